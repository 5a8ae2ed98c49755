/*!
 * Error types for Vigil
 */

use std::fmt;
use std::io;
use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, VigilError>;

/// Exit code constants for structured process exit
pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FATAL: i32 = 2;

#[derive(Debug)]
pub enum VigilError {
    /// The configured devices root could not be read at all.
    /// Everything below it degrades to a logged skip; this does not.
    DevicesRootUnreadable { path: PathBuf, source: io::Error },

    /// I/O error
    Io(io::Error),

    /// Configuration error
    Config(String),

    /// Report log error
    ReportLog(String),
}

impl VigilError {
    /// Get the process exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            VigilError::DevicesRootUnreadable { .. }
            | VigilError::Io(_)
            | VigilError::Config(_)
            | VigilError::ReportLog(_) => EXIT_FATAL,
        }
    }

    /// Check if this error is fatal to a sweep (as opposed to a
    /// per-unit or per-subtree condition, which never surfaces here)
    pub fn is_fatal(&self) -> bool {
        match self {
            VigilError::DevicesRootUnreadable { .. } => true,
            VigilError::Config(_) => true,
            VigilError::Io(_) => true,
            VigilError::ReportLog(_) => false,
        }
    }
}

impl fmt::Display for VigilError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VigilError::DevicesRootUnreadable { path, source } => {
                write!(f, "Devices root unreadable: {}: {}", path.display(), source)
            }
            VigilError::Io(err) => {
                write!(f, "I/O error: {}", err)
            }
            VigilError::Config(msg) => {
                write!(f, "Configuration error: {}", msg)
            }
            VigilError::ReportLog(msg) => {
                write!(f, "Report log error: {}", msg)
            }
        }
    }
}

impl std::error::Error for VigilError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            VigilError::DevicesRootUnreadable { source, .. } => Some(source),
            VigilError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for VigilError {
    fn from(err: io::Error) -> Self {
        VigilError::Io(err)
    }
}
