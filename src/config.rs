/*!
 * Configuration types for Vigil
 */

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Result, VigilError};

/// Main configuration for the auditing daemon
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    /// Root directory holding one subdirectory per storage device
    #[serde(default = "default_devices")]
    pub devices: PathBuf,

    /// Shard root under each device (e.g. "replicas" in
    /// /srv/node/sda/replicas/1001/...)
    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    /// Verify a device directory is an actual mount point before
    /// scanning it, so a failed mount never exposes the host
    /// filesystem to the audit
    #[serde(default = "default_true")]
    pub mount_check: bool,

    /// File extension identifying data units under a partition
    #[serde(default = "default_unit_suffix")]
    pub unit_suffix: String,

    /// Target seconds between sweep starts in service mode
    #[serde(default = "default_interval")]
    pub interval_secs: u64,

    /// Seconds between interim pass/fail reports during long sweeps
    #[serde(default = "default_reporting_interval")]
    pub reporting_interval_secs: u64,

    /// Maximum units audited per second (0 = unlimited)
    #[serde(default)]
    pub max_units_per_second: u32,

    /// Number of audit worker threads (0 = sequential)
    #[serde(default)]
    pub workers: usize,

    /// Path to the JSON Lines report log (None = logs only)
    #[serde(default)]
    pub report_log: Option<PathBuf>,

    /// Log level for diagnostic output
    #[serde(default)]
    pub log_level: LogLevel,

    /// Log file path (None = stdout)
    #[serde(default)]
    pub log_file: Option<PathBuf>,

    /// Enable verbose logging (shorthand for log_level = debug)
    #[serde(default)]
    pub verbose: bool,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            devices: default_devices(),
            data_dir: default_data_dir(),
            mount_check: true,
            unit_suffix: default_unit_suffix(),
            interval_secs: default_interval(),
            reporting_interval_secs: default_reporting_interval(),
            max_units_per_second: 0,
            workers: 0,
            report_log: None,
            log_level: LogLevel::Info,
            log_file: None,
            verbose: false,
        }
    }
}

impl AuditConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &PathBuf) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            VigilError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        let config: AuditConfig = toml::from_str(&contents).map_err(|e| {
            VigilError::Config(format!("cannot parse {}: {}", path.display(), e))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn to_file(&self, path: &PathBuf) -> Result<()> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| VigilError::Config(format!("cannot serialize config: {}", e)))?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Reject configurations the daemon cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.data_dir.is_empty() {
            return Err(VigilError::Config("data_dir must not be empty".to_string()));
        }
        if self.unit_suffix.is_empty() {
            return Err(VigilError::Config(
                "unit_suffix must not be empty".to_string(),
            ));
        }
        if self.reporting_interval_secs == 0 {
            return Err(VigilError::Config(
                "reporting_interval_secs must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Target cadence between sweep starts
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    /// Rolling window between interim count reports
    pub fn reporting_interval(&self) -> Duration {
        Duration::from_secs(self.reporting_interval_secs)
    }
}

/// Log level for diagnostic output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Only errors
    Error,

    /// Warnings and errors
    Warn,

    /// Info, warnings, and errors
    #[default]
    Info,

    /// Debug and above
    Debug,

    /// All messages including traces
    Trace,
}

impl LogLevel {
    /// Convert to tracing::Level
    pub fn to_tracing_level(&self) -> tracing::Level {
        match self {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace => tracing::Level::TRACE,
        }
    }
}

// Default value functions for serde
fn default_true() -> bool {
    true
}

fn default_devices() -> PathBuf {
    PathBuf::from("/srv/node")
}

fn default_data_dir() -> String {
    "replicas".to_string()
}

fn default_unit_suffix() -> String {
    "db".to_string()
}

fn default_interval() -> u64 {
    1800
}

fn default_reporting_interval() -> u64 {
    3600
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AuditConfig::default();
        assert_eq!(config.devices, PathBuf::from("/srv/node"));
        assert_eq!(config.data_dir, "replicas");
        assert!(config.mount_check);
        assert_eq!(config.interval_secs, 1800);
        assert_eq!(config.reporting_interval_secs, 3600);
        assert_eq!(config.workers, 0);
        assert_eq!(config.max_units_per_second, 0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_serialization_round_trip() {
        let config = AuditConfig::default();
        let toml = toml::to_string(&config).unwrap();
        let deserialized: AuditConfig = toml::from_str(&toml).unwrap();
        assert_eq!(config.devices, deserialized.devices);
        assert_eq!(config.mount_check, deserialized.mount_check);
        assert_eq!(config.interval_secs, deserialized.interval_secs);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let toml_str = r#"
devices = "/mnt/store"
interval_secs = 60
"#;
        let config: AuditConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.devices, PathBuf::from("/mnt/store"));
        assert_eq!(config.interval_secs, 60);
        assert!(config.mount_check);
        assert_eq!(config.data_dir, "replicas");
        assert_eq!(config.unit_suffix, "db");
    }

    #[test]
    fn test_readme_config_example() {
        let toml_str = r#"
devices = "/srv/node"
data_dir = "replicas"
mount_check = true
unit_suffix = "db"
interval_secs = 1800
reporting_interval_secs = 3600
max_units_per_second = 25
workers = 4
report_log = "/var/log/vigil/report.log"
log_level = "info"
"#;
        let config: AuditConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.max_units_per_second, 25);
        assert_eq!(config.workers, 4);
        assert_eq!(
            config.report_log,
            Some(PathBuf::from("/var/log/vigil/report.log"))
        );
        assert_eq!(config.log_level, LogLevel::Info);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_empty_data_dir() {
        let config = AuditConfig {
            data_dir: String::new(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_reporting_interval() {
        let config = AuditConfig {
            reporting_interval_secs: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_durations() {
        let config = AuditConfig {
            interval_secs: 60,
            reporting_interval_secs: 10,
            ..Default::default()
        };
        assert_eq!(config.interval(), Duration::from_secs(60));
        assert_eq!(config.reporting_interval(), Duration::from_secs(10));
    }

    #[test]
    fn test_log_level_conversion() {
        assert_eq!(LogLevel::Error.to_tracing_level(), tracing::Level::ERROR);
        assert_eq!(LogLevel::Debug.to_tracing_level(), tracing::Level::DEBUG);
    }
}
