/*!
 * Storage broker: opens and validates one data unit
 *
 * The auditor only ever talks to the two-method `UnitBroker`
 * capability, so any on-disk unit format (account, container, object
 * metadata stores) can plug in behind it. `ReplicaFileBroker` is the
 * built-in format: a JSON header line declaring the unit id, a
 * soft-delete flag, the payload length and its SHA-256 digest,
 * followed by the raw payload bytes.
 */

use std::fs::File;
use std::io::{BufRead, BufReader, Read, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Header lines longer than this are treated as corruption rather
/// than read into memory.
const MAX_HEADER_LEN: u64 = 64 * 1024;

/// Errors raised while opening or validating a data unit.
///
/// Every variant is recovered at the per-unit auditor as a counted
/// failure; none of them aborts a sweep.
#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("unreadable unit: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed unit header: {0}")]
    Header(String),

    #[error("payload length mismatch: header declares {declared} bytes, found {found}")]
    SizeMismatch { declared: u64, found: u64 },

    #[error("payload digest mismatch: expected {expected}, got {actual}")]
    DigestMismatch { expected: String, actual: String },
}

/// Summary record returned by a successful integrity read
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitInfo {
    pub id: String,
    pub payload_len: u64,
    pub sha256: String,
}

/// Capability interface over one opened data unit
pub trait UnitBroker {
    /// True if the unit is a soft-delete tombstone
    fn is_deleted(&self) -> bool;

    /// Read and validate the unit's content
    fn get_info(&self) -> Result<UnitInfo, BrokerError>;
}

/// Constructs a broker for a data-unit path. Implemented once per
/// unit kind; the sweep machinery is generic over it.
pub trait BrokerOpener: Send + Sync {
    type Broker: UnitBroker;

    fn open(&self, path: &Path) -> Result<Self::Broker, BrokerError>;
}

#[derive(Debug, Serialize, Deserialize)]
struct UnitHeader {
    id: String,
    #[serde(default)]
    deleted: bool,
    payload_len: u64,
    sha256: String,
}

/// Built-in replica file format: one JSON header line, then payload
pub struct ReplicaFileBroker {
    path: PathBuf,
    header: UnitHeader,
}

impl ReplicaFileBroker {
    /// Open a unit file and parse its header. Payload validation is
    /// deferred to `get_info`, so tombstones can be recognized
    /// without reading their (empty) payload.
    pub fn open(path: &Path) -> Result<Self, BrokerError> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file).take(MAX_HEADER_LEN);

        let mut header_line = String::new();
        let n = reader.read_line(&mut header_line)?;
        if n == 0 {
            return Err(BrokerError::Header("empty file".to_string()));
        }
        if n as u64 >= MAX_HEADER_LEN && !header_line.ends_with('\n') {
            return Err(BrokerError::Header("header line too long".to_string()));
        }

        let header: UnitHeader = serde_json::from_str(header_line.trim_end())
            .map_err(|e| BrokerError::Header(e.to_string()))?;

        Ok(Self {
            path: path.to_path_buf(),
            header,
        })
    }

    /// Write a unit file in the replica format. Not used by the
    /// auditor itself (auditing is strictly read-only); this is the
    /// producer half of the format.
    pub fn create(path: &Path, id: &str, payload: &[u8], deleted: bool) -> std::io::Result<()> {
        let header = UnitHeader {
            id: id.to_string(),
            deleted,
            payload_len: payload.len() as u64,
            sha256: format!("{:x}", Sha256::digest(payload)),
        };
        let mut file = File::create(path)?;
        let line = serde_json::to_string(&header).map_err(std::io::Error::other)?;
        file.write_all(line.as_bytes())?;
        file.write_all(b"\n")?;
        file.write_all(payload)?;
        file.sync_all()?;
        Ok(())
    }
}

impl UnitBroker for ReplicaFileBroker {
    fn is_deleted(&self) -> bool {
        self.header.deleted
    }

    fn get_info(&self) -> Result<UnitInfo, BrokerError> {
        let file = File::open(&self.path)?;
        let mut reader = BufReader::new(file);

        // skip the header line re-parsed at open time
        let mut header_line = String::new();
        reader.read_line(&mut header_line)?;

        let mut hasher = Sha256::new();
        let mut found = 0u64;
        let mut buffer = [0u8; 64 * 1024];
        loop {
            let n = reader.read(&mut buffer)?;
            if n == 0 {
                break;
            }
            hasher.update(&buffer[..n]);
            found += n as u64;
        }

        if found != self.header.payload_len {
            return Err(BrokerError::SizeMismatch {
                declared: self.header.payload_len,
                found,
            });
        }

        let actual = format!("{:x}", hasher.finalize());
        if actual != self.header.sha256 {
            return Err(BrokerError::DigestMismatch {
                expected: self.header.sha256.clone(),
                actual,
            });
        }

        Ok(UnitInfo {
            id: self.header.id.clone(),
            payload_len: self.header.payload_len,
            sha256: actual,
        })
    }
}

/// Opener for the built-in replica file format
#[derive(Debug, Clone, Copy, Default)]
pub struct ReplicaFileOpener;

impl BrokerOpener for ReplicaFileOpener {
    type Broker = ReplicaFileBroker;

    fn open(&self, path: &Path) -> Result<Self::Broker, BrokerError> {
        ReplicaFileBroker::open(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::OpenOptions;
    use tempfile::tempdir;

    #[test]
    fn test_create_and_validate() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a1f.db");

        ReplicaFileBroker::create(&path, "a1f", b"account payload", false).unwrap();

        let broker = ReplicaFileBroker::open(&path).unwrap();
        assert!(!broker.is_deleted());

        let info = broker.get_info().unwrap();
        assert_eq!(info.id, "a1f");
        assert_eq!(info.payload_len, 15);
    }

    #[test]
    fn test_deleted_tombstone() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("dead.db");

        ReplicaFileBroker::create(&path, "dead", b"", true).unwrap();

        let broker = ReplicaFileBroker::open(&path).unwrap();
        assert!(broker.is_deleted());
    }

    #[test]
    fn test_corrupt_payload_fails_digest() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.db");

        ReplicaFileBroker::create(&path, "bad", b"original payload", false).unwrap();

        // flip payload bytes without touching the header
        let mut raw = std::fs::read(&path).unwrap();
        let len = raw.len();
        raw[len - 1] ^= 0xff;
        std::fs::write(&path, &raw).unwrap();

        let broker = ReplicaFileBroker::open(&path).unwrap();
        match broker.get_info() {
            Err(BrokerError::DigestMismatch { .. }) => {}
            other => panic!("expected digest mismatch, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_truncated_payload_fails_size() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("short.db");

        ReplicaFileBroker::create(&path, "short", b"0123456789", false).unwrap();

        let raw = std::fs::read(&path).unwrap();
        std::fs::write(&path, &raw[..raw.len() - 4]).unwrap();

        let broker = ReplicaFileBroker::open(&path).unwrap();
        match broker.get_info() {
            Err(BrokerError::SizeMismatch { declared, found }) => {
                assert_eq!(declared, 10);
                assert_eq!(found, 6);
            }
            other => panic!("expected size mismatch, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_malformed_header() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("junk.db");
        std::fs::write(&path, b"not json at all\nwhatever").unwrap();

        match ReplicaFileBroker::open(&path) {
            Err(BrokerError::Header(_)) => {}
            other => panic!("expected header error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_empty_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("empty.db");
        std::fs::write(&path, b"").unwrap();

        assert!(matches!(
            ReplicaFileBroker::open(&path),
            Err(BrokerError::Header(_))
        ));
    }

    #[test]
    fn test_appended_garbage_fails_size() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("grown.db");

        ReplicaFileBroker::create(&path, "grown", b"data", false).unwrap();

        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(b"extra").unwrap();

        let broker = ReplicaFileBroker::open(&path).unwrap();
        assert!(matches!(
            broker.get_info(),
            Err(BrokerError::SizeMismatch { .. })
        ));
    }
}
