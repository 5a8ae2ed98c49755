/*!
 * Vigil - replica store integrity auditor
 *
 * A crash-tolerant, rate-paced auditing daemon for sharded on-disk
 * replica stores, with:
 * - Lazy enumeration of data units across devices and partitions
 * - Mount-point guarding against failed device attachments
 * - SHA-256 payload validation through a pluggable broker interface
 * - Time-windowed pass/fail telemetry with JSON Lines report logs
 * - Self-pacing service mode with startup jitter and graceful shutdown
 *
 * Version: 0.4.0
 * Author: Shane Wall <shaneawall@gmail.com>
 */

pub mod config;
pub mod core;
pub mod error;
pub mod logging;
pub mod report;

// Re-export commonly used types
pub use config::{AuditConfig, LogLevel};
pub use core::{
    run_once, run_service, AuditOutcome, BrokerOpener, DataUnitLocation, MountCheck,
    ReplicaFileBroker, ReplicaFileOpener, ReportWindow, ShutdownHandle, SweepStats, Sweeper,
    SystemMounts, UnitBroker,
};
pub use error::{Result, VigilError};
pub use report::{ReportEvent, ReportLog, ReportStats};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
