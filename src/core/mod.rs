/*!
 * Core auditing machinery
 */

pub mod auditor;
pub mod broker;
pub mod locations;
pub mod pace;
pub mod scheduler;
pub mod shutdown;
pub mod sweep;

pub use auditor::{audit_unit, AuditOutcome};
pub use broker::{
    BrokerError, BrokerOpener, ReplicaFileBroker, ReplicaFileOpener, UnitBroker, UnitInfo,
};
pub use locations::{DataUnitLocation, LocationIter, MountCheck, SystemMounts};
pub use pace::UnitRateLimiter;
pub use scheduler::{pause_between, run_once, run_service, startup_jitter};
pub use shutdown::ShutdownHandle;
pub use sweep::{ReportWindow, SweepStats, Sweeper};
