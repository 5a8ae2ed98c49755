/*!
 * Per-unit auditor
 */

use tracing::{debug, error};

use super::broker::{BrokerOpener, UnitBroker};
use super::locations::DataUnitLocation;

/// Classification of one audited unit.
///
/// `Skipped` covers soft-delete tombstones, which count toward
/// neither passes nor failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditOutcome {
    Passed,
    Failed,
    Skipped,
}

/// Audit a single data unit through its broker.
///
/// This never propagates: any broker error is classified as `Failed`
/// and logged with the unit's identifying path, so one corrupt unit
/// can never abort a sweep. Strictly read-only.
pub fn audit_unit<O: BrokerOpener>(opener: &O, location: &DataUnitLocation) -> AuditOutcome {
    let broker = match opener.open(&location.path) {
        Ok(broker) => broker,
        Err(err) => {
            error!(
                device = %location.device,
                partition = %location.partition,
                path = %location.path.display(),
                error = %err,
                "audit failed: could not open unit"
            );
            return AuditOutcome::Failed;
        }
    };

    if broker.is_deleted() {
        debug!(path = %location.path.display(), "skipping deleted unit");
        return AuditOutcome::Skipped;
    }

    match broker.get_info() {
        Ok(info) => {
            debug!(
                path = %location.path.display(),
                unit = %info.id,
                "audit passed"
            );
            AuditOutcome::Passed
        }
        Err(err) => {
            error!(
                device = %location.device,
                partition = %location.partition,
                path = %location.path.display(),
                error = %err,
                "audit failed"
            );
            AuditOutcome::Failed
        }
    }
}
