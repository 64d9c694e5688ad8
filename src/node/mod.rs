mod handle;
mod health;
mod reservation;

pub use handle::{NodeHandle, NodeState, NodeSummary};
pub use health::{HEALTH_CHECK_DEADLINE, HEALTH_CHECK_INTERVAL, HEALTH_FAILURE_THRESHOLD, HealthChecker, ProbeOutcome};
pub use reservation::Reservation;
