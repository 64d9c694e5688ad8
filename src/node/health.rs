use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::client::NodeClient;

use super::handle::NodeHandle;

/// Consecutive probe failures before a node is demoted to `DOWN`.
pub const HEALTH_FAILURE_THRESHOLD: u32 = 3;

/// Interval between probes for a single node.
pub const HEALTH_CHECK_INTERVAL: Duration = Duration::from_secs(30);

/// Hard deadline for a single probe round-trip.
pub const HEALTH_CHECK_DEADLINE: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOutcome {
    Healthy,
    Unreachable,
}

/// Schedules one recurring probe task per registered node. Tasks never
/// acquire the Distributor's directory lock; they only touch the single
/// `NodeHandle` they were spawned for.
pub struct HealthChecker {
    client: Arc<dyn NodeClient>,
}

impl HealthChecker {
    pub fn new(client: Arc<dyn NodeClient>) -> Self {
        HealthChecker { client }
    }

    /// Spawns the recurring task for `node`. The returned handle is owned by
    /// the Distributor's directory entry so `remove` can abort it.
    pub fn spawn(&self, node: Arc<NodeHandle>) -> JoinHandle<()> {
        let client = self.client.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(HEALTH_CHECK_INTERVAL);
            loop {
                ticker.tick().await;
                run_probe(&*client, &node).await;
            }
        })
    }

    /// Runs one probe immediately, used by `Distributor::refresh`.
    pub async fn probe_now(&self, node: &NodeHandle) {
        run_probe(&*self.client, node).await;
    }
}

async fn run_probe(client: &dyn NodeClient, node: &NodeHandle) {
    let outcome = match tokio::time::timeout(HEALTH_CHECK_DEADLINE, client.probe(&node.uri())).await {
        Ok(Ok(())) => ProbeOutcome::Healthy,
        Ok(Err(_)) | Err(_) => ProbeOutcome::Unreachable,
    };
    node.apply_probe(outcome);
}
