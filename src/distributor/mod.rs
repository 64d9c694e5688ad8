mod request;

pub use request::NewSessionRequest;

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::instrument;

use crate::bus::{Event, EventBus};
use crate::client::NodeClient;
use crate::config::DistributorConfig;
use crate::error::{Error, Result};
use crate::model::{NodeId, NodeStatus, SessionRecord};
use crate::node::{HealthChecker, NodeHandle, NodeState, NodeSummary};
use crate::policy::SelectionPolicy;
use crate::session_map::SessionMap;

struct NodeEntry {
    handle: Arc<NodeHandle>,
    health_task: JoinHandle<()>,
}

/// Owns the node directory and serializes registration, removal, and
/// scheduling decisions behind a single reader/writer lock. No node-side
/// I/O is ever performed while the write lock is held.
pub struct Distributor {
    hosts: RwLock<HashMap<NodeId, NodeEntry>>,
    bus: Arc<dyn EventBus>,
    session_map: Arc<dyn SessionMap>,
    node_client: Arc<dyn NodeClient>,
    health_checker: Arc<HealthChecker>,
    policy: SelectionPolicy,
    registration_secret: String,
}

impl Distributor {
    pub fn new(config: DistributorConfig, bus: Arc<dyn EventBus>, session_map: Arc<dyn SessionMap>, node_client: Arc<dyn NodeClient>) -> Arc<Self> {
        let distributor = Arc::new(Distributor {
            hosts: RwLock::new(HashMap::new()),
            bus: bus.clone(),
            session_map,
            node_client: node_client.clone(),
            health_checker: Arc::new(HealthChecker::new(node_client)),
            policy: SelectionPolicy::new(),
            registration_secret: config.registration_secret,
        });

        let handler_distributor = distributor.clone();
        let mut receiver = bus.subscribe();
        tokio::spawn(async move {
            loop {
                match receiver.recv().await {
                    Ok(Event::NodeStatus(status)) => handler_distributor.on_node_status(status).await,
                    Ok(Event::NodeDrainComplete(id)) => handler_distributor.remove(id).await,
                    Ok(_) => {}
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                        log::warn!("distributor event listener lagged, skipped {skipped} events");
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        distributor
    }

    /// Filters capacity-matching `UP` nodes, ranks them with the Selection
    /// Policy, reserves capacity on the winner, and on success records the
    /// resulting session. Alternative capability sets in `request` are
    /// reported in the failure message but not tried (see DESIGN.md).
    #[instrument(skip(self, request), err)]
    pub async fn new_session(&self, request: NewSessionRequest) -> Result<SessionRecord> {
        let caps = request.primary().clone();

        let reservation = {
            let guard = self.hosts.write().await;
            let candidates: Vec<Arc<NodeHandle>> =
                guard.values().map(|entry| entry.handle.clone()).filter(|h| h.state() == NodeState::Up && h.has_capacity(&caps)).collect();

            let browser = caps.browser_name();
            let ranked = self.policy.select(&candidates, browser);

            let winner = ranked.into_iter().min_by(|a, b| {
                a.load()
                    .partial_cmp(&b.load())
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then_with(|| a.last_session_created_at().cmp(&b.last_session_created_at()))
                    .then_with(|| a.id().cmp(&b.id()))
            });

            match winner {
                Some(node) => node.reserve(&caps),
                None => None,
            }
            // write lock (and `guard`) drop here, before any node-side I/O
        }
        .ok_or_else(|| Error::SessionNotCreated { caps: request.all().to_vec(), reason: "no candidate node has capacity".into() })?;

        let record = reservation.finalize(&*self.node_client, &caps).await?;

        self.session_map.add(record.clone()).await.map_err(|e| Error::Storage(format!("session {} created on node but not recorded: {e}", record.session_id)))?;

        Ok(record)
    }

    /// Registers a node programmatically — equivalent to receiving a valid
    /// status for it, bypassing the registration-secret check.
    #[instrument(skip(self, status))]
    pub async fn add(&self, status: NodeStatus) -> Result<()> {
        self.upsert_node(status).await;
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn remove(&self, id: NodeId) {
        let removed = {
            let mut guard = self.hosts.write().await;
            guard.remove(&id)
        };
        if let Some(entry) = removed {
            entry.health_task.abort();
            self.bus.publish(Event::NodeRemoved(id));
        }
    }

    #[instrument(skip(self))]
    pub async fn status(&self) -> Vec<NodeSummary> {
        self.hosts.read().await.values().map(|entry| entry.handle.as_summary()).collect()
    }

    /// Triggers an immediate health check on every node.
    #[instrument(skip(self))]
    pub async fn refresh(&self) {
        let handles: Vec<Arc<NodeHandle>> = self.hosts.read().await.values().map(|entry| entry.handle.clone()).collect();
        for handle in handles {
            self.health_checker.probe_now(&handle).await;
        }
    }

    pub async fn is_ready(&self) -> bool {
        self.bus.is_ready() && self.session_map.is_ready()
    }

    async fn on_node_status(&self, status: NodeStatus) {
        if status.registration_secret != self.registration_secret {
            self.bus.publish(Event::NodeRejected(status.uri));
            return;
        }
        self.upsert_node(status).await;
    }

    /// Creates on first sight of an id, updates in place for a known id, or
    /// — when a status arrives with a known uri but a different id (a node
    /// restart) — removes the stale entry first and adds the new one. The
    /// known-id / known-uri / neither decision and its mutation happen under
    /// one write-lock acquisition, so two concurrent registrations for the
    /// same new uri cannot both pass the stale check and both insert.
    async fn upsert_node(&self, status: NodeStatus) {
        enum Outcome {
            Updated,
            Replaced { stale_id: NodeId, stale_task: JoinHandle<()> },
            Added,
        }

        let outcome = {
            let mut guard = self.hosts.write().await;

            if let Some(entry) = guard.get(&status.node_id) {
                entry.handle.update(&status);
                Outcome::Updated
            } else if let Some(stale_id) = guard.iter().find(|(_, entry)| entry.handle.uri() == status.uri).map(|(id, _)| *id) {
                let stale_task = guard.remove(&stale_id).expect("just located by iter").health_task;
                let handle = Arc::new(NodeHandle::from_status(&status));
                let health_task = self.health_checker.spawn(handle.clone());
                guard.insert(status.node_id, NodeEntry { handle, health_task });
                Outcome::Replaced { stale_id, stale_task }
            } else {
                let handle = Arc::new(NodeHandle::from_status(&status));
                let health_task = self.health_checker.spawn(handle.clone());
                guard.insert(status.node_id, NodeEntry { handle, health_task });
                Outcome::Added
            }
        };

        match outcome {
            Outcome::Updated => {}
            Outcome::Replaced { stale_id, stale_task } => {
                stale_task.abort();
                self.bus.publish(Event::NodeRemoved(stale_id));
                self.bus.publish(Event::NodeAdded(status.node_id));
            }
            Outcome::Added => self.bus.publish(Event::NodeAdded(status.node_id)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::LocalEventBus;
    use crate::client::MockNodeClient;
    use crate::session_map::MemorySessionMap;

    fn setup() -> Arc<Distributor> {
        let bus = Arc::new(LocalEventBus::new());
        let session_map = Arc::new(MemorySessionMap::new(&*bus));
        let node_client = Arc::new(MockNodeClient::healthy());
        Distributor::new(DistributorConfig::new("s"), bus, session_map, node_client)
    }

    #[tracing_test::traced_test]
    #[tokio::test(flavor = "current_thread")]
    async fn failed_new_session_opens_an_errored_span() {
        let distributor = setup();
        let request = NewSessionRequest::single(crate::model::Capabilities::new().with("browserName", "chrome"));

        let result = distributor.new_session(request).await;

        assert!(result.is_err());
        assert!(logs_contain("new_session"));
        assert!(logs_contain("error"));
    }
}
