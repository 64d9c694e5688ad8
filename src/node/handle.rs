use std::sync::RwLock;
use std::time::Instant;

use crate::model::{Capabilities, NodeId, NodeStatus, Stereotype};

use super::health::{HEALTH_FAILURE_THRESHOLD, ProbeOutcome};
use super::reservation::Reservation;

/// Lifecycle state of a registered node. A `Draining` node refuses new
/// reservations; it only leaves the directory via a drain-complete event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    Up,
    Draining,
    Down,
}

/// Per-stereotype slot accounting: how many concurrent sessions of this
/// template the node can serve, and how many are currently reserved.
#[derive(Debug, Clone)]
struct StereotypeSlots {
    stereotype: Stereotype,
    reserved: u32,
}

impl StereotypeSlots {
    fn available(&self) -> u32 {
        self.stereotype.slots.saturating_sub(self.reserved)
    }
}

#[derive(Debug)]
struct NodeHandleInner {
    uri: String,
    state: NodeState,
    load: f64,
    last_session_created_at: Instant,
    stereotypes: Vec<StereotypeSlots>,
    consecutive_health_failures: u32,
}

/// Per-registered-node record. Its mutable fields are protected by the
/// handle's own lock so health-check tasks never need the Distributor's
/// directory lock (see `HealthChecker`).
#[derive(Debug)]
pub struct NodeHandle {
    id: NodeId,
    inner: RwLock<NodeHandleInner>,
}

/// Immutable projection of a `NodeHandle` for status dumps.
#[derive(Debug, Clone)]
pub struct NodeSummary {
    pub id: NodeId,
    pub uri: String,
    pub state: NodeState,
    pub load: f64,
    pub stereotypes: Vec<(Stereotype, u32)>,
}

impl NodeHandle {
    pub fn from_status(status: &NodeStatus) -> Self {
        let stereotypes = status.stereotypes.iter().cloned().map(|stereotype| StereotypeSlots { stereotype, reserved: 0 }).collect();
        NodeHandle {
            id: status.node_id,
            inner: RwLock::new(NodeHandleInner {
                uri: status.uri.clone(),
                state: NodeState::Up,
                load: 0.0,
                last_session_created_at: Instant::now(),
                stereotypes,
                consecutive_health_failures: 0,
            }),
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn uri(&self) -> String {
        self.inner.read().expect("node lock poisoned").uri.clone()
    }

    pub fn state(&self) -> NodeState {
        self.inner.read().expect("node lock poisoned").state
    }

    pub fn load(&self) -> f64 {
        self.inner.read().expect("node lock poisoned").load
    }

    pub fn last_session_created_at(&self) -> Instant {
        self.inner.read().expect("node lock poisoned").last_session_created_at
    }

    /// True if any advertised stereotype matching `caps` has a free slot.
    pub fn has_capacity(&self, caps: &Capabilities) -> bool {
        let guard = self.inner.read().expect("node lock poisoned");
        guard.state == NodeState::Up && guard.stereotypes.iter().any(|s| s.stereotype.matches(caps) && s.available() > 0)
    }

    pub fn stereotypes(&self) -> Vec<Stereotype> {
        self.inner.read().expect("node lock poisoned").stereotypes.iter().map(|s| s.stereotype.clone()).collect()
    }

    /// Atomically decrements a free slot for a stereotype matching `caps` and
    /// returns a guard that finalizes the reservation or releases it on drop.
    pub fn reserve(self: &std::sync::Arc<Self>, caps: &Capabilities) -> Option<Reservation> {
        let mut guard = self.inner.write().expect("node lock poisoned");
        if guard.state != NodeState::Up {
            return None;
        }
        let slot = guard.stereotypes.iter_mut().find(|s| s.stereotype.matches(caps) && s.available() > 0)?;
        slot.reserved += 1;
        let stereotype_caps = slot.stereotype.capabilities.clone();
        let uri = guard.uri.clone();
        drop(guard);
        Some(Reservation::new(self.clone(), stereotype_caps, uri))
    }

    /// Called by `Reservation::release` (success path marks the session
    /// creation time; failure path only frees the slot).
    pub(super) fn release_slot(&self, stereotype_caps: &Capabilities) {
        let mut guard = self.inner.write().expect("node lock poisoned");
        if let Some(slot) = guard.stereotypes.iter_mut().find(|s| s.stereotype.capabilities == *stereotype_caps) {
            slot.reserved = slot.reserved.saturating_sub(1);
        }
    }

    pub(super) fn record_session_created(&self) {
        let mut guard = self.inner.write().expect("node lock poisoned");
        guard.last_session_created_at = Instant::now();
    }

    /// Recompute load/counters/state from the latest snapshot.
    pub fn update(&self, status: &NodeStatus) {
        let mut guard = self.inner.write().expect("node lock poisoned");
        guard.uri = status.uri.clone();
        guard.consecutive_health_failures = 0;
        // `Down` is only cleared by `apply_probe`: a routine heartbeat must
        // never revive a node the health checker demoted.
        if status.availability == crate::model::Availability::Draining {
            guard.state = NodeState::Draining;
        }

        let total_slots: u32 = status.stereotypes.iter().map(|s| s.slots).sum();
        guard.load = if total_slots == 0 { 0.0 } else { status.active_sessions as f64 / total_slots as f64 };

        for advertised in &status.stereotypes {
            match guard.stereotypes.iter_mut().find(|s| s.stereotype.capabilities == advertised.capabilities) {
                Some(existing) => existing.stereotype.slots = advertised.slots,
                None => guard.stereotypes.push(StereotypeSlots { stereotype: advertised.clone(), reserved: 0 }),
            }
        }
    }

    /// Probe result handling: transitions `UP <-> DOWN` on repeated failures
    /// or recovery. Never touches the Distributor's directory lock.
    pub fn apply_probe(&self, outcome: ProbeOutcome) {
        let mut guard = self.inner.write().expect("node lock poisoned");
        match outcome {
            ProbeOutcome::Healthy => {
                guard.consecutive_health_failures = 0;
                if guard.state == NodeState::Down {
                    guard.state = NodeState::Up;
                }
            }
            ProbeOutcome::Unreachable => {
                guard.consecutive_health_failures += 1;
                if guard.consecutive_health_failures >= HEALTH_FAILURE_THRESHOLD {
                    guard.state = NodeState::Down;
                }
            }
        }
    }

    pub fn as_summary(&self) -> NodeSummary {
        let guard = self.inner.read().expect("node lock poisoned");
        NodeSummary {
            id: self.id,
            uri: guard.uri.clone(),
            state: guard.state,
            load: guard.load,
            stereotypes: guard.stereotypes.iter().map(|s| (s.stereotype.clone(), s.available())).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn status(node_id: NodeId, slots: u32) -> NodeStatus {
        NodeStatus {
            node_id,
            uri: "http://node-1".into(),
            stereotypes: vec![Stereotype::new(Capabilities::new().with("browserName", "chrome"), slots)],
            active_sessions: 0,
            availability: crate::model::Availability::Up,
            registration_secret: "s".into(),
        }
    }

    #[test]
    fn reserve_decrements_and_release_restores() {
        let handle = Arc::new(NodeHandle::from_status(&status(NodeId::random(), 1)));
        let caps = Capabilities::new().with("browserName", "chrome");
        assert!(handle.has_capacity(&caps));

        let reservation = handle.reserve(&caps).expect("slot available");
        assert!(!handle.has_capacity(&caps));

        drop(reservation); // dropped without finalize() => released
        assert!(handle.has_capacity(&caps));
    }

    #[test]
    fn draining_node_refuses_reservations() {
        let handle = Arc::new(NodeHandle::from_status(&status(NodeId::random(), 2)));
        let mut draining_status = status(handle.id(), 2);
        draining_status.availability = crate::model::Availability::Draining;
        handle.update(&draining_status);

        let caps = Capabilities::new().with("browserName", "chrome");
        assert!(handle.reserve(&caps).is_none());
    }

    #[test]
    fn health_failures_transition_to_down_and_recover() {
        let handle = NodeHandle::from_status(&status(NodeId::random(), 1));
        for _ in 0..HEALTH_FAILURE_THRESHOLD {
            handle.apply_probe(ProbeOutcome::Unreachable);
        }
        assert_eq!(handle.state(), NodeState::Down);

        handle.apply_probe(ProbeOutcome::Healthy);
        assert_eq!(handle.state(), NodeState::Up);
    }

    #[test]
    fn heartbeat_does_not_revive_a_down_node() {
        let handle = NodeHandle::from_status(&status(NodeId::random(), 1));
        for _ in 0..HEALTH_FAILURE_THRESHOLD {
            handle.apply_probe(ProbeOutcome::Unreachable);
        }
        assert_eq!(handle.state(), NodeState::Down);

        handle.update(&status(handle.id(), 1));
        assert_eq!(handle.state(), NodeState::Down, "a routine NODE_STATUS heartbeat must not clear DOWN");
    }
}
