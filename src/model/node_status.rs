use serde::{Deserialize, Serialize};

use super::capabilities::Stereotype;
use super::id::NodeId;

/// Snapshot message published by a node. Immutable once received.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeStatus {
    pub node_id: NodeId,
    pub uri: String,
    pub stereotypes: Vec<Stereotype>,
    pub active_sessions: u32,
    pub availability: Availability,
    pub registration_secret: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Availability {
    Up,
    Draining,
}
