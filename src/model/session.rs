use serde::{Deserialize, Serialize};

use super::capabilities::Capabilities;
use super::id::SessionId;

/// A live automation session recorded by the Distributor after a successful
/// reservation and node-side creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub session_id: SessionId,
    pub uri: String,
    pub capabilities: Capabilities,
}
