mod memory;
mod relational;

pub use memory::MemorySessionMap;
pub use relational::RelationalSessionMap;

use async_trait::async_trait;

use crate::error::Result;
use crate::model::{SessionId, SessionRecord};

/// Key-value store keyed by `sessionId`, with pluggable backend. `remove` is
/// idempotent and never errors on a missing id — `SESSION_CLOSED` delivery
/// is the sole trigger for removal in normal operation; the Distributor
/// never calls `remove` directly after a successful session creation.
#[async_trait]
pub trait SessionMap: Send + Sync {
    /// Inserts or replaces. Returns whether an insert (vs. replace) occurred.
    async fn add(&self, session: SessionRecord) -> Result<bool>;
    async fn get(&self, id: SessionId) -> Result<SessionRecord>;
    async fn remove(&self, id: SessionId);
    fn is_ready(&self) -> bool;
}
