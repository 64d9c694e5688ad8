use std::sync::Arc;

use crate::client::NodeClient;
use crate::error::{Error, Result};
use crate::model::{Capabilities, SessionRecord};

use super::handle::NodeHandle;

/// A deferred node-side session creation. Holds a decremented slot until
/// `finalize` is called; if dropped without finalizing (or on finalize
/// failure) the slot is released back to the node.
///
/// The Distributor obtains one under its write lock, releases the lock, and
/// only then calls `finalize` — no node-side I/O happens while the
/// directory lock is held.
pub struct Reservation {
    node: Arc<NodeHandle>,
    stereotype_caps: Capabilities,
    uri: String,
    settled: bool,
}

impl Reservation {
    pub(super) fn new(node: Arc<NodeHandle>, stereotype_caps: Capabilities, uri: String) -> Self {
        Reservation { node, stereotype_caps, uri, settled: false }
    }

    /// Performs the actual remote "create session" call. On success, marks
    /// the reservation settled (the slot remains decremented for the
    /// lifetime of the session) and records the node's last-session-created
    /// timestamp. On failure, releases the slot and returns
    /// `SessionNotCreated`.
    pub async fn finalize(mut self, client: &dyn NodeClient, requested: &Capabilities) -> Result<SessionRecord> {
        match client.create_session(&self.uri, requested).await {
            Ok(session_id) => {
                self.settled = true; // slot now backs a live session, not a pending reservation
                self.node.record_session_created();
                Ok(SessionRecord { session_id, uri: self.uri.clone(), capabilities: requested.clone() })
            }
            Err(cause) => {
                self.release();
                Err(Error::SessionNotCreated { caps: vec![requested.clone()], reason: cause })
            }
        }
    }

    fn release(&mut self) {
        if !self.settled {
            self.node.release_slot(&self.stereotype_caps);
            self.settled = true;
        }
    }
}

impl Drop for Reservation {
    fn drop(&mut self) {
        self.release();
    }
}
