use tokio::sync::broadcast;

use crate::model::{NodeId, NodeStatus, SessionId};

/// Lifecycle events exchanged between the Distributor, the Session Map, and
/// external collaborators. Consumed: `NodeStatus`, `NodeDrainComplete`,
/// `SessionClosed`. Produced: `NodeAdded`, `NodeRemoved`, `NodeRejected`.
#[derive(Debug, Clone)]
pub enum Event {
    NodeStatus(NodeStatus),
    NodeDrainComplete(NodeId),
    SessionClosed(SessionId),
    NodeAdded(NodeId),
    NodeRemoved(NodeId),
    NodeRejected(String),
}

/// Pub/sub of node and session lifecycle events. The concrete transport
/// (message broker, in-process channel, ...) is an external collaborator;
/// this crate ships `LocalEventBus`, an in-process broadcast channel,
/// sufficient to run and test the core end-to-end.
pub trait EventBus: Send + Sync {
    fn publish(&self, event: Event);
    fn subscribe(&self) -> broadcast::Receiver<Event>;
    fn is_ready(&self) -> bool;
}

/// In-process broadcast-channel bus. Handlers subscribe and run on whatever
/// task polls the receiver.
pub struct LocalEventBus {
    sender: broadcast::Sender<Event>,
}

impl LocalEventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(1024);
        LocalEventBus { sender }
    }
}

impl Default for LocalEventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus for LocalEventBus {
    fn publish(&self, event: Event) {
        // No subscribers is not an error: events are best-effort fan-out.
        let _ = self.sender.send(event);
    }

    fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.sender.subscribe()
    }

    fn is_ready(&self) -> bool {
        true
    }
}
