use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;

use crate::bus::{Event, EventBus};
use crate::error::{Error, Result};
use crate::model::{SessionId, SessionRecord};

use super::SessionMap;

/// Concurrent map protected by a fair reader/writer lock. Registers a
/// listener on `SESSION_CLOSED` at construction time; the listener must be
/// deregistered via `close()` to allow clean teardown (see Design Notes,
/// "Listener lifecycle").
pub struct MemorySessionMap {
    sessions: Arc<RwLock<HashMap<SessionId, SessionRecord>>>,
    listener: Option<JoinHandle<()>>,
}

impl MemorySessionMap {
    pub fn new(bus: &dyn EventBus) -> Self {
        let sessions: Arc<RwLock<HashMap<SessionId, SessionRecord>>> = Arc::new(RwLock::new(HashMap::new()));
        let mut receiver = bus.subscribe();
        let listener_sessions = sessions.clone();
        let listener = tokio::spawn(async move {
            loop {
                match receiver.recv().await {
                    Ok(Event::SessionClosed(id)) => {
                        listener_sessions.write().await.remove(&id);
                    }
                    Ok(_) => {}
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                        log::warn!("session map listener lagged, skipped {skipped} events");
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }
        });
        MemorySessionMap { sessions, listener: Some(listener) }
    }

    pub fn close(&mut self) {
        if let Some(handle) = self.listener.take() {
            handle.abort();
        }
    }
}

impl Drop for MemorySessionMap {
    fn drop(&mut self) {
        self.close();
    }
}

#[async_trait]
impl SessionMap for MemorySessionMap {
    async fn add(&self, session: SessionRecord) -> Result<bool> {
        let mut guard = self.sessions.write().await;
        let inserted = !guard.contains_key(&session.session_id);
        guard.insert(session.session_id, session);
        Ok(inserted)
    }

    async fn get(&self, id: SessionId) -> Result<SessionRecord> {
        self.sessions.read().await.get(&id).cloned().ok_or_else(|| Error::NoSuchSession(id.to_string()))
    }

    async fn remove(&self, id: SessionId) {
        self.sessions.write().await.remove(&id);
    }

    fn is_ready(&self) -> bool {
        self.listener.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Capabilities;

    fn record() -> SessionRecord {
        SessionRecord { session_id: SessionId::random(), uri: "http://node/session/1".into(), capabilities: Capabilities::new() }
    }

    #[tokio::test]
    async fn add_then_get_round_trips() {
        let bus = crate::bus::LocalEventBus::new();
        let map = MemorySessionMap::new(&bus);
        let session = record();
        assert!(map.add(session.clone()).await.unwrap());
        assert_eq!(map.get(session.session_id).await.unwrap(), session);
    }

    #[tokio::test]
    async fn session_closed_event_removes_entry() {
        let bus = crate::bus::LocalEventBus::new();
        let map = MemorySessionMap::new(&bus);
        let session = record();
        map.add(session.clone()).await.unwrap();

        bus.publish(Event::SessionClosed(session.session_id));
        // allow the listener task to run
        tokio::task::yield_now().await;
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        assert!(map.get(session.session_id).await.is_err());
    }

    #[tokio::test]
    async fn remove_is_idempotent() {
        let bus = crate::bus::LocalEventBus::new();
        let map = MemorySessionMap::new(&bus);
        let id = SessionId::random();
        map.remove(id).await;
        map.remove(id).await;
    }
}
