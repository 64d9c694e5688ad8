use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::{Connection, OptionalExtension, params};

use crate::error::{Error, Result};
use crate::model::{Capabilities, SessionId, SessionRecord};

use super::SessionMap;

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS sessions_map (
    session_ids  TEXT PRIMARY KEY,
    session_uri  TEXT NOT NULL,
    session_caps TEXT NULL
)";

/// SQLite-backed Session Map, with a single `sessions_map` table keyed by
/// session id. SQLite calls are synchronous, so each operation is dispatched
/// to a blocking thread and the connection is shared behind a `Mutex`. The
/// connection is held in an `Option` so `close()` can release it explicitly
/// instead of waiting for the last `Arc` to drop.
pub struct RelationalSessionMap {
    conn: Arc<Mutex<Option<Connection>>>,
}

impl RelationalSessionMap {
    /// `connection_string` is a path for `rusqlite::Connection::open`
    /// (use `:memory:` for tests — no external database process required).
    pub fn open(connection_string: &str) -> Result<Self> {
        let conn = Connection::open(connection_string).map_err(|e| Error::Config(format!("failed to open session map database: {e}")))?;
        conn.execute(SCHEMA, []).map_err(|e| Error::Config(format!("failed to create sessions_map table: {e}")))?;
        Ok(RelationalSessionMap { conn: Arc::new(Mutex::new(Some(conn))) })
    }

    /// Releases the underlying SQLite connection. Subsequent operations fail
    /// with `Error::Storage`.
    pub fn close(&self) {
        if let Ok(mut guard) = self.conn.lock() {
            guard.take();
        }
    }
}

impl Drop for RelationalSessionMap {
    fn drop(&mut self) {
        self.close();
    }
}

#[async_trait]
impl SessionMap for RelationalSessionMap {
    async fn add(&self, session: SessionRecord) -> Result<bool> {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || add_sync(&conn, session))
            .await
            .map_err(|e| Error::Internal(format!("session map task panicked: {e}")))?
    }

    async fn get(&self, id: SessionId) -> Result<SessionRecord> {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || get_sync(&conn, id))
            .await
            .map_err(|e| Error::Internal(format!("session map task panicked: {e}")))?
    }

    async fn remove(&self, id: SessionId) {
        let conn = self.conn.clone();
        let _ = tokio::task::spawn_blocking(move || remove_sync(&conn, id)).await;
    }

    fn is_ready(&self) -> bool {
        self.conn.lock().map(|c| c.as_ref().map(|conn| conn.is_autocommit()).unwrap_or(false)).unwrap_or(false)
    }
}

fn locked(conn: &Mutex<Option<Connection>>) -> Result<std::sync::MutexGuard<'_, Option<Connection>>> {
    let guard = conn.lock().expect("sqlite connection lock poisoned");
    if guard.is_none() {
        return Err(Error::Storage("session map connection is closed".into()));
    }
    Ok(guard)
}

fn add_sync(conn: &Mutex<Option<Connection>>, session: SessionRecord) -> Result<bool> {
    let guard = locked(conn)?;
    let conn = guard.as_ref().expect("checked by locked()");
    let caps_json = serde_json::to_string(&session.capabilities)?;
    let existed: bool = conn
        .query_row("SELECT 1 FROM sessions_map WHERE session_ids = ?", params![session.session_id.to_string()], |_| Ok(()))
        .optional()?
        .is_some();

    conn.execute(
        "INSERT OR REPLACE INTO sessions_map (session_ids, session_uri, session_caps) VALUES (?, ?, ?)",
        params![session.session_id.to_string(), session.uri, caps_json],
    )?;
    Ok(!existed)
}

fn get_sync(conn: &Mutex<Option<Connection>>, id: SessionId) -> Result<SessionRecord> {
    let guard = locked(conn)?;
    let conn = guard.as_ref().expect("checked by locked()");
    let row = conn
        .query_row(
            "SELECT session_uri, session_caps FROM sessions_map WHERE session_ids = ? LIMIT 1",
            params![id.to_string()],
            |row| {
                let uri: String = row.get(0)?;
                let caps: Option<String> = row.get(1)?;
                Ok((uri, caps))
            },
        )
        .optional()?;

    let Some((uri, caps_json)) = row else {
        return Err(Error::NoSuchSession(id.to_string()));
    };

    if url::Url::parse(&uri).is_err() {
        return Err(Error::NoSuchSession(uri));
    }

    let capabilities = match caps_json {
        Some(json) => serde_json::from_str(&json)?,
        None => Capabilities::new(),
    };

    Ok(SessionRecord { session_id: id, uri, capabilities })
}

fn remove_sync(conn: &Mutex<Option<Connection>>, id: SessionId) -> Result<()> {
    let guard = locked(conn)?;
    let conn = guard.as_ref().expect("checked by locked()");
    conn.execute("DELETE FROM sessions_map WHERE session_ids = ?", params![id.to_string()])?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(caps: Capabilities) -> SessionRecord {
        SessionRecord { session_id: SessionId::random(), uri: "http://node/session/1".into(), capabilities: caps }
    }

    #[tokio::test]
    async fn add_then_get_round_trips() {
        let map = RelationalSessionMap::open(":memory:").unwrap();
        let session = record(Capabilities::new().with("browserName", "chrome"));
        assert!(map.add(session.clone()).await.unwrap());
        assert_eq!(map.get(session.session_id).await.unwrap(), session);
    }

    #[tokio::test]
    async fn add_then_remove_then_get_fails() {
        let map = RelationalSessionMap::open(":memory:").unwrap();
        let session = record(Capabilities::new());
        map.add(session.clone()).await.unwrap();
        map.remove(session.session_id).await;
        assert!(map.get(session.session_id).await.is_err());
    }

    #[tokio::test]
    async fn unicode_and_embedded_quotes_round_trip() {
        let map = RelationalSessionMap::open(":memory:").unwrap();
        let caps = Capabilities::new().with("browserName", "chrome").with("note", "he said \"héllo\" 日本語 🦀");
        let session = record(caps);
        map.add(session.clone()).await.unwrap();
        let fetched = map.get(session.session_id).await.unwrap();
        assert_eq!(fetched.capabilities, session.capabilities);
    }

    #[tokio::test]
    async fn repeat_add_replaces_and_reports_no_new_insert() {
        let map = RelationalSessionMap::open(":memory:").unwrap();
        let session = record(Capabilities::new());
        assert!(map.add(session.clone()).await.unwrap());
        assert!(!map.add(session.clone()).await.unwrap());
    }

    #[tokio::test]
    async fn unparseable_uri_surfaces_as_no_such_session() {
        let map = RelationalSessionMap::open(":memory:").unwrap();
        let mut session = record(Capabilities::new());
        session.uri = "not a uri".into();
        map.add(session.clone()).await.unwrap();

        let err = map.get(session.session_id).await.unwrap_err();
        assert!(matches!(err, Error::NoSuchSession(offending) if offending == "not a uri"));
    }

    #[tokio::test]
    async fn close_releases_the_connection_and_fails_subsequent_operations() {
        let map = RelationalSessionMap::open(":memory:").unwrap();
        let session = record(Capabilities::new());
        map.add(session.clone()).await.unwrap();

        map.close();

        assert!(!map.is_ready());
        assert!(matches!(map.get(session.session_id).await, Err(Error::Storage(_))));
    }
}
