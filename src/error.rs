use thiserror::Error;

use crate::model::Capabilities;

/// Taxonomy of errors a Distributor operation can surface to a caller.
#[derive(Debug, Error)]
pub enum Error {
    /// No candidate node could serve the requested capabilities, the node-side
    /// creation call failed, or the payload was empty.
    #[error("session not created for {caps:?}: {reason}")]
    SessionNotCreated { caps: Vec<Capabilities>, reason: String },

    /// Session Map lookup miss, or a stored URI failed to parse.
    #[error("no such session: {0}")]
    NoSuchSession(String),

    /// Session Map backend I/O failure.
    #[error("storage failure: {0}")]
    Storage(String),

    /// Startup-time failure to initialize a backend.
    #[error("configuration error: {0}")]
    Config(String),

    /// Anything else that should never happen in normal operation.
    #[error("internal error: {0}")]
    Internal(String),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
