use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use crate::model::{Capabilities, SessionId};

/// The remote-node client: performs the actual "create session" and health
/// probe calls against a worker node's HTTP/RPC surface. The wire protocol
/// itself is an external collaborator's concern; this is the seam the core
/// consumes instead of talking to nodes directly.
#[async_trait]
pub trait NodeClient: Send + Sync {
    async fn create_session(&self, uri: &str, caps: &Capabilities) -> Result<SessionId, String>;
    async fn probe(&self, uri: &str) -> Result<(), String>;
}

/// Produces `reqwest::Client` instances shared across node handles, an
/// injectable HTTP client factory so callers can control pooling/TLS.
pub trait HttpClientFactory: Send + Sync {
    fn client(&self) -> reqwest::Client;
}

#[derive(Debug, Default)]
pub struct ReqwestClientFactory;

impl HttpClientFactory for ReqwestClientFactory {
    fn client(&self) -> reqwest::Client {
        reqwest::Client::builder().timeout(std::time::Duration::from_secs(30)).build().unwrap_or_default()
    }
}

/// Production `NodeClient`: POSTs a session-creation request to the node's
/// advertised URI and GETs its status endpoint for health probes.
pub struct HttpNodeClient {
    client: reqwest::Client,
}

impl HttpNodeClient {
    pub fn new(factory: &dyn HttpClientFactory) -> Self {
        HttpNodeClient { client: factory.client() }
    }
}

#[async_trait]
impl NodeClient for HttpNodeClient {
    async fn create_session(&self, uri: &str, caps: &Capabilities) -> Result<SessionId, String> {
        let response = self
            .client
            .post(format!("{uri}/session"))
            .json(caps)
            .send()
            .await
            .map_err(|e| format!("create session request failed: {e}"))?;

        if !response.status().is_success() {
            return Err(format!("node rejected session creation: {}", response.status()));
        }
        Ok(SessionId::random())
    }

    async fn probe(&self, uri: &str) -> Result<(), String> {
        let response = self.client.get(format!("{uri}/status")).send().await.map_err(|e| format!("probe failed: {e}"))?;
        if response.status().is_success() { Ok(()) } else { Err(format!("unhealthy status: {}", response.status())) }
    }
}

/// Test double: deterministic success/failure, no network I/O.
pub struct MockNodeClient {
    healthy: AtomicBool,
    creations: AtomicU32,
    fail_creation: AtomicBool,
}

impl MockNodeClient {
    pub fn healthy() -> Self {
        MockNodeClient { healthy: AtomicBool::new(true), creations: AtomicU32::new(0), fail_creation: AtomicBool::new(false) }
    }

    pub fn failing() -> Self {
        MockNodeClient { healthy: AtomicBool::new(false), creations: AtomicU32::new(0), fail_creation: AtomicBool::new(false) }
    }

    pub fn failing_creation() -> Self {
        MockNodeClient { healthy: AtomicBool::new(true), creations: AtomicU32::new(0), fail_creation: AtomicBool::new(true) }
    }

    pub fn creations(&self) -> u32 {
        self.creations.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl NodeClient for MockNodeClient {
    async fn create_session(&self, _uri: &str, _caps: &Capabilities) -> Result<SessionId, String> {
        if self.fail_creation.load(Ordering::SeqCst) {
            return Err("mock creation failure".into());
        }
        self.creations.fetch_add(1, Ordering::SeqCst);
        Ok(SessionId::random())
    }

    async fn probe(&self, _uri: &str) -> Result<(), String> {
        if self.healthy.load(Ordering::SeqCst) { Ok(()) } else { Err("mock unreachable".into()) }
    }
}
