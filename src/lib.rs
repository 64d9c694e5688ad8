pub mod bus;
pub mod client;
pub mod config;
pub mod distributor;
pub mod error;
pub mod logger;
pub mod model;
pub mod node;
pub mod policy;
pub mod session_map;

pub use bus::{Event, EventBus, LocalEventBus};
pub use client::{HttpClientFactory, HttpNodeClient, NodeClient, ReqwestClientFactory};
pub use config::{DistributorConfig, SessionMapBackend};
pub use distributor::{Distributor, NewSessionRequest};
pub use error::{Error, Result};
pub use session_map::{MemorySessionMap, RelationalSessionMap, SessionMap};
