use std::sync::Arc;

use clap::Parser;

use grid_distributor::{
    DistributorConfig, Distributor, Event, EventBus, LocalEventBus, MemorySessionMap, NewSessionRequest, RelationalSessionMap, SessionMap,
    client::MockNodeClient,
    logger,
    model::{Availability, Capabilities, NodeId, NodeStatus, Stereotype},
};

/// Demo runner for the distributor core. Does not start an HTTP/RPC server
/// (the concrete transport is out of scope); it seeds one node, submits one
/// session, and prints the resulting directory status.
#[derive(Parser, Debug)]
struct Cli {
    /// Registration secret nodes must present in their status payload.
    #[arg(long, default_value = "dev-secret")]
    secret: String,

    /// SQLite path for the relational Session Map backend. Omit for the
    /// in-memory backend.
    #[arg(long)]
    db: Option<String>,

    /// Address a future HTTP/RPC transport would bind to. Accepted and
    /// logged only — no server is started (out of scope, see DESIGN.md).
    #[arg(long, default_value = "127.0.0.1:4567")]
    bind: String,
}

#[tokio::main]
async fn main() {
    logger::init();
    let cli = Cli::parse();
    log::info!("configured bind address {} (no server started, transport is out of scope)", cli.bind);

    let bus = Arc::new(LocalEventBus::new());

    let mut config = DistributorConfig::new(cli.secret.clone());
    if let Some(path) = &cli.db {
        config = config.with_relational_backend(path.clone());
    }

    let session_map: Arc<dyn SessionMap> = match &config.session_map_backend {
        grid_distributor::SessionMapBackend::Relational { connection_string } => {
            Arc::new(RelationalSessionMap::open(connection_string).expect("failed to open session map database"))
        }
        grid_distributor::SessionMapBackend::Memory => Arc::new(MemorySessionMap::new(&*bus)),
    };
    let node_client = Arc::new(MockNodeClient::healthy());

    let distributor = Distributor::new(config, bus.clone(), session_map, node_client);

    let node_id = NodeId::random();
    distributor
        .add(NodeStatus {
            node_id,
            uri: "http://127.0.0.1:4444".into(),
            stereotypes: vec![Stereotype::new(Capabilities::new().with("browserName", "chrome"), 4)],
            active_sessions: 0,
            availability: Availability::Up,
            registration_secret: cli.secret,
        })
        .await
        .expect("node registration cannot fail");

    log::info!("Registered demo node {node_id}");

    let request = NewSessionRequest::single(Capabilities::new().with("browserName", "chrome"));
    match distributor.new_session(request).await {
        Ok(session) => log::info!("Created session {} on {}", session.session_id, session.uri),
        Err(e) => log::error!("Failed to create session: {e}"),
    }

    for summary in distributor.status().await {
        log::info!("node {} uri={} state={:?} load={:.2}", summary.id, summary.uri, summary.state, summary.load);
    }

    // Demonstrate drain: bus-delivered event removes the node without a
    // direct `remove` call.
    bus.publish(Event::NodeDrainComplete(node_id));
}
