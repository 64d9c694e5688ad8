use std::sync::Arc;

use grid_distributor::client::MockNodeClient;
use grid_distributor::model::{Availability, Capabilities, NodeId, NodeStatus, Stereotype};
use grid_distributor::{Distributor, DistributorConfig, Error, Event, EventBus, LocalEventBus, MemorySessionMap, NewSessionRequest};

const SECRET: &str = "test-secret";

fn node_status(node_id: NodeId, uri: &str, browser: &str, slots: u32) -> NodeStatus {
    NodeStatus {
        node_id,
        uri: uri.into(),
        stereotypes: vec![Stereotype::new(Capabilities::new().with("browserName", browser), slots)],
        active_sessions: 0,
        availability: Availability::Up,
        registration_secret: SECRET.into(),
    }
}

fn setup() -> (Arc<Distributor>, Arc<LocalEventBus>) {
    let bus = Arc::new(LocalEventBus::new());
    let session_map = Arc::new(MemorySessionMap::new(&*bus));
    let node_client = Arc::new(MockNodeClient::healthy());
    let distributor = Distributor::new(DistributorConfig::new(SECRET), bus.clone(), session_map, node_client);
    (distributor, bus)
}

#[tokio::test]
async fn single_node_happy_path() {
    let (distributor, _bus) = setup();
    distributor.add(node_status(NodeId::random(), "http://n1", "chrome", 2)).await.unwrap();

    let request = NewSessionRequest::single(Capabilities::new().with("browserName", "chrome"));
    let session = distributor.new_session(request).await.expect("session should be created");

    let statuses = distributor.status().await;
    assert_eq!(statuses.len(), 1);
    let (_, available) = &statuses[0].stereotypes[0];
    assert_eq!(*available, 1); // one slot reserved out of two

    assert_eq!(session.capabilities.browser_name(), Some("chrome"));
}

#[tokio::test]
async fn capacity_exhaustion_exactly_one_concurrent_request_succeeds() {
    let (distributor, _bus) = setup();
    distributor.add(node_status(NodeId::random(), "http://n1", "chrome", 1)).await.unwrap();

    let make_request = || NewSessionRequest::single(Capabilities::new().with("browserName", "chrome"));
    let (first, second) = tokio::join!(distributor.new_session(make_request()), distributor.new_session(make_request()));

    let successes = [&first, &second].into_iter().filter(|r| r.is_ok()).count();
    let failures = [&first, &second].into_iter().filter(|r| r.is_err()).count();
    assert_eq!(successes, 1);
    assert_eq!(failures, 1);
}

#[tokio::test]
async fn rarity_prefilter_reserves_scarce_nodes_for_matching_requests() {
    let (distributor, _bus) = setup();
    let edge_id = NodeId::random();
    distributor.add(node_status(edge_id, "http://edge", "edge", 1)).await.unwrap();
    for i in 0..3 {
        distributor.add(node_status(NodeId::random(), &format!("http://chrome-{i}"), "chrome", 1)).await.unwrap();
    }

    let chrome_request = NewSessionRequest::single(Capabilities::new().with("browserName", "chrome"));
    let chrome_session = distributor.new_session(chrome_request).await.expect("chrome session should be created");
    assert_ne!(chrome_session.uri, "http://edge");

    let edge_request = NewSessionRequest::single(Capabilities::new().with("browserName", "edge"));
    let edge_session = distributor.new_session(edge_request).await.expect("edge session should be created");
    assert_eq!(edge_session.uri, "http://edge");
}

#[tokio::test]
async fn restart_with_same_uri_replaces_node_and_fires_events() {
    let (distributor, bus) = setup();
    let mut events = bus.subscribe();

    let old_id = NodeId::random();
    distributor.add(node_status(old_id, "http://n1", "chrome", 1)).await.unwrap();
    let _ = events.recv().await; // NodeAdded(old_id)

    let new_id = NodeId::random();
    bus.publish(Event::NodeStatus(node_status(new_id, "http://n1", "chrome", 1)));

    let mut saw_removed = false;
    let mut saw_added = false;
    for _ in 0..6 {
        match tokio::time::timeout(std::time::Duration::from_millis(200), events.recv()).await {
            Ok(Ok(Event::NodeRemoved(id))) if id == old_id => saw_removed = true,
            Ok(Ok(Event::NodeAdded(id))) if id == new_id => saw_added = true,
            Ok(Ok(_)) => {}
            other => panic!("event stream ended early: {other:?}"),
        }
        if saw_removed && saw_added {
            break;
        }
    }
    assert!(saw_removed, "expected NodeRemoved(old_id)");
    assert!(saw_added, "expected NodeAdded(new_id)");

    let statuses = distributor.status().await;
    assert_eq!(statuses.len(), 1);
    assert_eq!(statuses[0].id, new_id);
}

#[tokio::test]
async fn bad_secret_is_rejected_not_registered() {
    let (distributor, bus) = setup();
    let mut events = bus.subscribe();

    let mut bad = node_status(NodeId::random(), "http://n1", "chrome", 1);
    bad.registration_secret = "wrong".into();
    bus.publish(Event::NodeStatus(bad));

    let rejected = loop {
        match tokio::time::timeout(std::time::Duration::from_millis(200), events.recv()).await {
            Ok(Ok(Event::NodeRejected(uri))) => break uri,
            Ok(Ok(_)) => continue,
            other => panic!("expected NodeRejected, got {other:?}"),
        }
    };
    assert_eq!(rejected, "http://n1");
    assert!(distributor.status().await.is_empty());
}

#[tokio::test]
async fn drain_complete_removes_node_and_subsequent_session_fails() {
    let (distributor, bus) = setup();
    let node_id = NodeId::random();
    distributor.add(node_status(node_id, "http://n1", "chrome", 1)).await.unwrap();

    bus.publish(Event::NodeDrainComplete(node_id));
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    assert!(distributor.status().await.is_empty());

    let request = NewSessionRequest::single(Capabilities::new().with("browserName", "chrome"));
    let result = distributor.new_session(request).await;
    assert!(matches!(result, Err(Error::SessionNotCreated { .. })));
}

#[tokio::test]
async fn new_session_on_empty_directory_fails() {
    let (distributor, _bus) = setup();
    let request = NewSessionRequest::single(Capabilities::new().with("browserName", "chrome"));
    let result = distributor.new_session(request).await;
    assert!(matches!(result, Err(Error::SessionNotCreated { .. })));
}

#[tokio::test]
async fn node_side_creation_failure_releases_the_reserved_slot() {
    let bus = Arc::new(LocalEventBus::new());
    let session_map = Arc::new(MemorySessionMap::new(&*bus));
    let node_client = Arc::new(MockNodeClient::failing_creation());
    let distributor = Distributor::new(DistributorConfig::new(SECRET), bus, session_map, node_client);
    distributor.add(node_status(NodeId::random(), "http://n1", "chrome", 1)).await.unwrap();

    let request = NewSessionRequest::single(Capabilities::new().with("browserName", "chrome"));
    let result = distributor.new_session(request).await;
    assert!(matches!(result, Err(Error::SessionNotCreated { .. })));

    // the failed reservation must have released its slot, not leaked it
    let statuses = distributor.status().await;
    let (_, available) = &statuses[0].stereotypes[0];
    assert_eq!(*available, 1);
}
