//! End-to-end discovery and publishing tests against a fake lookup service.

use parking_lot::Mutex;
use relayq::{InMemoryConnector, Producer, ProducerConfig, ProducerError};
use std::sync::Arc;
use std::time::{Duration, Instant};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

#[derive(Clone, Copy)]
enum LookupMode {
    Healthy,
    Error500,
    Malformed,
}

/// Mutable lookup-service state shared with the mock server, so tests can
/// change the advertised broker set between polls.
struct LookupState {
    producers: Mutex<Vec<(String, u16)>>,
    mode: Mutex<LookupMode>,
}

impl LookupState {
    fn new(producers: &[(&str, u16)]) -> Arc<Self> {
        Arc::new(Self {
            producers: Mutex::new(
                producers
                    .iter()
                    .map(|(host, port)| (host.to_string(), *port))
                    .collect(),
            ),
            mode: Mutex::new(LookupMode::Healthy),
        })
    }

    fn set_producers(&self, producers: &[(&str, u16)]) {
        *self.producers.lock() = producers
            .iter()
            .map(|(host, port)| (host.to_string(), *port))
            .collect();
    }

    fn set_mode(&self, mode: LookupMode) {
        *self.mode.lock() = mode;
    }

    fn body(&self) -> serde_json::Value {
        let producers: Vec<serde_json::Value> = self
            .producers
            .lock()
            .iter()
            .map(|(host, port)| {
                serde_json::json!({
                    "remote_address": format!("{host}:53000"),
                    "hostname": host,
                    "broadcast_address": host,
                    "tcp_port": port,
                    "http_port": port + 1,
                    "version": "1.2.1"
                })
            })
            .collect();
        serde_json::json!({ "producers": producers })
    }
}

struct LookupResponder(Arc<LookupState>);

impl Respond for LookupResponder {
    fn respond(&self, _request: &Request) -> ResponseTemplate {
        match *self.0.mode.lock() {
            LookupMode::Healthy => ResponseTemplate::new(200).set_body_json(self.0.body()),
            LookupMode::Error500 => ResponseTemplate::new(500),
            LookupMode::Malformed => ResponseTemplate::new(200).set_body_string("not json"),
        }
    }
}

async fn start_lookup_server(state: Arc<LookupState>) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/nodes"))
        .respond_with(LookupResponder(state))
        .mount(&server)
        .await;
    server
}

fn fast_config(endpoint: &str) -> ProducerConfig {
    ProducerConfig::new([endpoint]).with_poll_interval(Duration::from_millis(50))
}

async fn wait_for_size(producer: &Producer, expected: usize) {
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        if producer.size().await == expected {
            return;
        }
        assert!(
            Instant::now() < deadline,
            "timed out waiting for pool size {expected}, current {}",
            producer.size().await
        );
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

#[tokio::test]
async fn test_end_to_end_grow_and_shrink() {
    let state = LookupState::new(&[("10.0.0.1", 4150)]);
    let server = start_lookup_server(state.clone()).await;

    let connector = InMemoryConnector::new();
    let producer =
        Producer::new(fast_config(&server.uri()), Arc::new(connector.clone())).unwrap();

    // First poll: one broker
    wait_for_size(&producer, 1).await;
    producer.publish("orders", b"payload-1").await.unwrap();
    let first = connector.transport("10.0.0.1:4150").unwrap();
    assert_eq!(first.published().len(), 1);

    // Second broker appears
    state.set_producers(&[("10.0.0.1", 4150), ("10.0.0.2", 4150)]);
    wait_for_size(&producer, 2).await;
    assert_eq!(connector.connect_count("10.0.0.1:4150"), 1);

    // First broker goes away; its connection is closed and not reused
    state.set_producers(&[("10.0.0.2", 4150)]);
    wait_for_size(&producer, 1).await;
    assert_eq!(producer.broker_addrs().await, vec!["10.0.0.2:4150".to_string()]);
    assert_eq!(first.close_count(), 1);

    producer.publish("orders", b"payload-2").await.unwrap();
    producer.publish("orders", b"payload-3").await.unwrap();
    let second = connector.transport("10.0.0.2:4150").unwrap();
    assert_eq!(second.published().len(), 2);
    assert_eq!(first.published().len(), 1);

    producer.close().await.unwrap();
}

#[tokio::test]
async fn test_poll_failure_leaves_pool_unchanged() {
    let state = LookupState::new(&[("10.0.0.1", 4150), ("10.0.0.2", 4150)]);
    let server = start_lookup_server(state.clone()).await;

    let connector = InMemoryConnector::new();
    let producer =
        Producer::new(fast_config(&server.uri()), Arc::new(connector.clone())).unwrap();
    wait_for_size(&producer, 2).await;
    let before = producer.broker_addrs().await;

    // Several failed polls must not touch the pool
    state.set_mode(LookupMode::Error500);
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(producer.size().await, 2);
    assert_eq!(producer.broker_addrs().await, before);

    state.set_mode(LookupMode::Malformed);
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(producer.size().await, 2);
    assert_eq!(producer.broker_addrs().await, before);

    // Once discovery recovers, reconciliation resumes
    state.set_producers(&[("10.0.0.1", 4150)]);
    state.set_mode(LookupMode::Healthy);
    wait_for_size(&producer, 1).await;

    producer.close().await.unwrap();
}

#[tokio::test]
async fn test_empty_pool_self_heals() {
    let state = LookupState::new(&[("10.0.0.1", 4150)]);
    state.set_mode(LookupMode::Error500);
    let server = start_lookup_server(state.clone()).await;

    let connector = InMemoryConnector::new();
    let producer =
        Producer::new(fast_config(&server.uri()), Arc::new(connector.clone())).unwrap();

    // Discovery failing from the start: empty pool, distinct error
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(producer.size().await, 0);
    let err = producer.publish("orders", b"payload").await.unwrap_err();
    assert!(matches!(err, ProducerError::NoBrokersAvailable));

    state.set_mode(LookupMode::Healthy);
    wait_for_size(&producer, 1).await;
    producer.publish("orders", b"payload").await.unwrap();

    producer.close().await.unwrap();
}

#[tokio::test]
async fn test_rotates_across_lookup_endpoints() {
    let state_a = LookupState::new(&[("10.0.0.1", 4150)]);
    let state_b = LookupState::new(&[("10.0.0.1", 4150)]);
    let server_a = start_lookup_server(state_a.clone()).await;
    let server_b = start_lookup_server(state_b.clone()).await;

    let connector = InMemoryConnector::new();
    let config = fast_config(&server_a.uri()).with_lookup_endpoint(server_b.uri());
    let producer = Producer::new(config, Arc::new(connector.clone())).unwrap();

    wait_for_size(&producer, 1).await;
    tokio::time::sleep(Duration::from_millis(300)).await;

    // Round-robin rotation reaches both endpoints
    assert!(!server_a.received_requests().await.unwrap().is_empty());
    assert!(!server_b.received_requests().await.unwrap().is_empty());

    producer.close().await.unwrap();
}
