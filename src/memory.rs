//! In-memory broker transport (for testing)

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::error::{ProducerError, ProducerResult};
use crate::transport::{BrokerTransport, Connector};

/// In-memory connector (for testing/development).
///
/// Hands out [`InMemoryTransport`]s that record published messages instead
/// of speaking a wire protocol. Individual addresses can be marked as
/// refusing connections to exercise connection-failure paths.
#[derive(Clone, Default)]
pub struct InMemoryConnector {
    state: Arc<ConnectorState>,
}

#[derive(Default)]
struct ConnectorState {
    refused: RwLock<HashSet<String>>,
    transports: RwLock<HashMap<String, Arc<InMemoryTransport>>>,
    connect_counts: RwLock<HashMap<String, usize>>,
}

impl InMemoryConnector {
    /// Create a new in-memory connector
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent connects to `addr` fail
    pub fn refuse(&self, addr: &str) {
        self.state.refused.write().insert(addr.to_string());
    }

    /// Allow connects to a previously refused `addr`
    pub fn allow(&self, addr: &str) {
        self.state.refused.write().remove(addr);
    }

    /// The most recently established transport for `addr`, if any
    pub fn transport(&self, addr: &str) -> Option<Arc<InMemoryTransport>> {
        self.state.transports.read().get(addr).cloned()
    }

    /// How many times a connection to `addr` has been established
    pub fn connect_count(&self, addr: &str) -> usize {
        self.state
            .connect_counts
            .read()
            .get(addr)
            .copied()
            .unwrap_or(0)
    }
}

#[async_trait]
impl Connector for InMemoryConnector {
    async fn connect(&self, addr: &str) -> ProducerResult<Arc<dyn BrokerTransport>> {
        if self.state.refused.read().contains(addr) {
            return Err(ProducerError::ConnectionSetup {
                addr: addr.to_string(),
                reason: "connection refused".to_string(),
            });
        }

        let transport = Arc::new(InMemoryTransport::new(addr));
        self.state
            .transports
            .write()
            .insert(addr.to_string(), transport.clone());
        *self
            .state
            .connect_counts
            .write()
            .entry(addr.to_string())
            .or_insert(0) += 1;

        Ok(transport)
    }
}

/// In-memory transport recording published messages
#[derive(Debug)]
pub struct InMemoryTransport {
    addr: String,
    published: Mutex<Vec<(String, Vec<u8>)>>,
    close_count: AtomicUsize,
    fail_publishes: RwLock<bool>,
}

impl InMemoryTransport {
    fn new(addr: &str) -> Self {
        Self {
            addr: addr.to_string(),
            published: Mutex::new(Vec::new()),
            close_count: AtomicUsize::new(0),
            fail_publishes: RwLock::new(false),
        }
    }

    /// Broker address this transport is connected to
    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Messages published through this transport, as `(topic, payload)`
    pub fn published(&self) -> Vec<(String, Vec<u8>)> {
        self.published.lock().clone()
    }

    /// How many times `close` has been called
    pub fn close_count(&self) -> usize {
        self.close_count.load(Ordering::SeqCst)
    }

    /// Make subsequent publishes fail
    pub fn fail_publishes(&self, fail: bool) {
        *self.fail_publishes.write() = fail;
    }
}

#[async_trait]
impl BrokerTransport for InMemoryTransport {
    async fn publish(&self, topic: &str, payload: &[u8]) -> ProducerResult<()> {
        if *self.fail_publishes.read() {
            return Err(ProducerError::Publish(format!(
                "{}: simulated publish failure",
                self.addr
            )));
        }
        self.published
            .lock()
            .push((topic.to_string(), payload.to_vec()));
        Ok(())
    }

    async fn close(&self) -> ProducerResult<()> {
        self.close_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_connect_and_publish() {
        let connector = InMemoryConnector::new();
        let transport = connector.connect("10.0.0.1:4150").await.unwrap();

        transport.publish("orders", b"payload").await.unwrap();

        let recorded = connector.transport("10.0.0.1:4150").unwrap();
        assert_eq!(recorded.published(), vec![("orders".to_string(), b"payload".to_vec())]);
        assert_eq!(connector.connect_count("10.0.0.1:4150"), 1);
    }

    #[tokio::test]
    async fn test_refused_address() {
        let connector = InMemoryConnector::new();
        connector.refuse("10.0.0.2:4150");

        let err = connector.connect("10.0.0.2:4150").await.unwrap_err();
        assert!(matches!(err, ProducerError::ConnectionSetup { .. }));

        connector.allow("10.0.0.2:4150");
        assert!(connector.connect("10.0.0.2:4150").await.is_ok());
    }

    #[tokio::test]
    async fn test_close_count() {
        let connector = InMemoryConnector::new();
        let transport = connector.connect("10.0.0.1:4150").await.unwrap();

        transport.close().await.unwrap();
        assert_eq!(connector.transport("10.0.0.1:4150").unwrap().close_count(), 1);
    }

    #[tokio::test]
    async fn test_failing_publish() {
        let connector = InMemoryConnector::new();
        let transport = connector.connect("10.0.0.1:4150").await.unwrap();

        connector.transport("10.0.0.1:4150").unwrap().fail_publishes(true);
        let err = transport.publish("orders", b"payload").await.unwrap_err();
        assert!(matches!(err, ProducerError::Publish(_)));
    }
}
