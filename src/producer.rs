//! Producer façade and discovery poller
//!
//! A [`Producer`] owns a [`LookupRegistry`], a [`ConnectionPool`], and one
//! background task that periodically polls a lookup endpoint and reconciles
//! the pool against the discovered broker set. Publish calls pick a pooled
//! broker round-robin and delegate to its transport.

use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::config::ProducerConfig;
use crate::error::{ProducerError, ProducerResult};
use crate::lookup::{LookupClient, LookupRegistry, query_url};
use crate::pool::ConnectionPool;
use crate::transport::Connector;

/// Producer-side client: broker discovery, connection pooling, and
/// round-robin publishing.
///
/// All methods are safe to call concurrently from many tasks. The discovery
/// poller runs for the lifetime of the producer and is stopped by
/// [`close`](Producer::close).
pub struct Producer {
    config: ProducerConfig,
    registry: Arc<LookupRegistry>,
    pool: Arc<ConnectionPool>,
    lookup: Arc<LookupClient>,
    running: Arc<AtomicBool>,
    poller: Mutex<Option<JoinHandle<()>>>,
    poll_started: AtomicBool,
}

impl Producer {
    /// Create a producer and start polling the configured lookup endpoints.
    ///
    /// The pool starts empty; it fills after the first successful poll. Must
    /// be called within a Tokio runtime (the poller is spawned here when the
    /// configuration carries at least one endpoint).
    ///
    /// # Errors
    /// Returns [`ProducerError::InvalidEndpoint`] when a configured endpoint
    /// fails format validation.
    pub fn new(config: ProducerConfig, connector: Arc<dyn Connector>) -> ProducerResult<Self> {
        let registry = Arc::new(LookupRegistry::new());
        for endpoint in &config.lookup_endpoints {
            registry.register(endpoint)?;
        }

        let pool = Arc::new(ConnectionPool::new(connector, config.connect_timeout));
        let lookup = Arc::new(LookupClient::new(config.lookup_timeout));

        let producer = Self {
            registry,
            pool,
            lookup,
            running: Arc::new(AtomicBool::new(true)),
            poller: Mutex::new(None),
            poll_started: AtomicBool::new(false),
            config,
        };

        if !producer.registry.is_empty() {
            producer.start_poller();
        }

        info!(endpoints = producer.registry.len(), "producer started");
        Ok(producer)
    }

    /// Register an additional lookup endpoint.
    ///
    /// Duplicates are ignored. The first registration that makes the
    /// registry non-empty starts the discovery poller; the start is
    /// idempotent.
    pub fn add_lookup_endpoint(&self, endpoint: &str) -> ProducerResult<()> {
        if !self.running.load(Ordering::SeqCst) {
            return Err(ProducerError::Closed);
        }
        self.registry.register(endpoint)?;
        self.start_poller();
        Ok(())
    }

    /// Publish a payload to a topic on the next pooled broker.
    ///
    /// The configured topic prefix, if any, is applied first. Transport
    /// errors propagate verbatim; there is no retry at this layer.
    ///
    /// # Errors
    /// Returns [`ProducerError::NoBrokersAvailable`] while the pool is empty
    /// (a recoverable condition: callers should retry with backoff) and
    /// [`ProducerError::Closed`] after [`close`](Producer::close).
    pub async fn publish(&self, topic: &str, payload: &[u8]) -> ProducerResult<()> {
        if !self.running.load(Ordering::SeqCst) {
            return Err(ProducerError::Closed);
        }

        let topic = self.qualified_topic(topic);
        let (addr, conn) = self.pool.next().await?;
        debug!(addr = %addr, topic = %topic, bytes = payload.len(), "publishing message");
        conn.publish(&topic, payload).await
    }

    /// Serialize a value as JSON and publish it.
    pub async fn publish_json<T: Serialize + ?Sized>(
        &self,
        topic: &str,
        value: &T,
    ) -> ProducerResult<()> {
        let payload = serde_json::to_vec(value)
            .map_err(|e| ProducerError::Serialization(e.to_string()))?;
        self.publish(topic, &payload).await
    }

    /// Number of currently pooled broker connections
    pub async fn size(&self) -> usize {
        self.pool.len().await
    }

    /// Currently pooled broker addresses, in round-robin order
    pub async fn broker_addrs(&self) -> Vec<String> {
        self.pool.addrs().await
    }

    /// Registered lookup endpoints
    pub fn lookup_endpoints(&self) -> Vec<String> {
        self.registry.endpoints()
    }

    /// Check whether the producer has been closed
    pub fn is_closed(&self) -> bool {
        !self.running.load(Ordering::SeqCst)
    }

    /// Stop the discovery poller and close every pooled connection.
    ///
    /// Idempotent. Publishes issued after close return
    /// [`ProducerError::Closed`]; publishes already in flight may still
    /// complete (shutdown is best effort).
    pub async fn close(&self) -> ProducerResult<()> {
        if !self.running.swap(false, Ordering::SeqCst) {
            return Ok(());
        }

        let handle = self.poller.lock().take();
        if let Some(handle) = handle {
            handle.abort();
        }

        self.pool.close_all().await;
        info!("producer closed");
        Ok(())
    }

    fn qualified_topic(&self, topic: &str) -> String {
        match self.config.topic_prefix.as_deref() {
            Some(prefix) if !prefix.is_empty() => format!("{prefix}_{topic}"),
            _ => topic.to_string(),
        }
    }

    fn start_poller(&self) {
        if self.poll_started.swap(true, Ordering::SeqCst) {
            return;
        }

        let registry = self.registry.clone();
        let pool = self.pool.clone();
        let client = self.lookup.clone();
        let running = self.running.clone();
        let poll_interval = self.config.poll_interval;

        let handle = tokio::spawn(async move {
            // First tick completes immediately, so the pool fills without
            // waiting out a full interval.
            let mut ticker = tokio::time::interval(poll_interval);
            loop {
                ticker.tick().await;
                if !running.load(Ordering::SeqCst) {
                    break;
                }
                poll_once(&registry, &client, &pool).await;
            }
        });

        *self.poller.lock() = Some(handle);
    }
}

/// Run one discovery cycle: query the next lookup endpoint and reconcile
/// the pool with the result. Any failure leaves the pool untouched; the
/// endpoint stays eligible for future rotation.
async fn poll_once(registry: &LookupRegistry, client: &LookupClient, pool: &ConnectionPool) {
    let endpoint = match registry.next_endpoint() {
        Ok(endpoint) => endpoint,
        Err(_) => return,
    };

    let url = match query_url(&endpoint) {
        Ok(url) => url,
        Err(e) => {
            error!(endpoint = %endpoint, error = %e, "invalid lookup endpoint");
            return;
        }
    };

    match client.fetch_brokers(url).await {
        Ok(brokers) => {
            debug!(endpoint = %endpoint, discovered = brokers.len(), "lookup poll succeeded");
            pool.reconcile(&brokers).await;
        }
        Err(e) => {
            error!(endpoint = %endpoint, error = %e, "lookup query failed, keeping current pool");
        }
    }
}
