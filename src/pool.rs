//! Broker connection pool with round-robin selection
//!
//! The pool owns the authoritative map of broker address to open transport.
//! Each discovery result is reconciled against it: vanished brokers are
//! closed and dropped, new ones are connected and appended. Selection for
//! publishing cycles through the pooled addresses in insertion order.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::error::{ProducerError, ProducerResult};
use crate::transport::{BrokerTransport, Connector};

/// Pool of live broker connections.
///
/// `addrs` drives round-robin order; `conns` holds the transport for every
/// address in `addrs`. The two are only ever updated together under the
/// write lock, so readers never observe one without the other.
pub struct ConnectionPool {
    inner: RwLock<PoolInner>,
    cursor: AtomicUsize,
    connector: Arc<dyn Connector>,
    connect_timeout: Duration,
}

struct PoolInner {
    addrs: Vec<String>,
    conns: HashMap<String, Arc<dyn BrokerTransport>>,
}

impl ConnectionPool {
    /// Create an empty pool that establishes transports through `connector`
    pub fn new(connector: Arc<dyn Connector>, connect_timeout: Duration) -> Self {
        Self {
            inner: RwLock::new(PoolInner {
                addrs: Vec::new(),
                conns: HashMap::new(),
            }),
            cursor: AtomicUsize::new(0),
            connector,
            connect_timeout,
        }
    }

    /// Reconcile the pool against the latest discovered broker set.
    ///
    /// Brokers no longer present are closed and removed; newly discovered
    /// ones are connected and appended. A broker whose connection attempt
    /// fails (or times out after `connect_timeout`) is skipped for this
    /// cycle and retried on the next reconcile if still discovered.
    /// Surviving brokers keep their existing transport.
    ///
    /// The write lock is held for the entire diff-and-apply, so `next` never
    /// observes a half-updated pool.
    pub async fn reconcile(&self, latest: &[String]) {
        let mut inner = self.inner.write().await;

        let mut latest_unique = Vec::with_capacity(latest.len());
        let mut seen = HashSet::new();
        for addr in latest {
            if seen.insert(addr.as_str()) {
                latest_unique.push(addr.clone());
            }
        }

        let to_remove: Vec<String> = inner
            .addrs
            .iter()
            .filter(|addr| !seen.contains(addr.as_str()))
            .cloned()
            .collect();

        for addr in &to_remove {
            if let Some(conn) = inner.conns.remove(addr) {
                if let Err(e) = conn.close().await {
                    warn!(addr = %addr, error = %e, "error closing removed broker connection");
                }
            }
            inner.addrs.retain(|a| a != addr);
            debug!(addr = %addr, "removed broker from pool");
        }

        for addr in latest_unique {
            if inner.conns.contains_key(&addr) {
                continue;
            }
            match tokio::time::timeout(self.connect_timeout, self.connector.connect(&addr)).await {
                Ok(Ok(conn)) => {
                    inner.addrs.push(addr.clone());
                    inner.conns.insert(addr.clone(), conn);
                    debug!(addr = %addr, "added broker to pool");
                }
                Ok(Err(e)) => {
                    warn!(addr = %addr, error = %e, "broker connection failed, skipping this cycle");
                }
                Err(_) => {
                    warn!(
                        addr = %addr,
                        timeout_ms = self.connect_timeout.as_millis() as u64,
                        "broker connection timed out, skipping this cycle"
                    );
                }
            }
        }

        if inner.addrs.is_empty() {
            info!("broker list empty");
        }

        // Cursor must never reference past the (possibly shrunk) list.
        if self.cursor.load(Ordering::SeqCst) >= inner.addrs.len() {
            self.cursor.store(0, Ordering::SeqCst);
        }
    }

    /// Select the next broker round-robin.
    ///
    /// # Errors
    /// Returns [`ProducerError::NoBrokersAvailable`] when the pool is empty.
    pub async fn next(&self) -> ProducerResult<(String, Arc<dyn BrokerTransport>)> {
        let inner = self.inner.read().await;
        let len = inner.addrs.len();
        if len == 0 {
            return Err(ProducerError::NoBrokersAvailable);
        }

        let prev = self
            .cursor
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |c| Some((c + 1) % len))
            .unwrap_or_default();
        let addr = inner.addrs[prev % len].clone();
        let conn = inner
            .conns
            .get(&addr)
            .cloned()
            .ok_or(ProducerError::NoBrokersAvailable)?;

        Ok((addr, conn))
    }

    /// Number of currently pooled connections
    pub async fn len(&self) -> usize {
        self.inner.read().await.addrs.len()
    }

    /// Check whether the pool currently holds no connections
    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.addrs.is_empty()
    }

    /// Currently pooled broker addresses, in round-robin order
    pub async fn addrs(&self) -> Vec<String> {
        self.inner.read().await.addrs.clone()
    }

    /// Close every pooled connection and clear the pool.
    pub async fn close_all(&self) {
        let mut inner = self.inner.write().await;
        for (addr, conn) in inner.conns.drain() {
            if let Err(e) = conn.close().await {
                warn!(addr = %addr, error = %e, "error closing broker connection");
            }
        }
        inner.addrs.clear();
        self.cursor.store(0, Ordering::SeqCst);
    }
}
