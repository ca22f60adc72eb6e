//! Trait seams for broker transports
//!
//! The wire protocol spoken to an individual broker is not this crate's
//! concern. A [`BrokerTransport`] wraps one open broker connection and a
//! [`Connector`] knows how to establish them; the pool treats both as opaque.

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::ProducerResult;

/// One open, reusable connection to a single broker.
#[async_trait]
pub trait BrokerTransport: Send + Sync + std::fmt::Debug {
    /// Publish a payload to a topic on this broker.
    ///
    /// Errors are returned verbatim to the caller of
    /// [`Producer::publish`](crate::Producer::publish); retry and backoff are
    /// a caller concern.
    async fn publish(&self, topic: &str, payload: &[u8]) -> ProducerResult<()>;

    /// Close the connection gracefully.
    async fn close(&self) -> ProducerResult<()>;
}

/// Factory for establishing broker transports.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Open a transport to the broker at `addr` (`host:port`).
    ///
    /// Failures are not fatal: the pool skips the address for the current
    /// reconcile cycle and retries on the next one.
    async fn connect(&self, addr: &str) -> ProducerResult<Arc<dyn BrokerTransport>>;
}
