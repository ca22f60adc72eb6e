//! # RelayQ Producer
//!
//! Producer-side client for NSQ-style distributed message queues: lookup
//! service discovery, broker connection pooling, and round-robin publishing.
//!
//! ## Features
//!
//! - **Broker Discovery** - Periodically polls lookup endpoints for the set
//!   of live brokers
//! - **Connection Pooling** - Keeps one persistent connection per discovered
//!   broker, reconciled on every poll
//! - **Round-Robin Publishing** - Cycles publish calls across the pool in
//!   insertion order
//! - **Pluggable Transports** - The broker wire protocol lives behind the
//!   [`BrokerTransport`]/[`Connector`] seam
//! - **Self-Healing** - Poll and connect failures are logged and retried;
//!   an empty pool surfaces as a distinct, recoverable error
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use relayq::{Producer, ProducerConfig};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ProducerConfig::new(["lookup-1:4161", "lookup-2:4161"])
//!         .with_topic_prefix("prod");
//!
//!     // `connector` is whatever speaks your broker's wire protocol.
//!     let producer = Producer::new(config, connector)?;
//!
//!     producer.publish("orders", b"{\"order_id\":42}").await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Error Handling
//!
//! [`ProducerError::NoBrokersAvailable`] is a normal, recoverable condition
//! while the pool is empty (before the first successful poll, or after every
//! discovered broker has gone away). Callers should retry with backoff;
//! the pool refills on its own once discovery succeeds again.

pub mod config;
pub mod error;
pub mod lookup;
pub mod memory;
pub mod pool;
pub mod producer;
pub mod transport;

pub use config::ProducerConfig;
pub use error::{ProducerError, ProducerResult};
pub use lookup::LookupRegistry;
pub use memory::{InMemoryConnector, InMemoryTransport};
pub use pool::ConnectionPool;
pub use producer::Producer;
pub use transport::{BrokerTransport, Connector};
