//! Error types for producer operations

use thiserror::Error;

/// Convenience result type for producer operations.
pub type ProducerResult<T> = std::result::Result<T, ProducerError>;

/// Errors that can occur while discovering brokers or publishing messages
#[derive(Error, Debug)]
pub enum ProducerError {
    /// No lookup endpoints have been registered
    #[error("no lookup endpoints configured")]
    NoEndpoints,

    /// A lookup endpoint failed format validation at registration time
    #[error("invalid lookup endpoint: {0}")]
    InvalidEndpoint(String),

    /// Network or HTTP failure while querying a lookup endpoint
    #[error("lookup request failed: {0}")]
    LookupTransport(String),

    /// A lookup endpoint returned a body that could not be decoded
    #[error("lookup response decode failed: {0}")]
    LookupDecode(String),

    /// Failed to establish a connection to a newly discovered broker
    #[error("connection to broker {addr} failed: {reason}")]
    ConnectionSetup {
        /// Address of the broker that could not be connected
        addr: String,
        /// Underlying failure description
        reason: String,
    },

    /// The connection pool is currently empty
    #[error("no brokers available")]
    NoBrokersAvailable,

    /// The broker transport rejected or failed the publish
    #[error("publish failed: {0}")]
    Publish(String),

    /// Failed to serialize a message payload
    #[error("serialization failed: {0}")]
    Serialization(String),

    /// The producer has been closed
    #[error("producer is closed")]
    Closed,
}

impl ProducerError {
    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ProducerError::LookupTransport(_)
                | ProducerError::LookupDecode(_)
                | ProducerError::ConnectionSetup { .. }
                | ProducerError::NoBrokersAvailable
                | ProducerError::Publish(_)
        )
    }

    /// Check if this error indicates a discovery problem rather than a
    /// publish problem
    pub fn is_lookup_error(&self) -> bool {
        matches!(
            self,
            ProducerError::NoEndpoints
                | ProducerError::InvalidEndpoint(_)
                | ProducerError::LookupTransport(_)
                | ProducerError::LookupDecode(_)
        )
    }
}
