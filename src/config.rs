//! Producer configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration for a [`Producer`](crate::Producer)
///
/// The producer never reads configuration files or environment variables
/// itself; callers construct a `ProducerConfig` from whatever configuration
/// surface they own and hand it to [`Producer::new`](crate::Producer::new).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProducerConfig {
    /// Lookup service endpoints queried for live brokers.
    ///
    /// Each entry is either a `host:port` pair or a full URL. Endpoints
    /// without a path component are queried at `/nodes`.
    #[serde(default)]
    pub lookup_endpoints: Vec<String>,

    /// Interval between lookup polls
    #[serde(default = "default_poll_interval")]
    pub poll_interval: Duration,

    /// Timeout for establishing a single broker connection during reconcile
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: Duration,

    /// Timeout for a single lookup HTTP request
    #[serde(default = "default_lookup_timeout")]
    pub lookup_timeout: Duration,

    /// Optional prefix prepended to every topic as `{prefix}_{topic}`
    pub topic_prefix: Option<String>,
}

fn default_poll_interval() -> Duration {
    Duration::from_secs(15)
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_lookup_timeout() -> Duration {
    Duration::from_secs(5)
}

impl Default for ProducerConfig {
    fn default() -> Self {
        Self {
            lookup_endpoints: Vec::new(),
            poll_interval: default_poll_interval(),
            connect_timeout: default_connect_timeout(),
            lookup_timeout: default_lookup_timeout(),
            topic_prefix: None,
        }
    }
}

impl ProducerConfig {
    /// Create a new configuration with the given lookup endpoints
    pub fn new<I, S>(lookup_endpoints: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            lookup_endpoints: lookup_endpoints.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    /// Add a lookup endpoint
    pub fn with_lookup_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.lookup_endpoints.push(endpoint.into());
        self
    }

    /// Set the lookup poll interval
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Set the broker connection timeout
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the lookup request timeout
    pub fn with_lookup_timeout(mut self, timeout: Duration) -> Self {
        self.lookup_timeout = timeout;
        self
    }

    /// Set the topic prefix
    pub fn with_topic_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.topic_prefix = Some(prefix.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ProducerConfig::default();
        assert!(config.lookup_endpoints.is_empty());
        assert_eq!(config.poll_interval, Duration::from_secs(15));
        assert_eq!(config.connect_timeout, Duration::from_secs(5));
        assert!(config.topic_prefix.is_none());
    }

    #[test]
    fn test_builder() {
        let config = ProducerConfig::new(["lookup-1:4161"])
            .with_lookup_endpoint("lookup-2:4161")
            .with_poll_interval(Duration::from_secs(5))
            .with_topic_prefix("staging");

        assert_eq!(config.lookup_endpoints.len(), 2);
        assert_eq!(config.poll_interval, Duration::from_secs(5));
        assert_eq!(config.topic_prefix.as_deref(), Some("staging"));
    }
}
