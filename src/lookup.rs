//! Lookup endpoint registry and discovery queries
//!
//! The registry holds the lookup service endpoints supplied at startup and
//! rotates through them round-robin, one endpoint per poll. Queries go to
//! `{endpoint}/nodes` unless the registered endpoint already carries a path.

use parking_lot::RwLock;
use reqwest::header;
use serde::Deserialize;
use std::time::Duration;
use url::Url;

use crate::error::{ProducerError, ProducerResult};

/// Accept header for version negotiation with NSQ-style lookup daemons.
const LOOKUP_ACCEPT: &str = "application/vnd.nsq; version=1.0";

/// Ordered, deduplicated set of lookup endpoints with a rotation cursor.
pub struct LookupRegistry {
    inner: RwLock<RegistryInner>,
}

struct RegistryInner {
    endpoints: Vec<String>,
    cursor: usize,
}

impl LookupRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(RegistryInner {
                endpoints: Vec::new(),
                cursor: 0,
            }),
        }
    }

    /// Register a lookup endpoint.
    ///
    /// Duplicates (by string equality) are silently ignored. Returns `true`
    /// when this registration turned an empty registry non-empty, which is
    /// the signal to start the discovery poller.
    ///
    /// # Errors
    /// Returns [`ProducerError::InvalidEndpoint`] when the endpoint is
    /// neither a `host:port` pair nor parseable as a URL.
    pub fn register(&self, endpoint: &str) -> ProducerResult<bool> {
        validate_endpoint(endpoint)?;

        let mut inner = self.inner.write();
        if inner.endpoints.iter().any(|e| e == endpoint) {
            return Ok(false);
        }
        inner.endpoints.push(endpoint.to_string());
        Ok(inner.endpoints.len() == 1)
    }

    /// Return the endpoint at the rotation cursor and advance the cursor.
    ///
    /// The cursor is re-clamped against the current length on every call, so
    /// the list may grow or shrink between calls.
    ///
    /// # Errors
    /// Returns [`ProducerError::NoEndpoints`] when the registry is empty.
    pub fn next_endpoint(&self) -> ProducerResult<String> {
        let mut inner = self.inner.write();
        let len = inner.endpoints.len();
        if len == 0 {
            return Err(ProducerError::NoEndpoints);
        }
        if inner.cursor >= len {
            inner.cursor = 0;
        }
        let endpoint = inner.endpoints[inner.cursor].clone();
        inner.cursor = (inner.cursor + 1) % len;
        Ok(endpoint)
    }

    /// Currently registered endpoints, in registration order
    pub fn endpoints(&self) -> Vec<String> {
        self.inner.read().endpoints.clone()
    }

    /// Number of registered endpoints
    pub fn len(&self) -> usize {
        self.inner.read().endpoints.len()
    }

    /// Check whether the registry holds no endpoints
    pub fn is_empty(&self) -> bool {
        self.inner.read().endpoints.is_empty()
    }
}

impl Default for LookupRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Validate a lookup endpoint at registration time.
///
/// Endpoints carrying a path must parse as a URL; bare `host:port` pairs
/// must contain a port. Validation is local and synchronous.
fn validate_endpoint(endpoint: &str) -> ProducerResult<()> {
    if endpoint.contains('/') {
        let raw = if endpoint.contains("://") {
            endpoint.to_string()
        } else {
            format!("http://{endpoint}")
        };
        Url::parse(&raw)
            .map_err(|e| ProducerError::InvalidEndpoint(format!("{endpoint}: {e}")))?;
        return Ok(());
    }
    if !endpoint.contains(':') {
        return Err(ProducerError::InvalidEndpoint(format!(
            "{endpoint}: missing port"
        )));
    }
    Ok(())
}

/// Build the discovery query URL for a registered endpoint.
///
/// Prepends `http://` when no scheme is present and defaults the path to
/// `/nodes` when the endpoint carries none.
pub(crate) fn query_url(endpoint: &str) -> ProducerResult<Url> {
    let raw = if endpoint.contains("://") {
        endpoint.to_string()
    } else {
        format!("http://{endpoint}")
    };
    let mut url = Url::parse(&raw)
        .map_err(|e| ProducerError::InvalidEndpoint(format!("{endpoint}: {e}")))?;
    if url.path().is_empty() || url.path() == "/" {
        url.set_path("/nodes");
    }
    Ok(url)
}

/// One live broker entry in a lookup response
#[derive(Debug, Clone, Deserialize)]
#[allow(dead_code)]
pub(crate) struct PeerInfo {
    #[serde(default)]
    pub remote_address: String,
    #[serde(default)]
    pub hostname: String,
    pub broadcast_address: String,
    pub tcp_port: u16,
    #[serde(default)]
    pub http_port: u16,
    #[serde(default)]
    pub version: String,
}

impl PeerInfo {
    /// Canonical `host:port` broker address used as the pool key
    pub fn broker_addr(&self) -> String {
        format!("{}:{}", self.broadcast_address, self.tcp_port)
    }
}

/// Lookup service response body
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct LookupResponse {
    #[serde(default)]
    pub producers: Vec<PeerInfo>,
}

/// HTTP client for querying lookup endpoints
pub(crate) struct LookupClient {
    http: reqwest::Client,
}

impl LookupClient {
    pub fn new(timeout: Duration) -> Self {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .expect("Failed to build HTTP client");
        Self { http }
    }

    /// Query one lookup endpoint and return the live broker addresses.
    ///
    /// Non-2xx responses map to [`ProducerError::LookupTransport`], malformed
    /// bodies to [`ProducerError::LookupDecode`].
    pub async fn fetch_brokers(&self, url: Url) -> ProducerResult<Vec<String>> {
        let response = self
            .http
            .get(url.clone())
            .header(header::ACCEPT, LOOKUP_ACCEPT)
            .send()
            .await
            .map_err(|e| ProducerError::LookupTransport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ProducerError::LookupTransport(format!(
                "{url} returned status {}",
                response.status()
            )));
        }

        let body: LookupResponse = response
            .json()
            .await
            .map_err(|e| ProducerError::LookupDecode(e.to_string()))?;

        Ok(body.producers.iter().map(PeerInfo::broker_addr).collect())
    }
}
