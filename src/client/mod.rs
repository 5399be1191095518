//! Fetch client for the remote kinship API.
//!
//! [`FetchClient`] issues single-node, paginated-children, and batch search
//! requests, strictly one at a time. Transient failures (429, 5xx, transport
//! errors) are retried with exponential backoff; 404s and other permanent
//! misses return immediately. Every request, retries and pages included,
//! passes through the politeness [`Pacer`].
//!
//! Traversals consume records through the [`NodeSource`] trait, so they run
//! the same against HTTP or an in-memory graph.

pub mod memory;
pub mod retry;
pub mod transport;

use std::collections::HashSet;

use serde_json::Value;

use crate::config::ClientConfig;
use crate::error::{FetchError, Result};
use crate::types::{NodeId, NodeRecord};

pub use memory::MemorySource;
pub use retry::{Pacer, RetryPolicy, Sleeper, ThreadSleeper};
pub use transport::{HttpTransport, RawResponse, Transport, TransportError};

/// Maximum ids per search request.
pub const BATCH_LIMIT: usize = 100;

/// Keys under which list endpoints may return their items.
const LIST_KEYS: &[&str] = &["nodes", "kitties", "items", "data", "results"];
const NESTED_LIST_KEYS: &[&str] = &["nodes", "kitties", "items", "results"];

/// Keys a single-node body may wrap its record in.
const SINGLE_WRAPPERS: &[&str] = &["kitty", "node"];

// ---------------------------------------------------------------------------
// NodeSource
// ---------------------------------------------------------------------------

/// Where traversals get their records from.
pub trait NodeSource {
    /// Fetch one record by id.
    fn fetch_node(&mut self, id: NodeId) -> std::result::Result<NodeRecord, FetchError>;

    /// All children of `id`, deduplicated, in first-seen order.
    fn fetch_children(
        &mut self,
        id: NodeId,
        page_size: usize,
    ) -> std::result::Result<Vec<NodeRecord>, FetchError>;

    /// Child ids only.
    fn fetch_child_ids(
        &mut self,
        id: NodeId,
        page_size: usize,
    ) -> std::result::Result<Vec<NodeId>, FetchError> {
        Ok(self
            .fetch_children(id, page_size)?
            .into_iter()
            .map(|r| r.id)
            .collect())
    }

    /// Best-effort bulk lookup. Ids that cannot be fetched are skipped.
    fn fetch_batch(&mut self, ids: &[NodeId]) -> Vec<NodeRecord> {
        ids.iter()
            .filter_map(|&id| match self.fetch_node(id) {
                Ok(rec) => Some(rec),
                Err(e) => {
                    tracing::warn!("batch fallback: node {} unavailable: {}", id, e);
                    None
                }
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// FetchClient
// ---------------------------------------------------------------------------

/// Retry-aware, paced client for the remote read API.
pub struct FetchClient<T = HttpTransport, S = ThreadSleeper> {
    transport: T,
    sleeper: S,
    endpoint: String,
    policy: RetryPolicy,
    pacer: Pacer,
    requests: u64,
}

impl FetchClient {
    /// Production client: `reqwest` transport, real sleeps.
    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        config.validate()?;
        let transport = HttpTransport::new(config)?;
        Ok(Self::with_parts(config, transport, ThreadSleeper))
    }
}

impl<T: Transport, S: Sleeper> FetchClient<T, S> {
    /// Assemble a client from explicit parts.
    pub fn with_parts(config: &ClientConfig, transport: T, sleeper: S) -> Self {
        Self {
            transport,
            sleeper,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            policy: RetryPolicy::from_config(config),
            pacer: Pacer::new(config.politeness_delay()),
            requests: 0,
        }
    }

    /// Number of HTTP requests issued so far, retries included.
    pub fn requests_made(&self) -> u64 {
        self.requests
    }

    pub fn node_url(&self, id: NodeId) -> String {
        format!("{}/{}", self.endpoint, id)
    }

    pub fn children_url(&self, id: NodeId, page: u32, limit: usize) -> String {
        format!("{}?parent={}&page={}&limit={}", self.endpoint, id, page, limit)
    }

    pub fn search_url(&self, ids: &[NodeId]) -> String {
        let joined = ids
            .iter()
            .map(|id| id.to_string())
            .collect::<Vec<_>>()
            .join(",");
        format!("{}?search={}&limit={}", self.endpoint, joined, ids.len())
    }

    /// GET with pacing and retry; returns the decoded JSON body.
    fn get_json(&mut self, url: &str) -> std::result::Result<Value, FetchError> {
        let mut attempt: u32 = 0;
        loop {
            self.pacer.wait(&self.sleeper);
            tracing::debug!("GET {}", url);
            let outcome = self.transport.get(url);
            self.pacer.mark();
            self.requests += 1;

            let failure = match outcome {
                Ok(resp) => match resp.status {
                    200..=299 => {
                        return serde_json::from_str(&resp.body).map_err(|e| FetchError::Decode {
                            url: url.to_string(),
                            reason: e.to_string(),
                        });
                    }
                    404 => {
                        tracing::debug!("404 Not Found: {}", url);
                        return Err(FetchError::NotFound {
                            url: url.to_string(),
                        });
                    }
                    429 => "429 rate limited".to_string(),
                    500..=599 => format!("HTTP {}", resp.status),
                    status => {
                        return Err(FetchError::Status {
                            url: url.to_string(),
                            status,
                        });
                    }
                },
                Err(e) => e.to_string(),
            };

            if attempt >= self.policy.max_retries {
                tracing::error!(
                    "GET failed after {} attempts: {} | last error: {}",
                    attempt + 1,
                    url,
                    failure
                );
                return Err(FetchError::Exhausted {
                    url: url.to_string(),
                    attempts: attempt + 1,
                    last: failure,
                });
            }

            let delay = self.policy.backoff(attempt);
            tracing::warn!(
                "Request failed ({}), sleeping {:.2}s",
                failure,
                delay.as_secs_f64()
            );
            self.sleeper.sleep(delay);
            attempt += 1;
        }
    }
}

impl<T: Transport, S: Sleeper> NodeSource for FetchClient<T, S> {
    fn fetch_node(&mut self, id: NodeId) -> std::result::Result<NodeRecord, FetchError> {
        let url = self.node_url(id);
        let body = unwrap_single(self.get_json(&url)?);
        NodeRecord::from_value(body).ok_or_else(|| FetchError::Decode {
            url,
            reason: "response carries no usable node id".to_string(),
        })
    }

    fn fetch_children(
        &mut self,
        id: NodeId,
        page_size: usize,
    ) -> std::result::Result<Vec<NodeRecord>, FetchError> {
        let page_size = page_size.max(1);
        let mut seen: HashSet<NodeId> = HashSet::new();
        let mut out = Vec::new();
        let mut page: u32 = 1;

        loop {
            let url = self.children_url(id, page, page_size);
            let items = extract_items(self.get_json(&url)?);
            if items.is_empty() {
                break;
            }

            let item_count = items.len();
            let mut valid = 0usize;
            let mut fresh = 0usize;
            for rec in items.into_iter().filter_map(NodeRecord::from_value) {
                valid += 1;
                if seen.insert(rec.id) {
                    out.push(rec);
                    fresh += 1;
                }
            }
            tracing::debug!(
                "children page={} parent={} items={} valid={} new={}",
                page,
                id,
                item_count,
                valid,
                fresh
            );

            if valid == 0 || fresh == 0 || item_count < page_size {
                break;
            }
            page += 1;
        }

        Ok(out)
    }

    fn fetch_batch(&mut self, ids: &[NodeId]) -> Vec<NodeRecord> {
        let mut out = Vec::new();
        for chunk in ids.chunks(BATCH_LIMIT) {
            let wanted: HashSet<NodeId> = chunk.iter().copied().collect();
            let url = self.search_url(chunk);
            match self.get_json(&url) {
                Ok(body) => out.extend(
                    extract_items(body)
                        .into_iter()
                        .filter_map(NodeRecord::from_value)
                        .filter(|r| wanted.contains(&r.id)),
                ),
                Err(e) => {
                    tracing::warn!("batch lookup failed ({}), falling back to single fetches", e);
                    for &id in chunk {
                        match self.fetch_node(id) {
                            Ok(rec) => out.push(rec),
                            Err(e) => tracing::warn!("node {} unavailable: {}", id, e),
                        }
                    }
                }
            }
        }
        out
    }
}

// ---------------------------------------------------------------------------
// Body shapes
// ---------------------------------------------------------------------------

/// Strip a `{"kitty": {...}}` style wrapper from a single-node body.
fn unwrap_single(body: Value) -> Value {
    let Value::Object(mut obj) = body else {
        return body;
    };
    for key in SINGLE_WRAPPERS {
        if matches!(obj.get(*key), Some(Value::Object(_))) {
            if let Some(inner) = obj.remove(*key) {
                return inner;
            }
        }
    }
    Value::Object(obj)
}

/// Pull the item list out of a list-endpoint body, whichever key holds it.
fn extract_items(body: Value) -> Vec<Value> {
    match body {
        Value::Array(items) => items,
        Value::Object(mut obj) => {
            if let Some(items) = take_array(&mut obj, LIST_KEYS) {
                return items;
            }
            match obj.remove("data") {
                Some(Value::Object(mut inner)) => {
                    take_array(&mut inner, NESTED_LIST_KEYS).unwrap_or_default()
                }
                _ => Vec::new(),
            }
        }
        _ => Vec::new(),
    }
}

fn take_array(obj: &mut serde_json::Map<String, Value>, keys: &[&str]) -> Option<Vec<Value>> {
    for key in keys {
        if matches!(obj.get(*key), Some(Value::Array(_))) {
            if let Some(Value::Array(items)) = obj.remove(*key) {
                return Some(items);
            }
        }
    }
    None
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
