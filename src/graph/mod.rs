//! Graph layer: node cache, visit ledger, crawler, and pathfinder.

pub mod cache;
pub mod crawl;
mod ledger;
pub mod pathfind;

use serde::Serialize;

use crate::types::NodeId;

pub use cache::NodeCache;
pub use crawl::{crawl, CrawlOutcome, InclusionReason};
pub use pathfind::{find_paths, PathOutcome};

/// Which request failed for a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchStage {
    Node,
    Children,
}

/// A non-fatal per-node failure recorded during a traversal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FetchFailure {
    pub id: NodeId,
    pub error: String,
    pub stage: FetchStage,
}

impl FetchFailure {
    pub fn new(id: NodeId, error: impl std::fmt::Display, stage: FetchStage) -> Self {
        let error = error.to_string();
        tracing::warn!("{:?} fetch failed for {}: {}", stage, id, error);
        Self { id, error, stage }
    }
}
