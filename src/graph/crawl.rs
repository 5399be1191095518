//! Aggregation crawler: depth-bounded multi-root ancestor/descendant expansion.
//!
//! Starting from a set of roots, the crawler walks up through matron/sire
//! references and down through children lists, with independent depth
//! budgets in each direction. Work is an explicit FIFO queue gated by a
//! visit ledger, so a node is expanded again only when a new request
//! reaches deeper than every earlier one.
//!
//! Ancestors are requested with a child budget of zero: climbing a parent
//! line never fans back out into that ancestor's other offspring. Children
//! get `child_parent_levels` of ancestor budget, which pulls in their other
//! parent when set to 1.
//!
//! An id whose fetch failed permanently (404, other 4xx, undecodable) is
//! never fetched again. An id whose retries were exhausted is fetched again
//! if the ledger later admits it with a deeper budget.

use std::collections::{BTreeMap, BTreeSet, HashSet, VecDeque};
use std::fmt;

use super::cache::NodeCache;
use super::ledger::{Admission, VisitLedger};
use super::{FetchFailure, FetchStage};
use crate::client::NodeSource;
use crate::config::CrawlConfig;
use crate::types::{DepthBudget, NodeId};

// ---------------------------------------------------------------------------
// Result types
// ---------------------------------------------------------------------------

/// Why a node was pulled into the crawl.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InclusionReason {
    Root,
    ParentOf(NodeId),
    ChildOf(NodeId),
}

impl fmt::Display for InclusionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Root => write!(f, "root"),
            Self::ParentOf(id) => write!(f, "parent_of:{id}"),
            Self::ChildOf(id) => write!(f, "child_of:{id}"),
        }
    }
}

/// Everything a crawl produced.
#[derive(Debug, Default)]
pub struct CrawlOutcome {
    pub nodes: NodeCache,
    /// id -> every reason it was requested for.
    pub included_by: BTreeMap<NodeId, BTreeSet<String>>,
    pub errors: Vec<FetchFailure>,
    /// `true` when the node cap cut the crawl short.
    pub truncated: bool,
}

impl CrawlOutcome {
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn error_count(&self) -> usize {
        self.errors.len()
    }
}

// ---------------------------------------------------------------------------
// Crawl state
// ---------------------------------------------------------------------------

/// One pending expansion.
#[derive(Debug, Clone, Copy)]
struct CrawlTask {
    id: NodeId,
    budget: DepthBudget,
}

struct CrawlState {
    cache: NodeCache,
    ledger: VisitLedger,
    reasons: BTreeMap<NodeId, BTreeSet<String>>,
    errors: Vec<FetchFailure>,
    failed: HashSet<NodeId>,
    queue: VecDeque<CrawlTask>,
}

impl CrawlState {
    fn new() -> Self {
        Self {
            cache: NodeCache::new(),
            ledger: VisitLedger::new(),
            reasons: BTreeMap::new(),
            errors: Vec::new(),
            failed: HashSet::new(),
            queue: VecDeque::new(),
        }
    }

    /// Record the reason, then enqueue if the ledger admits the budget.
    fn request(&mut self, id: NodeId, budget: DepthBudget, reason: InclusionReason) {
        if id == 0 {
            return;
        }
        self.reasons.entry(id).or_default().insert(reason.to_string());
        match self.ledger.request(id, budget) {
            Admission::Enqueue(budget) => self.queue.push_back(CrawlTask { id, budget }),
            Admission::Redundant => tracing::trace!(
                "{} already covered by {:?}",
                id,
                self.ledger.budget(id)
            ),
        }
    }

    fn fail(&mut self, id: NodeId, error: impl fmt::Display, stage: FetchStage) {
        self.errors.push(FetchFailure::new(id, error, stage));
    }
}

// ---------------------------------------------------------------------------
// Crawl
// ---------------------------------------------------------------------------

/// Crawl outward from `roots` with the limits in `config`.
///
/// Per-node failures never abort the crawl; they are collected in
/// [`CrawlOutcome::errors`]. Hitting `max_total` stops early with a warning.
pub fn crawl<S>(source: &mut S, roots: &[NodeId], config: &CrawlConfig) -> CrawlOutcome
where
    S: NodeSource + ?Sized,
{
    let mut state = CrawlState::new();
    let mut truncated = false;

    for &root in roots {
        state.request(
            root,
            DepthBudget::new(config.parent_levels, config.child_levels),
            InclusionReason::Root,
        );
    }
    tracing::info!(
        "Crawling {} roots (parents={}, children={}, child_parents={})",
        state.queue.len(),
        config.parent_levels,
        config.child_levels,
        config.child_parent_levels
    );

    while let Some(task) = state.queue.pop_front() {
        if state.cache.len() >= config.max_total {
            tracing::warn!(
                "Reached max_total={}; stopping with {} expansions still queued",
                config.max_total,
                state.queue.len() + 1
            );
            truncated = true;
            break;
        }

        let id = task.id;
        if state.failed.contains(&id) {
            continue;
        }

        let (matron, sire) = match state.cache.get(id) {
            Some(rec) => (rec.matron_id, rec.sire_id),
            None => match source.fetch_node(id) {
                Ok(rec) => {
                    let parents = (rec.matron_id, rec.sire_id);
                    state.cache.insert(rec);
                    parents
                }
                Err(e) => {
                    // transient failures get another try on a deeper re-admission
                    if e.is_permanent() {
                        state.failed.insert(id);
                    }
                    state.fail(id, e, FetchStage::Node);
                    continue;
                }
            },
        };

        if task.budget.parents > 0 {
            let next = DepthBudget::new(task.budget.parents - 1, 0);
            for parent in matron.into_iter().chain(sire) {
                state.request(parent, next, InclusionReason::ParentOf(id));
            }
        }

        if task.budget.children > 0 {
            match source.fetch_child_ids(id, config.page_size) {
                Ok(children) => {
                    tracing::debug!("{} children of {}", children.len(), id);
                    let next = DepthBudget::new(config.child_parent_levels, task.budget.children - 1);
                    for child in children {
                        state.request(child, next, InclusionReason::ChildOf(id));
                    }
                }
                Err(e) => state.fail(id, e, FetchStage::Children),
            }
        }

        tracing::debug!(
            "Expanded {} (parents={}, children={}); {} cached, {} queued",
            id,
            task.budget.parents,
            task.budget.children,
            state.cache.len(),
            state.queue.len()
        );
    }

    tracing::info!(
        "Crawl finished: {} nodes, {} errors, {} ids requested",
        state.cache.len(),
        state.errors.len(),
        state.ledger.len()
    );

    CrawlOutcome {
        nodes: state.cache,
        included_by: state.reasons,
        errors: state.errors,
        truncated,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
