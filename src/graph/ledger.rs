//! Visit ledger: the deepest budget each node has been requested with.
//!
//! A node is (re-)enqueued only when a request would let it reach further
//! than any earlier request did, in at least one direction. The stored
//! budget only ever grows, which is what bounds the crawl on cyclic or
//! heavily inbred graphs.

use std::collections::HashMap;

use crate::types::{DepthBudget, NodeId};

/// Outcome of [`VisitLedger::request`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// The request improves on what was recorded; expand with this budget.
    Enqueue(DepthBudget),
    /// Some earlier request already covers this one.
    Redundant,
}

#[derive(Debug, Default, Clone)]
pub struct VisitLedger {
    budgets: HashMap<NodeId, DepthBudget>,
}

impl VisitLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a request for `id` with `budget`.
    pub fn request(&mut self, id: NodeId, budget: DepthBudget) -> Admission {
        match self.budgets.get_mut(&id) {
            None => {
                self.budgets.insert(id, budget);
                Admission::Enqueue(budget)
            }
            Some(recorded) if recorded.covers(&budget) => Admission::Redundant,
            Some(recorded) => {
                *recorded = recorded.merge(&budget);
                Admission::Enqueue(budget)
            }
        }
    }

    /// Deepest budget recorded for `id`.
    pub fn budget(&self, id: NodeId) -> Option<DepthBudget> {
        self.budgets.get(&id).copied()
    }

    /// Distinct ids requested so far.
    pub fn len(&self) -> usize {
        self.budgets.len()
    }
}
