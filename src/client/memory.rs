//! In-memory [`NodeSource`] over a fixed set of records.
//!
//! Children are derived from the records' own parent references, so a
//! record set loaded from a node file behaves like the remote API would.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use super::NodeSource;
use crate::error::FetchError;
use crate::types::{NodeId, NodeRecord};

#[derive(Debug, Default)]
pub struct MemorySource {
    records: BTreeMap<NodeId, NodeRecord>,
    children: BTreeMap<NodeId, BTreeSet<NodeId>>,
    unavailable: HashSet<NodeId>,
    node_fetches: usize,
    children_fetches: usize,
}

impl MemorySource {
    pub fn new(records: impl IntoIterator<Item = NodeRecord>) -> Self {
        let mut source = Self::default();
        for rec in records {
            source.insert(rec);
        }
        source
    }

    /// Add a record and index it under its parents. Later inserts for the
    /// same id are ignored.
    pub fn insert(&mut self, record: NodeRecord) {
        if self.records.contains_key(&record.id) {
            return;
        }
        for parent in record.parent_ids() {
            self.children.entry(parent).or_default().insert(record.id);
        }
        self.records.insert(record.id, record);
    }

    /// Make every request touching `id` fail as if the server were down.
    pub fn mark_unavailable(&mut self, id: NodeId) {
        self.unavailable.insert(id);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Single-node fetches served so far.
    pub fn node_fetches(&self) -> usize {
        self.node_fetches
    }

    /// Children lookups served so far.
    pub fn children_fetches(&self) -> usize {
        self.children_fetches
    }

    fn url(id: NodeId) -> String {
        format!("memory://{id}")
    }

    fn down(id: NodeId) -> FetchError {
        FetchError::Exhausted {
            url: Self::url(id),
            attempts: 1,
            last: "source unavailable".to_string(),
        }
    }
}

impl NodeSource for MemorySource {
    fn fetch_node(&mut self, id: NodeId) -> Result<NodeRecord, FetchError> {
        self.node_fetches += 1;
        if self.unavailable.contains(&id) {
            return Err(Self::down(id));
        }
        self.records
            .get(&id)
            .cloned()
            .ok_or_else(|| FetchError::NotFound { url: Self::url(id) })
    }

    fn fetch_children(&mut self, id: NodeId, _page_size: usize) -> Result<Vec<NodeRecord>, FetchError> {
        self.children_fetches += 1;
        if self.unavailable.contains(&id) {
            return Err(Self::down(id));
        }
        Ok(self
            .children
            .get(&id)
            .into_iter()
            .flatten()
            .filter_map(|child| self.records.get(child).cloned())
            .collect())
    }
}
