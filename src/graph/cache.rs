//! Per-run node cache.

use std::collections::HashMap;

use crate::types::{NodeId, NodeRecord};

/// Fetched records keyed by id. The first record stored for an id wins.
#[derive(Debug, Default, Clone)]
pub struct NodeCache {
    nodes: HashMap<NodeId, NodeRecord>,
}

impl NodeCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `record` unless its id is already cached. Returns `true` when
    /// the record was added.
    pub fn insert(&mut self, record: NodeRecord) -> bool {
        match self.nodes.entry(record.id) {
            std::collections::hash_map::Entry::Occupied(_) => false,
            std::collections::hash_map::Entry::Vacant(slot) => {
                slot.insert(record);
                true
            }
        }
    }

    pub fn get(&self, id: NodeId) -> Option<&NodeRecord> {
        self.nodes.get(&id)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.keys().copied()
    }

    /// Merge every record of `other` that is not cached yet.
    pub fn absorb(&mut self, other: NodeCache) {
        for (_, rec) in other.nodes {
            self.insert(rec);
        }
    }

    /// All records ordered by id.
    pub fn into_sorted_vec(self) -> Vec<NodeRecord> {
        let mut out: Vec<NodeRecord> = self.nodes.into_values().collect();
        out.sort_by_key(|r| r.id);
        out
    }
}

impl Extend<NodeRecord> for NodeCache {
    fn extend<I: IntoIterator<Item = NodeRecord>>(&mut self, iter: I) {
        for rec in iter {
            self.insert(rec);
        }
    }
}

impl FromIterator<NodeRecord> for NodeCache {
    fn from_iter<I: IntoIterator<Item = NodeRecord>>(iter: I) -> Self {
        let mut cache = Self::new();
        cache.extend(iter);
        cache
    }
}
