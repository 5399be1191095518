//! Bidirectional shortest-path search between two node sets.
//!
//! Two BFS frontiers grow toward each other, one hop per round each. An
//! edge is any parent or child link, so a node's neighbours are its matron,
//! its sire, and everything on its children list. Nodes are fetched lazily
//! the first time a frontier expands them.
//!
//! Once the frontiers touch, the search keeps going only while a shorter
//! meeting could still turn up: it stops when `2 * round > best + slack`.
//! The slack is a heuristic margin, not a proof of optimality.

use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

use super::cache::NodeCache;
use super::{FetchFailure, FetchStage};
use crate::client::NodeSource;
use crate::config::PathConfig;
use crate::error::{KinGraphError, Result};
use crate::types::NodeId;

// ---------------------------------------------------------------------------
// Result types
// ---------------------------------------------------------------------------

/// Two adjacent nodes, one reached from each side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct MeetingPoint {
    /// Reached by the frontier grown from the `from` set.
    forward: NodeId,
    /// Reached by the frontier grown from the `to` set.
    backward: NodeId,
    /// Hops from a `from` origin to a `to` origin through this edge.
    total: u32,
}

/// Everything a path search produced.
#[derive(Debug, Default)]
pub struct PathOutcome {
    /// Shortest paths found, each from a `from` id to a `to` id. Empty when
    /// the sets are not connected within the round limit.
    pub paths: Vec<Vec<NodeId>>,
    /// Every record fetched during the search.
    pub nodes: NodeCache,
    pub errors: Vec<FetchFailure>,
    pub rounds: u32,
}

impl PathOutcome {
    pub fn is_connected(&self) -> bool {
        !self.paths.is_empty()
    }

    /// Length in hops of the shortest path, if any.
    pub fn distance(&self) -> Option<usize> {
        self.paths.first().map(|p| p.len().saturating_sub(1))
    }

    /// Fetch path members that are not cached yet, in batches.
    pub fn backfill<S: NodeSource + ?Sized>(&mut self, source: &mut S) -> usize {
        let missing: Vec<NodeId> = self
            .paths
            .iter()
            .flatten()
            .copied()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .filter(|id| !self.nodes.contains(*id))
            .collect();
        if missing.is_empty() {
            return 0;
        }
        tracing::info!("Backfilling {} path nodes", missing.len());
        let before = self.nodes.len();
        self.nodes.extend(source.fetch_batch(&missing));
        self.nodes.len() - before
    }
}

// ---------------------------------------------------------------------------
// Frontier
// ---------------------------------------------------------------------------

/// One side of the search.
#[derive(Debug)]
struct Frontier {
    depth: HashMap<NodeId, u32>,
    predecessor: HashMap<NodeId, Option<NodeId>>,
    queue: VecDeque<NodeId>,
}

impl Frontier {
    fn seeded(origins: &BTreeSet<NodeId>) -> Self {
        Self {
            depth: origins.iter().map(|&id| (id, 0)).collect(),
            predecessor: origins.iter().map(|&id| (id, None)).collect(),
            queue: origins.iter().copied().collect(),
        }
    }

    fn depth(&self, id: NodeId) -> Option<u32> {
        self.depth.get(&id).copied()
    }

    /// Pop every queued id discovered before `round`.
    fn take_round(&mut self, round: u32) -> Vec<NodeId> {
        let mut batch = Vec::new();
        while let Some(&id) = self.queue.front() {
            if self.depth(id).unwrap_or(0) >= round {
                break;
            }
            self.queue.pop_front();
            batch.push(id);
        }
        batch
    }

    /// Mark `id` reached at `depth` via `via`, unless already visited.
    fn discover(&mut self, id: NodeId, depth: u32, via: NodeId) {
        if self.depth.contains_key(&id) {
            return;
        }
        self.depth.insert(id, depth);
        self.predecessor.insert(id, Some(via));
        self.queue.push_back(id);
    }

    /// Predecessor chain from `id` back to its origin, `id` first.
    fn trace(&self, id: NodeId) -> Vec<NodeId> {
        let mut chain = vec![id];
        let mut current = id;
        while let Some(Some(prev)) = self.predecessor.get(&current) {
            chain.push(*prev);
            current = *prev;
        }
        chain
    }

    fn is_exhausted(&self) -> bool {
        self.queue.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Forward,
    Backward,
}

// ---------------------------------------------------------------------------
// Search
// ---------------------------------------------------------------------------

struct Search<'a, S: ?Sized> {
    source: &'a mut S,
    config: &'a PathConfig,
    nodes: NodeCache,
    neighbors: HashMap<NodeId, BTreeSet<NodeId>>,
    failed: HashSet<NodeId>,
    errors: Vec<FetchFailure>,
    meetings: Vec<MeetingPoint>,
    best: Option<u32>,
}

impl<S: NodeSource + ?Sized> Search<'_, S> {
    /// Neighbour set of `id`, fetching on first use. `None` when the node
    /// itself cannot be fetched.
    fn neighbors_of(&mut self, id: NodeId) -> Option<&BTreeSet<NodeId>> {
        if !self.neighbors.contains_key(&id) {
            let set = self.load_neighbors(id)?;
            self.neighbors.insert(id, set);
        }
        self.neighbors.get(&id)
    }

    fn load_neighbors(&mut self, id: NodeId) -> Option<BTreeSet<NodeId>> {
        if self.failed.contains(&id) {
            return None;
        }
        if !self.nodes.contains(id) {
            match self.source.fetch_node(id) {
                Ok(rec) => {
                    self.nodes.insert(rec);
                }
                Err(e) => {
                    if e.is_permanent() {
                        self.failed.insert(id);
                    }
                    self.errors.push(FetchFailure::new(id, e, FetchStage::Node));
                    return None;
                }
            }
        }

        let mut set: BTreeSet<NodeId> = self
            .nodes
            .get(id)
            .map(|rec| rec.parent_ids().collect())
            .unwrap_or_default();
        let parents = set.len();

        match self.source.fetch_children(id, self.config.page_size) {
            Ok(children) => {
                if !children.is_empty() {
                    tracing::debug!("{}: {} parents, {} children", id, parents, children.len());
                }
                for child in children {
                    set.insert(child.id);
                    self.nodes.insert(child);
                }
            }
            Err(e) => self
                .errors
                .push(FetchFailure::new(id, e, FetchStage::Children)),
        }
        Some(set)
    }

    /// Expand one side by one hop.
    fn step(&mut self, round: u32, side: Side, this: &mut Frontier, other: &Frontier) {
        let batch = this.take_round(round);
        if batch.is_empty() {
            return;
        }
        tracing::info!("{:?} round {}: expanding {} nodes", side, round, batch.len());

        for id in batch {
            let Some(neighbors) = self.neighbors_of(id) else {
                continue;
            };
            let neighbors: Vec<NodeId> = neighbors.iter().copied().collect();
            let own_depth = this.depth(id).unwrap_or(0);

            for n in neighbors {
                if let Some(other_depth) = other.depth(n) {
                    let total = own_depth + 1 + other_depth;
                    if self.best.map_or(true, |best| total <= best) {
                        let (forward, backward) = match side {
                            Side::Forward => (id, n),
                            Side::Backward => (n, id),
                        };
                        tracing::info!("Meeting point {} <-> {} (length {})", forward, backward, total);
                        self.best = Some(total);
                        self.meetings.push(MeetingPoint {
                            forward,
                            backward,
                            total,
                        });
                    }
                }
                this.discover(n, round, id);
            }
        }
    }
}

/// Find the shortest kinship paths from any id in `from` to any id in `to`.
///
/// Returns an empty path list, not an error, when the sets do not connect
/// within `config.max_rounds`.
pub fn find_paths<S>(
    source: &mut S,
    from: &BTreeSet<NodeId>,
    to: &BTreeSet<NodeId>,
    config: &PathConfig,
) -> Result<PathOutcome>
where
    S: NodeSource + ?Sized,
{
    if from.is_empty() || to.is_empty() {
        return Err(KinGraphError::InvalidInput(
            "both node sets must be non-empty".to_string(),
        ));
    }

    let overlap: Vec<NodeId> = from.intersection(to).copied().collect();
    if !overlap.is_empty() {
        tracing::info!("Node sets overlap in {} ids", overlap.len());
        return Ok(PathOutcome {
            paths: overlap.into_iter().map(|id| vec![id]).collect(),
            ..PathOutcome::default()
        });
    }

    let mut forward = Frontier::seeded(from);
    let mut backward = Frontier::seeded(to);
    let mut search = Search {
        source,
        config,
        nodes: NodeCache::new(),
        neighbors: HashMap::new(),
        failed: HashSet::new(),
        errors: Vec::new(),
        meetings: Vec::new(),
        best: None,
    };

    let mut rounds = 0;
    while rounds < config.max_rounds && !(forward.is_exhausted() && backward.is_exhausted()) {
        rounds += 1;
        search.step(rounds, Side::Forward, &mut forward, &backward);
        search.step(rounds, Side::Backward, &mut backward, &forward);

        if let Some(best) = search.best {
            if 2 * rounds > best.saturating_add(config.slack) {
                break;
            }
        }
    }

    let paths = match search.best {
        Some(best) => reconstruct(&search.meetings, best, &forward, &backward),
        None => {
            tracing::warn!("No connection found within {} rounds", rounds);
            Vec::new()
        }
    };

    Ok(PathOutcome {
        paths,
        nodes: search.nodes,
        errors: search.errors,
        rounds,
    })
}

/// Paths through every meeting point of length `best`, deduplicated and
/// sorted by length then id sequence.
fn reconstruct(
    meetings: &[MeetingPoint],
    best: u32,
    forward: &Frontier,
    backward: &Frontier,
) -> Vec<Vec<NodeId>> {
    let unique: BTreeSet<Vec<NodeId>> = meetings
        .iter()
        .filter(|m| m.total == best)
        .map(|m| {
            let mut path = forward.trace(m.forward);
            path.reverse();
            path.extend(backward.trace(m.backward));
            path
        })
        .collect();

    let mut paths: Vec<Vec<NodeId>> = unique.into_iter().collect();
    paths.sort_by(|a, b| a.len().cmp(&b.len()).then_with(|| a.cmp(b)));
    paths
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
