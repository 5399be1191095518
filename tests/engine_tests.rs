//! End-to-end tests: crawler and pathfinder driving the real fetch client
//! over a scripted HTTP transport.

use std::cell::RefCell;
use std::collections::{BTreeSet, HashMap};
use std::rc::Rc;
use std::time::Duration;

use pretty_assertions::assert_eq as pa_eq;
use serde_json::{json, Value};
use tempfile::TempDir;

use kingraph::client::{FetchClient, RawResponse, Sleeper, Transport, TransportError};
use kingraph::config::{ClientConfig, CrawlConfig, KinGraphConfig, PathConfig};
use kingraph::export::{load_node_file, write_json, CrawlReport};
use kingraph::graph::{crawl, find_paths, FetchStage};
use kingraph::types::NodeId;

const ENDPOINT: &str = "http://kin.test/v3/kitties";

// ---------------------------------------------------------------------------
// Fake API
// ---------------------------------------------------------------------------

/// Serves a small pedigree the way the remote API does: single nodes with
/// nested parent objects, children in pages under `kitties`.
struct FakeApi {
    nodes: HashMap<NodeId, (Option<NodeId>, Option<NodeId>)>,
    /// Remaining 429 responses per node URL.
    throttled: HashMap<NodeId, u32>,
    /// Nodes whose every request fails with a 503.
    broken: BTreeSet<NodeId>,
    log: Rc<RefCell<Vec<String>>>,
}

impl FakeApi {
    fn new(nodes: &[(NodeId, Option<NodeId>, Option<NodeId>)]) -> Self {
        Self {
            nodes: nodes.iter().map(|&(id, m, s)| (id, (m, s))).collect(),
            throttled: HashMap::new(),
            broken: BTreeSet::new(),
            log: Rc::new(RefCell::new(Vec::new())),
        }
    }

    fn node_json(&self, id: NodeId) -> Value {
        let (m, s) = self.nodes[&id];
        json!({
            "id": id,
            "name": format!("Kitty {id}"),
            "generation": 0,
            "matron": m.map(|m| json!({"id": m})),
            "sire": s.map(|s| json!({"id": s})),
        })
    }

    fn children(&self, id: NodeId) -> Vec<NodeId> {
        let mut out: Vec<NodeId> = self
            .nodes
            .iter()
            .filter(|(_, (m, s))| *m == Some(id) || *s == Some(id))
            .map(|(child, _)| *child)
            .collect();
        out.sort_unstable();
        out
    }

    fn query(query: &str, key: &str) -> Option<String> {
        query
            .split('&')
            .find_map(|kv| kv.strip_prefix(key)?.strip_prefix('=').map(str::to_string))
    }

    fn ok(body: Value) -> Result<RawResponse, TransportError> {
        Ok(RawResponse::new(200, body.to_string()))
    }
}

impl Transport for FakeApi {
    fn get(&mut self, url: &str) -> Result<RawResponse, TransportError> {
        self.log.borrow_mut().push(url.to_string());
        let rest = url
            .strip_prefix(ENDPOINT)
            .ok_or_else(|| TransportError(format!("unexpected host: {url}")))?;

        if let Some(id) = rest.strip_prefix('/') {
            let id: NodeId = id.parse().map_err(|_| TransportError("bad id".into()))?;
            if self.broken.contains(&id) {
                return Ok(RawResponse::new(503, "down"));
            }
            if let Some(left) = self.throttled.get_mut(&id).filter(|n| **n > 0) {
                *left -= 1;
                return Ok(RawResponse::new(429, "slow down"));
            }
            if !self.nodes.contains_key(&id) {
                return Ok(RawResponse::new(404, "{}"));
            }
            return Self::ok(json!({ "kitty": self.node_json(id) }));
        }

        let query = rest.strip_prefix('?').unwrap_or_default();
        if let Some(parent) = Self::query(query, "parent") {
            let parent: NodeId = parent.parse().map_err(|_| TransportError("bad parent".into()))?;
            if self.broken.contains(&parent) {
                return Ok(RawResponse::new(503, "down"));
            }
            let page: usize = Self::query(query, "page").and_then(|p| p.parse().ok()).unwrap_or(1);
            let limit: usize = Self::query(query, "limit").and_then(|l| l.parse().ok()).unwrap_or(100);
            let items: Vec<Value> = self
                .children(parent)
                .into_iter()
                .skip((page - 1) * limit)
                .take(limit)
                .map(|id| self.node_json(id))
                .collect();
            return Self::ok(json!({ "kitties": items, "page": page }));
        }

        if let Some(ids) = Self::query(query, "search") {
            let items: Vec<Value> = ids
                .split(',')
                .filter_map(|id| id.parse::<NodeId>().ok())
                .filter(|id| self.nodes.contains_key(id))
                .map(|id| self.node_json(id))
                .collect();
            return Self::ok(json!({ "kitties": items }));
        }

        Ok(RawResponse::new(400, "bad request"))
    }
}

#[derive(Clone, Default)]
struct Naps(Rc<RefCell<Vec<Duration>>>);

impl Sleeper for Naps {
    fn sleep(&self, duration: Duration) {
        self.0.borrow_mut().push(duration);
    }
}

/// ```text
///  1 x 2 -> 3        3 x 4 -> 5,6,7       5 x 8 -> 9
/// ```
fn pedigree() -> FakeApi {
    FakeApi::new(&[
        (1, None, None),
        (2, None, None),
        (3, Some(1), Some(2)),
        (4, None, None),
        (5, Some(3), Some(4)),
        (6, Some(3), Some(4)),
        (7, Some(3), Some(4)),
        (8, None, None),
        (9, Some(5), Some(8)),
    ])
}

fn client_config() -> ClientConfig {
    ClientConfig {
        endpoint: ENDPOINT.to_string(),
        sleep_secs: 0.0,
        max_retries: 3,
        backoff_base_secs: 0.25,
        ..ClientConfig::default()
    }
}

fn client(api: FakeApi) -> (FetchClient<FakeApi, Naps>, Naps) {
    let naps = Naps::default();
    (FetchClient::with_parts(&client_config(), api, naps.clone()), naps)
}

fn set(ids: &[NodeId]) -> BTreeSet<NodeId> {
    ids.iter().copied().collect()
}

// ---------------------------------------------------------------------------
// Crawl
// ---------------------------------------------------------------------------

#[test]
fn crawl_over_http_collects_neighbourhood() {
    let (mut client, _) = client(pedigree());
    let config = CrawlConfig {
        parent_levels: 1,
        child_levels: 1,
        page_size: 2,
        ..CrawlConfig::default()
    };

    let out = crawl(&mut client, &[3], &config);

    let mut ids: Vec<NodeId> = out.nodes.ids().collect();
    ids.sort_unstable();
    pa_eq!(ids, vec![1, 2, 3, 5, 6, 7]);
    assert!(out.errors.is_empty());
    let reasons: Vec<&str> = out.included_by[&6].iter().map(String::as_str).collect();
    pa_eq!(reasons, vec!["child_of:3"]);
    // payload is carried through untouched
    pa_eq!(out.nodes.get(5).unwrap().payload["name"], json!("Kitty 5"));
    pa_eq!(out.nodes.get(5).unwrap().matron_id, Some(3));
}

#[test]
fn crawl_survives_throttling_and_outages() {
    let mut api = pedigree();
    api.throttled.insert(1, 2);
    api.broken.insert(2);
    let (mut client, naps) = client(api);
    let config = CrawlConfig {
        parent_levels: 1,
        child_levels: 0,
        ..CrawlConfig::default()
    };

    let out = crawl(&mut client, &[3], &config);

    assert!(out.nodes.contains(1));
    assert!(!out.nodes.contains(2));
    pa_eq!(out.errors.len(), 1);
    pa_eq!(out.errors[0].id, 2);
    pa_eq!(out.errors[0].stage, FetchStage::Node);
    assert!(out.errors[0].error.contains("after 4 attempts"));

    // two 429 backoffs for node 1, three 503 backoffs for node 2
    let naps = naps.0.borrow().clone();
    pa_eq!(
        naps,
        vec![
            Duration::from_millis(250),
            Duration::from_millis(500),
            Duration::from_millis(250),
            Duration::from_millis(500),
            Duration::from_millis(1000),
        ]
    );
}

#[test]
fn crawl_report_is_written_and_reloadable() {
    let tmp = TempDir::new().unwrap();
    let out_path = tmp.path().join("crawl.json");
    let (mut client, _) = client(pedigree());
    let config = KinGraphConfig {
        client: client_config(),
        crawl: CrawlConfig {
            parent_levels: 2,
            child_levels: 0,
            ..CrawlConfig::default()
        },
        ..KinGraphConfig::default()
    };

    let outcome = crawl(&mut client, &[9, 404], &config.crawl);
    let report = CrawlReport::new(&[9, 404], outcome, &config.crawl, &config.client);
    write_json(&out_path, &report).unwrap();

    let v: Value = serde_json::from_str(&std::fs::read_to_string(&out_path).unwrap()).unwrap();
    pa_eq!(v["source"], json!(ENDPOINT));
    pa_eq!(v["root_ids"], json!([9, 404]));
    pa_eq!(v["counts"], json!({"kitties": 5, "errors": 1}));
    pa_eq!(v["errors"][0]["id"], json!(404));
    pa_eq!(v["errors"][0]["stage"], json!("node"));
    pa_eq!(v["included_by"]["3"], json!(["parent_of:5"]));
    pa_eq!(v["config"]["parent_levels"], json!(2));
    pa_eq!(v["config"]["endpoint"], json!(ENDPOINT));

    let reloaded = load_node_file(&out_path).unwrap();
    let ids: Vec<NodeId> = reloaded.iter().map(|r| r.id).collect();
    pa_eq!(ids, vec![3, 4, 5, 8, 9]);
}

// ---------------------------------------------------------------------------
// Path
// ---------------------------------------------------------------------------

#[test]
fn path_over_http_between_cousins() {
    let (mut client, _) = client(pedigree());

    let out = find_paths(&mut client, &set(&[9]), &set(&[6]), &PathConfig::default()).unwrap();

    // 9's matron 5 and 6 are full siblings through 3 and 4
    pa_eq!(out.paths, vec![vec![9, 5, 3, 6], vec![9, 5, 4, 6]]);
    pa_eq!(out.distance(), Some(3));
}

#[test]
fn path_to_unknown_node_is_empty_not_an_error() {
    let (mut client, _) = client(pedigree());

    let out = find_paths(&mut client, &set(&[1]), &set(&[999]), &PathConfig::default()).unwrap();

    assert!(out.paths.is_empty());
    assert!(out.errors.iter().any(|e| e.id == 999));
}

#[test]
fn backfill_uses_search_endpoint() {
    let api = pedigree();
    let log = api.log.clone();
    let (mut client, _) = client(api);

    let mut out = find_paths(&mut client, &set(&[1]), &set(&[2]), &PathConfig::default()).unwrap();
    pa_eq!(out.paths, vec![vec![1, 3, 2]]);

    let mut fresh = kingraph::graph::PathOutcome {
        paths: out.paths.clone(),
        ..Default::default()
    };
    pa_eq!(fresh.backfill(&mut client), 3);
    assert!(log
        .borrow()
        .iter()
        .any(|url| url == &format!("{ENDPOINT}?search=1,2,3&limit=3")));
    pa_eq!(out.backfill(&mut client), 0);
}
