//! JSON artifacts and input files.
//!
//! - [`CrawlReport`] / [`PathReport`]: the documents written by the `crawl`
//!   and `path` commands
//! - [`parse_ids`] / [`parse_ids_file`]: root id lists from flags or files
//! - [`load_node_file`]: node records from an earlier artifact

use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use regex::Regex;
use serde::Serialize;
use serde_json::Value;

use crate::config::{ClientConfig, CrawlConfig};
use crate::error::{KinGraphError, Result};
use crate::graph::{CrawlOutcome, FetchFailure, NodeCache};
use crate::types::{NodeId, NodeRecord};

/// UTC timestamp in the artifact format, e.g. `2024-05-01T12:00:00Z`.
pub fn utc_timestamp() -> String {
    chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

// ---------------------------------------------------------------------------
// Crawl report
// ---------------------------------------------------------------------------

/// Crawl and client parameters echoed into the report.
#[derive(Debug, Clone, Serialize)]
pub struct ReportConfig {
    #[serde(flatten)]
    pub crawl: CrawlConfig,
    #[serde(flatten)]
    pub client: ClientConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReportCounts {
    pub kitties: usize,
    pub errors: usize,
}

/// The document written by `kingraph crawl`.
#[derive(Debug, Serialize)]
pub struct CrawlReport {
    pub source: String,
    pub generated_at_utc: String,
    pub config: ReportConfig,
    pub root_ids: Vec<NodeId>,
    pub included_by: BTreeMap<NodeId, Vec<String>>,
    pub kitties: Vec<NodeRecord>,
    pub errors: Vec<FetchFailure>,
    pub counts: ReportCounts,
}

impl CrawlReport {
    pub fn new(
        roots: &[NodeId],
        outcome: CrawlOutcome,
        crawl: &CrawlConfig,
        client: &ClientConfig,
    ) -> Self {
        let counts = ReportCounts {
            kitties: outcome.node_count(),
            errors: outcome.error_count(),
        };
        Self {
            source: client.endpoint.clone(),
            generated_at_utc: utc_timestamp(),
            config: ReportConfig {
                crawl: crawl.clone(),
                client: client.clone(),
            },
            root_ids: roots.to_vec(),
            included_by: outcome
                .included_by
                .into_iter()
                .map(|(id, reasons)| (id, reasons.into_iter().collect()))
                .collect(),
            kitties: outcome.nodes.into_sorted_vec(),
            errors: outcome.errors,
            counts,
        }
    }
}

// ---------------------------------------------------------------------------
// Path report
// ---------------------------------------------------------------------------

/// The document written by `kingraph path --out`.
#[derive(Debug, Serialize)]
pub struct PathReport {
    pub generated: String,
    pub from_ids: Vec<NodeId>,
    pub to_ids: Vec<NodeId>,
    pub paths: Vec<Vec<NodeId>>,
    pub kitties: Vec<NodeRecord>,
}

impl PathReport {
    pub fn new(
        from: &BTreeSet<NodeId>,
        to: &BTreeSet<NodeId>,
        paths: Vec<Vec<NodeId>>,
        nodes: NodeCache,
    ) -> Self {
        Self {
            generated: utc_timestamp(),
            from_ids: from.iter().copied().collect(),
            to_ids: to.iter().copied().collect(),
            paths,
            kitties: nodes.into_sorted_vec(),
        }
    }
}

/// Pretty-print `value` as JSON to `path`, creating parent directories.
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let mut out = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut out, value)?;
    out.write_all(b"\n")?;
    out.flush()?;
    tracing::info!("Wrote {}", path.display());
    Ok(())
}

// ---------------------------------------------------------------------------
// Id lists
// ---------------------------------------------------------------------------

/// Parse comma- or whitespace-separated ids, deduplicated in first-seen order.
pub fn parse_ids(input: &str) -> Result<Vec<NodeId>> {
    let separator =
        Regex::new(r"[,\s]+").map_err(|e| KinGraphError::Other(format!("id separator: {e}")))?;
    let mut seen = BTreeSet::new();
    let mut ids = Vec::new();
    for token in separator.split(input.trim()).filter(|t| !t.is_empty()) {
        let id = parse_id(token)?;
        if seen.insert(id) {
            ids.push(id);
        }
    }
    Ok(ids)
}

/// Read ids one per line. Blank lines and `#` comments are skipped.
pub fn parse_ids_file(path: &Path) -> Result<Vec<NodeId>> {
    let text = std::fs::read_to_string(path)?;
    let mut seen = BTreeSet::new();
    let mut ids = Vec::new();
    for line in text.lines().map(str::trim) {
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let id = parse_id(line).map_err(|_| {
            KinGraphError::InvalidInput(format!("invalid id in {}: {line}", path.display()))
        })?;
        if seen.insert(id) {
            ids.push(id);
        }
    }
    Ok(ids)
}

fn parse_id(token: &str) -> Result<NodeId> {
    token
        .parse::<NodeId>()
        .ok()
        .filter(|&id| id > 0)
        .ok_or_else(|| KinGraphError::InvalidInput(format!("invalid node id: {token}")))
}

// ---------------------------------------------------------------------------
// Node files
// ---------------------------------------------------------------------------

/// Load node records from `{"kitties": [...]}`, `{"data": [...]}`, or a
/// bare array. Entries without a usable id are skipped.
pub fn load_node_file(path: &Path) -> Result<Vec<NodeRecord>> {
    let text = std::fs::read_to_string(path)?;
    let value: Value = serde_json::from_str(&text)?;

    let items = match value {
        Value::Array(items) => items,
        Value::Object(mut obj) => match ["kitties", "data"]
            .iter()
            .find_map(|key| match obj.remove(*key) {
                Some(Value::Array(items)) => Some(items),
                _ => None,
            }) {
            Some(items) => items,
            None => {
                return Err(KinGraphError::InvalidInput(format!(
                    "{}: expected a \"kitties\" or \"data\" array",
                    path.display()
                )))
            }
        },
        _ => {
            return Err(KinGraphError::InvalidInput(format!(
                "{}: expected a JSON object or array",
                path.display()
            )))
        }
    };

    let total = items.len();
    let records: Vec<NodeRecord> = items.into_iter().filter_map(NodeRecord::from_value).collect();
    if records.len() < total {
        tracing::warn!(
            "{}: skipped {} entries without a valid id",
            path.display(),
            total - records.len()
        );
    }
    Ok(records)
}

/// Ids of `records`, sorted.
pub fn ids_of(records: &[NodeRecord]) -> BTreeSet<NodeId> {
    records.iter().map(|r| r.id).collect()
}
