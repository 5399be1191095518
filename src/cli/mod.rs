//! Command-line front end.
//!
//! `kingraph crawl` materialises the neighbourhood around a set of roots and
//! writes it as JSON; `kingraph path` finds the shortest kinship paths
//! between two sets of nodes.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{ArgAction, Args, Parser, Subcommand};

use crate::client::{FetchClient, NodeSource};
use crate::config::{load_config, ClientConfig, CrawlConfig, KinGraphConfig, PathConfig};
use crate::error::{KinGraphError, Result};
use crate::export::{
    ids_of, load_node_file, parse_ids, parse_ids_file, write_json, CrawlReport, PathReport,
};
use crate::graph::{crawl, find_paths, NodeCache, PathOutcome};
use crate::types::NodeId;

/// Paths printed to the terminal; the JSON artifact carries all of them.
const PRINTED_PATHS: usize = 5;

// ---------------------------------------------------------------------------
// Arguments
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "kingraph",
    version,
    about = "Crawl and query a remote kinship graph"
)]
pub struct Cli {
    /// Increase verbosity (-v info, -vv debug). RUST_LOG overrides.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// YAML config file (default: .kingraph.yml, then the user config dir)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Expand ancestors and descendants around root nodes
    Crawl(CrawlArgs),
    /// Find shortest kinship paths between two node sets
    Path(PathArgs),
}

/// Overrides for the fetch client.
#[derive(Args, Debug, Clone, Default)]
pub struct ClientArgs {
    /// Collection endpoint URL
    #[arg(long)]
    pub endpoint: Option<String>,

    /// Request timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Politeness delay between requests in seconds
    #[arg(long, value_name = "SECS")]
    pub sleep: Option<f64>,

    /// Retries per request for rate limits and server errors
    #[arg(long)]
    pub retries: Option<u32>,

    /// Backoff base in seconds
    #[arg(long, value_name = "SECS")]
    pub backoff: Option<f64>,
}

impl ClientArgs {
    pub fn apply(&self, config: &mut ClientConfig) {
        if let Some(v) = &self.endpoint {
            config.endpoint = v.clone();
        }
        if let Some(v) = self.timeout {
            config.request_timeout_secs = v;
        }
        if let Some(v) = self.sleep {
            config.sleep_secs = v;
        }
        if let Some(v) = self.retries {
            config.max_retries = v;
        }
        if let Some(v) = self.backoff {
            config.backoff_base_secs = v;
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct CrawlArgs {
    /// Root ids, comma or space separated
    #[arg(long, required_unless_present = "ids_file", conflicts_with = "ids_file")]
    pub ids: Option<String>,

    /// File with one root id per line
    #[arg(long, value_name = "FILE")]
    pub ids_file: Option<PathBuf>,

    /// Ancestor levels to expand
    #[arg(long)]
    pub parents: Option<u32>,

    /// Descendant levels to expand
    #[arg(long)]
    pub children: Option<u32>,

    /// Ancestor levels granted to each discovered child
    #[arg(long)]
    pub child_parent_levels: Option<u32>,

    /// Children list page size
    #[arg(long)]
    pub page_size: Option<usize>,

    /// Hard cap on fetched nodes
    #[arg(long)]
    pub max_total: Option<usize>,

    #[command(flatten)]
    pub client: ClientArgs,

    /// Output JSON path
    #[arg(long, default_value = "kingraph_crawl.json")]
    pub out: PathBuf,
}

impl CrawlArgs {
    pub fn apply(&self, config: &mut CrawlConfig) {
        if let Some(v) = self.parents {
            config.parent_levels = v;
        }
        if let Some(v) = self.children {
            config.child_levels = v;
        }
        if let Some(v) = self.child_parent_levels {
            config.child_parent_levels = v;
        }
        if let Some(v) = self.page_size {
            config.page_size = v;
        }
        if let Some(v) = self.max_total {
            config.max_total = v;
        }
    }

    /// Root ids from `--ids` or `--ids-file`.
    pub fn roots(&self) -> Result<Vec<NodeId>> {
        let roots = match (&self.ids, &self.ids_file) {
            (Some(ids), _) => parse_ids(ids)?,
            (None, Some(path)) => parse_ids_file(path)?,
            (None, None) => Vec::new(),
        };
        if roots.is_empty() {
            return Err(KinGraphError::InvalidInput("no root ids given".into()));
        }
        Ok(roots)
    }
}

#[derive(Args, Debug, Clone)]
pub struct PathArgs {
    /// Ids of the first node set
    #[arg(long, required_unless_present = "from_json")]
    pub from_ids: Option<String>,

    /// Node file whose records join the first set
    #[arg(long, value_name = "FILE")]
    pub from_json: Option<PathBuf>,

    /// Ids of the second node set
    #[arg(long, required_unless_present = "to_json")]
    pub to_ids: Option<String>,

    /// Node file whose records join the second set
    #[arg(long, value_name = "FILE")]
    pub to_json: Option<PathBuf>,

    /// Maximum search rounds
    #[arg(long, alias = "max-depth")]
    pub max_rounds: Option<u32>,

    /// Early-stop slack
    #[arg(long)]
    pub slack: Option<u32>,

    #[command(flatten)]
    pub client: ClientArgs,

    /// Write paths and every known node to this JSON file
    #[arg(long)]
    pub out: Option<PathBuf>,
}

impl PathArgs {
    pub fn apply(&self, config: &mut PathConfig) {
        if let Some(v) = self.max_rounds {
            config.max_rounds = v;
        }
        if let Some(v) = self.slack {
            config.slack = v;
        }
    }
}

/// One side of a path query: ids plus any records loaded with them.
#[derive(Debug, Default)]
pub struct NodeSet {
    pub ids: BTreeSet<NodeId>,
    pub known: NodeCache,
}

impl NodeSet {
    pub fn resolve(ids: Option<&str>, json: Option<&Path>, flag: &str) -> Result<Self> {
        let mut set = Self::default();
        if let Some(ids) = ids {
            set.ids.extend(parse_ids(ids)?);
        }
        if let Some(path) = json {
            let records = load_node_file(path)?;
            set.ids.extend(ids_of(&records));
            set.known.extend(records);
        }
        if set.ids.is_empty() {
            return Err(KinGraphError::InvalidInput(format!(
                "{flag}: no node ids given"
            )));
        }
        Ok(set)
    }
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

impl Command {
    /// Defaults, then file and environment, then this command's flags.
    /// Validated once, after every layer is applied.
    pub fn effective_config(
        &self,
        file: Option<&Path>,
        project_root: Option<&Path>,
    ) -> Result<KinGraphConfig> {
        let mut config = load_config(file, project_root)?;
        match self {
            Command::Crawl(args) => {
                args.client.apply(&mut config.client);
                args.apply(&mut config.crawl);
            }
            Command::Path(args) => {
                args.client.apply(&mut config.client);
                args.apply(&mut config.path);
            }
        }
        config.validate()?;
        Ok(config)
    }
}

/// Run a parsed command line.
pub fn run(cli: Cli) -> Result<ExitCode> {
    let cwd = std::env::current_dir().ok();
    let config = cli
        .command
        .effective_config(cli.config.as_deref(), cwd.as_deref())?;

    match cli.command {
        Command::Crawl(args) => {
            let roots = args.roots()?;
            let mut client = FetchClient::from_config(&config.client)?;
            run_crawl(&mut client, &roots, &config, &args.out)?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Path(args) => {
            let from = NodeSet::resolve(args.from_ids.as_deref(), args.from_json.as_deref(), "--from")?;
            let to = NodeSet::resolve(args.to_ids.as_deref(), args.to_json.as_deref(), "--to")?;
            let mut client = FetchClient::from_config(&config.client)?;
            let found = run_path(&mut client, from, to, &config.path, args.out.as_deref())?;
            Ok(if found {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
    }
}

/// Crawl from `roots`, write the report to `out`, print a summary.
pub fn run_crawl<S: NodeSource + ?Sized>(
    source: &mut S,
    roots: &[NodeId],
    config: &KinGraphConfig,
    out: &Path,
) -> Result<CrawlReport> {
    tracing::info!("roots={:?}", roots);
    let outcome = crawl(source, roots, &config.crawl);
    let report = CrawlReport::new(roots, outcome, &config.crawl, &config.client);
    write_json(out, &report)?;

    println!("Wrote: {}", out.display());
    println!(
        "Nodes: {}  Errors: {}",
        report.counts.kitties, report.counts.errors
    );
    if report.counts.errors > 0 {
        println!("Some errors occurred. Inspect the 'errors' array in the JSON.");
    }
    Ok(report)
}

/// Search for paths between `from` and `to`, print them, and optionally
/// write the path report. Returns whether any path was found.
pub fn run_path<S: NodeSource + ?Sized>(
    source: &mut S,
    from: NodeSet,
    to: NodeSet,
    config: &PathConfig,
    out: Option<&Path>,
) -> Result<bool> {
    println!(
        "Finding shortest path between {} and {} nodes...",
        from.ids.len(),
        to.ids.len()
    );
    println!("From: {}", preview(&from.ids));
    println!("To: {}", preview(&to.ids));
    println!();

    let mut outcome = find_paths(source, &from.ids, &to.ids, config)?;
    print_paths(&outcome);

    if let Some(out) = out {
        outcome.nodes.absorb(from.known);
        outcome.nodes.absorb(to.known);
        outcome.backfill(source);
        let PathOutcome { paths, nodes, .. } = outcome;
        let found = !paths.is_empty();
        let report = PathReport::new(&from.ids, &to.ids, paths, nodes);
        write_json(out, &report)?;
        println!("\nExported {} nodes to {}", report.kitties.len(), out.display());
        return Ok(found);
    }

    Ok(outcome.is_connected())
}

fn print_paths(outcome: &PathOutcome) {
    if !outcome.is_connected() {
        println!("No connection found!");
        return;
    }
    println!("Found {} shortest path(s):", outcome.paths.len());
    for (i, path) in outcome.paths.iter().take(PRINTED_PATHS).enumerate() {
        let hops = path
            .iter()
            .map(|id| id.to_string())
            .collect::<Vec<_>>()
            .join(" -> ");
        println!("  Path {} ({} nodes): {}", i + 1, path.len(), hops);
    }
    if outcome.paths.len() > PRINTED_PATHS {
        println!("  ... and {} more paths", outcome.paths.len() - PRINTED_PATHS);
    }
}

/// First ten ids, with an ellipsis when there are more.
fn preview(ids: &BTreeSet<NodeId>) -> String {
    let head: Vec<String> = ids.iter().take(10).map(|id| id.to_string()).collect();
    let more = if ids.len() > 10 { "..." } else { "" };
    format!("[{}]{}", head.join(", "), more)
}
