//! kingraph: kinship-graph crawling and shortest-path search.
//!
//! Reads parent/child records from a remote paginated API and derives two
//! views: a depth-bounded neighbourhood around a set of roots
//! ([`graph::crawl`]) and the shortest kinship paths between two node sets
//! ([`graph::find_paths`]).

pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod export;
pub mod graph;
pub mod observability;
pub mod types;
