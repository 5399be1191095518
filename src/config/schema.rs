//! Configuration data structures for kingraph.
//!
//! Defines the YAML config format: fetch-client settings, crawl limits, and
//! pathfinder knobs. Every field carries a serde default so partial files
//! are valid.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{KinGraphError, Result};

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Root configuration for kingraph.
///
/// Loaded from YAML files, environment variables, and CLI flags.
/// Multiple sources are merged with well-defined priority (see
/// [`crate::config::loader`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KinGraphConfig {
    /// Config format version (currently "1.0").
    #[serde(default = "default_version")]
    pub version: String,

    /// Remote API access and retry policy.
    #[serde(default)]
    pub client: ClientConfig,

    /// Aggregation crawler limits.
    #[serde(default)]
    pub crawl: CrawlConfig,

    /// Bidirectional pathfinder knobs.
    #[serde(default)]
    pub path: PathConfig,
}

impl Default for KinGraphConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            client: ClientConfig::default(),
            crawl: CrawlConfig::default(),
            path: PathConfig::default(),
        }
    }
}

impl KinGraphConfig {
    /// Validate every section.
    pub fn validate(&self) -> Result<()> {
        self.client.validate()?;
        self.crawl.validate()?;
        self.path.validate()
    }
}

// ---------------------------------------------------------------------------
// ClientConfig
// ---------------------------------------------------------------------------

/// Fetch client settings: where to go, how politely, how persistently.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Collection endpoint; node URLs are `{endpoint}/{id}`.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Politeness delay between consecutive requests, in seconds.
    #[serde(default = "default_sleep_secs")]
    pub sleep_secs: f64,

    /// Retries after the first attempt for transient failures.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Base of the exponential backoff, in seconds.
    #[serde(default = "default_backoff_base_secs")]
    pub backoff_base_secs: f64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            user_agent: default_user_agent(),
            request_timeout_secs: default_timeout_secs(),
            sleep_secs: default_sleep_secs(),
            max_retries: default_max_retries(),
            backoff_base_secs: default_backoff_base_secs(),
        }
    }
}

impl ClientConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn politeness_delay(&self) -> Duration {
        Duration::from_secs_f64(self.sleep_secs.max(0.0))
    }

    pub fn backoff_base(&self) -> Duration {
        Duration::from_secs_f64(self.backoff_base_secs.max(0.0))
    }

    pub fn validate(&self) -> Result<()> {
        if self.endpoint.trim().is_empty() {
            return Err(KinGraphError::Config("client.endpoint cannot be empty".into()));
        }
        if self.request_timeout_secs == 0 {
            return Err(KinGraphError::Config(
                "client.request_timeout_secs must be > 0".into(),
            ));
        }
        check_seconds("client.sleep_secs", self.sleep_secs)?;
        check_seconds("client.backoff_base_secs", self.backoff_base_secs)
    }
}

fn check_seconds(field: &str, value: f64) -> Result<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(KinGraphError::Config(format!(
            "{field} must be a non-negative number of seconds, got {value}"
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// CrawlConfig
// ---------------------------------------------------------------------------

/// Depth limits and caps for the aggregation crawler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrawlConfig {
    /// Ancestor levels to expand from each root.
    #[serde(default = "default_parent_levels")]
    pub parent_levels: u32,

    /// Descendant levels to expand from each root.
    #[serde(default = "default_child_levels")]
    pub child_levels: u32,

    /// Ancestor levels granted to every newly discovered child.
    #[serde(default)]
    pub child_parent_levels: u32,

    /// Children list page size.
    #[serde(default = "default_crawl_page_size")]
    pub page_size: usize,

    /// Hard cap on fetched nodes.
    #[serde(default = "default_max_total")]
    pub max_total: usize,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            parent_levels: default_parent_levels(),
            child_levels: default_child_levels(),
            child_parent_levels: 0,
            page_size: default_crawl_page_size(),
            max_total: default_max_total(),
        }
    }
}

impl CrawlConfig {
    pub fn validate(&self) -> Result<()> {
        if self.page_size == 0 {
            return Err(KinGraphError::Config("crawl.page_size must be > 0".into()));
        }
        if self.max_total == 0 {
            return Err(KinGraphError::Config("crawl.max_total must be > 0".into()));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// PathConfig
// ---------------------------------------------------------------------------

/// Bidirectional pathfinder knobs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathConfig {
    /// Maximum search rounds (each round advances both frontiers one hop).
    #[serde(default = "default_max_rounds")]
    pub max_rounds: u32,

    /// Early-stop slack: stop once `2 * round > best + slack`. Heuristic,
    /// not a proven bound.
    #[serde(default = "default_slack")]
    pub slack: u32,

    /// Children list page size used when computing neighbor sets.
    #[serde(default = "default_path_page_size")]
    pub page_size: usize,
}

impl Default for PathConfig {
    fn default() -> Self {
        Self {
            max_rounds: default_max_rounds(),
            slack: default_slack(),
            page_size: default_path_page_size(),
        }
    }
}

impl PathConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_rounds == 0 {
            return Err(KinGraphError::Config("path.max_rounds must be > 0".into()));
        }
        if self.page_size == 0 {
            return Err(KinGraphError::Config("path.page_size must be > 0".into()));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

fn default_version() -> String {
    "1.0".to_string()
}

fn default_endpoint() -> String {
    "https://api.cryptokitties.co/v3/kitties".to_string()
}

fn default_user_agent() -> String {
    concat!("kingraph/", env!("CARGO_PKG_VERSION")).to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_sleep_secs() -> f64 {
    0.15
}

fn default_max_retries() -> u32 {
    4
}

fn default_backoff_base_secs() -> f64 {
    0.75
}

fn default_parent_levels() -> u32 {
    3
}

fn default_child_levels() -> u32 {
    2
}

fn default_crawl_page_size() -> usize {
    100
}

fn default_max_total() -> usize {
    5000
}

fn default_max_rounds() -> u32 {
    50
}

fn default_slack() -> u32 {
    2
}

fn default_path_page_size() -> usize {
    50
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq as pa_eq;
    use test_case::test_case;

    #[test]
    fn test_default_config() {
        let config = KinGraphConfig::default();
        assert_eq!(config.client.max_retries, 4);
        assert_eq!(config.client.request_timeout_secs, 30);
        assert_eq!(config.crawl.parent_levels, 3);
        assert_eq!(config.crawl.child_levels, 2);
        assert_eq!(config.crawl.child_parent_levels, 0);
        assert_eq!(config.crawl.max_total, 5000);
        assert_eq!(config.path.max_rounds, 50);
        assert_eq!(config.path.slack, 2);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_yaml_equals_default() {
        let config: KinGraphConfig = serde_yaml::from_str("{}").unwrap();
        pa_eq!(config, KinGraphConfig::default());
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let yaml = r#"
crawl:
  parent_levels: 6
path:
  slack: 4
"#;
        let config: KinGraphConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.crawl.parent_levels, 6);
        assert_eq!(config.crawl.child_levels, 2);
        assert_eq!(config.path.slack, 4);
        assert_eq!(config.path.max_rounds, 50);
        pa_eq!(config.client, ClientConfig::default());
    }

    #[test]
    fn test_serde_yaml_roundtrip() {
        let mut config = KinGraphConfig::default();
        config.client.endpoint = "http://localhost:8080/nodes".into();
        config.crawl.max_total = 12;

        let yaml = serde_yaml::to_string(&config).unwrap();
        let back: KinGraphConfig = serde_yaml::from_str(&yaml).unwrap();
        pa_eq!(back, config);
    }

    #[test]
    fn test_durations() {
        let client = ClientConfig {
            sleep_secs: 0.25,
            backoff_base_secs: 1.5,
            ..ClientConfig::default()
        };
        assert_eq!(client.politeness_delay(), Duration::from_millis(250));
        assert_eq!(client.backoff_base(), Duration::from_millis(1500));
        assert_eq!(client.request_timeout(), Duration::from_secs(30));
    }

    #[test_case(ClientConfig { endpoint: " ".into(), ..ClientConfig::default() } ; "empty endpoint")]
    #[test_case(ClientConfig { request_timeout_secs: 0, ..ClientConfig::default() } ; "zero timeout")]
    #[test_case(ClientConfig { sleep_secs: -1.0, ..ClientConfig::default() } ; "negative sleep")]
    #[test_case(ClientConfig { backoff_base_secs: f64::NAN, ..ClientConfig::default() } ; "nan backoff")]
    fn invalid_client_config(client: ClientConfig) {
        assert!(matches!(client.validate(), Err(KinGraphError::Config(_))));
    }

    #[test]
    fn invalid_crawl_and_path_config() {
        let crawl = CrawlConfig {
            page_size: 0,
            ..CrawlConfig::default()
        };
        assert!(crawl.validate().is_err());

        let crawl = CrawlConfig {
            max_total: 0,
            ..CrawlConfig::default()
        };
        assert!(crawl.validate().is_err());

        let path = PathConfig {
            max_rounds: 0,
            ..PathConfig::default()
        };
        assert!(path.validate().is_err());
    }

    #[test]
    fn test_invalid_yaml_returns_error() {
        let result: std::result::Result<KinGraphConfig, _> = serde_yaml::from_str("{{invalid yaml}}");
        assert!(result.is_err());
    }
}
