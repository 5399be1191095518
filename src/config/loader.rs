//! Multi-source configuration loading.
//!
//! Priority, lowest first:
//! 1. Built-in defaults
//! 2. One YAML file: the explicit `--config` path, else `.kingraph.yml` /
//!    `.kingraph.yaml` in the project root, else `config.yml` in the user
//!    config directory
//! 3. `KINGRAPH_*` environment variables
//!
//! CLI flags are applied on top by the caller, which then calls
//! [`KinGraphConfig::validate`] once on the final result.

use std::path::{Path, PathBuf};

use directories::ProjectDirs;

use super::schema::KinGraphConfig;
use crate::error::{KinGraphError, Result};

const PROJECT_FILE_NAMES: &[&str] = &[".kingraph.yml", ".kingraph.yaml"];

/// Load the effective configuration.
///
/// An explicit path that does not exist is an error; implicit locations are
/// simply skipped when absent. The result is not validated.
pub fn load_config(explicit: Option<&Path>, project_root: Option<&Path>) -> Result<KinGraphConfig> {
    let mut config = match explicit {
        Some(path) => read_config_file(path)?,
        None => match discover_config_file(project_root) {
            Some(path) => read_config_file(&path)?,
            None => KinGraphConfig::default(),
        },
    };

    apply_env_overrides(&mut config, |key| std::env::var(key).ok())?;
    Ok(config)
}

/// Parse a single YAML config file.
pub fn read_config_file(path: &Path) -> Result<KinGraphConfig> {
    let text = std::fs::read_to_string(path).map_err(|e| {
        KinGraphError::Config(format!("cannot read config {}: {}", path.display(), e))
    })?;
    let config: KinGraphConfig = serde_yaml::from_str(&text)?;
    tracing::debug!("Loaded config from {}", path.display());
    Ok(config)
}

/// First existing implicit config location, if any.
fn discover_config_file(project_root: Option<&Path>) -> Option<PathBuf> {
    if let Some(root) = project_root {
        for name in PROJECT_FILE_NAMES {
            let candidate = root.join(name);
            if candidate.is_file() {
                return Some(candidate);
            }
        }
    }
    let user = ProjectDirs::from("", "", "kingraph")?
        .config_dir()
        .join("config.yml");
    user.is_file().then_some(user)
}

/// Apply `KINGRAPH_*` overrides using `lookup` to read variables.
///
/// Taking the lookup as a closure keeps tests independent of the process
/// environment.
pub fn apply_env_overrides<F>(config: &mut KinGraphConfig, lookup: F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    let client = &mut config.client;
    if let Some(v) = lookup("KINGRAPH_ENDPOINT") {
        client.endpoint = v;
    }
    if let Some(v) = lookup("KINGRAPH_USER_AGENT") {
        client.user_agent = v;
    }
    if let Some(v) = lookup("KINGRAPH_TIMEOUT_SECS") {
        client.request_timeout_secs = parse_env("KINGRAPH_TIMEOUT_SECS", &v)?;
    }
    if let Some(v) = lookup("KINGRAPH_SLEEP_SECS") {
        client.sleep_secs = parse_env("KINGRAPH_SLEEP_SECS", &v)?;
    }
    if let Some(v) = lookup("KINGRAPH_MAX_RETRIES") {
        client.max_retries = parse_env("KINGRAPH_MAX_RETRIES", &v)?;
    }
    if let Some(v) = lookup("KINGRAPH_BACKOFF_SECS") {
        client.backoff_base_secs = parse_env("KINGRAPH_BACKOFF_SECS", &v)?;
    }
    Ok(())
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| KinGraphError::Config(format!("{key} has invalid value {value:?}")))
}
