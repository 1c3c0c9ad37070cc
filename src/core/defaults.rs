use serde::{Deserialize, Serialize};
use std::fs;
use std::time::Duration;

use crate::paths;

/// Root configuration structure for buildstep.json
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct BuildstepConfig {
    #[serde(default)]
    pub defaults: Defaults,
}

/// All configurable defaults that can be overridden via buildstep.json
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Defaults {
    #[serde(default = "default_poll")]
    pub poll: PollConfig,

    #[serde(default = "default_candidates")]
    pub candidates: CandidatesConfig,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            poll: default_poll(),
            candidates: default_candidates(),
        }
    }
}

/// Waits performed after service and load-balancer actions
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PollConfig {
    #[serde(default = "default_service_interval_secs")]
    pub service_interval_secs: u64,

    #[serde(default = "default_load_balancer_pause_secs")]
    pub load_balancer_pause_secs: u64,

    /// Upper bound for service state polls. `None` waits until the state converges.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl PollConfig {
    pub fn service_interval(&self) -> Duration {
        Duration::from_secs(self.service_interval_secs)
    }

    pub fn load_balancer_pause(&self) -> Duration {
        Duration::from_secs(self.load_balancer_pause_secs)
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

/// Fallbacks used when refreshing parameter candidates
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CandidatesConfig {
    #[serde(default = "default_repository")]
    pub default_repository: String,

    #[serde(default = "default_subdirectory")]
    pub default_subdirectory: String,

    #[serde(default = "default_implicit_branch")]
    pub implicit_branch: String,

    #[serde(default = "default_index_path")]
    pub index_path: String,
}

// =============================================================================
// Default value functions
// =============================================================================

fn default_poll() -> PollConfig {
    PollConfig {
        service_interval_secs: default_service_interval_secs(),
        load_balancer_pause_secs: default_load_balancer_pause_secs(),
        timeout_secs: None,
    }
}

fn default_service_interval_secs() -> u64 {
    15
}

fn default_load_balancer_pause_secs() -> u64 {
    30
}

fn default_candidates() -> CandidatesConfig {
    CandidatesConfig {
        default_repository: default_repository(),
        default_subdirectory: default_subdirectory(),
        implicit_branch: default_implicit_branch(),
        index_path: default_index_path(),
    }
}

fn default_repository() -> String {
    "snapshots".to_string()
}

fn default_subdirectory() -> String {
    "branches".to_string()
}

fn default_implicit_branch() -> String {
    "trunk".to_string()
}

fn default_index_path() -> String {
    "/service/local/data_index".to_string()
}

// =============================================================================
// Loading functions
// =============================================================================

/// Load defaults, merging file config with built-in defaults.
/// If buildstep.json is missing or invalid, silently returns built-in defaults.
pub fn load_defaults() -> Defaults {
    load_config().defaults
}

/// Load the full buildstep.json config, falling back to defaults on any error.
pub fn load_config() -> BuildstepConfig {
    load_config_from_file().unwrap_or_default()
}

fn load_config_from_file() -> crate::Result<BuildstepConfig> {
    let path = paths::buildstep_json()?;

    if !path.exists() {
        return Err(crate::Error::config_missing_key(
            "defaults",
            Some(path.display().to_string()),
        ));
    }

    let content = fs::read_to_string(&path).map_err(|e| {
        crate::Error::internal_io(e.to_string(), Some(format!("read {}", path.display())))
    })?;

    parse_config(&content, &path.display().to_string())
}

/// Parse buildstep.json content. Missing keys take their built-in values.
pub fn parse_config(content: &str, origin: &str) -> crate::Result<BuildstepConfig> {
    serde_json::from_str(content).map_err(|e| crate::Error::config_invalid_json(origin, e))
}

/// Save config to buildstep.json (creates if missing).
pub fn save_config(config: &BuildstepConfig) -> crate::Result<()> {
    let path = paths::buildstep_json()?;

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| {
            crate::Error::internal_io(e.to_string(), Some(format!("create {}", parent.display())))
        })?;
    }

    let content = serde_json::to_string_pretty(config).map_err(|e| {
        crate::Error::internal_json(e.to_string(), Some("serialize buildstep.json".to_string()))
    })?;

    crate::utils::io::write_file_atomic(&path, &content, "write buildstep.json")
}

pub fn config_exists() -> bool {
    paths::buildstep_json()
        .map(|p| p.exists())
        .unwrap_or(false)
}

/// Delete buildstep.json (reset to defaults)
pub fn reset_config() -> crate::Result<bool> {
    let path = paths::buildstep_json()?;

    if path.exists() {
        fs::remove_file(&path).map_err(|e| {
            crate::Error::internal_io(e.to_string(), Some(format!("delete {}", path.display())))
        })?;
        Ok(true)
    } else {
        Ok(false)
    }
}

/// Get the path to buildstep.json (for display purposes)
pub fn config_path() -> crate::Result<String> {
    Ok(paths::buildstep_json()?.display().to_string())
}

/// Get built-in defaults (ignoring any file config)
pub fn builtin_defaults() -> Defaults {
    Defaults::default()
}
