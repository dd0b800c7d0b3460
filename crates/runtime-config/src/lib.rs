//! Shared configuration types.
//!
//! The CLI and the composer read `turntree.toml` through these types.
//! Conversions into core/composer settings live in the consuming crates.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Canonical config file name.
pub const CONFIG_FILE_NAME: &str = "turntree.toml";

/// Environment variable overriding the config location.
pub const CONFIG_ENV_VAR: &str = "TURNTREE_CONFIG";

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("failed to read config at {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// Top-level configuration (persisted as `turntree.toml`).
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct TurnTreeConfig {
    #[serde(default)]
    pub collapse: CollapseConfig,
    #[serde(default)]
    pub composer: ComposerConfig,
    #[serde(default)]
    pub engine: EngineConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CollapseConfig {
    /// Divergences deeper than this are collapsed when first seen.
    #[serde(default = "default_divergence_depth_threshold")]
    pub divergence_depth_threshold: usize,
    /// Straight runs longer than this are folded.
    #[serde(default = "default_linear_run_threshold", alias = "fold_threshold")]
    pub linear_run_threshold: usize,
    #[serde(default = "default_fold_edge")]
    pub fold_head: usize,
    #[serde(default = "default_fold_edge")]
    pub fold_tail: usize,
}

impl Default for CollapseConfig {
    fn default() -> Self {
        Self {
            divergence_depth_threshold: default_divergence_depth_threshold(),
            linear_run_threshold: default_linear_run_threshold(),
            fold_head: default_fold_edge(),
            fold_tail: default_fold_edge(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ComposerConfig {
    /// Upper bound on one submission; 0 (the default) waits for the engine.
    #[serde(default = "default_submit_timeout_secs")]
    pub submit_timeout_secs: u64,
}

impl Default for ComposerConfig {
    fn default() -> Self {
        Self {
            submit_timeout_secs: default_submit_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EngineConfig {
    #[serde(default = "default_agent_name")]
    pub agent_name: String,
    #[serde(default = "default_reply_prefix")]
    pub reply_prefix: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            agent_name: default_agent_name(),
            reply_prefix: default_reply_prefix(),
        }
    }
}

// ── Serde default functions ─────────────────────────────────────────────

fn default_divergence_depth_threshold() -> usize {
    2
}
fn default_linear_run_threshold() -> usize {
    6
}
fn default_fold_edge() -> usize {
    2
}
fn default_submit_timeout_secs() -> u64 {
    0
}
fn default_agent_name() -> String {
    "agent".to_string()
}
fn default_reply_prefix() -> String {
    "ack: ".to_string()
}

/// Normalize values that would make folding meaningless.
/// Returns true when any field was updated.
pub fn apply_compat_fallbacks(config: &mut TurnTreeConfig) -> bool {
    let mut changed = false;
    let collapse = &mut config.collapse;

    if collapse.fold_head == 0 {
        collapse.fold_head = 1;
        changed = true;
    }
    if collapse.fold_tail == 0 {
        collapse.fold_tail = 1;
        changed = true;
    }
    if collapse.linear_run_threshold < 3 {
        collapse.linear_run_threshold = 3;
        changed = true;
    }
    // A fold must hide at least one turn of the shortest foldable run.
    while collapse.fold_head + collapse.fold_tail > collapse.linear_run_threshold {
        if collapse.fold_head >= collapse.fold_tail {
            collapse.fold_head -= 1;
        } else {
            collapse.fold_tail -= 1;
        }
        changed = true;
    }

    changed
}

/// Parse config text and apply fallbacks.
pub fn parse_config(content: &str, path: &Path) -> Result<TurnTreeConfig, ConfigError> {
    let mut config: TurnTreeConfig =
        toml::from_str(content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
    if apply_compat_fallbacks(&mut config) {
        debug!(path = %path.display(), "config values normalized");
    }
    Ok(config)
}

/// Load config from `path`; a missing file yields defaults.
pub fn load_config(path: &Path) -> Result<TurnTreeConfig, ConfigError> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "no config file, using defaults");
            return Ok(TurnTreeConfig::default());
        }
        Err(source) => {
            return Err(ConfigError::Read {
                path: path.to_path_buf(),
                source,
            });
        }
    };
    parse_config(&content, path)
}

/// Default config location: `~/.config/turntree/turntree.toml`.
pub fn default_config_path() -> Option<PathBuf> {
    let home = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .ok()?;
    Some(
        PathBuf::from(home)
            .join(".config")
            .join("turntree")
            .join(CONFIG_FILE_NAME),
    )
}

/// Resolve the config path: explicit flag, then `$TURNTREE_CONFIG`, then the
/// default location.
pub fn resolve_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    explicit
        .map(Path::to_path_buf)
        .or_else(|| {
            std::env::var(CONFIG_ENV_VAR)
                .ok()
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from)
        })
        .or_else(default_config_path)
}
