use anyhow::{Context, Result, bail};
use std::path::{Path, PathBuf};
use turntree_core::CollapseSettings;
use turntree_runtime_config::{CollapseConfig, TurnTreeConfig, load_config, resolve_config_path};

/// Effective configuration plus where it came from.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    /// File that was read; `None` when defaults were used.
    pub source: Option<PathBuf>,
    pub config: TurnTreeConfig,
}

impl LoadedConfig {
    pub fn collapse_settings(&self) -> CollapseSettings {
        collapse_settings(&self.config.collapse)
    }
}

/// Load config from `--config`, `$TURNTREE_CONFIG` or the default location.
///
/// An explicitly requested file must exist; the other locations fall back to
/// defaults when absent.
pub fn load(explicit: Option<&Path>) -> Result<LoadedConfig> {
    if let Some(path) = explicit {
        if !path.exists() {
            bail!("config file not found: {}", path.display());
        }
    }

    let Some(path) = resolve_config_path(explicit) else {
        tracing::debug!("no home directory, using default config");
        return Ok(LoadedConfig {
            source: None,
            config: TurnTreeConfig::default(),
        });
    };

    let config = load_config(&path)
        .with_context(|| format!("Failed to load config from {}", path.display()))?;
    let source = path.exists().then_some(path);
    Ok(LoadedConfig { source, config })
}

pub fn collapse_settings(config: &CollapseConfig) -> CollapseSettings {
    CollapseSettings {
        divergence_depth_threshold: config.divergence_depth_threshold,
        linear_run_threshold: config.linear_run_threshold,
        fold_head: config.fold_head,
        fold_tail: config.fold_tail,
    }
}
