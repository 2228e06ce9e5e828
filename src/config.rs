//! Runtime configuration for graphs and the execution engine
//!
//! Settings come from an optional JSON file and are then overlaid with
//! environment variables.

use crate::constants::engine::DEFAULT_MAX_DEPTH;
use crate::error::{GraphError, Result};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

/// Extra plugin directories, separated like `PATH`
pub const PLUGIN_PATH_VAR: &str = "NODEFLOW_PLUGIN_PATH";
/// Override for [`GraphConfig::max_execution_depth`]
pub const MAX_DEPTH_VAR: &str = "NODEFLOW_MAX_DEPTH";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    /// Nesting limit for node execution and upstream resolution
    pub max_execution_depth: usize,
    /// Placement of nodes created without a position
    pub viewport_center: [f32; 2],
    /// Echo `Print` output to stdout as well as the engine console
    pub echo_print: bool,
    pub plugin_paths: Vec<PathBuf>,
    /// Whether `Try` nodes divert downstream failures to `Except`
    pub catch_try_errors: bool,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            max_execution_depth: DEFAULT_MAX_DEPTH,
            viewport_center: [0.0, 0.0],
            echo_print: false,
            plugin_paths: Vec::new(),
            catch_try_errors: true,
        }
    }
}

impl GraphConfig {
    /// Read a JSON configuration file; missing fields keep their defaults
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| GraphError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&content)
            .map_err(|e| GraphError::Config(format!("{}: {}", path.display(), e)))?;
        debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Defaults overlaid with the environment
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env();
        config
    }

    /// Overlay environment variables onto this configuration
    pub fn apply_env(&mut self) {
        self.apply_vars(env::var_os(PLUGIN_PATH_VAR), env::var(MAX_DEPTH_VAR).ok());
    }

    fn apply_vars(&mut self, plugin_path: Option<std::ffi::OsString>, max_depth: Option<String>) {
        if let Some(paths) = plugin_path {
            self.plugin_paths
                .extend(env::split_paths(&paths).filter(|p| !p.as_os_str().is_empty()));
        }
        if let Some(depth) = max_depth {
            match depth.trim().parse::<usize>() {
                Ok(depth) if depth > 0 => self.max_execution_depth = depth,
                _ => warn!("Ignoring {}={:?}: expected a positive integer", MAX_DEPTH_VAR, depth),
            }
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| GraphError::Config(format!("Failed to serialize configuration: {}", e)))?;
        std::fs::write(path, content).map_err(|source| GraphError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}
