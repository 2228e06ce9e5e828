//! Plugin discovery and registration
//!
//! Two kinds of plugin extend the node registry before any graph is built:
//! manifest plugins, a `plugin.json` found in a plugin directory, and code
//! plugins implementing [`GraphPlugin`] that the embedding program hands over.

use crate::config::GraphConfig;
use crate::error::GraphError;
use crate::literal;
use crate::nodes::NodeRegistry;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// File name a manifest plugin is recognized by
pub const MANIFEST_FILE: &str = "plugin.json";

#[derive(Debug, Error)]
pub enum PluginError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid manifest {path}: {source}")]
    Manifest {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("plugin {name} needs version {required}, this is {current}")]
    Incompatible {
        name: String,
        required: String,
        current: String,
    },

    #[error("plugin {name} failed to register: {source}")]
    Registration {
        name: String,
        #[source]
        source: GraphError,
    },
}

/// A node type derived from an existing one
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AliasSpec {
    pub node_type: String,
    pub base: String,
    #[serde(default)]
    pub group: Option<String>,
    /// Parameter defaults for the new type, as literals
    #[serde(default)]
    pub defaults: BTreeMap<String, String>,
}

/// Contents of a `plugin.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginManifest {
    pub name: String,
    #[serde(default)]
    pub version: String,
    /// Oldest crate version the plugin works with
    #[serde(default)]
    pub compatible_version: Option<String>,
    /// `{node type: {parameter: literal}}`
    #[serde(default)]
    pub parameter_defaults: BTreeMap<String, BTreeMap<String, String>>,
    #[serde(default)]
    pub aliases: Vec<AliasSpec>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PluginInfo {
    pub name: String,
    pub version: String,
    /// Manifest path; `None` for code plugins
    pub source: Option<PathBuf>,
}

/// Plugin compiled into the embedding program
pub trait GraphPlugin: Send + Sync {
    fn info(&self) -> PluginInfo;

    fn register(&self, registry: &mut NodeRegistry) -> Result<(), GraphError>;
}

/// Same major and minor version as this crate
fn is_compatible_version(required: &str) -> bool {
    let major_minor = |v: &str| v.split('.').take(2).map(str::to_string).collect::<Vec<_>>();
    major_minor(required) == major_minor(env!("CARGO_PKG_VERSION"))
}

fn apply_defaults(registry: &NodeRegistry, node_type: &str, defaults: &BTreeMap<String, String>) {
    for (parameter, text) in defaults {
        if !registry.set_param_default(node_type, parameter, literal::interpret(text)) {
            warn!("Default for {}.{} skipped", node_type, parameter);
        }
    }
}

/// Register a manifest's aliases, then its parameter defaults
pub fn apply_manifest(manifest: &PluginManifest, registry: &mut NodeRegistry) -> Result<(), PluginError> {
    if let Some(required) = &manifest.compatible_version {
        if !is_compatible_version(required) {
            return Err(PluginError::Incompatible {
                name: manifest.name.clone(),
                required: required.clone(),
                current: env!("CARGO_PKG_VERSION").to_string(),
            });
        }
    }
    for alias in &manifest.aliases {
        registry
            .register_alias(&alias.base, &alias.node_type, alias.group.as_deref())
            .map_err(|source| PluginError::Registration {
                name: manifest.name.clone(),
                source,
            })?;
        apply_defaults(registry, &alias.node_type, &alias.defaults);
    }
    for (node_type, defaults) in &manifest.parameter_defaults {
        apply_defaults(registry, node_type, defaults);
    }
    Ok(())
}

pub fn load_manifest(path: &Path) -> Result<PluginManifest, PluginError> {
    let content = fs::read_to_string(path).map_err(|source| PluginError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&content).map_err(|source| PluginError::Manifest {
        path: path.to_path_buf(),
        source,
    })
}

/// Finds plugins and registers them into a [`NodeRegistry`]
pub struct PluginManager {
    plugin_directories: Vec<PathBuf>,
    code_plugins: Vec<Box<dyn GraphPlugin>>,
    loaded: Vec<PluginInfo>,
}

impl PluginManager {
    /// Manager searching `~/.nodeflow/plugins` and `./plugins`
    pub fn new() -> Self {
        let mut plugin_directories = Vec::new();
        if let Some(home) = dirs::home_dir() {
            plugin_directories.push(home.join(".nodeflow").join("plugins"));
        }
        plugin_directories.push(PathBuf::from("./plugins"));
        Self::with_directories(plugin_directories)
    }

    /// Manager searching only the given directories
    pub fn with_directories(plugin_directories: Vec<PathBuf>) -> Self {
        Self {
            plugin_directories,
            code_plugins: Vec::new(),
            loaded: Vec::new(),
        }
    }

    /// Standard directories plus the configured ones
    pub fn with_config(config: &GraphConfig) -> Self {
        let mut manager = Self::new();
        for path in &config.plugin_paths {
            manager.add_plugin_directory(path);
        }
        manager
    }

    pub fn add_plugin_directory<P: AsRef<Path>>(&mut self, path: P) {
        self.plugin_directories.push(path.as_ref().to_path_buf());
    }

    pub fn plugin_directories(&self) -> &[PathBuf] {
        &self.plugin_directories
    }

    pub fn add_plugin(&mut self, plugin: Box<dyn GraphPlugin>) {
        self.code_plugins.push(plugin);
    }

    /// Manifest paths: `plugin.json` directly in a plugin directory or one
    /// level below it, sorted within each directory
    pub fn discover(&self) -> Vec<PathBuf> {
        let mut manifests = Vec::new();
        for dir in &self.plugin_directories {
            if !dir.is_dir() {
                continue;
            }
            let top = dir.join(MANIFEST_FILE);
            if top.is_file() {
                manifests.push(top);
            }
            let Ok(entries) = fs::read_dir(dir) else {
                warn!("Cannot read plugin directory {}", dir.display());
                continue;
            };
            let mut nested: Vec<PathBuf> = entries
                .flatten()
                .map(|entry| entry.path().join(MANIFEST_FILE))
                .filter(|path| path.is_file())
                .collect();
            nested.sort();
            manifests.extend(nested);
        }
        manifests
    }

    /// Register code plugins, then every discovered manifest. Failures are
    /// logged and skipped; the plugins that loaded are returned.
    pub fn load_all(&mut self, registry: &mut NodeRegistry) -> Vec<PluginInfo> {
        let mut loaded = Vec::new();
        for plugin in &self.code_plugins {
            let info = plugin.info();
            match plugin.register(registry) {
                Ok(()) => {
                    info!("Loaded plugin {} {}", info.name, info.version);
                    loaded.push(info);
                }
                Err(err) => warn!("Plugin {} failed to register: {}", info.name, err),
            }
        }
        for path in self.discover() {
            match load_manifest(&path).and_then(|manifest| {
                apply_manifest(&manifest, registry)?;
                Ok(manifest)
            }) {
                Ok(manifest) => {
                    info!("Loaded plugin {} {} from {}", manifest.name, manifest.version, path.display());
                    loaded.push(PluginInfo {
                        name: manifest.name,
                        version: manifest.version,
                        source: Some(path),
                    });
                }
                Err(err) => warn!("Skipping plugin: {}", err),
            }
        }
        debug!("{} plugins loaded", loaded.len());
        self.loaded.extend(loaded.iter().cloned());
        loaded
    }

    pub fn loaded_plugins(&self) -> &[PluginInfo] {
        &self.loaded
    }
}

impl Default for PluginManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nodes::{NodeGraph, NodeTypeDef};
    use crate::value::Value;
    use std::sync::Arc;
    use tempfile::TempDir;

    const MANIFEST: &str = r#"{
        "name": "greetings",
        "version": "1.2.0",
        "parameter_defaults": { "Print": { "inputs:arg": "'hello'" } },
        "aliases": [
            { "node_type": "Shout", "base": "Upper String", "group": "Greetings",
              "defaults": { "inputs:arg": "'hey'" } }
        ]
    }"#;

    struct Doubler;

    impl GraphPlugin for Doubler {
        fn info(&self) -> PluginInfo {
            PluginInfo {
                name: "doubler".to_string(),
                version: "0.1.0".to_string(),
                source: None,
            }
        }

        fn register(&self, registry: &mut NodeRegistry) -> Result<(), GraphError> {
            registry.register(NodeTypeDef::pure("Double").with_group("Greetings"));
            Ok(())
        }
    }

    fn write_plugin(root: &Path, dir: &str, manifest: &str) {
        let dir = root.join(dir);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(MANIFEST_FILE), manifest).unwrap();
    }

    #[test]
    fn test_discover_and_load() {
        let tmp = TempDir::new().unwrap();
        write_plugin(tmp.path(), "greetings", MANIFEST);
        write_plugin(tmp.path(), "broken", "{ \"name\": ");

        let mut manager = PluginManager::with_directories(vec![tmp.path().to_path_buf(), tmp.path().join("absent")]);
        manager.add_plugin(Box::new(Doubler));
        assert_eq!(manager.discover().len(), 2);

        let mut registry = NodeRegistry::with_builtins();
        let loaded = manager.load_all(&mut registry);
        let names: Vec<&str> = loaded.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["doubler", "greetings"]);
        assert_eq!(manager.loaded_plugins().len(), 2);

        assert!(registry.contains("Double"));
        assert!(registry.is_subtype("Shout", "Upper String"));
        assert_eq!(registry.nodes_in_group("Greetings"), vec!["Double", "Shout"]);

        let mut g = NodeGraph::new(Arc::new(registry));
        let print = g.create_node("Print", None, None).unwrap();
        let shout = g.create_node("Shout", None, None).unwrap();
        assert_eq!(g.node(print).unwrap().value("inputs:arg"), Some(Value::from("hello")));
        assert_eq!(g.node(shout).unwrap().value("inputs:arg"), Some(Value::from("hey")));
    }

    #[test]
    fn test_manifest_errors() {
        let mut registry = NodeRegistry::with_builtins();
        let mut manifest: PluginManifest = serde_json::from_str(MANIFEST).unwrap();
        manifest.aliases[0].base = "Nothing".to_string();
        assert!(matches!(
            apply_manifest(&manifest, &mut registry),
            Err(PluginError::Registration { .. })
        ));

        manifest.compatible_version = Some("99.0".to_string());
        assert!(matches!(
            apply_manifest(&manifest, &mut registry),
            Err(PluginError::Incompatible { .. })
        ));

        let missing = load_manifest(Path::new("/definitely/not/here.json")).unwrap_err();
        assert!(matches!(missing, PluginError::Io { .. }));
    }

    #[test]
    fn test_configured_directories_are_searched() {
        let config = GraphConfig {
            plugin_paths: vec![PathBuf::from("/opt/nodeflow")],
            ..GraphConfig::default()
        };
        let manager = PluginManager::with_config(&config);
        assert_eq!(manager.plugin_directories().last(), Some(&PathBuf::from("/opt/nodeflow")));
        assert!(is_compatible_version(env!("CARGO_PKG_VERSION")));
    }
}
