//! # Plugin Registry
//!
//! Resolves plugin names into loaded backends and absorbs load failures: a
//! plugin that cannot be built is logged and left out, never fatal.
//!
//! The process-wide registry ([`PluginRegistry::global`]) holds the built-in
//! factories. Each built-in factory remembers the executable path of its tool
//! after the first successful load, for the rest of the process; there is no
//! invalidation. Failed lookups are retried on the next load.
//!
//! `svgo` is special: when a `.svgo.yml` exists in the working directory its
//! contents are merged under the caller's options (caller keys win, plugin
//! lists are concatenated file-first).

use super::gifsicle::{self, Gifsicle};
use super::jpegtran::{self, Jpegtran};
use super::optipng::{self, Optipng};
use super::svgo::{self, Svgo};
use super::{PluginOptions, PluginSet, Transform};
use crate::error::PluginLoadError;
use crate::imagemin::PLUGIN_NAME;
use crate::platform::PlatformCommands;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, OnceLock};
use tracing::{debug, warn};

/// Plugins applied when a stage is built without an explicit plugin set
pub const DEFAULT_PLUGINS: [&str; 4] = [gifsicle::PLUGIN, jpegtran::PLUGIN, optipng::PLUGIN, svgo::PLUGIN];

/// Builds a backend from construction options
pub trait BackendFactory: Send + Sync {
    fn create(&self, options: PluginOptions) -> Result<Transform, PluginLoadError>;
}

type BuildFn = fn(PathBuf, PluginOptions) -> Result<Transform, PluginLoadError>;

/// Factory for a backend wrapping an external executable
struct ToolFactory {
    plugin: &'static str,
    build: BuildFn,
    resolved: OnceLock<PathBuf>,
}

impl ToolFactory {
    fn new(plugin: &'static str, build: BuildFn) -> Self {
        Self {
            plugin,
            build,
            resolved: OnceLock::new(),
        }
    }

    fn tool_path(&self) -> Result<PathBuf, PluginLoadError> {
        if let Some(path) = self.resolved.get() {
            return Ok(path.clone());
        }

        let platform = PlatformCommands::instance();
        let path = platform
            .resolve_tool(self.plugin)
            .ok_or_else(|| PluginLoadError::ToolNotFound {
                plugin: self.plugin.to_string(),
                tool: platform.get_command(self.plugin).to_string(),
            })?;
        Ok(self.resolved.get_or_init(|| path).clone())
    }
}

impl BackendFactory for ToolFactory {
    fn create(&self, options: PluginOptions) -> Result<Transform, PluginLoadError> {
        (self.build)(self.tool_path()?, options)
    }
}

/// Named backend factories plus the directory `.svgo.yml` is looked up in
pub struct PluginRegistry {
    working_dir: Option<PathBuf>,
    factories: HashMap<String, Arc<dyn BackendFactory>>,
}

impl PluginRegistry {
    /// The process-wide registry with the built-in plugins. `.svgo.yml` is
    /// looked up relative to the current directory at load time.
    pub fn global() -> Arc<Self> {
        static INSTANCE: OnceLock<Arc<PluginRegistry>> = OnceLock::new();
        INSTANCE
            .get_or_init(|| Arc::new(Self::with_builtins(None)))
            .clone()
    }

    /// A registry with the built-in plugins rooted at `working_dir`
    pub fn new(working_dir: impl Into<PathBuf>) -> Self {
        Self::with_builtins(Some(working_dir.into()))
    }

    /// A registry without any plugin
    pub fn empty(working_dir: impl Into<PathBuf>) -> Self {
        Self {
            working_dir: Some(working_dir.into()),
            factories: HashMap::new(),
        }
    }

    fn with_builtins(working_dir: Option<PathBuf>) -> Self {
        let builtins: [ToolFactory; 4] = [
            ToolFactory::new(gifsicle::PLUGIN, |tool, options| {
                Ok(Arc::new(Gifsicle::new(tool, &options)?) as Transform)
            }),
            ToolFactory::new(jpegtran::PLUGIN, |tool, options| {
                Ok(Arc::new(Jpegtran::new(tool, &options)?) as Transform)
            }),
            ToolFactory::new(optipng::PLUGIN, |tool, options| {
                Ok(Arc::new(Optipng::new(tool, &options)?) as Transform)
            }),
            ToolFactory::new(svgo::PLUGIN, |tool, options| {
                Ok(Arc::new(Svgo::new(tool, options)?) as Transform)
            }),
        ];

        let factories = builtins
            .into_iter()
            .map(|factory| (factory.plugin.to_string(), Arc::new(factory) as Arc<dyn BackendFactory>))
            .collect();

        Self { working_dir, factories }
    }

    /// Registers or replaces the factory for `name`
    pub fn with_factory(mut self, name: &str, factory: impl BackendFactory + 'static) -> Self {
        self.factories.insert(name.to_string(), Arc::new(factory));
        self
    }

    fn svgo_config_path(&self) -> PathBuf {
        match self.working_dir {
            Some(ref dir) => dir.join(svgo::CONFIG_FILE),
            None => PathBuf::from(svgo::CONFIG_FILE),
        }
    }

    /// Reads the local svgo configuration, if there is one
    fn load_svgo_config(&self) -> Result<Option<PluginOptions>, PluginLoadError> {
        let path = self.svgo_config_path();
        if !path.is_file() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(&path).map_err(|source| PluginLoadError::ConfigRead {
            path: path.clone(),
            source,
        })?;
        let config: Option<PluginOptions> =
            serde_yaml::from_str(&content).map_err(|source| PluginLoadError::ConfigParse {
                path: path.clone(),
                source,
            })?;

        debug!("Loaded svgo configuration from {}", path.display());
        Ok(config)
    }

    /// Builds the backend `name`, reporting why it could not be loaded
    pub fn try_load_plugin(&self, name: &str, options: PluginOptions) -> Result<Transform, PluginLoadError> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| PluginLoadError::Unknown(name.to_string()))?;

        let options = if name == svgo::PLUGIN {
            match self.load_svgo_config()? {
                Some(file) => file.merged_with(options),
                None => options,
            }
        } else {
            options
        };

        factory.create(options)
    }

    /// Builds the backend `name`. Failures are logged and yield `None`.
    pub fn load_plugin(&self, name: &str, options: PluginOptions) -> Option<Transform> {
        match self.try_load_plugin(name, options) {
            Ok(plugin) => Some(plugin),
            Err(e) => {
                warn!("{}: Couldn't load default plugin \"{}\": {}", PLUGIN_NAME, name, e);
                None
            }
        }
    }

    /// Loads every default plugin in order, leaving out those that fail
    pub fn default_plugins(&self) -> PluginSet {
        DEFAULT_PLUGINS
            .iter()
            .filter_map(|name| self.load_plugin(name, PluginOptions::default()))
            .collect()
    }

    /// A reusable loader bound to one plugin name
    pub fn expose(self: &Arc<Self>, name: &str) -> impl Fn(PluginOptions) -> Option<Transform> {
        let registry = Arc::clone(self);
        let name = name.to_string();
        move |options| registry.load_plugin(&name, options)
    }
}
