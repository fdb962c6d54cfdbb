//! # Compression Plugins
//!
//! A plugin (backend) is a configured transform over raw image bytes. The
//! built-in plugins wrap external optimizers:
//!
//! | Plugin | Tool | Handles |
//! |--------|------|---------|
//! | `gifsicle` | gifsicle | GIF |
//! | `jpegtran` | jpegtran | JPEG |
//! | `optipng` | optipng | PNG |
//! | `svgo` | svgo | SVG |
//!
//! Every plugin returns buffers of other image families untouched, so a whole
//! plugin set can be applied to any image: each buffer is piped through the
//! plugins in order and only the matching one rewrites it.
//!
//! Plugins are resolved by name through the [`PluginRegistry`]; the
//! functions [`gifsicle`], [`jpegtran`], [`optipng`] and [`svgo`] expose each
//! default plugin individually for manual configuration.

pub mod command;
pub mod gifsicle;
pub mod jpegtran;
pub mod optipng;
pub mod registry;
pub mod svgo;

pub use registry::{BackendFactory, PluginRegistry, DEFAULT_PLUGINS};

use crate::error::{BackendError, PluginLoadError};
use image::ImageFormat;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A compression backend: one configured transform over raw bytes
#[async_trait::async_trait]
pub trait Backend: Send + Sync {
    /// Plugin name, e.g. `optipng`
    fn name(&self) -> &str;

    /// Optimizes `input`. Buffers this backend does not handle are returned as-is.
    async fn optimize(&self, input: Vec<u8>) -> Result<Vec<u8>, BackendError>;
}

/// Shared handle to a loaded backend
pub type Transform = Arc<dyn Backend>;

/// Ordered backends applied to one file
pub type PluginSet = Vec<Transform>;

/// Pipes `input` through every backend of `plugins` in order
pub async fn run_plugins(plugins: &[Transform], input: Vec<u8>) -> Result<Vec<u8>, BackendError> {
    let mut data = input;
    for plugin in plugins {
        data = plugin.optimize(data).await?;
    }
    Ok(data)
}

/// Construction options of a plugin: an ordered `plugins` list (used by svgo)
/// and free-form top-level settings in the camelCase form the tools' option
/// documents use.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PluginOptions {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub plugins: Vec<serde_json::Value>,
    #[serde(flatten)]
    pub settings: serde_json::Map<String, serde_json::Value>,
}

impl PluginOptions {
    /// Sets one top-level setting
    pub fn with(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.settings.insert(key.to_string(), value.into());
        self
    }

    /// Appends one entry to the plugin list
    pub fn with_plugin(mut self, plugin: impl Into<serde_json::Value>) -> Self {
        self.plugins.push(plugin.into());
        self
    }

    /// Layers `overrides` on top of `self`: top-level keys of `overrides` win,
    /// plugin lists are concatenated (`self` first).
    pub fn merged_with(mut self, overrides: PluginOptions) -> Self {
        self.settings.extend(overrides.settings);
        self.plugins.extend(overrides.plugins);
        self
    }

    /// Deserializes the top-level settings into a backend's typed options
    pub(crate) fn settings_as<T: DeserializeOwned>(&self, plugin: &str) -> Result<T, PluginLoadError> {
        serde_json::from_value(serde_json::Value::Object(self.settings.clone())).map_err(|source| {
            PluginLoadError::InvalidOptions {
                plugin: plugin.to_string(),
                source,
            }
        })
    }
}

/// Image families handled by the built-in plugins
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Gif,
    Jpeg,
    Png,
    Svg,
}

impl ImageKind {
    /// Detects the family from the buffer's leading bytes
    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        match image::guess_format(bytes) {
            Ok(ImageFormat::Gif) => Some(Self::Gif),
            Ok(ImageFormat::Jpeg) => Some(Self::Jpeg),
            Ok(ImageFormat::Png) => Some(Self::Png),
            _ if looks_like_svg(bytes) => Some(Self::Svg),
            _ => None,
        }
    }
}

fn looks_like_svg(bytes: &[u8]) -> bool {
    let Ok(text) = std::str::from_utf8(bytes) else {
        return false;
    };
    let text = text.trim_start_matches('\u{feff}').trim_start();
    text.starts_with('<') && text.to_ascii_lowercase().contains("<svg")
}

/// Loads `gifsicle` through the process-wide registry
pub fn gifsicle(options: PluginOptions) -> Option<Transform> {
    PluginRegistry::global().load_plugin(gifsicle::PLUGIN, options)
}

/// Loads `jpegtran` through the process-wide registry
pub fn jpegtran(options: PluginOptions) -> Option<Transform> {
    PluginRegistry::global().load_plugin(jpegtran::PLUGIN, options)
}

/// Loads `optipng` through the process-wide registry
pub fn optipng(options: PluginOptions) -> Option<Transform> {
    PluginRegistry::global().load_plugin(optipng::PLUGIN, options)
}

/// Loads `svgo` through the process-wide registry
pub fn svgo(options: PluginOptions) -> Option<Transform> {
    PluginRegistry::global().load_plugin(svgo::PLUGIN, options)
}
