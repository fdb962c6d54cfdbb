//! SVG optimization with svgo.
//!
//! The plugin options are written as svgo's own configuration document, so
//! any top-level svgo setting and the `plugins` list pass straight through.
//! The registry merges a local `.svgo.yml` into these options before the
//! backend is built.

use super::{command, Backend, ImageKind, PluginOptions};
use crate::error::{BackendError, PluginLoadError};
use crate::utils::to_string_vec;
use std::path::PathBuf;

pub const PLUGIN: &str = "svgo";

/// Name of the local svgo configuration merged into caller options
pub const CONFIG_FILE: &str = ".svgo.yml";

pub struct Svgo {
    tool: PathBuf,
    options: PluginOptions,
}

impl Svgo {
    pub fn new(tool: PathBuf, options: PluginOptions) -> Result<Self, PluginLoadError> {
        Ok(Self { tool, options })
    }

    /// Options the backend was built with, after any config file merge
    pub fn options(&self) -> &PluginOptions {
        &self.options
    }

    fn has_config(&self) -> bool {
        !self.options.plugins.is_empty() || !self.options.settings.is_empty()
    }
}

#[async_trait::async_trait]
impl Backend for Svgo {
    fn name(&self) -> &str {
        PLUGIN
    }

    async fn optimize(&self, input: Vec<u8>) -> Result<Vec<u8>, BackendError> {
        if ImageKind::sniff(&input) != Some(ImageKind::Svg) {
            return Ok(input);
        }

        let mut args = to_string_vec(["--input", "-", "--output", "-"]);
        // Keeps the config file alive until the tool exits
        let _config_dir = if self.has_config() {
            let dir = tempfile::TempDir::new()?;
            let config_path = dir.path().join("svgo.json");
            let document = serde_json::to_vec(&self.options).map_err(|source| BackendError::Config {
                tool: PLUGIN.to_string(),
                source,
            })?;
            tokio::fs::write(&config_path, document).await?;
            args.push(format!("--config={}", config_path.display()));
            Some(dir)
        } else {
            None
        };

        command::pipe_through(&self.tool, &args, &input).await
    }
}
