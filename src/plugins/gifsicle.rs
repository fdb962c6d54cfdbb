//! GIF optimization with gifsicle (stdin to stdout).

use super::{command, Backend, ImageKind, PluginOptions};
use crate::error::{BackendError, PluginLoadError};
use crate::utils::to_string_vec;
use serde::Deserialize;
use std::path::PathBuf;

pub const PLUGIN: &str = "gifsicle";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GifsicleOptions {
    /// Interlace the GIF for progressive rendering
    pub interlaced: bool,
    /// 1 to 3, higher is slower and smaller
    pub optimization_level: Option<u8>,
    /// Reduce the palette to at most this many colors (2 to 256)
    pub colors: Option<u16>,
}

pub struct Gifsicle {
    tool: PathBuf,
    options: GifsicleOptions,
}

impl Gifsicle {
    pub fn new(tool: PathBuf, options: &PluginOptions) -> Result<Self, PluginLoadError> {
        Ok(Self {
            tool,
            options: options.settings_as(PLUGIN)?,
        })
    }

    fn args(&self) -> Vec<String> {
        let mut args = to_string_vec(["--no-warnings", "--no-app-extensions"]);
        if self.options.interlaced {
            args.push("--interlace".to_string());
        }
        if let Some(level) = self.options.optimization_level {
            args.push(format!("--optimize={}", level.clamp(1, 3)));
        }
        if let Some(colors) = self.options.colors {
            args.push(format!("--colors={}", colors.clamp(2, 256)));
        }
        args
    }
}

#[async_trait::async_trait]
impl Backend for Gifsicle {
    fn name(&self) -> &str {
        PLUGIN
    }

    async fn optimize(&self, input: Vec<u8>) -> Result<Vec<u8>, BackendError> {
        if ImageKind::sniff(&input) != Some(ImageKind::Gif) {
            return Ok(input);
        }
        command::pipe_through(&self.tool, &self.args(), &input).await
    }
}
