//! Lossless JPEG optimization with jpegtran (stdin to stdout).

use super::{command, Backend, ImageKind, PluginOptions};
use crate::error::{BackendError, PluginLoadError};
use serde::Deserialize;
use std::path::PathBuf;

pub const PLUGIN: &str = "jpegtran";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct JpegtranOptions {
    /// Lossless conversion to progressive
    pub progressive: bool,
    /// Arithmetic coding instead of optimized Huffman tables
    pub arithmetic: bool,
}

pub struct Jpegtran {
    tool: PathBuf,
    options: JpegtranOptions,
}

impl Jpegtran {
    pub fn new(tool: PathBuf, options: &PluginOptions) -> Result<Self, PluginLoadError> {
        Ok(Self {
            tool,
            options: options.settings_as(PLUGIN)?,
        })
    }

    fn args(&self) -> Vec<String> {
        let mut args = crate::args!["-copy", "none"];
        if self.options.progressive {
            args.push("-progressive".to_string());
        }
        if self.options.arithmetic {
            args.push("-arithmetic".to_string());
        } else {
            args.push("-optimize".to_string());
        }
        args
    }
}

#[async_trait::async_trait]
impl Backend for Jpegtran {
    fn name(&self) -> &str {
        PLUGIN
    }

    async fn optimize(&self, input: Vec<u8>) -> Result<Vec<u8>, BackendError> {
        if ImageKind::sniff(&input) != Some(ImageKind::Jpeg) {
            return Ok(input);
        }
        command::pipe_through(&self.tool, &self.args(), &input).await
    }
}
