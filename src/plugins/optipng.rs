//! Lossless PNG optimization with optipng. optipng only works on files, so the
//! image goes through a temporary directory.

use super::{command, Backend, ImageKind, PluginOptions};
use crate::error::{BackendError, PluginLoadError};
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const PLUGIN: &str = "optipng";

#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct OptipngOptions {
    /// 0 to 7
    pub optimization_level: u8,
    pub bit_depth_reduction: bool,
    pub color_type_reduction: bool,
    pub palette_reduction: bool,
    /// Write an interlaced (Adam7) PNG
    pub interlaced: Option<bool>,
}

impl Default for OptipngOptions {
    fn default() -> Self {
        Self {
            optimization_level: 3,
            bit_depth_reduction: true,
            color_type_reduction: true,
            palette_reduction: true,
            interlaced: None,
        }
    }
}

pub struct Optipng {
    tool: PathBuf,
    options: OptipngOptions,
}

impl Optipng {
    pub fn new(tool: PathBuf, options: &PluginOptions) -> Result<Self, PluginLoadError> {
        Ok(Self {
            tool,
            options: options.settings_as(PLUGIN)?,
        })
    }

    fn args(&self, input: &Path, output: &Path) -> Vec<String> {
        let level = self.options.optimization_level.min(7);
        let mut args = crate::args!["-strip", "all", "-clobber", format!("-o{}", level)];
        if !self.options.bit_depth_reduction {
            args.push("-nb".to_string());
        }
        if !self.options.color_type_reduction {
            args.push("-nc".to_string());
        }
        if !self.options.palette_reduction {
            args.push("-np".to_string());
        }
        if let Some(interlaced) = self.options.interlaced {
            args.push("-i".to_string());
            args.push(if interlaced { "1" } else { "0" }.to_string());
        }
        args.push("-out".to_string());
        args.push(output.display().to_string());
        args.push(input.display().to_string());
        args
    }
}

#[async_trait::async_trait]
impl Backend for Optipng {
    fn name(&self) -> &str {
        PLUGIN
    }

    async fn optimize(&self, input: Vec<u8>) -> Result<Vec<u8>, BackendError> {
        if ImageKind::sniff(&input) != Some(ImageKind::Png) {
            return Ok(input);
        }
        command::run_on_files(&self.tool, "png", &input, |input, output| self.args(input, output)).await
    }
}
