//! # Configuration Management Module
//!
//! - `Options`: processing options of the image stage. `verbose` defaults to
//!   whether `--verbose` was among the process arguments.
//! - `BuildConfig`: settings of the build tasks (distribution directory),
//!   loadable from and savable to a JSON file.
//!
//! ## Example:
//! ```rust,no_run
//! # use build_assets::{BuildConfig, Options};
//! # use std::path::Path;
//! # async fn run() -> anyhow::Result<()> {
//! let config = BuildConfig::from_file(Path::new("build.json")).await?;
//! let options = Options { verbose: true };
//! # Ok(())
//! # }
//! ```

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Processing options of the image stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Options {
    /// Log one status line per processed or skipped file
    pub verbose: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            verbose: verbose_flag(std::env::args()),
        }
    }
}

/// Whether `--verbose` is among the given process arguments
pub fn verbose_flag<I, S>(args: I) -> bool
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    args.into_iter().any(|arg| arg.as_ref() == "--verbose")
}

/// Settings shared by the build tasks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildConfig {
    /// Distribution directory the tasks write into
    pub dist: PathBuf,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            dist: PathBuf::from("dist"),
        }
    }
}

impl BuildConfig {
    /// Validate configuration parameters
    pub fn validate(&self) -> Result<()> {
        if self.dist.as_os_str().is_empty() {
            return Err(anyhow::anyhow!("Distribution directory must not be empty"));
        }

        if self.dist.exists() && !self.dist.is_dir() {
            return Err(anyhow::anyhow!("Distribution path is not a directory: {}", self.dist.display()));
        }

        Ok(())
    }

    /// Load configuration from file, falling back to defaults when it does not exist
    pub async fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = tokio::fs::read_to_string(path).await?;
        let config: BuildConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub async fn save_to_file(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, content).await?;
        Ok(())
    }
}
