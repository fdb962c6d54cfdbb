//! # Build Assets Library
//!
//! Image minification stage for asset build pipelines, the registry of
//! compression backends it draws on, and the build tasks built around it.
//!
//! ## Modules:
//! - `config`: stage options and build settings
//! - `error`: error types of the stage, the backends and plugin loading
//! - `file`: file records flowing through a pipeline
//! - `file_manager`: glob-based file source and distribution sink
//! - `imagemin`: the image stage (per-file transform, totals, summary)
//! - `platform`: external tool lookup
//! - `plugins`: backends (gifsicle, jpegtran, optipng, svgo) and their registry
//! - `progress`: savings totals and progress display
//! - `tasks`: `compress_image` and `link`
//!
//! ## Usage:
//! ```rust,no_run
//! use build_assets::{FileSource, ImageMin, Options};
//!
//! # fn main() -> anyhow::Result<()> {
//! let stage = ImageMin::new(Options { verbose: true });
//! let events = stage.pipe(FileSource::new(["src/img/**/*"]).into_stream()?);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod file;
pub mod file_manager;
pub mod imagemin;
pub mod platform;
pub mod plugins;
pub mod progress;
pub mod tasks;
pub mod utils;

#[cfg(test)]
mod test_support;

pub use config::{BuildConfig, Options};
pub use error::{BackendError, PipelineError, PluginLoadError};
pub use file::{Contents, FileRecord};
pub use file_manager::{FileSink, FileSource};
pub use imagemin::{ImageMin, StageEvent};
pub use plugins::{Backend, PluginOptions, PluginRegistry, Transform};
pub use progress::{RunSummary, RunTotals};
pub use tasks::ImageTaskReport;
