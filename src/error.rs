//! # Error Types Module
//!
//! Defines every error the library can signal.
//!
//! ## Categories:
//! - `PipelineError`: item-scoped failures delivered on the stage's error channel
//!   (`UnsupportedInput`, `BackendFailure`) plus I/O errors raised by the file sink
//! - `BackendError`: an external optimizer could not be spawned or exited unsuccessfully
//! - `PluginLoadError`: a backend could not be constructed; always absorbed by the
//!   registry, which logs it and omits the backend
//!
//! ## Example:
//! ```rust,ignore
//! match stage.transform(file).await {
//!     Ok(file) => sink.write(&file).await?,
//!     Err(PipelineError::UnsupportedInput { .. }) => { /* stream-backed record */ }
//!     Err(e) => tracing::error!("{}", e),
//! }
//! ```

use std::path::PathBuf;

/// Errors surfaced per item by the image stage, or by the file sink
#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    #[error("{plugin}: Streaming not supported ({})", path.display())]
    UnsupportedInput { plugin: &'static str, path: PathBuf },

    #[error("{plugin}: {source} in {}", path.display())]
    BackendFailure {
        plugin: &'static str,
        path: PathBuf,
        #[source]
        source: BackendError,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    /// Path of the file the error belongs to, when it is item-scoped
    pub fn file_path(&self) -> Option<&std::path::Path> {
        match self {
            Self::UnsupportedInput { path, .. } | Self::BackendFailure { path, .. } => Some(path),
            Self::Io(_) => None,
        }
    }
}

/// Failures of a single external optimizer run
#[derive(thiserror::Error, Debug)]
pub enum BackendError {
    #[error("failed to run {tool}: {source}")]
    Spawn {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{tool} exited with {status}: {stderr}")]
    ToolFailed {
        tool: String,
        status: std::process::ExitStatus,
        stderr: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid {tool} configuration: {source}")]
    Config {
        tool: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Reasons a named backend could not be loaded
#[derive(thiserror::Error, Debug)]
pub enum PluginLoadError {
    #[error("unknown plugin \"{0}\"")]
    Unknown(String),

    #[error("executable \"{tool}\" for plugin \"{plugin}\" not found")]
    ToolNotFound { plugin: String, tool: String },

    #[error("invalid options for plugin \"{plugin}\": {source}")]
    InvalidOptions {
        plugin: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("cannot read {}: {source}", path.display())]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse {}: {source}", path.display())]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}
