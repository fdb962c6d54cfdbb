//! # Build Assets - Main Entry Point
//!
//! ## Responsibilities:
//! - Parsing command line arguments with `clap`
//! - Initializing `tracing` logging
//! - Loading the build settings and dispatching to the selected task
//!
//! ## Usage:
//! ```bash
//! build-assets image "src/img/**/*" --base src --dist dist
//! build-assets link --dist dist --verbose
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

use build_assets::{tasks, BuildConfig, FileSource};

#[derive(Parser)]
#[command(name = "build-assets")]
#[command(about = "Minify images and prepare a distribution directory")]
struct Args {
    #[command(subcommand)]
    task: Task,

    /// Build settings (JSON)
    #[arg(long, global = true, default_value = "build.json")]
    config: PathBuf,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Task {
    /// Minify images into the distribution directory
    Image {
        /// Glob patterns of the files to process; prefix with `!` to exclude
        #[arg(required = true)]
        patterns: Vec<String>,

        /// Distribution directory (overrides the config file)
        #[arg(short, long)]
        dist: Option<PathBuf>,

        /// Base directory output paths are relative to
        #[arg(short, long)]
        base: Option<PathBuf>,

        /// Patterns to leave out
        #[arg(short, long)]
        ignore: Vec<String>,
    },

    /// Copy package.json into the distribution directory and link node_modules
    Link {
        /// Distribution directory (overrides the config file)
        #[arg(short, long)]
        dist: Option<PathBuf>,
    },
}

async fn resolve_dist(config_path: &Path, dist: Option<PathBuf>) -> Result<PathBuf> {
    let mut config = BuildConfig::from_file(config_path).await?;
    if let Some(dist) = dist {
        config.dist = dist;
        config.validate()?;
    }
    Ok(config.dist)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let default_level = if args.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter).finish();

    tracing::subscriber::set_global_default(subscriber)?;

    match args.task {
        Task::Image {
            patterns,
            dist,
            base,
            ignore,
        } => {
            let dist = resolve_dist(&args.config, dist).await?;
            let mut source = FileSource::new(patterns).with_ignore(ignore);
            if let Some(base) = base {
                source = source.with_base(base);
            }

            let report = tasks::compress_image(source, &dist).await?;
            info!("{}", report.summary.format_summary());
        }
        Task::Link { dist } => {
            let dist = resolve_dist(&args.config, dist).await?;
            tasks::link(Path::new("."), &dist).await?;
        }
    }

    Ok(())
}
