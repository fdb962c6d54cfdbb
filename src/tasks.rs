//! # Build Tasks
//!
//! The two tasks the binary exposes:
//! - `compress_image`: minifies the images matched by a [`FileSource`] into a
//!   distribution directory
//! - `link`: copies the package manifest into the distribution directory and
//!   links the installed dependencies next to it

use crate::config::Options;
use crate::file_manager::{FileSink, FileSource};
use crate::imagemin::{ImageMin, StageEvent, PLUGIN_NAME};
use crate::progress::{ProgressManager, RunSummary};
use crate::utils::pretty_bytes;
use anyhow::{Context, Result};
use futures::StreamExt;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{error, info};

const MANIFEST: &str = "package.json";
const DEPENDENCIES: &str = "node_modules";

/// Outcome of an image task
#[derive(Debug, Clone, Default)]
pub struct ImageTaskReport {
    /// Files written to the distribution directory
    pub written: Vec<PathBuf>,
    /// Files dropped because of an error
    pub failed: usize,
    /// Total size of the written files
    pub output_bytes: u64,
    pub summary: RunSummary,
}

/// Minifies every file matched by `source` into `dist`, logging one line per file
pub async fn compress_image(source: FileSource, dist: &Path) -> Result<ImageTaskReport> {
    compress_with(ImageMin::new(Options { verbose: true }), source, dist).await
}

/// Runs `source` through an already configured stage into `dist`
pub async fn compress_with(stage: ImageMin, source: FileSource, dist: &Path) -> Result<ImageTaskReport> {
    let sink = FileSink::new(dist);
    let progress = ProgressManager::spinner("Compressing images");
    let mut report = ImageTaskReport::default();

    let events = stage.pipe(source.into_stream()?);
    futures::pin_mut!(events);

    while let Some(event) = events.next().await {
        match event {
            StageEvent::File(file) => {
                progress.update(&file.relative().display().to_string());
                let destination = sink
                    .write(&file)
                    .await
                    .with_context(|| format!("Failed to write {}", sink.destination(&file).display()))?;
                report.output_bytes += file.bytes().map_or(0, |b| b.len() as u64);
                report.written.push(destination);
            }
            StageEvent::Error(e) => {
                error!("{}", e);
                report.failed += 1;
            }
            StageEvent::Finished(summary) => report.summary = summary,
        }
    }

    progress.finish(&report.summary.format_summary());
    info!("{} all files {}", PLUGIN_NAME, pretty_bytes(report.output_bytes as i64));

    Ok(report)
}

/// Copies `package.json` from `root` into `dist` and links `root/node_modules`
/// as `dist/node_modules`, replacing whatever was there
pub async fn link(root: &Path, dist: &Path) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(dist)
        .await
        .with_context(|| format!("Failed to create {}", dist.display()))?;

    let manifest = dist.join(MANIFEST);
    fs::copy(root.join(MANIFEST), &manifest)
        .await
        .with_context(|| format!("Failed to copy {}", MANIFEST))?;
    info!("copy: {}", MANIFEST);

    let target = fs::canonicalize(root.join(DEPENDENCIES))
        .await
        .with_context(|| format!("Failed to resolve {}", root.join(DEPENDENCIES).display()))?;
    let link = dist.join(DEPENDENCIES);
    remove_existing(&link).await?;
    symlink_dir(&target, &link)
        .await
        .with_context(|| format!("Failed to link {}", link.display()))?;
    info!("link: {}", DEPENDENCIES);

    Ok(vec![manifest, link])
}

async fn remove_existing(path: &Path) -> Result<()> {
    let Ok(metadata) = fs::symlink_metadata(path).await else {
        return Ok(());
    };

    let removed = if metadata.file_type().is_symlink() {
        remove_symlink(path).await
    } else if metadata.is_dir() {
        fs::remove_dir_all(path).await
    } else {
        fs::remove_file(path).await
    };
    removed.with_context(|| format!("Failed to replace {}", path.display()))
}

#[cfg(unix)]
async fn symlink_dir(target: &Path, link: &Path) -> std::io::Result<()> {
    fs::symlink(target, link).await
}

#[cfg(windows)]
async fn symlink_dir(target: &Path, link: &Path) -> std::io::Result<()> {
    fs::symlink_dir(target, link).await
}

#[cfg(unix)]
async fn remove_symlink(path: &Path) -> std::io::Result<()> {
    fs::remove_file(path).await
}

#[cfg(windows)]
async fn remove_symlink(path: &Path) -> std::io::Result<()> {
    // Directory symlinks are removed as directories on Windows
    match fs::remove_dir(path).await {
        Ok(()) => Ok(()),
        Err(_) => fs::remove_file(path).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugins::Transform;
    use crate::test_support::{capture_logs, Broken, Truncate};
    use tempfile::TempDir;

    fn png(len: usize) -> Vec<u8> {
        let mut bytes = vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
        bytes.resize(len, 0);
        bytes
    }

    fn project() -> TempDir {
        let temp_dir = TempDir::new().unwrap();
        let img = temp_dir.path().join("src/img");
        std::fs::create_dir_all(img.join("icons")).unwrap();
        std::fs::write(img.join("a.png"), png(1000)).unwrap();
        std::fs::write(img.join("icons/b.txt"), b"notes").unwrap();
        temp_dir
    }

    #[tokio::test]
    async fn test_compress_writes_minified_and_skipped_files() {
        let temp_dir = project();
        let root = temp_dir.path();
        let dist = root.join("dist");
        let stage = ImageMin::with_plugins(vec![Truncate::new("optipng", 600) as Transform], Options { verbose: true });
        let source = FileSource::new([format!("{}/src/img/**/*", root.display())]);

        let (logs, _guard) = capture_logs();
        let report = compress_with(stage, source, &dist).await.unwrap();

        assert_eq!(report.written, vec![dist.join("a.png"), dist.join("icons/b.txt")]);
        assert_eq!(report.failed, 0);
        assert_eq!(std::fs::read(dist.join("a.png")).unwrap().len(), 600);
        assert_eq!(std::fs::read(dist.join("icons/b.txt")).unwrap(), b"notes");
        assert_eq!(report.output_bytes, 605);
        assert_eq!(report.summary.saved_bytes, 400);
        assert_eq!(report.summary.saved_percent, 40.0);

        let logs = logs.contents();
        assert!(logs.contains("image all files 605 B"));
        assert!(logs.contains("Skipping unsupported image icons/b.txt"));
    }

    #[tokio::test]
    async fn test_compress_logs_item_errors_and_continues() {
        let temp_dir = project();
        let root = temp_dir.path();
        let dist = root.join("dist");
        let stage = ImageMin::with_plugins(vec![std::sync::Arc::new(Broken) as Transform], Options { verbose: false });
        let source = FileSource::new([format!("{}/src/img/**/*", root.display())]);

        let (logs, _guard) = capture_logs();
        let report = compress_with(stage, source, &dist).await.unwrap();

        assert_eq!(report.failed, 1);
        assert_eq!(report.written, vec![dist.join("icons/b.txt")]);
        assert!(!dist.join("a.png").exists());
        assert!(logs.contents().contains("corrupt image data"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_link_copies_manifest_and_replaces_link() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        let dist = root.join("dist");
        std::fs::write(root.join(MANIFEST), br#"{"name":"app"}"#).unwrap();
        std::fs::create_dir_all(root.join("node_modules/dep")).unwrap();
        std::fs::create_dir_all(dist.join("node_modules")).unwrap();

        let (logs, _guard) = capture_logs();
        let created = link(root, &dist).await.unwrap();
        assert_eq!(created, vec![dist.join(MANIFEST), dist.join(DEPENDENCIES)]);

        assert_eq!(std::fs::read(dist.join(MANIFEST)).unwrap(), br#"{"name":"app"}"#);
        let link_meta = std::fs::symlink_metadata(dist.join(DEPENDENCIES)).unwrap();
        assert!(link_meta.file_type().is_symlink());
        assert!(dist.join("node_modules/dep").is_dir());

        // Running again replaces the existing link
        link(root, &dist).await.unwrap();
        assert!(dist.join("node_modules/dep").is_dir());

        let logs = logs.contents();
        assert!(logs.contains("copy: package.json"));
        assert!(logs.contains("link: node_modules"));
    }

    #[tokio::test]
    async fn test_link_without_manifest_fails() {
        let temp_dir = TempDir::new().unwrap();
        let err = link(temp_dir.path(), &temp_dir.path().join("dist")).await.unwrap_err();
        assert!(err.to_string().contains("package.json"));
    }
}
