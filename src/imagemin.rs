//! # Image Minification Stage
//!
//! Sequencing and bookkeeping layer between a stream of file records and the
//! compression plugins. The stage takes one record at a time and:
//!
//! 1. passes records without contents through untouched
//! 2. rejects stream-backed records (`UnsupportedInput`)
//! 3. passes through files whose extension is not an image it handles
//!    (`.jpg .jpeg .png .gif .svg`, case-insensitive)
//! 4. pipes every other file through the plugin set, replaces its contents
//!    with the result and records the savings
//!
//! Item errors never end the stream; the failing record is dropped and the
//! error is reported in its place. Once the input is exhausted the stage is
//! finalized and reports a [`RunSummary`].
//!
//! Items are processed strictly one after another: the next record is only
//! pulled once the previous one is fully resolved. There is no timeout, so a
//! hung optimizer stalls the whole stream.
//!
//! ## Example
//! ```rust,ignore
//! let stage = ImageMin::new(Options { verbose: true });
//! let events = stage.pipe(futures::stream::iter(files));
//! futures::pin_mut!(events);
//! while let Some(event) = events.next().await {
//!     match event {
//!         StageEvent::File(file) => sink.write(&file).await?,
//!         StageEvent::Error(e) => tracing::error!("{}", e),
//!         StageEvent::Finished(summary) => println!("{}", summary.format_summary()),
//!     }
//! }
//! ```

use crate::config::Options;
use crate::error::PipelineError;
use crate::file::FileRecord;
use crate::plugins::{run_plugins, PluginRegistry, PluginSet};
use crate::progress::{RunSummary, RunTotals};
use crate::utils::{format_percent, pretty_bytes};
use futures::stream::{self, Stream, StreamExt};
use std::sync::Arc;
use tracing::info;

/// Name the stage logs and tags its errors with
pub const PLUGIN_NAME: &str = "image";

/// Extensions the stage optimizes; everything else passes through
pub const VALID_EXTENSIONS: [&str; 5] = [".jpg", ".jpeg", ".png", ".gif", ".svg"];

/// What the stage emits for each input record, then once at the end
#[derive(Debug)]
pub enum StageEvent {
    File(FileRecord),
    Error(PipelineError),
    Finished(RunSummary),
}

pub struct ImageMin {
    /// Explicit plugin set; `None` resolves the registry defaults for every file
    plugins: Option<PluginSet>,
    options: Options,
    registry: Arc<PluginRegistry>,
    totals: RunTotals,
}

impl ImageMin {
    /// Stage using the default plugins of the process-wide registry
    pub fn new(options: Options) -> Self {
        Self {
            plugins: None,
            options,
            registry: PluginRegistry::global(),
            totals: RunTotals::default(),
        }
    }

    /// Stage using an explicit plugin set
    pub fn with_plugins(plugins: PluginSet, options: Options) -> Self {
        Self {
            plugins: Some(plugins),
            ..Self::new(options)
        }
    }

    /// Resolve default plugins from `registry` instead of the process-wide one
    pub fn with_registry(mut self, registry: Arc<PluginRegistry>) -> Self {
        self.registry = registry;
        self
    }

    pub fn totals(&self) -> &RunTotals {
        &self.totals
    }

    fn is_supported(file: &FileRecord) -> bool {
        file.extension()
            .map_or(false, |ext| VALID_EXTENSIONS.contains(&ext.as_str()))
    }

    /// Processes one record. `Ok` carries the record to forward downstream.
    pub async fn transform(&mut self, mut file: FileRecord) -> Result<FileRecord, PipelineError> {
        if file.is_null() {
            return Ok(file);
        }

        if file.is_stream() {
            return Err(PipelineError::UnsupportedInput {
                plugin: PLUGIN_NAME,
                path: file.path().to_path_buf(),
            });
        }

        if !Self::is_supported(&file) {
            if self.options.verbose {
                info!("{}: Skipping unsupported image {}", PLUGIN_NAME, file.relative().display());
            }
            return Ok(file);
        }

        let plugins = match self.plugins {
            Some(ref plugins) => plugins.clone(),
            None => self.registry.default_plugins(),
        };

        let input = file.take_bytes().unwrap_or_default();
        let original_size = input.len() as u64;

        let data = run_plugins(&plugins, input)
            .await
            .map_err(|source| PipelineError::BackendFailure {
                plugin: PLUGIN_NAME,
                path: file.path().to_path_buf(),
                source,
            })?;

        let optimized_size = data.len() as u64;
        let saved = original_size as i64 - optimized_size as i64;
        self.totals.record(original_size, optimized_size);

        if self.options.verbose {
            let msg = if saved > 0 {
                let percent = saved as f64 / original_size as f64 * 100.0;
                format!("saved {} - {}%", pretty_bytes(saved), format_percent(percent))
            } else {
                "already optimized".to_string()
            };
            info!("{}: ✔ {} ({})", PLUGIN_NAME, file.relative().display(), msg);
        }

        file.set_contents(data);
        Ok(file)
    }

    /// Finalizes the stage and reports the run's savings
    pub fn flush(self) -> RunSummary {
        self.totals.summary()
    }

    /// Drives `input` through the stage in order. Emits one event per input
    /// record, then exactly one `Finished`.
    pub fn pipe<S>(self, input: S) -> impl Stream<Item = StageEvent>
    where
        S: Stream<Item = FileRecord> + Unpin,
    {
        stream::unfold(Some((self, input)), |state| async move {
            let (mut stage, mut input) = state?;
            match input.next().await {
                Some(file) => {
                    let event = match stage.transform(file).await {
                        Ok(file) => StageEvent::File(file),
                        Err(e) => StageEvent::Error(e),
                    };
                    Some((event, Some((stage, input))))
                }
                None => Some((StageEvent::Finished(stage.flush()), None)),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugins::{Transform, DEFAULT_PLUGINS};
    use crate::test_support::{capture_logs, Broken, FixedFactory, RecordingFactory, Truncate};
    use tempfile::TempDir;

    const QUIET: Options = Options { verbose: false };
    const VERBOSE: Options = Options { verbose: true };

    fn png(len: usize) -> Vec<u8> {
        let mut bytes = vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
        bytes.resize(len, 0);
        bytes
    }

    fn shrink_to(keep: usize) -> ImageMin {
        ImageMin::with_plugins(vec![Truncate::new("shrink", keep) as Transform], QUIET)
    }

    async fn collect(stage: ImageMin, files: Vec<FileRecord>) -> Vec<StageEvent> {
        stage.pipe(stream::iter(files)).collect().await
    }

    #[tokio::test]
    async fn test_null_record_passes_through() {
        let shrink = Truncate::new("shrink", 1);
        let mut stage = ImageMin::with_plugins(vec![shrink.clone() as Transform], QUIET);

        let file = stage.transform(FileRecord::null("/src/a.png", "/src")).await.unwrap();
        assert!(file.is_null());
        assert_eq!(file.path(), std::path::Path::new("/src/a.png"));
        assert_eq!(shrink.calls(), 0);
        assert_eq!(*stage.totals(), RunTotals::default());
    }

    #[tokio::test]
    async fn test_stream_record_is_rejected() {
        let events = collect(
            shrink_to(1),
            vec![FileRecord::stream("/src/a.png", "/src", tokio::io::empty())],
        )
        .await;

        assert_eq!(events.len(), 2);
        match &events[0] {
            StageEvent::Error(e @ PipelineError::UnsupportedInput { .. }) => {
                assert!(e.to_string().contains("Streaming not supported"));
                assert_eq!(e.file_path(), Some(std::path::Path::new("/src/a.png")));
            }
            other => panic!("unexpected event: {other:?}"),
        }
        assert!(matches!(events[1], StageEvent::Finished(summary) if summary.saved_percent == 0.0));
    }

    #[tokio::test]
    async fn test_unsupported_extension_is_skipped() {
        let shrink = Truncate::new("shrink", 1);
        let mut stage = ImageMin::with_plugins(vec![shrink.clone() as Transform], QUIET);

        let (logs, _guard) = capture_logs();
        let file = stage
            .transform(FileRecord::buffer("/src/notes.txt", "/src", vec![7; 500]))
            .await
            .unwrap();

        assert_eq!(file.bytes(), Some(&[7u8; 500][..]));
        assert_eq!(shrink.calls(), 0);
        assert_eq!(*stage.totals(), RunTotals::default());
        assert!(!logs.contents().contains("Skipping"));
    }

    #[tokio::test]
    async fn test_skip_is_logged_when_verbose() {
        let mut stage = ImageMin::with_plugins(Vec::new(), VERBOSE);

        let (logs, _guard) = capture_logs();
        stage
            .transform(FileRecord::buffer("/src/docs/readme.md", "/src", vec![1]))
            .await
            .unwrap();

        assert!(logs.contents().contains("image: Skipping unsupported image docs/readme.md"));
    }

    #[tokio::test]
    async fn test_extension_match_is_case_insensitive() {
        let mut stage = shrink_to(10);
        let file = stage
            .transform(FileRecord::buffer("/src/PHOTO.JPEG", "/src", vec![0; 40]))
            .await
            .unwrap();
        assert_eq!(file.bytes().map(<[u8]>::len), Some(10));
        assert_eq!(stage.totals().saved_bytes, 30);
    }

    #[tokio::test]
    async fn test_savings_are_recorded_and_logged() {
        let mut stage = ImageMin::with_plugins(vec![Truncate::new("shrink", 600) as Transform], VERBOSE);

        let (logs, _guard) = capture_logs();
        let file = stage
            .transform(FileRecord::buffer("/src/img/a.png", "/src", png(1000)))
            .await
            .unwrap();

        assert_eq!(file.bytes().map(<[u8]>::len), Some(600));
        assert_eq!(stage.totals().original_bytes, 1000);
        assert_eq!(stage.totals().saved_bytes, 400);
        assert!(logs.contents().contains("image: ✔ img/a.png (saved 400 B - 40%)"));
    }

    #[tokio::test]
    async fn test_already_optimized_input() {
        let mut stage = ImageMin::with_plugins(vec![Truncate::new("shrink", 600) as Transform], VERBOSE);

        let (logs, _guard) = capture_logs();
        let once = stage
            .transform(FileRecord::buffer("/src/a.png", "/src", png(1000)))
            .await
            .unwrap();
        let totals_after_first = *stage.totals();

        let twice = stage.transform(once).await.unwrap();

        assert_eq!(twice.bytes().map(<[u8]>::len), Some(600));
        assert_eq!(stage.totals().original_bytes, totals_after_first.original_bytes);
        assert_eq!(stage.totals().saved_bytes, totals_after_first.saved_bytes);
        assert!(logs.contents().contains("image: ✔ a.png (already optimized)"));
    }

    #[tokio::test]
    async fn test_empty_image_does_not_divide_by_zero() {
        let mut stage = shrink_to(0);
        let file = stage
            .transform(FileRecord::buffer("/src/empty.gif", "/src", Vec::new()))
            .await
            .unwrap();
        assert_eq!(file.bytes(), Some(&[][..]));
        assert_eq!(stage.flush().saved_percent, 0.0);
    }

    #[tokio::test]
    async fn test_backend_failure_drops_only_that_file() {
        let stage = ImageMin::with_plugins(vec![Arc::new(Broken) as Transform], QUIET);
        let events = collect(
            stage,
            vec![
                FileRecord::buffer("/src/bad.png", "/src", png(100)),
                FileRecord::buffer("/src/style.css", "/src", vec![1; 10]),
            ],
        )
        .await;

        assert_eq!(events.len(), 3);
        match &events[0] {
            StageEvent::Error(e @ PipelineError::BackendFailure { plugin, .. }) => {
                assert_eq!(*plugin, "image");
                assert_eq!(e.file_path(), Some(std::path::Path::new("/src/bad.png")));
                assert!(e.to_string().contains("corrupt image data"));
            }
            other => panic!("unexpected event: {other:?}"),
        }
        assert!(matches!(&events[1], StageEvent::File(file) if file.path().ends_with("style.css")));
        assert!(matches!(events[2], StageEvent::Finished(_)));
    }

    #[tokio::test]
    async fn test_default_plugins_scenario() {
        // a.png compresses from 1000 to 600 bytes, b.txt is left alone
        let dir = TempDir::new().unwrap();
        let registry = PluginRegistry::empty(dir.path())
            .with_factory("gifsicle", RecordingFactory::new("gifsicle", false))
            .with_factory("jpegtran", RecordingFactory::new("jpegtran", false))
            .with_factory("optipng", FixedFactory(Truncate::new("optipng", 600)))
            .with_factory("svgo", RecordingFactory::new("svgo", false));
        let stage = ImageMin::new(QUIET).with_registry(Arc::new(registry));

        let events = collect(
            stage,
            vec![
                FileRecord::buffer("/src/a.png", "/src", png(1000)),
                FileRecord::buffer("/src/b.txt", "/src", vec![b'x'; 500]),
            ],
        )
        .await;

        let mut files = Vec::new();
        let mut summaries = Vec::new();
        for event in events {
            match event {
                StageEvent::File(file) => files.push(file),
                StageEvent::Finished(summary) => summaries.push(summary),
                StageEvent::Error(e) => panic!("unexpected error: {e}"),
            }
        }

        assert_eq!(files.len(), 2);
        assert_eq!(files[0].path(), std::path::Path::new("/src/a.png"));
        assert_eq!(files[0].bytes().map(<[u8]>::len), Some(600));
        assert_eq!(files[1].bytes(), Some(&[b'x'; 500][..]));
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].saved_percent, 40.0);
        assert!(summaries[0].saved_bytes <= summaries[0].original_bytes);
    }

    #[tokio::test]
    async fn test_default_plugins_are_resolved_per_file() {
        let dir = TempDir::new().unwrap();
        let factory = RecordingFactory::new("svgo", false);
        let received = factory.received();
        let registry = DEFAULT_PLUGINS
            .iter()
            .filter(|&&name| name != "svgo")
            .fold(PluginRegistry::empty(dir.path()), |registry, &name| {
                registry.with_factory(name, RecordingFactory::new(name, false))
            })
            .with_factory("svgo", factory);
        let mut stage = ImageMin::new(QUIET).with_registry(Arc::new(registry));

        stage.transform(FileRecord::buffer("/src/a.svg", "/src", b"<svg/>".to_vec())).await.unwrap();
        stage.transform(FileRecord::buffer("/src/b.svg", "/src", b"<svg/>".to_vec())).await.unwrap();
        stage.transform(FileRecord::buffer("/src/c.txt", "/src", b"text".to_vec())).await.unwrap();

        assert_eq!(received.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_finished_is_emitted_once_for_empty_input() {
        let events = collect(shrink_to(1), Vec::new()).await;
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], StageEvent::Finished(summary) if summary.minified_files == 0));
    }

    #[tokio::test]
    async fn test_aggregate_percent() {
        let stage = shrink_to(250);
        let events = collect(
            stage,
            vec![
                FileRecord::buffer("/src/a.png", "/src", png(1000)),
                FileRecord::buffer("/src/b.png", "/src", png(500)),
                FileRecord::buffer("/src/c.png", "/src", png(200)),
            ],
        )
        .await;

        let summary = match events.last() {
            Some(StageEvent::Finished(summary)) => *summary,
            other => panic!("unexpected event: {other:?}"),
        };
        // c.png is already smaller than the cut and does not count
        assert_eq!(summary.original_bytes, 1500);
        assert_eq!(summary.saved_bytes, 1000);
        assert_eq!(summary.minified_files, 3);
        assert!((summary.saved_percent - 66.666_666).abs() < 1e-4);
    }
}
