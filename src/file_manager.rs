//! # File Management Module
//!
//! File discovery and output for the build tasks.
//!
//! ## Responsibilities:
//! - `FileSource`: expands glob patterns into file records. Each pattern is
//!   walked from its static prefix (the glob parent), which is also the
//!   default base of the records it yields. `{a,b}` groups are expanded and a
//!   leading `./` is dropped. Patterns starting with `!` and the
//!   `ignore` list exclude matches.
//! - `FileSink`: writes records under a destination directory, preserving
//!   their path relative to the base.
//!
//! ## Example:
//! ```rust,no_run
//! # use build_assets::{FileSink, FileSource};
//! # async fn run() -> anyhow::Result<()> {
//! let source = FileSource::new(["src/img/**/*"]).with_base("src");
//! let sink = FileSink::new("dist");
//! for file in source.read_all().await? {
//!     sink.write(&file).await?;
//! }
//! # Ok(())
//! # }
//! ```

use crate::error::PipelineError;
use crate::file::{Contents, FileRecord};
use anyhow::{Context, Result};
use futures::stream::{self, BoxStream, StreamExt};
use glob::{MatchOptions, Pattern};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, error};
use walkdir::WalkDir;

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// Glob-based source of file records
#[derive(Debug, Clone, Default)]
pub struct FileSource {
    patterns: Vec<String>,
    base: Option<PathBuf>,
    ignore: Vec<String>,
}

impl FileSource {
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            patterns: patterns.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Base every record's relative path is computed from
    pub fn with_base(mut self, base: impl Into<PathBuf>) -> Self {
        self.base = Some(base.into());
        self
    }

    /// Additional patterns to exclude
    pub fn with_ignore<I, S>(mut self, ignore: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ignore.extend(ignore.into_iter().map(Into::into));
        self
    }

    /// Matching files with their bases, in pattern order, without duplicates
    pub fn resolve(&self) -> Result<Vec<(PathBuf, PathBuf)>> {
        let mut excluded = Vec::new();
        for raw in self
            .ignore
            .iter()
            .map(String::as_str)
            .chain(self.patterns.iter().filter_map(|p| p.strip_prefix('!')))
        {
            excluded.extend(compile(raw).with_context(|| format!("Invalid ignore pattern: {}", raw))?);
        }

        let explicit_base = self.base.as_deref().map(normalize);
        let mut seen = HashSet::new();
        let mut matches = Vec::new();

        for raw in self.patterns.iter().filter(|p| !p.starts_with('!')) {
            let patterns = compile(raw).with_context(|| format!("Invalid glob pattern: {}", raw))?;
            let parent = glob_parent(strip_current_dir(raw));
            let base = explicit_base.clone().unwrap_or_else(|| parent.clone());
            debug!("Walking {} for {}", parent.display(), raw);

            for entry in WalkDir::new(&parent)
                .follow_links(true)
                .sort_by_file_name()
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_file())
            {
                let path = normalize(entry.path());
                if !patterns.iter().any(|p| p.matches_path_with(&path, MATCH_OPTIONS)) {
                    continue;
                }
                if excluded.iter().any(|ignore| ignore.matches_path_with(&path, MATCH_OPTIONS)) {
                    continue;
                }
                if seen.insert(path.clone()) {
                    matches.push((path, base.clone()));
                }
            }
        }

        Ok(matches)
    }

    /// Reads every matching file into a buffer record
    pub async fn read_all(&self) -> Result<Vec<FileRecord>> {
        let mut records = Vec::new();
        for (path, base) in self.resolve()? {
            let bytes = fs::read(&path)
                .await
                .with_context(|| format!("Failed to read {}", path.display()))?;
            records.push(FileRecord::buffer(path, base, bytes));
        }
        Ok(records)
    }

    /// Lazily reads matching files, one per poll. Unreadable files are logged
    /// and left out.
    pub fn into_stream(self) -> Result<BoxStream<'static, FileRecord>> {
        let matches = self.resolve()?;
        Ok(stream::iter(matches)
            .filter_map(|(path, base)| async move {
                match fs::read(&path).await {
                    Ok(bytes) => Some(FileRecord::buffer(path, base, bytes)),
                    Err(e) => {
                        error!("Failed to read {}: {}", path.display(), e);
                        None
                    }
                }
            })
            .boxed())
    }
}

/// Static leading directories of a glob pattern
pub fn glob_parent(pattern: &str) -> PathBuf {
    let components: Vec<&str> = pattern.split('/').collect();
    let last = components.len() - 1;
    let mut parent = PathBuf::new();

    for (i, component) in components.iter().enumerate() {
        if i == last || is_magic(component) {
            break;
        }
        if component.is_empty() {
            if i == 0 {
                parent.push("/");
            }
            continue;
        }
        parent.push(component);
    }

    if parent.as_os_str().is_empty() {
        PathBuf::from(".")
    } else {
        parent
    }
}

fn is_magic(component: &str) -> bool {
    component.contains(['*', '?', '[', '{'])
}

/// Expands `{a,b}` alternation groups, nested groups included. Groups without
/// a comma and unbalanced braces are kept literally.
pub fn expand_braces(pattern: &str) -> Vec<String> {
    let Some(open) = pattern.find('{') else {
        return vec![pattern.to_string()];
    };

    let mut depth = 0;
    let mut close = None;
    let mut bounds = vec![open];
    for (offset, c) in pattern[open..].char_indices() {
        let i = open + offset;
        match c {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    close = Some(i);
                    break;
                }
            }
            ',' if depth == 1 => bounds.push(i),
            _ => {}
        }
    }

    let Some(close) = close else {
        return vec![pattern.to_string()];
    };
    let suffix = &pattern[close + 1..];

    if bounds.len() == 1 {
        let literal = &pattern[..=close];
        return expand_braces(suffix)
            .into_iter()
            .map(|rest| format!("{}{}", literal, rest))
            .collect();
    }

    bounds.push(close);
    let prefix = &pattern[..open];
    bounds
        .windows(2)
        .flat_map(|w| expand_braces(&format!("{}{}{}", prefix, &pattern[w[0] + 1..w[1]], suffix)))
        .collect()
}

/// Compiles one user pattern into the patterns its brace groups expand to
fn compile(raw: &str) -> Result<Vec<Pattern>, glob::PatternError> {
    expand_braces(strip_current_dir(raw))
        .iter()
        .map(|p| Pattern::new(p))
        .collect()
}

/// `./src/*.png` and `src/*.png` name the same files
fn strip_current_dir(pattern: &str) -> &str {
    let mut pattern = pattern;
    while let Some(rest) = pattern.strip_prefix("./") {
        pattern = rest;
    }
    pattern
}

/// Drops a leading `./` so walked paths line up with relative patterns
fn normalize(path: &Path) -> PathBuf {
    match path.strip_prefix(".") {
        Ok(rest) if rest.as_os_str().is_empty() => path.to_path_buf(),
        Ok(rest) => rest.to_path_buf(),
        Err(_) => path.to_path_buf(),
    }
}

/// Writes records under a destination directory
#[derive(Debug, Clone)]
pub struct FileSink {
    dist: PathBuf,
}

impl FileSink {
    pub fn new(dist: impl Into<PathBuf>) -> Self {
        Self { dist: dist.into() }
    }

    /// Where `file` is written
    pub fn destination(&self, file: &FileRecord) -> PathBuf {
        let relative = file.relative();
        if relative.is_absolute() {
            // Not under its base: keep only the file name
            self.dist.join(relative.file_name().unwrap_or_default())
        } else {
            self.dist.join(relative)
        }
    }

    /// Writes one record and returns its destination. Null records become
    /// directories.
    pub async fn write(&self, file: &FileRecord) -> Result<PathBuf, PipelineError> {
        let destination = self.destination(file);
        match file.contents() {
            Contents::Null => {
                fs::create_dir_all(&destination).await?;
            }
            Contents::Stream(_) => {
                return Err(PipelineError::UnsupportedInput {
                    plugin: "dest",
                    path: file.path().to_path_buf(),
                });
            }
            Contents::Buffer(bytes) => {
                if let Some(parent) = destination.parent() {
                    fs::create_dir_all(parent).await?;
                }
                fs::write(&destination, bytes).await?;
            }
        }
        Ok(destination)
    }
}
