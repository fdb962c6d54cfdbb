//! # File Records
//!
//! A `FileRecord` is one item flowing through a pipeline: where the file lives,
//! the base it was globbed from, and its contents.

use std::fmt;
use std::path::{Path, PathBuf};
use tokio::io::AsyncRead;

/// Contents of a file record. The three states are mutually exclusive.
pub enum Contents {
    /// No contents (directories, or files read without contents)
    Null,
    /// Contents delivered incrementally; never accepted by the image stage
    Stream(Box<dyn AsyncRead + Send + Unpin>),
    /// Whole contents in memory
    Buffer(Vec<u8>),
}

impl fmt::Debug for Contents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("Null"),
            Self::Stream(_) => f.write_str("Stream(..)"),
            Self::Buffer(bytes) => write!(f, "Buffer({} bytes)", bytes.len()),
        }
    }
}

/// One file flowing through a pipeline
#[derive(Debug)]
pub struct FileRecord {
    path: PathBuf,
    base: PathBuf,
    contents: Contents,
}

impl FileRecord {
    pub fn new(path: impl Into<PathBuf>, base: impl Into<PathBuf>, contents: Contents) -> Self {
        Self {
            path: path.into(),
            base: base.into(),
            contents,
        }
    }

    /// Record with in-memory contents
    pub fn buffer(path: impl Into<PathBuf>, base: impl Into<PathBuf>, bytes: Vec<u8>) -> Self {
        Self::new(path, base, Contents::Buffer(bytes))
    }

    /// Record without contents
    pub fn null(path: impl Into<PathBuf>, base: impl Into<PathBuf>) -> Self {
        Self::new(path, base, Contents::Null)
    }

    /// Record backed by a reader
    pub fn stream<R>(path: impl Into<PathBuf>, base: impl Into<PathBuf>, reader: R) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        Self::new(path, base, Contents::Stream(Box::new(reader)))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    /// Path relative to the base, used for display and for the output location.
    /// Falls back to the full path when the file is not under its base.
    pub fn relative(&self) -> &Path {
        self.path.strip_prefix(&self.base).unwrap_or(&self.path)
    }

    pub fn is_null(&self) -> bool {
        matches!(self.contents, Contents::Null)
    }

    pub fn is_stream(&self) -> bool {
        matches!(self.contents, Contents::Stream(_))
    }

    pub fn is_buffer(&self) -> bool {
        matches!(self.contents, Contents::Buffer(_))
    }

    pub fn contents(&self) -> &Contents {
        &self.contents
    }

    /// Bytes of a buffer record
    pub fn bytes(&self) -> Option<&[u8]> {
        match &self.contents {
            Contents::Buffer(bytes) => Some(bytes),
            _ => None,
        }
    }

    /// Moves the bytes out of a buffer record, leaving it `Null`.
    /// Other records are left untouched.
    pub fn take_bytes(&mut self) -> Option<Vec<u8>> {
        match std::mem::replace(&mut self.contents, Contents::Null) {
            Contents::Buffer(bytes) => Some(bytes),
            other => {
                self.contents = other;
                None
            }
        }
    }

    pub fn set_contents(&mut self, bytes: Vec<u8>) {
        self.contents = Contents::Buffer(bytes);
    }

    /// Lowercased extension including the leading dot, e.g. `.png`
    pub fn extension(&self) -> Option<String> {
        self.path
            .extension()
            .map(|ext| format!(".{}", ext.to_string_lossy().to_lowercase()))
    }
}
