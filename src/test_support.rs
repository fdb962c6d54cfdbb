//! In-process backends and log capture shared by the unit tests.

use crate::error::{BackendError, PluginLoadError};
use crate::plugins::{Backend, BackendFactory, PluginOptions, Transform};
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Keeps the first `keep` bytes of every buffer, counting its calls
pub struct Truncate {
    name: &'static str,
    keep: usize,
    calls: AtomicUsize,
}

impl Truncate {
    pub fn new(name: &'static str, keep: usize) -> Arc<Self> {
        Arc::new(Self {
            name,
            keep,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl Backend for Truncate {
    fn name(&self) -> &str {
        self.name
    }

    async fn optimize(&self, mut input: Vec<u8>) -> Result<Vec<u8>, BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        input.truncate(self.keep);
        Ok(input)
    }
}

/// Fails like a tool rejecting its input
pub struct Broken;

#[async_trait::async_trait]
impl Backend for Broken {
    fn name(&self) -> &str {
        "broken"
    }

    async fn optimize(&self, _input: Vec<u8>) -> Result<Vec<u8>, BackendError> {
        Err(BackendError::Io(io::Error::new(io::ErrorKind::InvalidData, "corrupt image data")))
    }
}

/// Factory that records the options it is given and builds a pass-through
/// backend, or fails like a missing tool
pub struct RecordingFactory {
    name: &'static str,
    fails: bool,
    received: Arc<Mutex<Vec<PluginOptions>>>,
}

impl RecordingFactory {
    pub fn new(name: &'static str, fails: bool) -> Self {
        Self {
            name,
            fails,
            received: Arc::default(),
        }
    }

    pub fn received(&self) -> Arc<Mutex<Vec<PluginOptions>>> {
        Arc::clone(&self.received)
    }
}

impl BackendFactory for RecordingFactory {
    fn create(&self, options: PluginOptions) -> Result<Transform, PluginLoadError> {
        self.received.lock().unwrap().push(options);
        if self.fails {
            return Err(PluginLoadError::ToolNotFound {
                plugin: self.name.to_string(),
                tool: self.name.to_string(),
            });
        }
        Ok(Truncate::new(self.name, usize::MAX) as Transform)
    }
}

/// Factory handing out one fixed backend
pub struct FixedFactory(pub Transform);

impl BackendFactory for FixedFactory {
    fn create(&self, _options: PluginOptions) -> Result<Transform, PluginLoadError> {
        Ok(Arc::clone(&self.0))
    }
}

/// Log lines written by the capturing subscriber
#[derive(Clone, Default)]
pub struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl LogBuffer {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl io::Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Routes this thread's `tracing` output into a buffer until the guard drops
pub fn capture_logs() -> (LogBuffer, tracing::subscriber::DefaultGuard) {
    let buffer = LogBuffer::default();
    let writer = buffer.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .with_max_level(tracing::Level::INFO)
        .finish();
    let guard = tracing::subscriber::set_default(subscriber);
    (buffer, guard)
}
