//! Abstracted asynchronous filesystem.
//!
//! Every resolver, the build orchestrator and the watch controller reach
//! storage only through [`FileSystem`]. Paths are virtual (see [`path`]).
//!
//! Implementations:
//! - [`MemoryFs`]: in-memory store with a logical mtime clock, used by tests
//!   and embedders that need deterministic sessions.
//! - The CLI provides a native implementation backed by `tokio::fs` and
//!   `notify`.

mod memory;
pub mod path;

pub use memory::MemoryFs;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

/// Kind of filesystem entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    File,
    Directory,
}

/// Result of a `stat` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStat {
    /// Entry kind.
    pub file_type: FileType,
    /// Modification time in milliseconds (or a logical clock value).
    pub mtime: u64,
    /// Size in bytes (0 for directories).
    pub size: u64,
}

impl FileStat {
    #[must_use]
    pub fn is_file(&self) -> bool {
        self.file_type == FileType::File
    }

    #[must_use]
    pub fn is_dir(&self) -> bool {
        self.file_type == FileType::Directory
    }
}

/// Filesystem error.
#[derive(Error, Debug)]
pub enum FsError {
    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Is a directory: {0}")]
    IsDirectory(String),

    #[error("Invalid UTF-8: {0}")]
    Decode(#[from] std::string::FromUtf8Error),

    #[error("IO error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid watch pattern '{pattern}': {message}")]
    Pattern { pattern: String, message: String },

    #[error("Watcher failed: {0}")]
    Watch(String),
}

impl FsError {
    /// Whether this error means the entry does not exist.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::NotFound(_) => true,
            Self::Io { source, .. } => source.kind() == std::io::ErrorKind::NotFound,
            _ => false,
        }
    }
}

/// Kind of watch event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsEventKind {
    Changed,
    Created,
    Deleted,
}

/// A change reported by a watch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FsEvent {
    /// Virtual path that changed.
    pub path: String,
    /// Kind of change.
    pub kind: FsEventKind,
}

impl FsEvent {
    #[must_use]
    pub fn new(path: impl Into<String>, kind: FsEventKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }
}

/// Releases the resources behind a watch. Must be idempotent.
pub trait WatchGuard: Send {
    fn dispose(&mut self);
}

/// An open watch: an ordered event stream plus its disposer.
///
/// Dropping the stream disposes the watch.
pub struct WatchStream {
    events: mpsc::UnboundedReceiver<FsEvent>,
    guard: Box<dyn WatchGuard>,
}

impl WatchStream {
    /// Create a stream from a receiver and the guard that stops its sender.
    pub fn new(events: mpsc::UnboundedReceiver<FsEvent>, guard: Box<dyn WatchGuard>) -> Self {
        Self { events, guard }
    }

    /// Wait for the next event. Returns `None` once the watch is closed.
    pub async fn recv(&mut self) -> Option<FsEvent> {
        self.events.recv().await
    }

    /// Stop the watch. Events already queued are discarded.
    pub fn dispose(&mut self) {
        self.guard.dispose();
        self.events.close();
        while self.events.try_recv().is_ok() {}
    }
}

impl Drop for WatchStream {
    fn drop(&mut self) {
        self.guard.dispose();
    }
}

impl std::fmt::Debug for WatchStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchStream").finish_non_exhaustive()
    }
}

/// Asynchronous storage capability consumed by the core.
///
/// `create_watch` patterns are globs matched against paths relative to the
/// filesystem root (no leading `/`).
#[async_trait]
pub trait FileSystem: Send + Sync + std::fmt::Debug {
    /// Stat an entry.
    async fn stat(&self, path: &str) -> Result<FileStat, FsError>;

    /// Read a file's bytes.
    async fn read_file(&self, path: &str) -> Result<Vec<u8>, FsError>;

    /// Write a file, creating parent directories as needed.
    async fn write_file(&self, path: &str, contents: &[u8]) -> Result<(), FsError>;

    /// Open a watch over entries matching `pattern`.
    fn create_watch(&self, pattern: &str) -> Result<WatchStream, FsError>;

    /// Decode file bytes to text.
    fn decode(&self, bytes: &[u8]) -> Result<String, FsError> {
        Ok(String::from_utf8(bytes.to_vec())?)
    }

    /// Encode text to file bytes.
    fn encode(&self, text: &str) -> Vec<u8> {
        text.as_bytes().to_vec()
    }

    /// Whether `path` exists and is a file. Any stat error counts as absent.
    async fn is_file(&self, path: &str) -> bool {
        matches!(self.stat(path).await, Ok(stat) if stat.is_file())
    }

    /// Whether `path` exists and is a directory.
    async fn is_dir(&self, path: &str) -> bool {
        matches!(self.stat(path).await, Ok(stat) if stat.is_dir())
    }

    /// Read and decode a file.
    async fn read_text(&self, path: &str) -> Result<String, FsError> {
        let bytes = self.read_file(path).await?;
        self.decode(&bytes)
    }
}

/// Compile a watch glob, mapping failures to [`FsError::Pattern`].
pub fn compile_pattern(pattern: &str) -> Result<glob::Pattern, FsError> {
    glob::Pattern::new(pattern).map_err(|e| FsError::Pattern {
        pattern: pattern.to_string(),
        message: e.to_string(),
    })
}

/// Build a root-relative watch pattern for `glob` inside `workspace_root`.
#[must_use]
pub fn workspace_pattern(workspace_root: &str, glob: &str) -> String {
    let glob = glob.trim_start_matches('/');
    let rel = path::relative_to(workspace_root, path::ROOT)
        .unwrap_or("")
        .trim_end_matches('/');
    if rel.is_empty() {
        glob.to_string()
    } else {
        format!("{}/{glob}", glob::Pattern::escape(rel))
    }
}
