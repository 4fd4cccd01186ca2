//! In-memory filesystem.

use super::{
    compile_pattern, path, FileStat, FileSystem, FileType, FsError, FsEvent, FsEventKind,
    WatchGuard, WatchStream,
};
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;

/// In-memory [`FileSystem`].
///
/// Modification times come from a logical clock that advances on every
/// write, so two writes always produce strictly increasing mtimes. Parent
/// directories are implied by file paths.
#[derive(Debug, Clone, Default)]
pub struct MemoryFs {
    inner: Arc<Mutex<Inner>>,
}

#[derive(Debug, Default)]
struct Inner {
    files: BTreeMap<String, Entry>,
    dirs: BTreeSet<String>,
    clock: u64,
    watchers: Vec<Subscriber>,
    next_watch_id: u64,
    write_log: Vec<String>,
}

#[derive(Debug)]
struct Entry {
    bytes: Vec<u8>,
    mtime: u64,
}

#[derive(Debug)]
struct Subscriber {
    id: u64,
    pattern: glob::Pattern,
    tx: mpsc::UnboundedSender<FsEvent>,
}

impl Inner {
    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    fn is_dir(&self, path: &str) -> bool {
        if path == path::ROOT || self.dirs.contains(path) {
            return true;
        }
        let prefix = format!("{path}/");
        self.files
            .range(prefix.clone()..)
            .next()
            .is_some_and(|(k, _)| k.starts_with(&prefix))
    }

    fn notify(&mut self, path: &str, kind: FsEventKind) {
        let rel = path.trim_start_matches('/');
        self.watchers.retain(|sub| {
            if !sub.pattern.matches(rel) {
                return !sub.tx.is_closed();
            }
            sub.tx.send(FsEvent::new(path, kind)).is_ok()
        });
    }

    fn put(&mut self, path: &str, bytes: Vec<u8>) -> Result<(), FsError> {
        if self.is_dir(path) {
            return Err(FsError::IsDirectory(path.to_string()));
        }
        let mtime = self.tick();
        let existed = self
            .files
            .insert(path.to_string(), Entry { bytes, mtime })
            .is_some();
        self.notify(
            path,
            if existed {
                FsEventKind::Changed
            } else {
                FsEventKind::Created
            },
        );
        Ok(())
    }
}

fn lock(inner: &Mutex<Inner>) -> MutexGuard<'_, Inner> {
    inner.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MemoryFs {
    /// Create an empty filesystem.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: add a text file.
    #[must_use]
    pub fn with_file(self, path: &str, contents: &str) -> Self {
        self.insert(path, contents);
        self
    }

    /// Builder: add an empty directory.
    #[must_use]
    pub fn with_dir(self, path: &str) -> Self {
        self.mkdir(path);
        self
    }

    /// Create or replace a file. Emits a watch event; not recorded in the
    /// write log.
    pub fn insert(&self, path: &str, contents: impl AsRef<[u8]>) {
        let path = path::normalize(path);
        let mut inner = lock(&self.inner);
        if let Err(e) = inner.put(&path, contents.as_ref().to_vec()) {
            tracing::warn!(path = %path, error = %e, "Ignoring insert over directory");
        }
    }

    /// Create an empty directory.
    pub fn mkdir(&self, path: &str) {
        let path = path::normalize(path);
        lock(&self.inner).dirs.insert(path);
    }

    /// Advance a file's mtime without changing its contents.
    pub fn touch(&self, path: &str) {
        let path = path::normalize(path);
        let mut inner = lock(&self.inner);
        let mtime = inner.tick();
        if let Some(entry) = inner.files.get_mut(&path) {
            entry.mtime = mtime;
            inner.notify(&path, FsEventKind::Changed);
        }
    }

    /// Remove a file. Returns whether it existed.
    pub fn remove(&self, path: &str) -> bool {
        let path = path::normalize(path);
        let mut inner = lock(&self.inner);
        let existed = inner.files.remove(&path).is_some();
        if existed {
            inner.notify(&path, FsEventKind::Deleted);
        }
        existed
    }

    /// Current contents of a file, decoded lossily.
    #[must_use]
    pub fn text(&self, path: &str) -> Option<String> {
        let path = path::normalize(path);
        lock(&self.inner)
            .files
            .get(&path)
            .map(|e| String::from_utf8_lossy(&e.bytes).into_owned())
    }

    /// Paths written through [`FileSystem::write_file`], in order.
    #[must_use]
    pub fn writes(&self) -> Vec<String> {
        lock(&self.inner).write_log.clone()
    }

    /// Number of live watch subscriptions.
    #[must_use]
    pub fn watcher_count(&self) -> usize {
        lock(&self.inner)
            .watchers
            .iter()
            .filter(|s| !s.tx.is_closed())
            .count()
    }
}

struct MemoryWatchGuard {
    inner: Arc<Mutex<Inner>>,
    id: u64,
}

impl WatchGuard for MemoryWatchGuard {
    fn dispose(&mut self) {
        lock(&self.inner).watchers.retain(|s| s.id != self.id);
    }
}

#[async_trait]
impl FileSystem for MemoryFs {
    async fn stat(&self, path: &str) -> Result<FileStat, FsError> {
        let path = path::normalize(path);
        let inner = lock(&self.inner);
        if let Some(entry) = inner.files.get(&path) {
            return Ok(FileStat {
                file_type: FileType::File,
                mtime: entry.mtime,
                size: entry.bytes.len() as u64,
            });
        }
        if inner.is_dir(&path) {
            return Ok(FileStat {
                file_type: FileType::Directory,
                mtime: 0,
                size: 0,
            });
        }
        Err(FsError::NotFound(path))
    }

    async fn read_file(&self, path: &str) -> Result<Vec<u8>, FsError> {
        let path = path::normalize(path);
        let inner = lock(&self.inner);
        match inner.files.get(&path) {
            Some(entry) => Ok(entry.bytes.clone()),
            None if inner.is_dir(&path) => Err(FsError::IsDirectory(path)),
            None => Err(FsError::NotFound(path)),
        }
    }

    async fn write_file(&self, path: &str, contents: &[u8]) -> Result<(), FsError> {
        let path = path::normalize(path);
        let mut inner = lock(&self.inner);
        inner.put(&path, contents.to_vec())?;
        inner.write_log.push(path);
        Ok(())
    }

    fn create_watch(&self, pattern: &str) -> Result<WatchStream, FsError> {
        let compiled = compile_pattern(pattern)?;
        let (tx, rx) = mpsc::unbounded_channel();
        let mut inner = lock(&self.inner);
        inner.next_watch_id += 1;
        let id = inner.next_watch_id;
        inner.watchers.push(Subscriber {
            id,
            pattern: compiled,
            tx,
        });
        Ok(WatchStream::new(
            rx,
            Box::new(MemoryWatchGuard {
                inner: Arc::clone(&self.inner),
                id,
            }),
        ))
    }
}
