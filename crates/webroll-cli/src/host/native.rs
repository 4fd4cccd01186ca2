//! Native filesystem host.
//!
//! Maps virtual paths (`/src/a.ts`) onto a real directory. I/O goes through
//! `tokio::fs`; watches use `notify` and are filtered by a glob relative to
//! the root.

use async_trait::async_trait;
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::io;
use std::path::{Component, Path, PathBuf};
use std::time::UNIX_EPOCH;
use tokio::sync::mpsc;
use tracing::{debug, error, trace};
use webroll_core::vfs::{
    compile_pattern, path, FileStat, FileSystem, FileType, FsError, FsEvent, FsEventKind,
    WatchGuard, WatchStream,
};

/// Filesystem rooted at a real directory.
#[derive(Debug, Clone)]
pub struct NativeFs {
    root: PathBuf,
}

impl NativeFs {
    /// Root the virtual filesystem at `root`.
    ///
    /// The root is canonicalized when possible so watch event paths, which
    /// the OS reports canonically, map back to virtual paths.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let root = std::fs::canonicalize(&root).unwrap_or(root);
        Self { root }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Real path for a virtual path. `..` never climbs above the root.
    #[must_use]
    pub fn real_path(&self, virtual_path: &str) -> PathBuf {
        let normalized = path::normalize(virtual_path);
        let rel = normalized.trim_start_matches('/');
        if rel.is_empty() {
            self.root.clone()
        } else {
            self.root.join(rel)
        }
    }

    /// Virtual path for a real path under the root.
    #[must_use]
    pub fn virtual_path(&self, real: &Path) -> Option<String> {
        let rel = real.strip_prefix(&self.root).ok()?;
        let mut out = String::new();
        for component in rel.components() {
            match component {
                Component::Normal(part) => {
                    out.push('/');
                    out.push_str(&part.to_string_lossy());
                }
                _ => return None,
            }
        }
        if out.is_empty() {
            out.push('/');
        }
        Some(out)
    }
}

fn io_error(path: &str, source: io::Error) -> FsError {
    if source.kind() == io::ErrorKind::NotFound {
        FsError::NotFound(path.to_string())
    } else {
        FsError::Io {
            path: path.to_string(),
            source,
        }
    }
}

fn event_kind(kind: &EventKind) -> Option<FsEventKind> {
    use notify::event::ModifyKind;
    match kind {
        EventKind::Create(_) => Some(FsEventKind::Created),
        EventKind::Remove(_) => Some(FsEventKind::Deleted),
        EventKind::Modify(ModifyKind::Metadata(_)) => None,
        EventKind::Modify(_) => Some(FsEventKind::Changed),
        _ => None,
    }
}

struct NotifyGuard {
    watcher: Option<RecommendedWatcher>,
}

impl WatchGuard for NotifyGuard {
    fn dispose(&mut self) {
        if self.watcher.take().is_some() {
            debug!("Native watcher disposed");
        }
    }
}

#[async_trait]
impl FileSystem for NativeFs {
    async fn stat(&self, path: &str) -> Result<FileStat, FsError> {
        let meta = tokio::fs::metadata(self.real_path(path))
            .await
            .map_err(|e| io_error(path, e))?;
        let mtime = meta
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map_or(0, |d| d.as_millis() as u64);
        let (file_type, size) = if meta.is_dir() {
            (FileType::Directory, 0)
        } else {
            (FileType::File, meta.len())
        };
        Ok(FileStat {
            file_type,
            mtime,
            size,
        })
    }

    async fn read_file(&self, path: &str) -> Result<Vec<u8>, FsError> {
        let real = self.real_path(path);
        if tokio::fs::metadata(&real).await.is_ok_and(|m| m.is_dir()) {
            return Err(FsError::IsDirectory(path.to_string()));
        }
        tokio::fs::read(&real).await.map_err(|e| io_error(path, e))
    }

    async fn write_file(&self, path: &str, contents: &[u8]) -> Result<(), FsError> {
        let real = self.real_path(path);
        if let Some(parent) = real.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| io_error(path, e))?;
        }
        tokio::fs::write(&real, contents)
            .await
            .map_err(|e| io_error(path, e))
    }

    fn create_watch(&self, pattern: &str) -> Result<WatchStream, FsError> {
        let compiled = compile_pattern(pattern)?;
        let (tx, rx) = mpsc::unbounded_channel();
        let mapper = self.clone();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    let Some(kind) = event_kind(&event.kind) else {
                        return;
                    };
                    for real in &event.paths {
                        let Some(virtual_path) = mapper.virtual_path(real) else {
                            continue;
                        };
                        if !compiled.matches(virtual_path.trim_start_matches('/')) {
                            continue;
                        }
                        trace!(path = %virtual_path, kind = ?kind, "Native change");
                        let _ = tx.send(FsEvent::new(virtual_path, kind));
                    }
                }
                Err(e) => error!(error = %e, "Watch error"),
            },
            Config::default(),
        )
        .map_err(|e| FsError::Watch(e.to_string()))?;

        watcher
            .watch(&self.root, RecursiveMode::Recursive)
            .map_err(|e| FsError::Watch(e.to_string()))?;
        debug!(root = %self.root.display(), pattern = %pattern, "Native watcher started");

        Ok(WatchStream::new(
            rx,
            Box::new(NotifyGuard {
                watcher: Some(watcher),
            }),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::tempdir;

    #[test]
    fn test_path_mapping() {
        let dir = tempdir().unwrap();
        let fs = NativeFs::new(dir.path());

        assert_eq!(fs.real_path("/src/a.ts"), fs.root().join("src/a.ts"));
        assert_eq!(fs.real_path("/"), fs.root());
        // Traversal stays under the root
        assert_eq!(fs.real_path("/../../etc/passwd"), fs.root().join("etc/passwd"));

        let real = fs.root().join("src").join("a.ts");
        assert_eq!(fs.virtual_path(&real).as_deref(), Some("/src/a.ts"));
        assert_eq!(fs.virtual_path(fs.root()).as_deref(), Some("/"));
        assert_eq!(fs.virtual_path(Path::new("/elsewhere/x")), None);
    }

    #[tokio::test]
    async fn test_write_creates_parents_and_reads_back() {
        let dir = tempdir().unwrap();
        let fs = NativeFs::new(dir.path());

        fs.write_file("/dist/js/out.js", b"let a = 1;").await.unwrap();
        assert_eq!(fs.read_text("/dist/js/out.js").await.unwrap(), "let a = 1;");

        let stat = fs.stat("/dist/js/out.js").await.unwrap();
        assert!(stat.is_file());
        assert_eq!(stat.size, 10);
        assert!(stat.mtime > 0);
        assert!(fs.is_dir("/dist").await);
    }

    #[tokio::test]
    async fn test_missing_and_directory_errors() {
        let dir = tempdir().unwrap();
        let fs = NativeFs::new(dir.path());
        std::fs::create_dir(dir.path().join("src")).unwrap();

        assert!(fs.stat("/missing.ts").await.unwrap_err().is_not_found());
        assert!(fs.read_file("/missing.ts").await.unwrap_err().is_not_found());
        assert!(matches!(
            fs.read_file("/src").await.unwrap_err(),
            FsError::IsDirectory(_)
        ));
    }

    #[tokio::test]
    async fn test_watch_reports_matching_changes() {
        let dir = tempdir().unwrap();
        let fs = NativeFs::new(dir.path());
        std::fs::create_dir(dir.path().join("src")).unwrap();

        let mut watch = fs.create_watch("src/**/*.ts").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();
        std::fs::write(dir.path().join("src").join("a.ts"), "export {};").unwrap();

        let event = tokio::time::timeout(Duration::from_secs(10), watch.recv())
            .await
            .expect("no watch event within timeout")
            .expect("watch closed");
        assert_eq!(event.path, "/src/a.ts");

        watch.dispose();
    }
}
