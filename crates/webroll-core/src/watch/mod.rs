//! Debounced rebuild-on-change.
//!
//! A watch session subscribes to filesystem events, coalesces bursts through
//! a [`Debouncer`] and asks the [`BuildOrchestrator`] for one build per burst.
//! Events that arrive while a build runs queue up and form the next burst.

mod debounce;

pub use debounce::{DebouncePolicy, Debouncer, MAX_WAIT, QUIET_WINDOW};

use crate::build::BuildOrchestrator;
use crate::vfs::{path, workspace_pattern, FileSystem, FsError, FsEvent, WatchStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, trace, warn};

/// Watch error.
#[derive(Error, Debug)]
pub enum WatchError {
    #[error("Failed to watch '{pattern}': {source}")]
    Open {
        pattern: String,
        #[source]
        source: FsError,
    },
}

struct WatchSession {
    pattern: String,
    disposed: Arc<AtomicBool>,
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl WatchSession {
    /// Mark disposed and signal the loop. The loop disposes the stream.
    fn signal_stop(self) -> JoinHandle<()> {
        self.disposed.store(true, Ordering::SeqCst);
        let _ = self.shutdown.send(());
        self.task
    }
}

/// Owns at most one watch session at a time.
pub struct WatchController {
    fs: Arc<dyn FileSystem>,
    orchestrator: Arc<BuildOrchestrator>,
    policy: DebouncePolicy,
    session: Mutex<Option<WatchSession>>,
}

impl WatchController {
    pub fn new(fs: Arc<dyn FileSystem>, orchestrator: Arc<BuildOrchestrator>) -> Self {
        Self {
            fs,
            orchestrator,
            policy: DebouncePolicy::default(),
            session: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn with_policy(mut self, policy: DebouncePolicy) -> Self {
        self.policy = policy;
        self
    }

    #[must_use]
    pub fn is_watching(&self) -> bool {
        self.lock().is_some()
    }

    /// Root-relative pattern of the active session.
    #[must_use]
    pub fn pattern(&self) -> Option<String> {
        self.lock().as_ref().map(|s| s.pattern.clone())
    }

    /// Start watching `glob` (relative to the workspace root), replacing any
    /// active session, then run one build.
    ///
    /// The build config is bootstrapped before the watch opens, so writing
    /// the default config does not trigger a rebuild.
    pub async fn start(&self, glob: &str) -> Result<(), WatchError> {
        self.dispose_session().await;

        if let Err(e) = self.orchestrator.load_config().await {
            // The eager build reports it
            debug!(error = %e, "Config not loadable before watch start");
        }

        let pattern = workspace_pattern(&self.orchestrator.settings().workspace_root, glob);
        let stream = self
            .fs
            .create_watch(&pattern)
            .map_err(|source| WatchError::Open {
                pattern: pattern.clone(),
                source,
            })?;

        let disposed = Arc::new(AtomicBool::new(false));
        let (shutdown, shutdown_rx) = oneshot::channel();
        let task = tokio::spawn(watch_loop(
            stream,
            shutdown_rx,
            Arc::clone(&disposed),
            Arc::clone(&self.orchestrator),
            self.policy,
        ));

        info!(pattern = %pattern, "Watching for changes");
        *self.lock() = Some(WatchSession {
            pattern,
            disposed,
            shutdown,
            task,
        });

        // Failures are already reported by the orchestrator
        let _ = self.orchestrator.build().await;
        Ok(())
    }

    /// Stop the active session. Returns `false` (and logs) when there is
    /// none. An in-flight build runs to completion.
    pub async fn stop(&self) -> bool {
        if self.dispose_session().await {
            info!("Stopped watching");
            true
        } else {
            warn!("Stop requested with no active watch");
            false
        }
    }

    async fn dispose_session(&self) -> bool {
        let Some(session) = self.lock().take() else {
            return false;
        };
        let task = session.signal_stop();
        if let Err(e) = task.await {
            warn!(error = %e, "Watch task ended abnormally");
        }
        true
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<WatchSession>> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for WatchController {
    fn drop(&mut self) {
        if let Some(session) = self.lock().take() {
            drop(session.signal_stop());
        }
    }
}

impl std::fmt::Debug for WatchController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchController")
            .field("pattern", &self.pattern())
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

/// Whether an event can affect a build.
fn is_relevant(event: &FsEvent, outdir: &str) -> bool {
    !path::is_within(&event.path, outdir)
}

async fn watch_loop(
    mut stream: WatchStream,
    mut shutdown: oneshot::Receiver<()>,
    disposed: Arc<AtomicBool>,
    orchestrator: Arc<BuildOrchestrator>,
    policy: DebouncePolicy,
) {
    let mut debouncer = Debouncer::new(policy);

    loop {
        let deadline = debouncer.deadline();
        tokio::select! {
            biased;

            _ = &mut shutdown => break,

            event = stream.recv() => {
                let Some(event) = event else { break };
                if !is_relevant(&event, &orchestrator.output_dir()) {
                    trace!(path = %event.path, "Ignoring output change");
                    continue;
                }
                debug!(path = %event.path, kind = ?event.kind, "Change detected");
                debouncer.record(Instant::now());
            }

            () = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                debouncer.reset();
                if disposed.load(Ordering::SeqCst) {
                    break;
                }
                info!("Rebuilding after changes");
                let _ = orchestrator.build().await;
            }
        }
    }

    stream.dispose();
    debug!("Watch loop exited");
}
