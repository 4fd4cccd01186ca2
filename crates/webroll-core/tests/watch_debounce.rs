//! Watch-driven rebuild timing, on paused tokio time.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use url::Url;
use webroll_core::resolver::{FetchError, Fetcher};
use webroll_core::{
    BufferSink, BuildOptions, BuildOutput, BundleEngine, EngineError, MemoryFs, OutputFile,
    ResolverChain, Session, Settings,
};

const CONFIG: &str = "/ws/webroll.config.json";

/// Counts invocations; optionally takes `delay` of virtual time per build.
#[derive(Default)]
struct CountingEngine {
    calls: AtomicUsize,
    delay: Duration,
}

impl CountingEngine {
    fn slow(delay: Duration) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            delay,
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BundleEngine for CountingEngine {
    fn name(&self) -> &str {
        "counting"
    }

    async fn build(
        &self,
        options: &BuildOptions,
        _resolvers: &ResolverChain,
    ) -> Result<BuildOutput, EngineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        Ok(BuildOutput {
            output_files: vec![OutputFile::from_text(
                format!("{}/out.js", options.outdir),
                "built",
            )],
            warnings: Vec::new(),
        })
    }
}

struct Offline;

#[async_trait]
impl Fetcher for Offline {
    async fn fetch(&self, url: &Url) -> Result<String, FetchError> {
        Err(FetchError::Request {
            url: url.to_string(),
            message: "offline".to_string(),
        })
    }
}

fn workspace() -> MemoryFs {
    MemoryFs::new()
        .with_file(CONFIG, r#"{"entryPoints":["src/index.ts"],"outdir":"dist"}"#)
        .with_file("/ws/src/index.ts", "export {};")
}

fn session(fs: &MemoryFs, engine: &Arc<CountingEngine>) -> Session {
    Session::builder(
        Arc::new(fs.clone()),
        Settings::default().with_workspace_root("/ws"),
    )
    .engine(engine.clone())
    .fetcher(Arc::new(Offline))
    .sink(Arc::new(BufferSink::new()))
    .build()
}

async fn advance(ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
}

#[tokio::test(start_paused = true)]
async fn test_start_builds_eagerly() {
    let fs = workspace();
    let engine = Arc::new(CountingEngine::default());
    let s = session(&fs, &engine);

    s.start_watch().await.unwrap();
    assert_eq!(engine.calls(), 1);
    assert!(s.watcher().is_watching());
    assert_eq!(s.watcher().pattern().as_deref(), Some("ws/**/*"));
    assert_eq!(fs.watcher_count(), 1);

    // No events, no further builds
    advance(5_000).await;
    assert_eq!(engine.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_burst_coalesces_into_one_build() {
    let fs = workspace();
    let engine = Arc::new(CountingEngine::default());
    let s = session(&fs, &engine);
    s.start_watch().await.unwrap();

    for i in 0..5 {
        fs.insert(&format!("/ws/src/f{i}.ts"), "x");
        advance(50).await;
    }
    // Last event at 200ms; quiet window not yet elapsed
    advance(100).await;
    assert_eq!(engine.calls(), 1);

    advance(1_000).await;
    assert_eq!(engine.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_spaced_events_build_separately() {
    let fs = workspace();
    let engine = Arc::new(CountingEngine::default());
    let s = session(&fs, &engine);
    s.start_watch().await.unwrap();

    fs.insert("/ws/src/index.ts", "export const a = 1;");
    advance(300).await;
    assert_eq!(engine.calls(), 2);

    fs.insert("/ws/src/index.ts", "export const a = 2;");
    advance(300).await;
    assert_eq!(engine.calls(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_continuous_events_fire_at_max_wait() {
    let fs = workspace();
    let engine = Arc::new(CountingEngine::default());
    let s = session(&fs, &engine);
    s.start_watch().await.unwrap();

    // An event every 150ms for 3s never leaves a 200ms quiet gap
    for _ in 0..20 {
        fs.touch("/ws/src/index.ts");
        advance(150).await;
    }
    // One build at the 2000ms ceiling; the second burst is still pending
    assert_eq!(engine.calls(), 2);

    advance(500).await;
    assert_eq!(engine.calls(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_output_writes_do_not_retrigger() {
    let fs = workspace();
    let engine = Arc::new(CountingEngine::default());
    let s = session(&fs, &engine);
    s.start_watch().await.unwrap();

    fs.insert("/ws/dist/manual.js", "x");
    advance(1_000).await;
    assert_eq!(engine.calls(), 1);

    // A real change builds once; its own output write is ignored
    fs.touch("/ws/src/index.ts");
    advance(1_000).await;
    assert_eq!(engine.calls(), 2);
    assert_eq!(fs.text("/ws/dist/out.js").as_deref(), Some("built"));
}

#[tokio::test(start_paused = true)]
async fn test_changes_during_build_coalesce_into_next() {
    let fs = workspace();
    let engine = Arc::new(CountingEngine::slow(Duration::from_millis(500)));
    let s = session(&fs, &engine);

    // Eager build occupies 0..500ms
    s.start_watch().await.unwrap();
    assert_eq!(engine.calls(), 1);

    // Fires at 700ms and runs until 1200ms
    fs.touch("/ws/src/index.ts");
    advance(300).await;
    assert_eq!(engine.calls(), 2);

    // Both arrive mid-build and form one burst afterwards
    fs.insert("/ws/src/a.ts", "a");
    advance(100).await;
    fs.insert("/ws/src/b.ts", "b");
    advance(2_000).await;
    assert_eq!(engine.calls(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_stop_suppresses_pending_burst() {
    let fs = workspace();
    let engine = Arc::new(CountingEngine::default());
    let s = session(&fs, &engine);
    s.start_watch().await.unwrap();

    fs.touch("/ws/src/index.ts");
    advance(100).await;
    assert!(s.stop_watch().await);
    assert!(!s.watcher().is_watching());
    assert_eq!(fs.watcher_count(), 0);

    fs.touch("/ws/src/index.ts");
    advance(1_000).await;
    assert_eq!(engine.calls(), 1);

    // Second stop is a logged no-op
    assert!(!s.stop_watch().await);
}

#[tokio::test(start_paused = true)]
async fn test_restart_replaces_session() {
    let fs = workspace();
    let engine = Arc::new(CountingEngine::default());
    let s = session(&fs, &engine);

    s.start_watch().await.unwrap();
    s.start_watch().await.unwrap();
    assert_eq!(fs.watcher_count(), 1);
    assert_eq!(engine.calls(), 2);

    fs.touch("/ws/src/index.ts");
    advance(1_000).await;
    assert_eq!(engine.calls(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_first_run_bootstrap_writes_once_and_builds_once() {
    let fs = MemoryFs::new().with_file("/ws/src/index.ts", "export {};");
    let engine = Arc::new(CountingEngine::default());
    let s = session(&fs, &engine);

    s.start_watch().await.unwrap();
    advance(5_000).await;

    assert_eq!(engine.calls(), 1);
    let config_writes = fs.writes().iter().filter(|p| *p == CONFIG).count();
    assert_eq!(config_writes, 1);
    assert!(fs.text(CONFIG).unwrap().contains("\"entryPoints\""));
}

#[tokio::test(start_paused = true)]
async fn test_config_edit_triggers_rebuild_with_new_outdir() {
    let fs = workspace();
    let engine = Arc::new(CountingEngine::default());
    let s = session(&fs, &engine);
    s.start_watch().await.unwrap();

    fs.insert(CONFIG, r#"{"entryPoints":["src/index.ts"],"outdir":"build"}"#);
    advance(1_000).await;
    assert_eq!(engine.calls(), 2);
    assert_eq!(fs.text("/ws/build/out.js").as_deref(), Some("built"));
    assert_eq!(s.orchestrator().output_dir(), "/ws/build");
}
