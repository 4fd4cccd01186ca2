//! Per-workspace context.

use crate::build::{BuildOrchestrator, BuildReport};
use crate::config::Settings;
use crate::diagnostics::{DiagnosticSink, TracingSink};
use crate::engine::{BundleEngine, GraphEngine};
use crate::error::Result;
use crate::resolver::{AliasResolver, Fetcher, HttpFetcher, ResolverChain};
use crate::vfs::FileSystem;
use crate::watch::{DebouncePolicy, WatchController};
use std::sync::Arc;

/// Everything a workspace needs: filesystem, output channel, settings,
/// resolver chain, orchestrator and watch controller.
#[derive(Debug)]
pub struct Session {
    fs: Arc<dyn FileSystem>,
    orchestrator: Arc<BuildOrchestrator>,
    watcher: WatchController,
}

impl Session {
    /// A session with the default engine, HTTP fetcher and tracing sink.
    pub fn new(fs: Arc<dyn FileSystem>, settings: Settings) -> Self {
        SessionBuilder::new(fs, settings).build()
    }

    pub fn builder(fs: Arc<dyn FileSystem>, settings: Settings) -> SessionBuilder {
        SessionBuilder::new(fs, settings)
    }

    #[must_use]
    pub fn fs(&self) -> &Arc<dyn FileSystem> {
        &self.fs
    }

    #[must_use]
    pub fn settings(&self) -> &Settings {
        self.orchestrator.settings()
    }

    #[must_use]
    pub fn resolvers(&self) -> &ResolverChain {
        self.orchestrator.resolvers()
    }

    #[must_use]
    pub fn orchestrator(&self) -> &Arc<BuildOrchestrator> {
        &self.orchestrator
    }

    #[must_use]
    pub fn watcher(&self) -> &WatchController {
        &self.watcher
    }

    /// Run one build.
    pub async fn build(&self) -> Result<BuildReport> {
        Ok(self.orchestrator.build().await?)
    }

    /// Watch the configured glob and rebuild on change.
    pub async fn start_watch(&self) -> Result<()> {
        let glob = self.settings().watch_glob.clone();
        self.watcher.start(&glob).await?;
        Ok(())
    }

    /// Stop watching. Returns `false` if no watch was active.
    pub async fn stop_watch(&self) -> bool {
        self.watcher.stop().await
    }
}

/// Assembles a [`Session`] with replaceable parts.
pub struct SessionBuilder {
    fs: Arc<dyn FileSystem>,
    settings: Settings,
    engine: Option<Arc<dyn BundleEngine>>,
    fetcher: Option<Arc<dyn Fetcher>>,
    sink: Option<Arc<dyn DiagnosticSink>>,
    policy: DebouncePolicy,
}

impl SessionBuilder {
    pub fn new(fs: Arc<dyn FileSystem>, settings: Settings) -> Self {
        Self {
            fs,
            settings,
            engine: None,
            fetcher: None,
            sink: None,
            policy: DebouncePolicy::default(),
        }
    }

    pub fn engine(mut self, engine: Arc<dyn BundleEngine>) -> Self {
        self.engine = Some(engine);
        self
    }

    pub fn fetcher(mut self, fetcher: Arc<dyn Fetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    pub fn sink(mut self, sink: Arc<dyn DiagnosticSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn debounce(mut self, policy: DebouncePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn build(self) -> Session {
        let aliases: AliasResolver = self.settings.aliases.iter().cloned().collect();
        let fetcher = self
            .fetcher
            .unwrap_or_else(|| Arc::new(HttpFetcher::new()) as Arc<dyn Fetcher>);
        let resolvers = Arc::new(ResolverChain::standard(
            Arc::clone(&self.fs),
            &self.settings.workspace_root,
            aliases,
            fetcher,
        ));

        let engine = self
            .engine
            .unwrap_or_else(|| Arc::new(GraphEngine::new()) as Arc<dyn BundleEngine>);
        let sink = self
            .sink
            .unwrap_or_else(|| Arc::new(TracingSink) as Arc<dyn DiagnosticSink>);
        let orchestrator = Arc::new(BuildOrchestrator::new(
            Arc::clone(&self.fs),
            engine,
            resolvers,
            sink,
            self.settings,
        ));
        let watcher = WatchController::new(Arc::clone(&self.fs), Arc::clone(&orchestrator))
            .with_policy(self.policy);

        Session {
            fs: self.fs,
            orchestrator,
            watcher,
        }
    }
}
