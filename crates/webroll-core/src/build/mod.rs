//! Build orchestration: config → engine → persisted outputs.

use crate::config::{BuildConfig, ConfigError, ConfigStore, Settings};
use crate::diagnostics::DiagnosticSink;
use crate::engine::{BuildOptions, BundleEngine, EngineError};
use crate::resolver::ResolverChain;
use crate::vfs::{path, FileSystem, FsError};
use serde::Serialize;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Orchestrator lifecycle.
///
/// `Idle → LoadingConfig → Building → WritingOutputs → Idle`, or through
/// `Failed` back to `Idle` when any step errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildState {
    Idle,
    LoadingConfig,
    Building,
    WritingOutputs,
    Failed,
}

/// Build error.
#[derive(Error, Debug)]
pub enum BuildError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("Failed to write output {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: FsError,
    },
}

/// Result of a successful build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildReport {
    /// Output paths written, in engine order.
    pub outputs: Vec<String>,
    pub warnings: Vec<String>,
    #[serde(skip)]
    pub duration: Duration,
}

/// Runs builds for one workspace.
///
/// Builds are serialized: a call made while another build is in flight waits
/// for it to finish, then runs against fresh config.
pub struct BuildOrchestrator {
    fs: Arc<dyn FileSystem>,
    engine: Arc<dyn BundleEngine>,
    resolvers: Arc<ResolverChain>,
    sink: Arc<dyn DiagnosticSink>,
    settings: Settings,
    config: ConfigStore,
    state: Mutex<BuildState>,
    build_lock: tokio::sync::Mutex<()>,
}

impl BuildOrchestrator {
    pub fn new(
        fs: Arc<dyn FileSystem>,
        engine: Arc<dyn BundleEngine>,
        resolvers: Arc<ResolverChain>,
        sink: Arc<dyn DiagnosticSink>,
        settings: Settings,
    ) -> Self {
        let config = ConfigStore::new(
            Arc::clone(&fs),
            settings.config_path(),
            settings.default_build_config(),
        );
        Self {
            fs,
            engine,
            resolvers,
            sink,
            settings,
            config,
            state: Mutex::new(BuildState::Idle),
            build_lock: tokio::sync::Mutex::new(()),
        }
    }

    #[must_use]
    pub fn state(&self) -> BuildState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    #[must_use]
    pub fn resolvers(&self) -> &ResolverChain {
        &self.resolvers
    }

    /// Absolute output directory of the last loaded config, or the
    /// bootstrap default before the first load.
    #[must_use]
    pub fn output_dir(&self) -> String {
        let outdir = self
            .config
            .cached()
            .map_or_else(|| self.settings.outdir.clone(), |c| c.config.outdir.clone());
        path::join(&self.settings.workspace_root, &outdir)
    }

    /// Load the build config through the mtime cache.
    pub async fn load_config(&self) -> Result<Arc<BuildConfig>, ConfigError> {
        if self.settings.config_file.trim().is_empty() {
            return Err(ConfigError::PathNotSet);
        }
        self.config.load().await
    }

    /// Run one build. Failures are reported to the sink and returned; the
    /// orchestrator is back in `Idle` either way.
    pub async fn build(&self) -> Result<BuildReport, BuildError> {
        let _guard = self.build_lock.lock().await;
        let started = Instant::now();

        let result = self.run(started).await;
        match &result {
            Ok(report) => {
                info!(
                    outputs = report.outputs.len(),
                    duration_ms = report.duration.as_millis(),
                    "Build succeeded"
                );
                self.sink.append_line(&format!(
                    "Build succeeded: {} file(s) in {}ms",
                    report.outputs.len(),
                    report.duration.as_millis()
                ));
            }
            Err(e) => {
                self.set_state(BuildState::Failed);
                error!(error = %e, "Build failed");
                self.sink.append_line(&format!("Build failed: {e}"));
            }
        }
        self.set_state(BuildState::Idle);
        result
    }

    async fn run(&self, started: Instant) -> Result<BuildReport, BuildError> {
        self.set_state(BuildState::LoadingConfig);
        let config = self.load_config().await?;

        self.set_state(BuildState::Building);
        let options = BuildOptions::from_config(&config, &self.settings.workspace_root);
        info!(
            engine = self.engine.name(),
            entries = options.entry_points.len(),
            format = %options.format,
            "Build started"
        );
        self.sink.append_line(&format!(
            "Building {} ({})",
            options.entry_points.join(", "),
            options.format
        ));

        let output = self.engine.build(&options, &self.resolvers).await?;
        for warning in &output.warnings {
            warn!(warning = %warning, "Engine warning");
            self.sink.append_line(&format!("warning: {warning}"));
        }

        // Every output is attempted; completed writes are kept on failure.
        self.set_state(BuildState::WritingOutputs);
        let mut written = Vec::with_capacity(output.output_files.len());
        let mut first_error = None;
        for file in &output.output_files {
            match self.fs.write_file(&file.path, &file.contents).await {
                Ok(()) => {
                    debug!(path = %file.path, bytes = file.contents.len(), "Wrote output");
                    written.push(file.path.clone());
                }
                Err(source) => {
                    error!(path = %file.path, error = %source, "Failed to write output");
                    self.sink
                        .append_line(&format!("Failed to write {}: {source}", file.path));
                    if first_error.is_none() {
                        first_error = Some(BuildError::Write {
                            path: file.path.clone(),
                            source,
                        });
                    }
                }
            }
        }
        if let Some(e) = first_error {
            return Err(e);
        }

        Ok(BuildReport {
            outputs: written,
            warnings: output.warnings,
            duration: started.elapsed(),
        })
    }

    fn set_state(&self, state: BuildState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = state;
    }
}

impl std::fmt::Debug for BuildOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuildOrchestrator")
            .field("engine", &self.engine.name())
            .field("config", &self.config.path())
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}
