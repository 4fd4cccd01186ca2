//! `webroll build` command implementation.
//!
//! Runs one build of the workspace: loads (or bootstraps) the build config,
//! bundles every entry point and writes the outputs.

use crate::host::{NativeFs, OutputChannel};
use miette::{IntoDiagnostic, Result};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use webroll_core::{
    BuildError, ConfigError, DiagnosticSink, EngineError, Error, Session, Settings, TracingSink,
};

/// JSON output for the build command.
#[derive(Serialize)]
struct BuildResultJson {
    ok: bool,
    outputs: Vec<String>,
    warnings: Vec<String>,
    duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<BuildErrorJson>,
}

#[derive(Serialize)]
struct BuildErrorJson {
    code: &'static str,
    message: String,
}

/// Stable error code for JSON output.
fn error_code(error: &Error) -> &'static str {
    match error {
        Error::Build(BuildError::Config(ConfigError::Parse { .. })) => "CONFIG_PARSE_ERROR",
        Error::Build(BuildError::Config(ConfigError::PathNotSet)) => "CONFIG_PATH_NOT_SET",
        Error::Build(BuildError::Config(_)) => "CONFIG_IO_ERROR",
        Error::Build(BuildError::Engine(EngineError::UnresolvedEntry(_))) => "UNRESOLVED_ENTRY",
        Error::Build(BuildError::Engine(EngineError::Load { .. })) => "LOAD_ERROR",
        Error::Build(BuildError::Engine(_)) => "ENGINE_ERROR",
        Error::Build(BuildError::Write { .. }) => "WRITE_ERROR",
        _ => "INTERNAL_ERROR",
    }
}

/// Run the build command.
pub async fn run(cwd: &Path, settings: Settings, json: bool) -> Result<()> {
    let start = Instant::now();

    // In JSON mode stdout carries only the result; diagnostics go to logs
    let sink: Arc<dyn DiagnosticSink> = if json {
        Arc::new(TracingSink)
    } else {
        Arc::new(OutputChannel)
    };
    let session = Session::builder(Arc::new(NativeFs::new(cwd)), settings)
        .sink(sink)
        .build();

    let result = session.build().await;
    let duration_ms = start.elapsed().as_millis() as u64;

    match result {
        Ok(report) => {
            if json {
                let out = BuildResultJson {
                    ok: true,
                    outputs: report.outputs,
                    warnings: report.warnings,
                    duration_ms,
                    error: None,
                };
                println!("{}", serde_json::to_string(&out).into_diagnostic()?);
            } else {
                for output in &report.outputs {
                    println!("  {output}");
                }
            }
            Ok(())
        }
        Err(e) => {
            if json {
                let out = BuildResultJson {
                    ok: false,
                    outputs: Vec::new(),
                    warnings: Vec::new(),
                    duration_ms,
                    error: Some(BuildErrorJson {
                        code: error_code(&e),
                        message: e.to_string(),
                    }),
                };
                println!("{}", serde_json::to_string(&out).into_diagnostic()?);
                std::process::exit(1);
            }
            Err(e).into_diagnostic()
        }
    }
}
