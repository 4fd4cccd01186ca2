//! Bundling engine capability.
//!
//! The orchestrator drives any [`BundleEngine`]; the engine receives the
//! resolver chain as its only way to locate and read modules, and returns
//! output files in memory. Writing them is the orchestrator's job.

mod emit;
mod graph;
pub mod scan;

pub use graph::GraphEngine;

use crate::config::{BuildConfig, OutputFormat};
use crate::resolver::{LoadError, ResolveError, ResolverChain};
use crate::vfs::path;
use async_trait::async_trait;
use thiserror::Error;

/// Options for a single engine invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildOptions {
    /// Entry specifiers, as written in the build config.
    pub entry_points: Vec<String>,
    /// Follow and inline imports. When false each entry is emitted alone.
    pub bundle: bool,
    /// Absolute virtual output directory.
    pub outdir: String,
    pub minify: bool,
    pub format: OutputFormat,
}

impl BuildOptions {
    /// Options for `config`, with `outdir` made absolute under the workspace.
    #[must_use]
    pub fn from_config(config: &BuildConfig, workspace_root: &str) -> Self {
        Self {
            entry_points: config.entry_points.clone(),
            bundle: config.bundle,
            outdir: path::join(workspace_root, &config.outdir),
            minify: config.minify,
            format: config.format,
        }
    }
}

/// A file produced by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputFile {
    /// Absolute virtual path.
    pub path: String,
    pub contents: Vec<u8>,
    /// Text form of `contents`.
    pub text: String,
}

impl OutputFile {
    #[must_use]
    pub fn from_text(path: impl Into<String>, text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            path: path.into(),
            contents: text.as_bytes().to_vec(),
            text,
        }
    }
}

/// Engine result.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildOutput {
    pub output_files: Vec<OutputFile>,
    /// Non-fatal problems, reported to the diagnostic sink.
    pub warnings: Vec<String>,
}

/// Engine error.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Could not resolve entry point '{0}'")]
    UnresolvedEntry(String),

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error("Failed to load {location}: {source}")]
    Load {
        location: String,
        #[source]
        source: LoadError,
    },

    #[error("{0}")]
    Other(String),
}

/// Turns entry points into output files through a resolver chain.
#[async_trait]
pub trait BundleEngine: Send + Sync {
    /// Engine name for logs.
    fn name(&self) -> &str;

    /// Run one build.
    async fn build(
        &self,
        options: &BuildOptions,
        resolvers: &ResolverChain,
    ) -> Result<BuildOutput, EngineError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_options_outdir_is_absolute() {
        let config = BuildConfig {
            outdir: "out/js".to_string(),
            ..BuildConfig::default()
        };
        let options = BuildOptions::from_config(&config, "/ws");
        assert_eq!(options.outdir, "/ws/out/js");
        assert_eq!(options.entry_points, vec!["src/index.ts"]);
        assert!(options.bundle);
    }

    #[test]
    fn test_output_file_bytes_match_text() {
        let file = OutputFile::from_text("/dist/a.js", "let a = 1;");
        assert_eq!(file.contents, b"let a = 1;");
    }
}
