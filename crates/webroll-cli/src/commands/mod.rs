pub mod build;
pub mod watch;

use clap::Args;
use webroll_core::config::DEFAULT_CONFIG_FILE;
use webroll_core::{OutputFormat, Settings};

/// Workspace settings shared by `build` and `watch`.
///
/// Except for `--config` and `--alias`, these only seed the config file
/// written on first run; an existing config file wins.
#[derive(Args, Debug, Clone)]
pub struct WorkspaceArgs {
    /// Build config file, relative to the workspace root
    #[arg(long, value_name = "PATH", default_value = DEFAULT_CONFIG_FILE)]
    pub config: String,

    /// Default entry point
    #[arg(long, default_value = "src/index.ts")]
    pub entry: String,

    /// Default output format (esm, cjs, iife)
    #[arg(long, default_value = "esm", value_parser = parse_format)]
    pub format: OutputFormat,

    /// Default output directory
    #[arg(long, default_value = "dist")]
    pub outdir: String,

    /// Minify output by default
    #[arg(long)]
    pub minify: bool,

    /// Import alias (e.g., @=/src), repeatable; first match wins
    #[arg(long = "alias", value_name = "FROM=TO", value_parser = parse_alias)]
    pub aliases: Vec<(String, String)>,
}

impl WorkspaceArgs {
    /// Settings for a workspace rooted at the filesystem root.
    pub fn settings(&self) -> Settings {
        self.aliases.iter().fold(
            Settings::default()
                .with_config_file(self.config.clone())
                .with_default_entry(self.entry.clone())
                .with_format(self.format)
                .with_outdir(self.outdir.clone())
                .with_minify(self.minify),
            |settings, (from, to)| settings.with_alias(from.clone(), to.clone()),
        )
    }
}

fn parse_format(s: &str) -> Result<OutputFormat, String> {
    s.parse()
}

fn parse_alias(s: &str) -> Result<(String, String), String> {
    let (from, to) = s
        .split_once('=')
        .ok_or_else(|| format!("invalid alias '{s}' (expected FROM=TO)"))?;
    let from = from.trim();
    if from.is_empty() {
        return Err(format!("invalid alias '{s}' (empty FROM)"));
    }
    Ok((from.to_string(), to.trim().to_string()))
}
