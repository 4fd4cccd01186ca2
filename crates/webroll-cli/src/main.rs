#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]

mod commands;
mod host;
mod logging;

use clap::Parser;
use commands::WorkspaceArgs;
use miette::{IntoDiagnostic, Result};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "webroll")]
#[command(author, version, about = "Resolve, bundle and watch a web workspace", long_about = None)]
struct Cli {
    /// Increase logging verbosity (-v for DEBUG, -vv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Emit JSON formatted output (stable, machine-readable)
    #[arg(long, global = true)]
    json: bool,

    /// Override the workspace directory
    #[arg(long, global = true, value_name = "PATH")]
    cwd: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Build the workspace once
    Build {
        #[command(flatten)]
        workspace: WorkspaceArgs,
    },

    /// Build, then rebuild on every change until Ctrl-C
    Watch {
        #[command(flatten)]
        workspace: WorkspaceArgs,

        /// Files to watch, relative to the workspace root
        #[arg(long, default_value = "**/*")]
        glob: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let cwd = cli
        .cwd
        .or_else(|| std::env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("."));

    logging::init(cli.verbose, cli.json);

    let rt = tokio::runtime::Runtime::new().into_diagnostic()?;
    match cli.command {
        Commands::Build { workspace } => {
            let span = tracing::info_span!("build", cmd = "build", cwd = %cwd.display());
            let _guard = span.enter();
            rt.block_on(commands::build::run(&cwd, workspace.settings(), cli.json))
        }
        Commands::Watch { workspace, glob } => {
            let span = tracing::info_span!("watch", cmd = "watch", cwd = %cwd.display());
            let _guard = span.enter();
            let settings = workspace.settings().with_watch_glob(glob);
            rt.block_on(commands::watch::run(&cwd, settings))
        }
    }
}
