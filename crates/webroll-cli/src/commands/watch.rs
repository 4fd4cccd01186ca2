//! `webroll watch` command implementation.

use crate::host::{NativeFs, OutputChannel};
use miette::{IntoDiagnostic, Result};
use std::path::Path;
use std::sync::Arc;
use tracing::info;
use webroll_core::{Session, Settings};

/// Build once, then rebuild on every change until Ctrl-C.
pub async fn run(cwd: &Path, settings: Settings) -> Result<()> {
    let session = Session::builder(Arc::new(NativeFs::new(cwd)), settings)
        .sink(Arc::new(OutputChannel))
        .build();

    session.start_watch().await.into_diagnostic()?;
    info!(root = %cwd.display(), "Watching; press Ctrl-C to stop");

    tokio::signal::ctrl_c().await.into_diagnostic()?;
    session.stop_watch().await;
    Ok(())
}
