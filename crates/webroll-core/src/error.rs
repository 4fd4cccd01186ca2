use crate::build::BuildError;
use crate::config::ConfigError;
use crate::engine::EngineError;
use crate::resolver::{FetchError, LoadError, ResolveError};
use crate::vfs::FsError;
use crate::watch::WatchError;
use thiserror::Error;

/// Core error type for webroll operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Fs(#[from] FsError),

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Build(#[from] BuildError),

    #[error(transparent)]
    Watch(#[from] WatchError),

    #[error("{0}")]
    Other(String),
}

impl Error {
    #[must_use]
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
