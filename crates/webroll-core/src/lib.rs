#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::return_self_not_must_use)]

//! Module resolution and build orchestration over an abstract filesystem.

pub mod build;
pub mod config;
pub mod diagnostics;
pub mod engine;
pub mod error;
pub mod resolver;
pub mod session;
pub mod vfs;
pub mod watch;

pub use build::{BuildError, BuildOrchestrator, BuildReport, BuildState};
pub use config::{BuildConfig, ConfigError, ConfigStore, OutputFormat, Settings};
pub use diagnostics::{BufferSink, DiagnosticSink, TracingSink};
pub use engine::{BuildOptions, BuildOutput, BundleEngine, EngineError, GraphEngine, OutputFile};
pub use error::{Error, Result};
pub use resolver::{Resolution, ResolvedLocation, Resolver, ResolverChain, Specifier};
pub use session::{Session, SessionBuilder};
pub use vfs::{FileSystem, FsError, FsEvent, FsEventKind, MemoryFs, WatchStream};
pub use watch::{DebouncePolicy, WatchController, WatchError};

/// The current version, read from Cargo.toml at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
