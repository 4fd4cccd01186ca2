//! Module resolution over the virtual filesystem.
//!
//! Resolvers share one capability interface ([`Resolver`]): map a
//! [`Specifier`] to a [`Resolution`], and load the content behind a
//! [`ResolvedLocation`]. The [`ResolverChain`] composes them under a fixed
//! priority:
//!
//! 1. [`AliasResolver`]: static prefix rewrites
//! 2. [`RemoteResolver`]: `http(s)://` specifiers and everything imported
//!    from a remote module
//! 3. [`LocalPathResolver`]: relative, absolute and entry-point specifiers
//! 4. [`PackageResolver`]: bare specifiers via upward `node_modules` search
//!
//! Anything no resolver claims is external.

mod alias;
mod chain;
mod local;
mod package;
mod remote;

pub use alias::AliasResolver;
pub use chain::ResolverChain;
pub use local::{LocalPathResolver, DEFAULT_EXTENSIONS};
pub use package::{PackageDescriptor, PackageResolver};
pub use remote::{is_remote_url, FetchError, Fetcher, HttpFetcher, RemoteResolver};

use crate::vfs::{path, FsError};
use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

/// Namespace partitioning resolved locations by backing mechanism.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Namespace {
    /// Backed by the abstracted filesystem.
    Local,
    /// Fetched over the network.
    Remote,
    /// Left un-inlined by the engine.
    External,
}

impl Namespace {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Remote => "remote",
            Self::External => "external",
        }
    }
}

impl std::fmt::Display for Namespace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A resolved module identity.
///
/// `path` is an absolute virtual path for local modules, a full URL for
/// remote modules, and the verbatim specifier for external ones.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ResolvedLocation {
    pub path: String,
    pub namespace: Namespace,
}

impl ResolvedLocation {
    #[must_use]
    pub fn local(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            namespace: Namespace::Local,
        }
    }

    #[must_use]
    pub fn remote(url: &url::Url) -> Self {
        Self {
            path: url.to_string(),
            namespace: Namespace::Remote,
        }
    }

    #[must_use]
    pub fn external(specifier: impl Into<String>) -> Self {
        Self {
            path: specifier.into(),
            namespace: Namespace::External,
        }
    }

    #[must_use]
    pub fn is_remote(&self) -> bool {
        self.namespace == Namespace::Remote
    }
}

impl std::fmt::Display for ResolvedLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.namespace, self.path)
    }
}

/// How a specifier is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecifierKind {
    /// A build entry point, relative to the workspace root.
    EntryPoint,
    /// `./x`, `../x`, `.` or `..`.
    Relative,
    /// `/x`, relative to the workspace root.
    Absolute,
    /// `http://...` or `https://...`.
    Url,
    /// Anything else: a package name, optionally with a subpath.
    Bare,
}

impl SpecifierKind {
    fn classify(raw: &str) -> Self {
        if is_remote_url(raw) {
            Self::Url
        } else if raw.starts_with('/') {
            Self::Absolute
        } else if raw == "."
            || raw == ".."
            || raw.starts_with("./")
            || raw.starts_with("../")
        {
            Self::Relative
        } else {
            Self::Bare
        }
    }
}

/// An import request: what is imported, from where.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Specifier {
    raw: String,
    importer: Option<ResolvedLocation>,
    kind: SpecifierKind,
}

impl Specifier {
    /// A build entry point.
    #[must_use]
    pub fn entry(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let kind = match SpecifierKind::classify(&raw) {
            SpecifierKind::Url => SpecifierKind::Url,
            _ => SpecifierKind::EntryPoint,
        };
        Self {
            raw,
            importer: None,
            kind,
        }
    }

    /// An import found inside `importer`.
    #[must_use]
    pub fn import(raw: impl Into<String>, importer: &ResolvedLocation) -> Self {
        let raw = raw.into();
        let kind = SpecifierKind::classify(&raw);
        Self {
            raw,
            importer: Some(importer.clone()),
            kind,
        }
    }

    /// The same request with a rewritten specifier string.
    ///
    /// Entry points stay entry points; imports are re-classified.
    #[must_use]
    pub fn with_raw(&self, raw: impl Into<String>) -> Self {
        match &self.importer {
            Some(importer) => Self::import(raw, importer),
            None => Self::entry(raw),
        }
    }

    #[must_use]
    pub fn raw(&self) -> &str {
        &self.raw
    }

    #[must_use]
    pub fn importer(&self) -> Option<&ResolvedLocation> {
        self.importer.as_ref()
    }

    #[must_use]
    pub fn kind(&self) -> SpecifierKind {
        self.kind
    }

    /// Whether the package resolver should look this up in `node_modules`.
    ///
    /// Entry points written as package names (including aliased entries
    /// rewritten to one) qualify too; the local resolver sees them first.
    #[must_use]
    pub fn is_package_request(&self) -> bool {
        match self.kind {
            SpecifierKind::Bare => true,
            SpecifierKind::EntryPoint => SpecifierKind::classify(&self.raw) == SpecifierKind::Bare,
            _ => false,
        }
    }

    /// Directory of a local importer.
    #[must_use]
    pub fn importer_dir(&self) -> Option<String> {
        self.importer
            .as_ref()
            .filter(|loc| loc.namespace == Namespace::Local)
            .map(|loc| path::parent(&loc.path))
    }
}

/// Outcome of a single resolver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Concrete location; ends the chain.
    Resolved(ResolvedLocation),
    /// Continue the chain with this specifier string instead.
    Redirect(String),
    /// Leave the import as-is in the output; ends the chain.
    External(String),
    /// Not handled by this resolver.
    Unresolved,
}

impl Resolution {
    /// The resolved location, if any.
    #[must_use]
    pub fn location(&self) -> Option<&ResolvedLocation> {
        match self {
            Self::Resolved(loc) => Some(loc),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_external(&self) -> bool {
        matches!(self, Self::External(_))
    }
}

/// How the engine should parse loaded content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Loader {
    Js,
    Jsx,
    Ts,
    Tsx,
    Json,
    Css,
    /// Engine default for unrecognized suffixes.
    Default,
}

impl Loader {
    /// Infer the loader from a path or URL path suffix.
    #[must_use]
    pub fn from_path(path: &str) -> Self {
        match path::extension(path) {
            Some("ts" | "mts" | "cts") => Self::Ts,
            Some("tsx") => Self::Tsx,
            Some("jsx") => Self::Jsx,
            Some("js" | "mjs" | "cjs") => Self::Js,
            Some("json") => Self::Json,
            Some("css") => Self::Css,
            _ => Self::Default,
        }
    }

    /// Whether the content is script source that can contain imports.
    #[must_use]
    pub fn is_script(&self) -> bool {
        matches!(
            self,
            Self::Js | Self::Jsx | Self::Ts | Self::Tsx | Self::Default
        )
    }
}

/// Content produced by a resolver's `load`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedModule {
    pub contents: String,
    pub loader: Loader,
}

/// Resolution error. Unmatched specifiers are not errors (they become
/// external); this covers malformed input only.
#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("Cannot resolve '{specifier}' against '{base}': {source}")]
    InvalidUrl {
        specifier: String,
        base: String,
        #[source]
        source: url::ParseError,
    },
}

/// Module load error.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("Failed to read file: {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: FsError,
    },

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("No resolver can load {0}")]
    NoLoader(String),
}

/// A unit of the resolver chain.
#[async_trait]
pub trait Resolver: Send + Sync {
    /// Name for logs and error messages.
    fn name(&self) -> &str;

    /// Map a specifier to a resolution.
    async fn resolve(&self, specifier: &Specifier) -> Result<Resolution, ResolveError>;

    /// Load a location this resolver owns.
    ///
    /// Return `None` to let the next resolver try.
    async fn load(&self, _location: &ResolvedLocation) -> Result<Option<LoadedModule>, LoadError> {
        Ok(None)
    }
}
