//! Fixed-priority resolver composition.

use super::{
    AliasResolver, Fetcher, LoadError, LoadedModule, LocalPathResolver, PackageResolver,
    RemoteResolver, Resolution, ResolveError, ResolvedLocation, Resolver, Specifier,
};
use crate::vfs::FileSystem;
use std::sync::Arc;
use tracing::{debug, trace};

/// An ordered list of resolvers exposing one resolve/load contract.
///
/// `resolve` walks the list in order. `Resolved` and `External` end the walk;
/// `Redirect` replaces the specifier for the resolvers that follow;
/// `Unresolved` moves on. A specifier nobody claims is external.
#[derive(Default)]
pub struct ResolverChain {
    resolvers: Vec<Arc<dyn Resolver>>,
}

impl ResolverChain {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The standard chain: alias → remote → local path → package.
    pub fn standard(
        fs: Arc<dyn FileSystem>,
        workspace_root: &str,
        aliases: AliasResolver,
        fetcher: Arc<dyn Fetcher>,
    ) -> Self {
        let local = Arc::new(LocalPathResolver::new(fs, workspace_root));
        let package = PackageResolver::new(Arc::clone(&local));

        let mut chain = Self::new();
        if !aliases.is_empty() {
            chain = chain.with(aliases);
        }
        chain
            .with(RemoteResolver::new(fetcher))
            .with_shared(local)
            .with(package)
    }

    /// Append a resolver.
    #[must_use]
    pub fn with(self, resolver: impl Resolver + 'static) -> Self {
        self.with_shared(Arc::new(resolver))
    }

    /// Append a shared resolver.
    #[must_use]
    pub fn with_shared(mut self, resolver: Arc<dyn Resolver>) -> Self {
        self.resolvers.push(resolver);
        self
    }

    /// Resolver names in priority order.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.resolvers.iter().map(|r| r.name()).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.resolvers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.resolvers.is_empty()
    }

    /// Resolve a specifier. Returns `Resolved` or `External`, never
    /// `Redirect` or `Unresolved`.
    pub async fn resolve(&self, specifier: &Specifier) -> Result<Resolution, ResolveError> {
        let mut current = specifier.clone();
        for resolver in &self.resolvers {
            match resolver.resolve(&current).await? {
                Resolution::Resolved(location) => {
                    trace!(resolver = resolver.name(), location = %location, "Resolved");
                    return Ok(Resolution::Resolved(location));
                }
                Resolution::External(raw) => return Ok(Resolution::External(raw)),
                Resolution::Redirect(raw) => current = current.with_raw(raw),
                Resolution::Unresolved => {}
            }
        }

        debug!(
            specifier = %current.raw(),
            importer = ?current.importer().map(|i| i.path.as_str()),
            "Unresolved, marking external"
        );
        Ok(Resolution::External(current.raw().to_string()))
    }

    /// Load a resolved location through the first resolver that owns it.
    pub async fn load(&self, location: &ResolvedLocation) -> Result<LoadedModule, LoadError> {
        for resolver in &self.resolvers {
            if let Some(module) = resolver.load(location).await? {
                return Ok(module);
            }
        }
        Err(LoadError::NoLoader(location.to_string()))
    }
}

impl std::fmt::Debug for ResolverChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolverChain")
            .field("resolvers", &self.names())
            .finish()
    }
}
