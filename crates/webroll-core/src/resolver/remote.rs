//! Remote (`http`/`https`) module resolution.
//!
//! Specifiers with an http(s) scheme enter the remote namespace. Every import
//! found inside a remote module is resolved URL-relative to that module and
//! stays remote, so transitive dependencies of a CDN module are never looked
//! up on the local filesystem.

use super::{
    LoadError, LoadedModule, Loader, Namespace, Resolution, ResolveError, ResolvedLocation,
    Resolver, Specifier,
};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;
use url::Url;

/// Whether a specifier names an http(s) URL.
#[must_use]
pub fn is_remote_url(specifier: &str) -> bool {
    let lower = specifier.get(..8).unwrap_or(specifier).to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// Remote fetch error. Never retried.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Failed to fetch {url}: status={status} {reason}")]
    Status {
        url: String,
        status: u16,
        reason: String,
    },

    #[error("Failed to fetch {url}: {message}")]
    Request { url: String, message: String },

    #[error("Invalid remote module URL '{url}': {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
}

/// Fetches remote module source.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &Url) -> Result<String, FetchError>;
}

/// [`Fetcher`] backed by `reqwest`.
#[derive(Debug, Clone, Default)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &Url) -> Result<String, FetchError> {
        let request_error = |e: reqwest::Error| FetchError::Request {
            url: url.to_string(),
            message: e.to_string(),
        };

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(request_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or("").to_string(),
            });
        }

        response.text().await.map_err(request_error)
    }
}

/// Resolves and loads modules in the remote namespace.
pub struct RemoteResolver {
    fetcher: Arc<dyn Fetcher>,
}

impl RemoteResolver {
    pub fn new(fetcher: Arc<dyn Fetcher>) -> Self {
        Self { fetcher }
    }
}

impl std::fmt::Debug for RemoteResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteResolver").finish_non_exhaustive()
    }
}

#[async_trait]
impl Resolver for RemoteResolver {
    fn name(&self) -> &str {
        "remote"
    }

    async fn resolve(&self, specifier: &Specifier) -> Result<Resolution, ResolveError> {
        let raw = specifier.raw();

        if let Some(importer) = specifier.importer().filter(|i| i.is_remote()) {
            let invalid = |source| ResolveError::InvalidUrl {
                specifier: raw.to_string(),
                base: importer.path.clone(),
                source,
            };
            let base = Url::parse(&importer.path).map_err(invalid)?;
            let url = base.join(raw).map_err(invalid)?;
            debug!(specifier = %raw, importer = %importer.path, url = %url, "Resolved remote continuation");
            return Ok(Resolution::Resolved(ResolvedLocation::remote(&url)));
        }

        if is_remote_url(raw) {
            let url = Url::parse(raw).map_err(|source| ResolveError::InvalidUrl {
                specifier: raw.to_string(),
                base: String::new(),
                source,
            })?;
            return Ok(Resolution::Resolved(ResolvedLocation::remote(&url)));
        }

        Ok(Resolution::Unresolved)
    }

    async fn load(&self, location: &ResolvedLocation) -> Result<Option<LoadedModule>, LoadError> {
        if location.namespace != Namespace::Remote {
            return Ok(None);
        }
        let url = Url::parse(&location.path).map_err(|source| FetchError::InvalidUrl {
            url: location.path.clone(),
            source,
        })?;

        debug!(url = %url, "Fetching remote module");
        let contents = self.fetcher.fetch(&url).await?;
        Ok(Some(LoadedModule {
            contents,
            loader: Loader::from_path(url.path()),
        }))
    }
}
