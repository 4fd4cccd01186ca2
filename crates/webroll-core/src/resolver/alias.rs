//! Static prefix aliases.

use super::{Resolution, ResolveError, Resolver, Specifier};
use async_trait::async_trait;
use tracing::debug;

/// Rewrites specifiers that equal, or start with `key + "/"`, an alias key.
///
/// Keys are checked in insertion order; the first match wins. The rewritten
/// specifier continues through the rest of the chain.
#[derive(Debug, Clone, Default)]
pub struct AliasResolver {
    aliases: Vec<(String, String)>,
}

impl AliasResolver {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an alias. Empty keys are ignored.
    #[must_use]
    pub fn alias(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        let from = from.into();
        if !from.is_empty() {
            self.aliases.push((from, to.into()));
        }
        self
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.aliases.is_empty()
    }

    /// Apply the first matching alias.
    #[must_use]
    pub fn rewrite(&self, specifier: &str) -> Option<String> {
        for (from, to) in &self.aliases {
            if specifier == from {
                return Some(to.clone());
            }
            if let Some(rest) = specifier.strip_prefix(from.as_str()) {
                if rest.starts_with('/') {
                    return Some(format!("{to}{rest}"));
                }
            }
        }
        None
    }
}

impl<K, V> FromIterator<(K, V)> for AliasResolver
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        iter.into_iter()
            .fold(Self::new(), |acc, (from, to)| acc.alias(from, to))
    }
}

#[async_trait]
impl Resolver for AliasResolver {
    fn name(&self) -> &str {
        "alias"
    }

    async fn resolve(&self, specifier: &Specifier) -> Result<Resolution, ResolveError> {
        match self.rewrite(specifier.raw()) {
            Some(rewritten) => {
                debug!(specifier = %specifier.raw(), rewritten = %rewritten, "Applied alias");
                Ok(Resolution::Redirect(rewritten))
            }
            None => Ok(Resolution::Unresolved),
        }
    }
}
