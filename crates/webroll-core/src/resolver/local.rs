//! Relative and absolute specifier resolution.

use super::{
    LoadError, LoadedModule, Loader, Namespace, PackageDescriptor, Resolution, ResolveError,
    ResolvedLocation, Resolver, Specifier, SpecifierKind,
};
use crate::vfs::{path, FileSystem};
use async_trait::async_trait;
use futures::future::join_all;
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Extensions probed after the exact path, in priority order.
pub const DEFAULT_EXTENSIONS: &[&str] = &[".ts", ".tsx", ".js", ".jsx", ".mjs", ".json"];

/// Resolves `./x`, `../x`, `/x` and entry points against the filesystem.
///
/// Probing order for a base path: the exact path, each extension in order,
/// then `<base>` as a directory (its `package.json` entry, then `index` with
/// the same suffixes).
#[derive(Debug)]
pub struct LocalPathResolver {
    fs: Arc<dyn FileSystem>,
    workspace_root: String,
    extensions: Vec<String>,
}

impl LocalPathResolver {
    /// Create a resolver rooted at `workspace_root`.
    pub fn new(fs: Arc<dyn FileSystem>, workspace_root: &str) -> Self {
        Self {
            fs,
            workspace_root: path::normalize(workspace_root),
            extensions: DEFAULT_EXTENSIONS.iter().map(|e| (*e).to_string()).collect(),
        }
    }

    /// Replace the probed extension list.
    #[must_use]
    pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extensions = extensions.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn workspace_root(&self) -> &str {
        &self.workspace_root
    }

    /// The unprobed path a specifier points at, if it is a local path form.
    ///
    /// Relative traversal is clamped at the workspace root.
    #[must_use]
    pub fn base_path(&self, specifier: &Specifier) -> Option<String> {
        let root = &self.workspace_root;
        match specifier.kind() {
            SpecifierKind::EntryPoint | SpecifierKind::Absolute => Some(path::normalize_within(
                root,
                &format!("{root}/{}", specifier.raw()),
            )),
            SpecifierKind::Relative => {
                let dir = match specifier.importer() {
                    None => root.clone(),
                    Some(importer) if importer.namespace == Namespace::Local => {
                        path::parent(&importer.path)
                    }
                    Some(_) => return None,
                };
                Some(path::normalize_within(
                    root,
                    &format!("{dir}/{}", specifier.raw()),
                ))
            }
            SpecifierKind::Url | SpecifierKind::Bare => None,
        }
    }

    /// Resolve a base path as a file, then as a directory.
    pub async fn resolve_path(&self, base: &str) -> Option<String> {
        if let Some(found) = self.resolve_file(base).await {
            return Some(found);
        }
        self.resolve_directory(base).await
    }

    /// Resolve a directory: descriptor entry first, then `index`.
    ///
    /// An entry that names a directory gets one more descriptor lookup of
    /// its own before its `index`.
    pub async fn resolve_directory(&self, dir: &str) -> Option<String> {
        if !self.fs.is_dir(dir).await {
            return None;
        }

        if let Some(target) = self.descriptor_target(dir).await {
            if let Some(found) = self.resolve_file(&target).await {
                return Some(found);
            }
            if let Some(inner) = self.descriptor_target(&target).await {
                if let Some(found) = self.resolve_file(&inner).await {
                    return Some(found);
                }
                if let Some(found) = self.resolve_index(&inner).await {
                    return Some(found);
                }
            }
            if let Some(found) = self.resolve_index(&target).await {
                return Some(found);
            }
            debug!(dir = %dir, entry = %target, "Descriptor entry did not resolve, trying index");
        }

        self.resolve_index(dir).await
    }

    /// Path named by `<dir>/package.json`, kept inside the workspace root
    /// when `dir` is.
    async fn descriptor_target(&self, dir: &str) -> Option<String> {
        let descriptor = self.read_descriptor(dir).await?;
        let entry = descriptor.entry()?;
        Some(path::normalize_within(
            &self.workspace_root,
            &format!("{dir}/{entry}"),
        ))
    }

    /// Read `<dir>/package.json`. Missing, unreadable or malformed
    /// descriptors are all treated as absent.
    pub async fn read_descriptor(&self, dir: &str) -> Option<PackageDescriptor> {
        let descriptor_path = path::join(dir, "package.json");
        if !self.fs.is_file(&descriptor_path).await {
            return None;
        }

        let text = match self.fs.read_text(&descriptor_path).await {
            Ok(text) => text,
            Err(e) => {
                warn!(path = %descriptor_path, error = %e, "Unreadable package.json, ignoring");
                return None;
            }
        };

        match serde_json::from_str(&text) {
            Ok(descriptor) => Some(descriptor),
            Err(e) => {
                warn!(path = %descriptor_path, error = %e, "Malformed package.json, ignoring");
                None
            }
        }
    }

    /// Probe `base` and `base + ext` for each extension.
    ///
    /// Probes run concurrently; the winner is the first candidate in
    /// priority order that is a file.
    pub async fn resolve_file(&self, base: &str) -> Option<String> {
        let candidates = self.candidates(base);
        let probes = candidates.iter().map(|c| self.fs.is_file(c));
        let hits = join_all(probes).await;

        let found = candidates
            .into_iter()
            .zip(hits)
            .find_map(|(candidate, hit)| hit.then_some(candidate));
        trace!(base = %base, found = ?found, "Probed file candidates");
        found
    }

    /// Resolve `<dir>/index` with extension probing, if `dir` is a directory.
    pub async fn resolve_index(&self, dir: &str) -> Option<String> {
        if !self.fs.is_dir(dir).await {
            return None;
        }
        self.resolve_file(&path::join(dir, "index")).await
    }

    fn candidates(&self, base: &str) -> Vec<String> {
        let mut out = Vec::with_capacity(self.extensions.len() + 1);
        out.push(base.to_string());
        for ext in &self.extensions {
            out.push(format!("{base}{ext}"));
        }
        out
    }
}

#[async_trait]
impl Resolver for LocalPathResolver {
    fn name(&self) -> &str {
        "local-path"
    }

    async fn resolve(&self, specifier: &Specifier) -> Result<Resolution, ResolveError> {
        let Some(base) = self.base_path(specifier) else {
            return Ok(Resolution::Unresolved);
        };

        match self.resolve_path(&base).await {
            Some(found) => {
                debug!(specifier = %specifier.raw(), resolved = %found, "Resolved local path");
                Ok(Resolution::Resolved(ResolvedLocation::local(found)))
            }
            None => {
                debug!(specifier = %specifier.raw(), base = %base, "No local candidate matched");
                Ok(Resolution::Unresolved)
            }
        }
    }

    async fn load(&self, location: &ResolvedLocation) -> Result<Option<LoadedModule>, LoadError> {
        if location.namespace != Namespace::Local {
            return Ok(None);
        }
        let contents = self
            .fs
            .read_text(&location.path)
            .await
            .map_err(|source| LoadError::Read {
                path: location.path.clone(),
                source,
            })?;
        Ok(Some(LoadedModule {
            contents,
            loader: Loader::from_path(&location.path),
        }))
    }
}
