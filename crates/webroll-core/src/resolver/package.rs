//! Bare specifier resolution through `node_modules`.

use super::{LocalPathResolver, Resolution, ResolveError, ResolvedLocation, Resolver, Specifier};
use crate::vfs::path;
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;

/// The subset of `package.json` used for entry resolution.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PackageDescriptor {
    #[serde(default)]
    pub main: Option<String>,
    #[serde(default)]
    pub module: Option<String>,
}

impl PackageDescriptor {
    /// Entry field: `module` wins over `main`. Empty strings are ignored.
    #[must_use]
    pub fn entry(&self) -> Option<&str> {
        fn non_empty(field: Option<&String>) -> Option<&str> {
            field.map(String::as_str).filter(|v| !v.is_empty())
        }
        non_empty(self.module.as_ref()).or_else(|| non_empty(self.main.as_ref()))
    }
}

/// Resolves bare specifiers by walking up from the importer's directory.
///
/// At each level `<dir>/node_modules/<specifier>` is tried as a file, then
/// as a package directory (descriptor entry, then `index`) through the
/// [`LocalPathResolver`]. The walk ends at the filesystem root.
#[derive(Debug)]
pub struct PackageResolver {
    local: Arc<LocalPathResolver>,
}

impl PackageResolver {
    pub fn new(local: Arc<LocalPathResolver>) -> Self {
        Self { local }
    }

    /// Search `node_modules` directories from `importer_dir` upward.
    pub async fn resolve_package(&self, import_path: &str, importer_dir: &str) -> Option<String> {
        let mut current = path::normalize(importer_dir);
        loop {
            let candidate = path::join(&current, &format!("node_modules/{import_path}"));
            if let Some(found) = self.local.resolve_path(&candidate).await {
                return Some(found);
            }

            let parent = path::parent(&current);
            if parent == current {
                return None;
            }
            current = parent;
        }
    }
}

#[async_trait]
impl Resolver for PackageResolver {
    fn name(&self) -> &str {
        "package"
    }

    async fn resolve(&self, specifier: &Specifier) -> Result<Resolution, ResolveError> {
        if !specifier.is_package_request() {
            return Ok(Resolution::Unresolved);
        }

        let importer_dir = match specifier.importer() {
            None => self.local.workspace_root().to_string(),
            Some(_) => match specifier.importer_dir() {
                Some(dir) => dir,
                None => return Ok(Resolution::Unresolved),
            },
        };

        match self.resolve_package(specifier.raw(), &importer_dir).await {
            Some(found) => {
                debug!(specifier = %specifier.raw(), resolved = %found, "Resolved package");
                Ok(Resolution::Resolved(ResolvedLocation::local(found)))
            }
            None => Ok(Resolution::Unresolved),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vfs::MemoryFs;

    fn resolver(fs: MemoryFs) -> PackageResolver {
        PackageResolver::new(Arc::new(LocalPathResolver::new(Arc::new(fs), "/ws")))
    }

    #[test]
    fn test_descriptor_entry_precedence() {
        let both: PackageDescriptor =
            serde_json::from_str(r#"{"main":"a.js","module":"b.js"}"#).unwrap();
        assert_eq!(both.entry(), Some("b.js"));

        let main_only: PackageDescriptor = serde_json::from_str(r#"{"main":"a.js"}"#).unwrap();
        assert_eq!(main_only.entry(), Some("a.js"));

        let empty_module: PackageDescriptor =
            serde_json::from_str(r#"{"main":"a.js","module":""}"#).unwrap();
        assert_eq!(empty_module.entry(), Some("a.js"));

        assert_eq!(PackageDescriptor::default().entry(), None);
    }

    #[tokio::test]
    async fn test_module_field_preferred() {
        let fs = MemoryFs::new()
            .with_file(
                "/ws/node_modules/pkg/package.json",
                r#"{"main":"a.js","module":"b.js"}"#,
            )
            .with_file("/ws/node_modules/pkg/a.js", "cjs")
            .with_file("/ws/node_modules/pkg/b.js", "esm");
        let r = resolver(fs);

        assert_eq!(
            r.resolve_package("pkg", "/ws/src").await.as_deref(),
            Some("/ws/node_modules/pkg/b.js")
        );
    }

    #[tokio::test]
    async fn test_entry_without_extension_and_entry_directory() {
        let fs = MemoryFs::new()
            .with_file("/ws/node_modules/a/package.json", r#"{"main":"lib/main"}"#)
            .with_file("/ws/node_modules/a/lib/main.js", "x")
            .with_file("/ws/node_modules/b/package.json", r#"{"module":"dist"}"#)
            .with_file("/ws/node_modules/b/dist/index.mjs", "x");
        let r = resolver(fs);

        assert_eq!(
            r.resolve_package("a", "/ws").await.as_deref(),
            Some("/ws/node_modules/a/lib/main.js")
        );
        assert_eq!(
            r.resolve_package("b", "/ws").await.as_deref(),
            Some("/ws/node_modules/b/dist/index.mjs")
        );
    }

    #[tokio::test]
    async fn test_malformed_descriptor_falls_back_to_index() {
        let fs = MemoryFs::new()
            .with_file("/ws/node_modules/pkg/package.json", "{ not json")
            .with_file("/ws/node_modules/pkg/index.js", "x");
        let r = resolver(fs);

        assert_eq!(
            r.resolve_package("pkg", "/ws").await.as_deref(),
            Some("/ws/node_modules/pkg/index.js")
        );
    }

    #[tokio::test]
    async fn test_dangling_entry_falls_back_to_index() {
        let fs = MemoryFs::new()
            .with_file("/ws/node_modules/pkg/package.json", r#"{"main":"gone.js"}"#)
            .with_file("/ws/node_modules/pkg/index.ts", "x");
        let r = resolver(fs);

        assert_eq!(
            r.resolve_package("pkg", "/ws").await.as_deref(),
            Some("/ws/node_modules/pkg/index.ts")
        );
    }

    #[tokio::test]
    async fn test_upward_walk_prefers_nearest() {
        let fs = MemoryFs::new()
            .with_file("/node_modules/dep/index.js", "root")
            .with_file("/ws/node_modules/dep/index.js", "workspace")
            .with_file("/ws/packages/app/node_modules/dep/index.js", "nearest")
            .with_file("/ws/node_modules/only-top.js", "file");
        let r = resolver(fs);

        assert_eq!(
            r.resolve_package("dep", "/ws/packages/app/src").await.as_deref(),
            Some("/ws/packages/app/node_modules/dep/index.js")
        );
        assert_eq!(
            r.resolve_package("dep", "/ws/other").await.as_deref(),
            Some("/ws/node_modules/dep/index.js")
        );
        assert_eq!(
            r.resolve_package("dep", "/elsewhere").await.as_deref(),
            Some("/node_modules/dep/index.js")
        );
        assert_eq!(
            r.resolve_package("only-top", "/ws/packages/app").await.as_deref(),
            Some("/ws/node_modules/only-top.js")
        );
    }

    #[tokio::test]
    async fn test_subpath_and_missing() {
        let fs = MemoryFs::new()
            .with_file("/ws/node_modules/@scope/pkg/utils/fmt.ts", "x")
            .with_dir("/ws/node_modules/empty");
        let r = resolver(fs);

        assert_eq!(
            r.resolve_package("@scope/pkg/utils/fmt", "/ws").await.as_deref(),
            Some("/ws/node_modules/@scope/pkg/utils/fmt.ts")
        );
        assert_eq!(r.resolve_package("empty", "/ws").await, None);
        assert_eq!(r.resolve_package("nope", "/ws/a/b/c").await, None);
    }

    #[tokio::test]
    async fn test_only_bare_specifiers() {
        let fs = MemoryFs::new().with_file("/ws/node_modules/x/index.js", "x");
        let r = resolver(fs);
        let importer = ResolvedLocation::local("/ws/src/main.ts");

        let relative = r.resolve(&Specifier::import("./x", &importer)).await.unwrap();
        assert_eq!(relative, Resolution::Unresolved);

        let bare = r.resolve(&Specifier::import("x", &importer)).await.unwrap();
        assert_eq!(
            bare.location().map(|l| l.path.as_str()),
            Some("/ws/node_modules/x/index.js")
        );
    }

    #[tokio::test]
    async fn test_package_named_entry_walks_from_root() {
        let fs = MemoryFs::new().with_file("/ws/node_modules/x/index.js", "x");
        let r = resolver(fs);

        let entry = r.resolve(&Specifier::entry("x")).await.unwrap();
        assert_eq!(
            entry.location().map(|l| l.path.as_str()),
            Some("/ws/node_modules/x/index.js")
        );
    }
}
