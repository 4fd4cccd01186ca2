use crate::vfs::{path, FileSystem, FsError};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;
use tracing::{debug, info};

/// Default config file name, relative to the workspace root.
pub const DEFAULT_CONFIG_FILE: &str = "webroll.config.json";

/// Output module format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Esm,
    Cjs,
    Iife,
}

impl OutputFormat {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Esm => "esm",
            Self::Cjs => "cjs",
            Self::Iife => "iife",
        }
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "esm" | "es" | "module" => Ok(Self::Esm),
            "cjs" | "commonjs" => Ok(Self::Cjs),
            "iife" => Ok(Self::Iife),
            other => Err(format!("unknown output format '{other}' (expected esm, cjs or iife)")),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Host settings recognized by the core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Virtual path of the workspace root.
    pub workspace_root: String,
    /// Watch glob, relative to the workspace root.
    pub watch_glob: String,
    /// Build config file, relative to the workspace root.
    pub config_file: String,
    /// Entry point used when bootstrapping a config.
    pub default_entry: String,
    /// Output format used when bootstrapping a config.
    pub format: OutputFormat,
    /// Output directory used when bootstrapping a config.
    pub outdir: String,
    /// Minify flag used when bootstrapping a config.
    pub minify: bool,
    /// Ordered alias mapping (prefix → replacement).
    pub aliases: Vec<(String, String)>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            workspace_root: path::ROOT.to_string(),
            watch_glob: "**/*".to_string(),
            config_file: DEFAULT_CONFIG_FILE.to_string(),
            default_entry: "src/index.ts".to_string(),
            format: OutputFormat::default(),
            outdir: "dist".to_string(),
            minify: false,
            aliases: Vec::new(),
        }
    }
}

impl Settings {
    /// Set the workspace root.
    #[must_use]
    pub fn with_workspace_root(mut self, root: impl Into<String>) -> Self {
        self.workspace_root = path::normalize(&root.into());
        self
    }

    /// Set the watch glob.
    #[must_use]
    pub fn with_watch_glob(mut self, glob: impl Into<String>) -> Self {
        self.watch_glob = glob.into();
        self
    }

    /// Set the config file path.
    #[must_use]
    pub fn with_config_file(mut self, file: impl Into<String>) -> Self {
        self.config_file = file.into();
        self
    }

    /// Set the default entry point.
    #[must_use]
    pub fn with_default_entry(mut self, entry: impl Into<String>) -> Self {
        self.default_entry = entry.into();
        self
    }

    /// Set the default output format.
    #[must_use]
    pub fn with_format(mut self, format: OutputFormat) -> Self {
        self.format = format;
        self
    }

    /// Set the default output directory.
    #[must_use]
    pub fn with_outdir(mut self, outdir: impl Into<String>) -> Self {
        self.outdir = outdir.into();
        self
    }

    /// Set the default minify flag.
    #[must_use]
    pub fn with_minify(mut self, minify: bool) -> Self {
        self.minify = minify;
        self
    }

    /// Add an alias. Order is significant.
    #[must_use]
    pub fn with_alias(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.aliases.push((from.into(), to.into()));
        self
    }

    /// Absolute virtual path of the build config file.
    #[must_use]
    pub fn config_path(&self) -> String {
        path::join(&self.workspace_root, &self.config_file)
    }

    /// The configuration written on first run.
    #[must_use]
    pub fn default_build_config(&self) -> BuildConfig {
        BuildConfig {
            entry_points: vec![self.default_entry.clone()],
            bundle: true,
            outdir: self.outdir.clone(),
            minify: self.minify,
            format: self.format,
        }
    }
}

/// Persisted build configuration.
///
/// ```json
/// {"entryPoints": ["src/index.ts"], "bundle": true, "outdir": "dist", "minify": false, "format": "esm"}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BuildConfig {
    pub entry_points: Vec<String>,
    pub bundle: bool,
    pub outdir: String,
    pub minify: bool,
    pub format: OutputFormat,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Settings::default().default_build_config()
    }
}

/// A parsed config and the mtime of the file it came from.
#[derive(Debug, Clone)]
pub struct CachedConfig {
    pub config: Arc<BuildConfig>,
    pub mtime: u64,
}

/// Build config loading error.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Build config file path is not set")]
    PathNotSet,

    #[error("Failed to read config at {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: FsError,
    },

    #[error("Failed to parse config at {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to write default config at {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: FsError,
    },

    #[error("Failed to serialize default config: {0}")]
    Serialize(#[source] serde_json::Error),
}

/// Loads the build config through the filesystem with an mtime-checked cache.
///
/// A cached config is reused while the file's live mtime is not newer than
/// the cached one. A missing file is replaced by the default config, which is
/// written once and then used.
#[derive(Debug)]
pub struct ConfigStore {
    fs: Arc<dyn FileSystem>,
    path: String,
    defaults: BuildConfig,
    cache: Mutex<Option<CachedConfig>>,
}

impl ConfigStore {
    pub fn new(fs: Arc<dyn FileSystem>, path: impl Into<String>, defaults: BuildConfig) -> Self {
        Self {
            fs,
            path: path::normalize(&path.into()),
            defaults,
            cache: Mutex::new(None),
        }
    }

    /// Virtual path of the config file.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The cached entry, if any.
    #[must_use]
    pub fn cached(&self) -> Option<CachedConfig> {
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Load the config, using the cache when it is still fresh.
    pub async fn load(&self) -> Result<Arc<BuildConfig>, ConfigError> {
        let stat = match self.fs.stat(&self.path).await {
            Ok(stat) => stat,
            Err(e) if e.is_not_found() => return self.bootstrap().await,
            Err(source) => {
                return Err(ConfigError::Read {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        if let Some(cached) = self.cached() {
            if stat.mtime <= cached.mtime {
                debug!(path = %self.path, mtime = cached.mtime, "Using cached build config");
                return Ok(cached.config);
            }
        }

        let text = self
            .fs
            .read_text(&self.path)
            .await
            .map_err(|source| ConfigError::Read {
                path: self.path.clone(),
                source,
            })?;
        let config: BuildConfig =
            serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
                path: self.path.clone(),
                source,
            })?;

        debug!(path = %self.path, mtime = stat.mtime, "Loaded build config");
        Ok(self.store(config, stat.mtime))
    }

    async fn bootstrap(&self) -> Result<Arc<BuildConfig>, ConfigError> {
        let config = self.defaults.clone();
        let text = serde_json::to_string_pretty(&config).map_err(ConfigError::Serialize)?;
        self.fs
            .write_file(&self.path, &self.fs.encode(&text))
            .await
            .map_err(|source| ConfigError::Write {
                path: self.path.clone(),
                source,
            })?;
        info!(path = %self.path, "Wrote default build config");

        let mtime = self.fs.stat(&self.path).await.map_or(0, |s| s.mtime);
        Ok(self.store(config, mtime))
    }

    fn store(&self, config: BuildConfig, mtime: u64) -> Arc<BuildConfig> {
        let config = Arc::new(config);
        *self.cache.lock().unwrap_or_else(PoisonError::into_inner) = Some(CachedConfig {
            config: Arc::clone(&config),
            mtime,
        });
        config
    }
}
