use std::path::{Path, PathBuf};

use crate::error::{CacheError, Result};

/// Configuration for selecting the on-disk cache root.
#[derive(Clone, Debug, Default)]
pub struct CacheConfig {
    /// Use this directory instead of `~/.vintage/cache`.
    pub root_override: Option<PathBuf>,
}

impl CacheConfig {
    pub fn from_env() -> Self {
        Self {
            root_override: std::env::var_os("VINTAGE_CACHE_DIR").map(PathBuf::from),
        }
    }

    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root_override: Some(root.into()),
        }
    }
}

/// The cache root and its three fixed subdirectories.
#[derive(Clone, Debug)]
pub struct CacheDir {
    root: PathBuf,
}

impl CacheDir {
    pub fn new(config: CacheConfig) -> Result<Self> {
        let root = match config.root_override {
            Some(root) => root,
            None => default_cache_root()?,
        };

        let dir = Self { root };
        std::fs::create_dir_all(dir.artifacts_dir())?;
        std::fs::create_dir_all(dir.results_dir())?;
        std::fs::create_dir_all(dir.tmp_dir())?;
        Ok(dir)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `artifacts/<package>/<version>/`: extracted source trees.
    pub fn artifacts_dir(&self) -> PathBuf {
        self.root.join("artifacts")
    }

    /// `results/<package>/<version>.json`: persisted aggregates.
    pub fn results_dir(&self) -> PathBuf {
        self.root.join("results")
    }

    /// Scratch downloads.
    pub fn tmp_dir(&self) -> PathBuf {
        self.root.join("tmp")
    }
}

pub(crate) fn default_cache_root() -> Result<PathBuf> {
    let home = std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .map(PathBuf::from)
        .ok_or(CacheError::MissingHomeDir)?;

    Ok(home.join(".vintage").join("cache"))
}

/// Reject anything that is not exactly one normal path component.
pub(crate) fn key_component<'a>(what: &'static str, value: &'a str) -> Result<&'a str> {
    let invalid = value.is_empty()
        || value == "."
        || value == ".."
        || value.contains(['/', '\\', '\0'])
        || (cfg!(windows) && value.contains(':'));
    if invalid {
        return Err(CacheError::InvalidKey {
            what,
            value: value.to_owned(),
        });
    }
    Ok(value)
}
