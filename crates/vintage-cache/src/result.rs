use std::fs;
use std::io;
use std::path::PathBuf;

use vintage_core::FeatureAggregate;

use crate::cache_dir::{key_component, CacheDir};
use crate::error::Result;
use crate::util::atomic_write;

/// Persisted [`FeatureAggregate`]s, one JSON file per (package, version).
///
/// Entries are not content-addressed: anything that parses and passes
/// [`FeatureAggregate::validate`] is a hit. Anything else is a miss.
#[derive(Clone, Debug)]
pub struct ResultCache {
    dir: CacheDir,
}

impl ResultCache {
    pub fn new(dir: CacheDir) -> Self {
        Self { dir }
    }

    pub fn entry_path(&self, package: &str, version: &str) -> Result<PathBuf> {
        let file_name = format!("{}.json", key_component("version", version)?);
        Ok(self
            .dir
            .results_dir()
            .join(key_component("package", package)?)
            .join(file_name))
    }

    pub fn load(&self, package: &str, version: &str) -> Option<FeatureAggregate> {
        let path = match self.entry_path(package, version) {
            Ok(path) => path,
            Err(err) => {
                tracing::warn!(
                    target: "vintage.cache",
                    package,
                    version,
                    error = %err,
                    "invalid result cache key"
                );
                return None;
            }
        };

        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(err) => {
                if err.kind() != io::ErrorKind::NotFound {
                    tracing::warn!(
                        target: "vintage.cache",
                        path = %path.display(),
                        error = %err,
                        "failed to read result cache entry"
                    );
                }
                return None;
            }
        };

        let aggregate: FeatureAggregate = match serde_json::from_slice(&bytes) {
            Ok(aggregate) => aggregate,
            Err(err) => {
                tracing::warn!(
                    target: "vintage.cache",
                    path = %path.display(),
                    error = %err,
                    "ignoring unparseable result cache entry"
                );
                return None;
            }
        };

        if let Err(err) = aggregate.validate() {
            tracing::warn!(
                target: "vintage.cache",
                path = %path.display(),
                error = %err,
                "ignoring invalid result cache entry"
            );
            return None;
        }

        tracing::debug!(target: "vintage.cache", package, version, "result cache hit");
        Some(aggregate)
    }

    /// Overwrite the entry. Empty aggregates are stored too; they mark a
    /// release whose detection yielded nothing.
    pub fn store(&self, package: &str, version: &str, aggregate: &FeatureAggregate) -> Result<()> {
        let path = self.entry_path(package, version)?;
        let mut bytes = serde_json::to_vec_pretty(aggregate)?;
        bytes.push(b'\n');
        atomic_write(&path, &bytes)
    }
}
