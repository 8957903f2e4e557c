use std::fs;
use std::io;
use std::path::PathBuf;

use vintage_archive::{Archive, ExtensionFilter};
use vintage_core::Release;

use crate::cache_dir::{key_component, CacheDir};
use crate::error::Result;
use crate::store::{sanitize_fetch_url, ArtifactStore, SchemeStore};
use crate::util::remove_dir_best_effort;

/// Extracted source trees keyed by (package, version).
///
/// A directory's existence is the only validity signal. It is published by
/// renaming a fully extracted staging directory, so an interrupted or failed
/// acquisition leaves nothing behind and the next run retries.
pub struct ArtifactCache {
    dir: CacheDir,
    filter: ExtensionFilter,
    store: Box<dyn ArtifactStore>,
}

impl ArtifactCache {
    pub fn new(dir: CacheDir, filter: ExtensionFilter) -> Self {
        Self {
            dir,
            filter,
            store: Box::new(SchemeStore::default()),
        }
    }

    /// Replace the default [`SchemeStore`], e.g. with one whose HTTP client
    /// carries the configured timeout and user agent.
    pub fn with_store(mut self, store: Box<dyn ArtifactStore>) -> Self {
        self.store = store;
        self
    }

    pub fn filter(&self) -> &ExtensionFilter {
        &self.filter
    }

    pub fn source_root(&self, package: &str, version: &str) -> Result<PathBuf> {
        Ok(self
            .dir
            .artifacts_dir()
            .join(key_component("package", package)?)
            .join(key_component("version", version)?))
    }

    pub fn acquire(&self, package: &str, release: &Release, force: bool) -> Result<PathBuf> {
        let dest = self.source_root(package, &release.version)?;

        if dest.is_dir() {
            if !force {
                tracing::debug!(
                    target: "vintage.cache",
                    package,
                    version = %release.version,
                    "artifact cache hit"
                );
                return Ok(dest);
            }
            match fs::remove_dir_all(&dest) {
                Ok(()) => {}
                Err(err) if err.kind() == io::ErrorKind::NotFound => {}
                Err(err) => return Err(err.into()),
            }
        }

        let tmp_dir = self.dir.tmp_dir();
        fs::create_dir_all(&tmp_dir)?;
        // Removed on drop, whatever happens below.
        let scratch = tempfile::Builder::new()
            .prefix("download-")
            .tempfile_in(&tmp_dir)?
            .into_temp_path();

        tracing::info!(
            target: "vintage.cache",
            package,
            version = %release.version,
            url = %sanitize_fetch_url(&release.url),
            "downloading artifact"
        );
        self.store.fetch(&release.url, &scratch)?;

        let Some(parent) = dest.parent() else {
            return Err(io::Error::other("artifact path has no parent").into());
        };
        fs::create_dir_all(parent)?;
        let staging = tempfile::Builder::new()
            .prefix(".staging-")
            .tempdir_in(parent)?;

        let written =
            Archive::new(scratch.to_path_buf()).extract_filtered(staging.path(), &self.filter)?;

        // Last writer wins against a concurrent run on the same key.
        if dest.exists() {
            remove_dir_best_effort(&dest, "acquire.replace_existing");
        }
        fs::rename(staging.path(), &dest)?;
        // `staging` now points at nothing; its drop is a no-op.
        drop(staging);

        tracing::info!(
            target: "vintage.cache",
            package,
            version = %release.version,
            files = written,
            "extracted artifact"
        );
        Ok(dest)
    }
}
