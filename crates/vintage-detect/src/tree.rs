use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::time::Instant;

use rayon::prelude::*;
use vintage_archive::ExtensionFilter;
use vintage_core::panic_payload_to_str;
use walkdir::WalkDir;

use crate::detector::{Detector, DetectorError};
use crate::pool::{default_concurrency, DetectPool};

/// The detector's output for one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawReport {
    pub path: PathBuf,
    pub text: String,
}

/// A file the detector could not process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectionFailure {
    pub path: PathBuf,
    pub message: String,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Detection {
    pub reports: Vec<RawReport>,
    pub failures: Vec<DetectionFailure>,
}

#[derive(Debug, Clone)]
pub struct DetectOptions {
    /// Worker threads; `1` runs sequentially on the caller's thread.
    pub concurrency: usize,
    pub filter: ExtensionFilter,
}

impl Default for DetectOptions {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            filter: ExtensionFilter::new(["py", "pyw"]),
        }
    }
}

/// Source files under `root`, sorted. Symlinks are not followed and
/// unreadable entries are skipped.
pub fn source_files(root: &Path, filter: &ExtensionFilter) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root).follow_links(false) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                tracing::warn!(
                    target: "vintage.detect",
                    root = %root.display(),
                    error = %err,
                    "skipping unreadable entry"
                );
                continue;
            }
        };
        if entry.file_type().is_file() && filter.matches(entry.path()) {
            files.push(entry.into_path());
        }
    }
    files.sort();
    files
}

/// Run `detector` over every source file under `root`.
///
/// Per-file failures, including panics, become [`DetectionFailure`]s and
/// never stop the remaining files.
pub fn detect_tree<D: Detector + ?Sized>(
    root: &Path,
    detector: &D,
    options: &DetectOptions,
) -> Detection {
    let start = Instant::now();
    let files = source_files(root, &options.filter);

    let results: Vec<(PathBuf, Result<String, DetectorError>)> =
        match DetectPool::new(options.concurrency) {
            DetectPool::Rayon(pool) => pool.install(|| {
                files
                    .into_par_iter()
                    .map(|path| {
                        let result = detect_one(detector, &path);
                        (path, result)
                    })
                    .collect()
            }),
            DetectPool::Inline => files
                .into_iter()
                .map(|path| {
                    let result = detect_one(detector, &path);
                    (path, result)
                })
                .collect(),
        };

    let mut detection = Detection::default();
    for (path, result) in results {
        match result {
            Ok(text) => detection.reports.push(RawReport { path, text }),
            Err(err) => {
                tracing::error!(
                    target: "vintage.detect",
                    path = %path.display(),
                    error = %err,
                    "detector failed"
                );
                detection.failures.push(DetectionFailure {
                    path,
                    message: err.to_string(),
                });
            }
        }
    }

    tracing::debug!(
        target: "vintage.detect",
        root = %root.display(),
        files = detection.reports.len() + detection.failures.len(),
        failures = detection.failures.len(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "detection finished"
    );
    detection
}

fn detect_one<D: Detector + ?Sized>(detector: &D, path: &Path) -> Result<String, DetectorError> {
    match catch_unwind(AssertUnwindSafe(|| detector.detect(path))) {
        Ok(result) => result,
        Err(panic) => Err(DetectorError::Panicked(
            panic_payload_to_str(panic.as_ref()).to_owned(),
        )),
    }
}
