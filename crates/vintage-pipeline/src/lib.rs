//! Orchestration: packages → releases → artifacts → detection → aggregate →
//! signature, with failures isolated per release and per package.

mod report;

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

use vintage_cache::{ArtifactCache, CacheError, ResultCache};
use vintage_core::{panic_payload_to_str, FeatureAggregate, Release, ReleaseSelection};
use vintage_detect::{aggregate, DetectOptions, Detector};
use vintage_registry::{Registry, RegistryError};
use vintage_signature::{normalize, validate, ReferenceVersionTable};

pub use report::{BatchReport, PackageOutcome, PackageReport, ReleaseOutcome, ReleaseReport};

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Discard extracted artifacts and download again.
    pub redownload: bool,
    /// Ignore cached aggregates and detect again.
    pub recompute: bool,
    pub detect: DetectOptions,
    /// Warn when a package yields fewer signatures than this.
    pub min_releases: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            redownload: false,
            recompute: false,
            detect: DetectOptions::default(),
            min_releases: 2,
        }
    }
}

pub struct Pipeline {
    config: PipelineConfig,
    registry: Box<dyn Registry>,
    artifacts: ArtifactCache,
    results: ResultCache,
    detector: Arc<dyn Detector>,
    reference: ReferenceVersionTable,
}

impl Pipeline {
    pub fn new(
        config: PipelineConfig,
        registry: Box<dyn Registry>,
        artifacts: ArtifactCache,
        results: ResultCache,
        detector: Arc<dyn Detector>,
        reference: ReferenceVersionTable,
    ) -> Self {
        Self {
            config,
            registry,
            artifacts,
            results,
            detector,
            reference,
        }
    }

    /// Analyze every package; a failing package never stops the others.
    pub fn run_batch<S: AsRef<str>>(
        &self,
        names: &[S],
        selection: &ReleaseSelection,
    ) -> BatchReport {
        let mut batch = BatchReport::default();
        for name in names {
            let name = name.as_ref();
            match self.run_package(name, selection) {
                Ok(report) => batch.packages.push(PackageOutcome::Analyzed(report)),
                Err(err) => {
                    tracing::error!(
                        target: "vintage.pipeline",
                        package = name,
                        error = %err,
                        "package failed"
                    );
                    batch.packages.push(PackageOutcome::Failed {
                        package: name.to_owned(),
                        reason: err.to_string(),
                    });
                }
            }
        }
        batch
    }

    /// Analyze the selected releases of one package. Only a registry
    /// failure is an error; release problems are recorded in the report.
    pub fn run_package(
        &self,
        name: &str,
        selection: &ReleaseSelection,
    ) -> Result<PackageReport, PipelineError> {
        let package = self.registry.fetch_package(name)?;
        let selected: Vec<&Release> = package.select(selection).collect();
        tracing::info!(
            target: "vintage.pipeline",
            package = %package.name,
            releases = package.releases.len(),
            selected = selected.len(),
            "analyzing package"
        );

        let mut report = PackageReport {
            package: package.name.clone(),
            releases: Vec::with_capacity(selected.len()),
            warnings: Vec::new(),
        };

        for release in selected {
            let outcome = self.analyze_release(&package.name, release);
            match &outcome {
                ReleaseOutcome::NoSignal => {
                    report
                        .warnings
                        .push(format!("{}: no version-specific constructs", release.version));
                }
                ReleaseOutcome::Failed { reason } => {
                    report
                        .warnings
                        .push(format!("{}: skipped: {reason}", release.version));
                }
                ReleaseOutcome::Signature { .. } => {}
            }
            report.releases.push(ReleaseReport {
                version: release.version.clone(),
                upload_date: release.upload_date(),
                outcome,
            });
        }

        let signatures = report.signatures();
        if signatures < self.config.min_releases {
            tracing::warn!(
                target: "vintage.pipeline",
                package = %package.name,
                signatures,
                min_releases = self.config.min_releases,
                "too few releases with a signature"
            );
            report.warnings.push(format!(
                "only {signatures} release(s) produced a signature (minimum {})",
                self.config.min_releases
            ));
        }

        Ok(report)
    }

    fn analyze_release(&self, package: &str, release: &Release) -> ReleaseOutcome {
        let start = Instant::now();
        let aggregate = match self.release_aggregate(package, release) {
            Ok(aggregate) => aggregate,
            Err(err) => {
                tracing::warn!(
                    target: "vintage.pipeline",
                    package,
                    version = %release.version,
                    error = %err,
                    "failed to acquire release"
                );
                return ReleaseOutcome::Failed {
                    reason: err.to_string(),
                };
            }
        };

        let total_constructs = aggregate.total();
        let outcome = match normalize(&aggregate) {
            Ok(signature) if total_constructs > 0 => {
                let anomalies = validate(&aggregate, release.upload_date(), &self.reference);
                for anomaly in &anomalies {
                    tracing::warn!(
                        target: "vintage.pipeline",
                        package,
                        version = %release.version,
                        bucket = %anomaly.bucket,
                        reference_date = %anomaly.reference_date,
                        constructs = ?anomaly.constructs,
                        "construct predates its language version"
                    );
                }
                ReleaseOutcome::Signature {
                    signature,
                    total_constructs,
                    anomalies,
                }
            }
            _ => {
                tracing::warn!(
                    target: "vintage.pipeline",
                    package,
                    version = %release.version,
                    "release has no version-specific constructs"
                );
                ReleaseOutcome::NoSignal
            }
        };

        tracing::debug!(
            target: "vintage.pipeline",
            package,
            version = %release.version,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "release analyzed"
        );
        outcome
    }

    fn release_aggregate(
        &self,
        package: &str,
        release: &Release,
    ) -> Result<FeatureAggregate, CacheError> {
        if !self.config.recompute {
            if let Some(aggregate) = self.results.load(package, &release.version) {
                return Ok(aggregate);
            }
        }

        let root = self
            .artifacts
            .acquire(package, release, self.config.redownload)?;

        let detected = catch_unwind(AssertUnwindSafe(|| {
            let detection = self.detector.detect_all(&root, &self.config.detect);
            if !detection.failures.is_empty() {
                tracing::warn!(
                    target: "vintage.pipeline",
                    package,
                    version = %release.version,
                    failed = detection.failures.len(),
                    analyzed = detection.reports.len(),
                    "some files could not be analyzed"
                );
            }
            aggregate(&detection.reports)
        }));
        let aggregate = match detected {
            Ok(aggregate) => aggregate,
            Err(panic) => {
                tracing::error!(
                    target: "vintage.pipeline",
                    package,
                    version = %release.version,
                    panic = %panic_payload_to_str(panic.as_ref()),
                    "detection panicked; recording an empty aggregate"
                );
                FeatureAggregate::new()
            }
        };

        // The aggregate is still usable when it cannot be persisted.
        if let Err(err) = self.results.store(package, &release.version, &aggregate) {
            tracing::warn!(
                target: "vintage.pipeline",
                package,
                version = %release.version,
                error = %err,
                "failed to store result cache entry"
            );
        }
        Ok(aggregate)
    }
}
