use rayon::prelude::*;
use vintage_core::{FeatureAggregate, VersionBucket};

use crate::parse::{parse_report_line, ReportLine};
use crate::tree::RawReport;

/// Credit one detected construct to its version buckets.
///
/// The legacy-track bucket is always credited when present. The major-track
/// bucket is credited too, except when it is the origin of the major track
/// and a legacy bucket was already credited, or when both tracks name the
/// same bucket. Returns `false` when neither track constrains the construct.
pub fn credit(
    aggregate: &mut FeatureAggregate,
    construct: &str,
    legacy: Option<VersionBucket>,
    major: Option<VersionBucket>,
) -> bool {
    if let Some(legacy) = legacy {
        aggregate.record(legacy, construct);
    }
    if let Some(major) = major {
        let reachable_from_legacy =
            legacy.is_some() && major == VersionBucket::MAJOR_TRACK_ORIGIN;
        if !reachable_from_legacy && legacy != Some(major) {
            aggregate.record(major, construct);
        }
    }
    legacy.is_some() || major.is_some()
}

/// Aggregate a single file's report. Malformed lines are logged and skipped.
pub fn aggregate_report(report: &RawReport) -> FeatureAggregate {
    let mut aggregate = FeatureAggregate::new();
    for line in report.text.lines() {
        match parse_report_line(line) {
            Ok(ReportLine::Noise) => {}
            Ok(ReportLine::Feature {
                construct,
                legacy,
                major,
            }) => {
                if !credit(&mut aggregate, &construct, legacy, major) {
                    tracing::debug!(
                        target: "vintage.detect",
                        path = %report.path.display(),
                        construct = %construct,
                        "dropping unconstrained construct"
                    );
                }
            }
            Err(err) => {
                tracing::error!(
                    target: "vintage.detect",
                    path = %report.path.display(),
                    line = %line,
                    error = %err,
                    "malformed report line"
                );
            }
        }
    }
    aggregate
}

pub fn aggregate(reports: &[RawReport]) -> FeatureAggregate {
    let mut aggregate = FeatureAggregate::new();
    for report in reports {
        aggregate.merge(aggregate_report(report));
    }
    aggregate
}

/// Same result as [`aggregate`]; per-file partials are merged in whatever
/// order they complete.
pub fn aggregate_parallel(reports: &[RawReport]) -> FeatureAggregate {
    reports
        .par_iter()
        .map(aggregate_report)
        .reduce(FeatureAggregate::new, |mut left, right| {
            left.merge(right);
            left
        })
}
