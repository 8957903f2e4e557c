use serde::{Serialize, Serializer};
use time::Date;
use vintage_core::{FeatureAggregate, VersionBucket};

use crate::ReferenceVersionTable;

/// A bucket whose language version was released after the package release
/// that supposedly uses it. Advisory only: usually a detector false positive
/// or a backport shim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Anomaly {
    pub bucket: VersionBucket,
    /// Sorted construct names found in the bucket.
    pub constructs: Vec<String>,
    #[serde(serialize_with = "serialize_date")]
    pub reference_date: Date,
    #[serde(serialize_with = "serialize_date")]
    pub upload_date: Date,
}

fn serialize_date<S: Serializer>(date: &Date, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(date)
}

pub fn validate(
    aggregate: &FeatureAggregate,
    upload_date: Date,
    table: &ReferenceVersionTable,
) -> Vec<Anomaly> {
    let mut anomalies = Vec::new();
    for (bucket, constructs) in aggregate.iter() {
        if constructs.is_empty() {
            continue;
        }
        let Some(reference_date) = table.release_date(bucket) else {
            tracing::debug!(
                target: "vintage.signature",
                bucket = %bucket,
                "bucket missing from reference table"
            );
            continue;
        };
        if reference_date > upload_date {
            anomalies.push(Anomaly {
                bucket,
                constructs: constructs.keys().cloned().collect(),
                reference_date,
                upload_date,
            });
        }
    }
    anomalies
}
