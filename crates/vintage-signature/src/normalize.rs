use std::collections::BTreeMap;

use vintage_core::{FeatureAggregate, VersionBucket};

/// Per-bucket share of a release's constructs, scaled so the busiest bucket
/// is `1.0`.
pub type Signature = BTreeMap<VersionBucket, f64>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignatureError {
    #[error("aggregate has no constructs to normalize")]
    NoSignal,
}

/// Sum of construct counts per bucket, saturating.
pub fn bucket_totals(aggregate: &FeatureAggregate) -> BTreeMap<VersionBucket, u64> {
    aggregate
        .buckets()
        .map(|bucket| (bucket, aggregate.bucket_total(bucket)))
        .collect()
}

/// Peak normalization: every bucket total divided by the largest one.
pub fn normalize(aggregate: &FeatureAggregate) -> Result<Signature, SignatureError> {
    let totals = bucket_totals(aggregate);
    let peak = totals.values().copied().max().unwrap_or(0);
    if peak == 0 {
        return Err(SignatureError::NoSignal);
    }
    Ok(totals
        .into_iter()
        .map(|(bucket, total)| (bucket, total as f64 / peak as f64))
        .collect())
}
