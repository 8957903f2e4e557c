use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::VersionBucket;

/// Per-version, per-construct occurrence counts for one release.
///
/// Invariants:
/// - every stored count is positive (zero entries are never materialized)
/// - no bucket maps to an empty construct table
/// - iteration is by ascending version bucket, then construct name
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureAggregate {
    buckets: BTreeMap<VersionBucket, BTreeMap<String, u64>>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AggregateError {
    #[error("bucket {bucket} has no constructs")]
    EmptyBucket { bucket: VersionBucket },
    #[error("construct {construct:?} in bucket {bucket} has a zero count")]
    ZeroCount {
        bucket: VersionBucket,
        construct: String,
    },
    #[error("construct counts overflow a 64-bit total")]
    CountOverflow,
}

impl FeatureAggregate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get-or-insert accessor for a bucket's construct table.
    ///
    /// Callers must add at least one positive count to a freshly inserted
    /// table; [`FeatureAggregate::add`] and [`FeatureAggregate::record`] do.
    fn bucket_mut(&mut self, bucket: VersionBucket) -> &mut BTreeMap<String, u64> {
        self.buckets.entry(bucket).or_default()
    }

    /// Count one occurrence of `construct` under `bucket`.
    pub fn record(&mut self, bucket: VersionBucket, construct: &str) {
        self.add(bucket, construct, 1);
    }

    /// Count `n` occurrences of `construct` under `bucket`. `n == 0` is a no-op.
    pub fn add(&mut self, bucket: VersionBucket, construct: &str, n: u64) {
        if n == 0 {
            return;
        }
        let table = self.bucket_mut(bucket);
        match table.get_mut(construct) {
            Some(count) => *count = count.saturating_add(n),
            None => {
                table.insert(construct.to_owned(), n);
            }
        }
    }

    /// Fold `other` into `self`. Commutative and associative, so per-file
    /// partial aggregates can be merged in any completion order.
    pub fn merge(&mut self, other: FeatureAggregate) {
        for (bucket, constructs) in other.buckets {
            for (construct, n) in constructs {
                self.add(bucket, &construct, n);
            }
        }
    }

    pub fn count(&self, bucket: VersionBucket, construct: &str) -> u64 {
        self.buckets
            .get(&bucket)
            .and_then(|table| table.get(construct))
            .copied()
            .unwrap_or(0)
    }

    pub fn bucket(&self, bucket: VersionBucket) -> Option<&BTreeMap<String, u64>> {
        self.buckets.get(&bucket)
    }

    pub fn bucket_total(&self, bucket: VersionBucket) -> u64 {
        self.buckets
            .get(&bucket)
            .map(|table| table.values().fold(0, |acc: u64, &n| acc.saturating_add(n)))
            .unwrap_or(0)
    }

    /// Total construct occurrences across all buckets, saturating.
    pub fn total(&self) -> u64 {
        self.buckets
            .values()
            .flat_map(|table| table.values())
            .fold(0, |acc: u64, &n| acc.saturating_add(n))
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    pub fn buckets(&self) -> impl Iterator<Item = VersionBucket> + '_ {
        self.buckets.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (VersionBucket, &BTreeMap<String, u64>)> + '_ {
        self.buckets.iter().map(|(bucket, table)| (*bucket, table))
    }

    /// The most frequent construct of each bucket. Ties go to the
    /// lexicographically smallest name.
    pub fn most_common_per_bucket(&self) -> BTreeMap<VersionBucket, (&str, u64)> {
        self.buckets
            .iter()
            .filter_map(|(bucket, table)| {
                table
                    .iter()
                    .fold(None, |best: Option<(&str, u64)>, (name, &n)| match best {
                        Some((_, best_n)) if best_n >= n => best,
                        _ => Some((name.as_str(), n)),
                    })
                    .map(|best| (*bucket, best))
            })
            .collect()
    }

    /// Check the structural invariants. Used when loading persisted aggregates.
    ///
    /// Counts built through [`FeatureAggregate::add`] saturate; a persisted
    /// entry whose grand total does not fit in a `u64` is rejected.
    pub fn validate(&self) -> Result<(), AggregateError> {
        let mut total = 0u64;
        for (bucket, table) in &self.buckets {
            if table.is_empty() {
                return Err(AggregateError::EmptyBucket { bucket: *bucket });
            }
            if let Some((construct, _)) = table.iter().find(|(_, n)| **n == 0) {
                return Err(AggregateError::ZeroCount {
                    bucket: *bucket,
                    construct: construct.clone(),
                });
            }
            for &n in table.values() {
                total = total.checked_add(n).ok_or(AggregateError::CountOverflow)?;
            }
        }
        Ok(())
    }
}
