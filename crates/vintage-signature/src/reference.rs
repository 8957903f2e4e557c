use std::collections::{BTreeMap, BTreeSet};

use time::macros::date;
use time::Date;
use vintage_core::VersionBucket;

/// Release dates of language versions, keyed by bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceVersionTable {
    dates: BTreeMap<VersionBucket, Date>,
}

impl ReferenceVersionTable {
    pub fn new(dates: impl IntoIterator<Item = (VersionBucket, Date)>) -> Self {
        Self {
            dates: dates.into_iter().collect(),
        }
    }

    /// CPython final release dates, 2.0 through 3.13.
    pub fn python() -> Self {
        Self::new([
            (VersionBucket::new(2, 0), date!(2000 - 10 - 16)),
            (VersionBucket::new(2, 1), date!(2001 - 04 - 15)),
            (VersionBucket::new(2, 2), date!(2001 - 12 - 21)),
            (VersionBucket::new(2, 3), date!(2003 - 06 - 29)),
            (VersionBucket::new(2, 4), date!(2004 - 11 - 30)),
            (VersionBucket::new(2, 5), date!(2006 - 09 - 19)),
            (VersionBucket::new(2, 6), date!(2008 - 10 - 01)),
            (VersionBucket::new(2, 7), date!(2010 - 07 - 03)),
            (VersionBucket::new(3, 0), date!(2008 - 12 - 03)),
            (VersionBucket::new(3, 1), date!(2009 - 06 - 27)),
            (VersionBucket::new(3, 2), date!(2011 - 02 - 20)),
            (VersionBucket::new(3, 3), date!(2012 - 09 - 29)),
            (VersionBucket::new(3, 4), date!(2014 - 03 - 16)),
            (VersionBucket::new(3, 5), date!(2015 - 09 - 13)),
            (VersionBucket::new(3, 6), date!(2016 - 12 - 23)),
            (VersionBucket::new(3, 7), date!(2018 - 06 - 27)),
            (VersionBucket::new(3, 8), date!(2019 - 10 - 14)),
            (VersionBucket::new(3, 9), date!(2020 - 10 - 05)),
            (VersionBucket::new(3, 10), date!(2021 - 10 - 04)),
            (VersionBucket::new(3, 11), date!(2022 - 10 - 24)),
            (VersionBucket::new(3, 12), date!(2023 - 10 - 02)),
            (VersionBucket::new(3, 13), date!(2024 - 10 - 07)),
        ])
    }

    pub fn release_date(&self, bucket: VersionBucket) -> Option<Date> {
        self.dates.get(&bucket).copied()
    }

    /// Buckets released on or before `date`.
    pub fn released_by(&self, date: Date) -> BTreeSet<VersionBucket> {
        self.dates
            .iter()
            .filter(|(_, released)| **released <= date)
            .map(|(bucket, _)| *bucket)
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (VersionBucket, Date)> + '_ {
        self.dates.iter().map(|(bucket, date)| (*bucket, *date))
    }
}
