use std::fmt;
use std::str::FromStr;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A canonical `major.minor` language version used as an aggregation key.
///
/// Ordering is numeric (`3.9 < 3.10`), which is also the iteration order of
/// every map keyed by buckets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VersionBucket {
    pub major: u16,
    pub minor: u16,
}

impl VersionBucket {
    /// The earliest bucket of the major track. Constructs gated at this bucket
    /// are reachable from the very first release of that track.
    pub const MAJOR_TRACK_ORIGIN: VersionBucket = VersionBucket::new(3, 0);

    #[inline]
    pub const fn new(major: u16, minor: u16) -> Self {
        Self { major, minor }
    }
}

impl fmt::Display for VersionBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid version bucket {input:?}")]
pub struct ParseVersionError {
    pub input: String,
}

impl FromStr for VersionBucket {
    type Err = ParseVersionError;

    /// Accepts `3`, `3.8` and `3.8.1`; anything past the minor component is
    /// dropped.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseVersionError {
            input: s.to_owned(),
        };

        let mut parts = s.trim().split('.');
        let major = parts
            .next()
            .filter(|p| !p.is_empty() && p.bytes().all(|b| b.is_ascii_digit()))
            .ok_or_else(err)?
            .parse::<u16>()
            .map_err(|_| err())?;
        let minor = match parts.next() {
            None => 0,
            Some(p) if !p.is_empty() && p.bytes().all(|b| b.is_ascii_digit()) => {
                p.parse::<u16>().map_err(|_| err())?
            }
            Some(_) => return Err(err()),
        };
        for rest in parts {
            if rest.is_empty() || !rest.bytes().all(|b| b.is_ascii_digit()) {
                return Err(err());
            }
        }

        Ok(Self { major, minor })
    }
}

impl Serialize for VersionBucket {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for VersionBucket {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct BucketVisitor;

        impl Visitor<'_> for BucketVisitor {
            type Value = VersionBucket;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a `major.minor` version string")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
                v.parse().map_err(E::custom)
            }
        }

        deserializer.deserialize_str(BucketVisitor)
    }
}
