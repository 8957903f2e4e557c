use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime, UtcOffset};

/// A registry package and the releases that ship a source artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Package {
    /// Canonical (PEP 503) name; see [`canonical_package_name`].
    pub name: String,
    /// Ordered by upload timestamp; unique by version string.
    pub releases: Vec<Release>,
}

impl Package {
    pub fn new(name: &str, mut releases: Vec<Release>) -> Self {
        let mut seen = HashSet::new();
        releases.retain(|release| seen.insert(release.version.clone()));
        // Stable: ties keep the order the caller supplied.
        releases.sort_by_key(|release| release.upload_time);
        Self {
            name: canonical_package_name(name),
            releases,
        }
    }

    pub fn select<'a>(
        &'a self,
        selection: &'a ReleaseSelection,
    ) -> impl Iterator<Item = &'a Release> + 'a {
        self.releases
            .iter()
            .filter(move |release| selection.matches(release))
    }
}

/// One source release of a package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Release {
    pub version: String,
    #[serde(with = "time::serde::rfc3339")]
    pub upload_time: OffsetDateTime,
    pub url: String,
    pub filename: String,
    /// Declared minimum runtime (`requires_python`), empty when undeclared.
    pub requires_python: String,
}

impl Release {
    /// `1.0`, `2.0.0`, `10.0`: a leading number followed only by zero components.
    pub fn is_major(&self) -> bool {
        major_pattern().is_match(&self.version)
    }

    /// Two numeric components (`1.4`), or any major release.
    pub fn is_minor(&self) -> bool {
        minor_pattern().is_match(&self.version) || self.is_major()
    }

    /// Calendar date of the upload in UTC.
    pub fn upload_date(&self) -> Date {
        self.upload_time.to_offset(UtcOffset::UTC).date()
    }
}

fn major_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d+(\.0)+$").expect("valid major-release regex"))
}

fn minor_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d+\.\d+$").expect("valid minor-release regex"))
}

/// Which releases of a package participate in a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReleaseFilter {
    All,
    #[default]
    Major,
    Minor,
}

impl ReleaseFilter {
    pub fn matches(self, release: &Release) -> bool {
        match self {
            ReleaseFilter::All => true,
            ReleaseFilter::Major => release.is_major(),
            ReleaseFilter::Minor => release.is_minor(),
        }
    }
}

/// Release-type filter plus an inclusive upload-date ceiling.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReleaseSelection {
    pub filter: ReleaseFilter,
    pub uploaded_until: Option<Date>,
}

impl ReleaseSelection {
    pub fn matches(&self, release: &Release) -> bool {
        self.filter.matches(release)
            && self
                .uploaded_until
                .map_or(true, |ceiling| release.upload_date() <= ceiling)
    }
}

/// PEP 503 normalization: lowercase, runs of `-`, `_` and `.` become one `-`.
pub fn canonical_package_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut in_separator = false;
    for c in name.trim().chars() {
        if matches!(c, '-' | '_' | '.') {
            if !in_separator {
                out.push('-');
            }
            in_separator = true;
        } else {
            out.extend(c.to_lowercase());
            in_separator = false;
        }
    }
    out
}
