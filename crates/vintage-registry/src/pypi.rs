use std::collections::BTreeMap;
use std::time::Duration;

use serde::Deserialize;
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{OffsetDateTime, PrimitiveDateTime};
use vintage_core::{canonical_package_name, Package, Release};

use crate::{agent, get_json, Registry, Result};

pub const DEFAULT_ENDPOINT: &str = "https://pypi.org/pypi";

/// Client for the PyPI JSON API (`{endpoint}/{name}/json`).
#[derive(Debug, Clone)]
pub struct PypiRegistry {
    endpoint: String,
    agent: ureq::Agent,
}

impl PypiRegistry {
    pub fn new(endpoint: &str, timeout: Option<Duration>, user_agent: &str) -> Self {
        Self {
            endpoint: endpoint.trim_end_matches('/').to_owned(),
            agent: agent(timeout, user_agent),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[derive(Debug, Deserialize)]
struct ProjectDocument {
    info: ProjectInfo,
    #[serde(default)]
    releases: BTreeMap<String, Vec<FileEntry>>,
}

#[derive(Debug, Deserialize)]
struct ProjectInfo {
    name: String,
}

#[derive(Debug, Deserialize)]
struct FileEntry {
    packagetype: String,
    url: String,
    filename: String,
    #[serde(default)]
    upload_time: Option<String>,
    #[serde(default)]
    upload_time_iso_8601: Option<String>,
    #[serde(default)]
    requires_python: Option<String>,
}

impl Registry for PypiRegistry {
    fn fetch_package(&self, name: &str) -> Result<Package> {
        let url = format!("{}/{}/json", self.endpoint, canonical_package_name(name));
        tracing::debug!(target: "vintage.registry", package = name, url = %url, "fetching package metadata");

        let document: ProjectDocument = get_json(&self.agent, &url, Some(name))?;
        let package = package_from_document(document);

        tracing::info!(
            target: "vintage.registry",
            package = %package.name,
            releases = package.releases.len(),
            "resolved package"
        );
        Ok(package)
    }
}

fn package_from_document(document: ProjectDocument) -> Package {
    let mut releases = Vec::with_capacity(document.releases.len());
    for (version, files) in document.releases {
        let Some(sdist) = files.into_iter().find(|file| file.packagetype == "sdist") else {
            tracing::debug!(
                target: "vintage.registry",
                package = %document.info.name,
                version = %version,
                "skipping release without a source distribution"
            );
            continue;
        };

        let timestamp = sdist
            .upload_time_iso_8601
            .as_deref()
            .or(sdist.upload_time.as_deref());
        let Some(upload_time) = timestamp.and_then(parse_upload_time) else {
            tracing::warn!(
                target: "vintage.registry",
                package = %document.info.name,
                version = %version,
                upload_time = ?timestamp,
                "skipping release with an unreadable upload time"
            );
            continue;
        };

        releases.push(Release {
            version,
            upload_time,
            url: sdist.url,
            filename: sdist.filename,
            requires_python: sdist.requires_python.unwrap_or_default(),
        });
    }
    Package::new(&document.info.name, releases)
}

/// RFC 3339, or an offset-less timestamp taken as UTC.
fn parse_upload_time(raw: &str) -> Option<OffsetDateTime> {
    if let Ok(parsed) = OffsetDateTime::parse(raw, &Rfc3339) {
        return Some(parsed);
    }
    let naive = format_description!(
        "[year]-[month]-[day]T[hour]:[minute]:[second][optional [.[subsecond]]]"
    );
    PrimitiveDateTime::parse(raw, naive)
        .ok()
        .map(PrimitiveDateTime::assume_utc)
}
