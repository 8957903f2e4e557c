//! `vintage.toml`: configuration file model, discovery and tracing setup.
//!
//! Every section has defaults, so a missing or empty file is a valid
//! configuration. Unknown keys are rejected.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

mod logging;

pub use logging::{init_tracing, LoggingConfig};

pub const VINTAGE_CONFIG_ENV_VAR: &str = "VINTAGE_CONFIG_PATH";

/// Popularity snapshot of the most-downloaded PyPI projects.
pub const DEFAULT_POPULARITY_FEED_URL: &str =
    "https://hugovk.github.io/top-pypi-packages/top-pypi-packages-30-days.min.json";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse toml config {path}: {message}")]
    Toml { path: String, message: String },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VintageConfig {
    pub cache: CacheSection,
    pub registry: RegistrySection,
    pub detector: DetectorSection,
    pub pipeline: PipelineSection,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CacheSection {
    /// Cache root; `$VINTAGE_CACHE_DIR` or `~/.vintage/cache` when unset.
    pub root: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RegistrySection {
    pub endpoint: String,
    pub popularity_feed_url: String,
    /// Feed ranking packages by size. There is no public default.
    pub size_feed_url: Option<String>,
    pub timeout_ms: u64,
    pub user_agent: String,
}

impl Default for RegistrySection {
    fn default() -> Self {
        Self {
            endpoint: "https://pypi.org/pypi".to_owned(),
            popularity_feed_url: DEFAULT_POPULARITY_FEED_URL.to_owned(),
            size_feed_url: None,
            timeout_ms: 30_000,
            user_agent: concat!("vintage/", env!("CARGO_PKG_VERSION")).to_owned(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DetectorSection {
    pub program: PathBuf,
    /// Arguments placed before the file path.
    pub args: Vec<String>,
    /// Kill a detector run after this long. Unset means wait forever.
    pub timeout_ms: Option<u64>,
    /// Per-stream cap on captured detector output.
    pub max_output_bytes: usize,
    /// Worker threads; defaults to available hardware parallelism.
    pub concurrency: Option<usize>,
    /// Source file extensions, for both extraction and detection.
    pub extensions: Vec<String>,
}

impl Default for DetectorSection {
    fn default() -> Self {
        Self {
            program: PathBuf::from("vermin"),
            args: vec![
                "-vvv".to_owned(),
                "--no-tips".to_owned(),
                "--no-parse-comments".to_owned(),
            ],
            timeout_ms: None,
            max_output_bytes: 8 * 1024 * 1024,
            concurrency: None,
            extensions: vec!["py".to_owned(), "pyw".to_owned()],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineSection {
    /// Warn when a package yields fewer signatures than this.
    pub min_releases: usize,
}

impl Default for PipelineSection {
    fn default() -> Self {
        Self { min_releases: 2 }
    }
}

impl VintageConfig {
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::load_from_str(&text).map_err(|err| ConfigError::Toml {
            path: path.display().to_string(),
            message: err.message().to_owned(),
        })
    }

    pub fn load_from_str(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }
}

/// Find the configuration file for `dir`.
///
/// Search order:
/// 1) `VINTAGE_CONFIG_PATH` (absolute or relative to `dir`)
/// 2) `vintage.toml` in `dir`
/// 3) `.vintage.toml` in `dir`
pub fn discover_config_path(dir: &Path) -> Option<PathBuf> {
    if let Some(value) = std::env::var_os(VINTAGE_CONFIG_ENV_VAR) {
        let candidate = PathBuf::from(value);
        return Some(if candidate.is_absolute() {
            candidate
        } else {
            dir.join(candidate)
        });
    }

    ["vintage.toml", ".vintage.toml"]
        .into_iter()
        .map(|name| dir.join(name))
        .find(|path| path.is_file())
}

/// Load the configuration for `dir`; defaults when no file is found.
pub fn load_for_dir(dir: &Path) -> Result<(VintageConfig, Option<PathBuf>), ConfigError> {
    let Some(path) = discover_config_path(dir) else {
        return Ok((VintageConfig::default(), None));
    };
    let config = VintageConfig::load_from_path(&path)?;
    Ok((config, Some(path)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn empty_file_is_all_defaults() {
        assert_eq!(VintageConfig::load_from_str("").unwrap(), VintageConfig::default());
    }

    #[test]
    fn sections_override_defaults() {
        let config = VintageConfig::load_from_str(
            r#"
[cache]
root = "/srv/vintage"

[detector]
program = "/opt/vermin/bin/vermin"
timeout_ms = 60000
concurrency = 4

[pipeline]
min_releases = 3

[logging]
level = "debug"
json = true
"#,
        )
        .unwrap();

        assert_eq!(config.cache.root, Some(PathBuf::from("/srv/vintage")));
        assert_eq!(config.detector.program, PathBuf::from("/opt/vermin/bin/vermin"));
        assert_eq!(config.detector.timeout_ms, Some(60_000));
        assert_eq!(config.detector.concurrency, Some(4));
        assert_eq!(config.detector.extensions, ["py", "pyw"]);
        assert_eq!(config.pipeline.min_releases, 3);
        assert_eq!(config.registry, RegistrySection::default());
        assert!(config.logging.json);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = VintageConfig::load_from_str("[detector]\nprogramme = \"vermin\"\n").unwrap_err();
        assert!(err.message().contains("programme"), "{}", err.message());
        assert!(VintageConfig::load_from_str("[charts]\nenabled = true\n").is_err());
    }
}
