//! Registry client: resolves a package name to its source releases, plus
//! the ranking feeds used to pick which packages to analyze.

mod feed;
mod pypi;

pub use feed::RankingFeed;
pub use pypi::{PypiRegistry, DEFAULT_ENDPOINT};

use vintage_core::Package;

pub type Result<T> = std::result::Result<T, RegistryError>;

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("package {package:?} was not found in the registry")]
    NotFound { package: String },

    #[error("request to {url} failed: {message}")]
    Http { url: String, message: String },

    #[error("unexpected response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to read response from {url}: {source}")]
    Io {
        url: String,
        #[source]
        source: std::io::Error,
    },
}

/// A source of package metadata.
pub trait Registry: Send + Sync {
    /// The package's releases that ship a source artifact, ordered by
    /// upload time.
    fn fetch_package(&self, name: &str) -> Result<Package>;
}

pub(crate) fn agent(timeout: Option<std::time::Duration>, user_agent: &str) -> ureq::Agent {
    let mut builder = ureq::AgentBuilder::new().user_agent(user_agent);
    if let Some(timeout) = timeout {
        builder = builder.timeout(timeout);
    }
    builder.build()
}

/// GET `url` and decode the JSON body. A 404 maps to
/// [`RegistryError::NotFound`] when `package` is given.
pub(crate) fn get_json<T: serde::de::DeserializeOwned>(
    agent: &ureq::Agent,
    url: &str,
    package: Option<&str>,
) -> Result<T> {
    let response = agent.get(url).call().map_err(|err| match err {
        ureq::Error::Status(404, _) if package.is_some() => RegistryError::NotFound {
            package: package.unwrap_or_default().to_owned(),
        },
        ureq::Error::Status(code, _) => RegistryError::Http {
            url: url.to_owned(),
            message: format!("server returned status {code}"),
        },
        ureq::Error::Transport(transport) => RegistryError::Http {
            url: url.to_owned(),
            message: transport.to_string(),
        },
    })?;

    // Streamed: metadata for long-lived packages exceeds `into_string`'s cap.
    serde_json::from_reader(std::io::BufReader::new(response.into_reader())).map_err(|source| {
        if source.is_io() {
            RegistryError::Io {
                url: url.to_owned(),
                source: source.into(),
            }
        } else {
            RegistryError::Decode {
                url: url.to_owned(),
                source,
            }
        }
    })
}
