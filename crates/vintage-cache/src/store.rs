use std::{
    fs::File,
    io,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::error::{CacheError, Result};

/// Fetches the artifact at `url` into `dest`, replacing it atomically.
pub trait ArtifactStore: Send + Sync {
    fn fetch(&self, url: &str, dest: &Path) -> Result<()>;
}

const URL_REDACTION: &str = "<redacted>";

/// Plain paths and `file://` URLs; used for mirrors and tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalStore;

impl ArtifactStore for LocalStore {
    fn fetch(&self, url: &str, dest: &Path) -> Result<()> {
        let path = match url.strip_prefix("file://") {
            Some(stripped) => PathBuf::from(stripped),
            None => PathBuf::from(url),
        };

        if path.is_dir() {
            return Err(CacheError::UnsupportedFetchUrl {
                url: sanitize_fetch_url(url),
            });
        }

        crate::util::atomic_write_with(dest, |out| {
            let mut reader = File::open(&path)?;
            io::copy(&mut reader, out)?;
            Ok(())
        })
    }
}

#[derive(Debug, Clone)]
pub struct HttpStore {
    agent: ureq::Agent,
}

impl HttpStore {
    pub fn new(timeout: Option<Duration>, user_agent: &str) -> Self {
        let mut builder = ureq::AgentBuilder::new().user_agent(user_agent);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Self {
            agent: builder.build(),
        }
    }
}

impl Default for HttpStore {
    fn default() -> Self {
        Self::new(None, concat!("vintage/", env!("CARGO_PKG_VERSION")))
    }
}

impl ArtifactStore for HttpStore {
    fn fetch(&self, url: &str, dest: &Path) -> Result<()> {
        let safe_url = sanitize_fetch_url(url);
        let response = self.agent.get(url).call().map_err(|err| {
            let message = match err {
                ureq::Error::Status(code, _response) => {
                    format!("server returned status {code} for {safe_url}")
                }
                ureq::Error::Transport(transport) => {
                    format!("transport error for {safe_url}: {transport}")
                }
            };
            CacheError::Http { message }
        })?;

        crate::util::atomic_write_with(dest, |out| {
            let mut reader = response.into_reader();
            io::copy(&mut reader, out)?;
            Ok(())
        })
    }
}

/// Picks a store per URL: `http(s)://` goes through the wrapped
/// [`HttpStore`], anything else is read from disk.
#[derive(Debug, Clone, Default)]
pub struct SchemeStore {
    http: HttpStore,
}

impl SchemeStore {
    pub fn new(http: HttpStore) -> Self {
        Self { http }
    }
}

impl ArtifactStore for SchemeStore {
    fn fetch(&self, url: &str, dest: &Path) -> Result<()> {
        if url.starts_with("http://") || url.starts_with("https://") {
            self.http.fetch(url, dest)
        } else {
            LocalStore.fetch(url, dest)
        }
    }
}

/// Strip userinfo and query values so URLs can go into errors and logs.
pub(crate) fn sanitize_fetch_url(url: &str) -> String {
    let Some(scheme_idx) = url.find("://") else {
        return url.to_owned();
    };

    let (scheme, rest) = url.split_at(scheme_idx + 3);
    let authority_end = rest.find(['/', '?', '#']).unwrap_or(rest.len());
    let (authority, tail) = rest.split_at(authority_end);

    let authority = match authority.rfind('@') {
        Some(at_pos) => format!("{URL_REDACTION}@{}", &authority[at_pos + 1..]),
        None => authority.to_owned(),
    };

    let tail = match tail.split_once('?') {
        Some((path, _query)) => format!("{path}?{URL_REDACTION}"),
        None => tail.to_owned(),
    };
    format!("{scheme}{authority}{tail}")
}
