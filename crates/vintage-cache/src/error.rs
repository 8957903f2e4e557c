pub type Result<T> = std::result::Result<T, CacheError>;

/// Errors produced by artifact acquisition and result persistence.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("failed to determine home directory for default cache path")]
    MissingHomeDir,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("http fetch failed: {message}")]
    Http { message: String },

    #[error("unsupported fetch URL {url}")]
    UnsupportedFetchUrl { url: String },

    #[error("archive error: {0}")]
    Archive(#[from] vintage_archive::ArchiveError),

    #[error("{what} {value:?} is not usable as a cache path component")]
    InvalidKey { what: &'static str, value: String },
}
