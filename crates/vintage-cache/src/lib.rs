//! Durable cross-run state: extracted source artifacts and persisted
//! per-release aggregates.
//!
//! ## On-disk layout
//!
//! Everything lives under the cache root (`~/.vintage/cache` unless
//! overridden via [`CacheConfig`] / `VINTAGE_CACHE_DIR`):
//! - `artifacts/<package>/<version>/`: source files extracted from the
//!   release's sdist, filtered by extension ([`ArtifactCache`])
//! - `results/<package>/<version>.json`: the release's
//!   [`vintage_core::FeatureAggregate`] ([`ResultCache`])
//! - `tmp/`: scratch downloads
//!
//! The two layers are invalidated independently and only on request.

mod artifact;
mod cache_dir;
mod error;
mod result;
mod store;
mod util;

pub use artifact::ArtifactCache;
pub use cache_dir::{CacheConfig, CacheDir};
pub use error::{CacheError, Result};
pub use result::ResultCache;
pub use store::{ArtifactStore, HttpStore, LocalStore, SchemeStore};
pub use util::atomic_write;
