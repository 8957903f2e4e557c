//! Core shared types for vintage.
//!
//! This crate is intentionally small: it owns the data model that flows
//! between the registry client, the caches, the detector adapter and the
//! signature code, and nothing that performs I/O.

mod aggregate;
mod release;
mod version;

pub use aggregate::{AggregateError, FeatureAggregate};
pub use release::{canonical_package_name, Package, Release, ReleaseFilter, ReleaseSelection};
pub use version::{ParseVersionError, VersionBucket};

/// Best-effort message from a `catch_unwind` payload.
pub fn panic_payload_to_str(payload: &(dyn std::any::Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        return message;
    }
    if let Some(message) = payload.downcast_ref::<String>() {
        return message;
    }
    "<non-string panic payload>"
}
