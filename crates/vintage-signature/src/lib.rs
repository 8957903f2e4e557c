//! Normalized modernity signatures and the temporal consistency check.

mod normalize;
mod reference;
mod validate;

pub use normalize::{bucket_totals, normalize, Signature, SignatureError};
pub use reference::ReferenceVersionTable;
pub use validate::{validate, Anomaly};
