//! Feature detection over extracted source trees.
//!
//! An external detector reports, per source file, every version-gated
//! construct it finds ([`parse`] describes the line protocol). Reports are
//! folded into a [`vintage_core::FeatureAggregate`] by [`aggregate`].

mod aggregate;
mod detector;
pub mod parse;
mod pool;
mod tree;

pub use aggregate::{aggregate, aggregate_parallel, aggregate_report, credit};
pub use detector::{CommandDetector, Detector, DetectorError};
pub use parse::{parse_report_line, ReportLine, ReportLineError};
pub use pool::default_concurrency;
pub use tree::{detect_tree, source_files, DetectOptions, Detection, DetectionFailure, RawReport};
