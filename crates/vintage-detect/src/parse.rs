//! The detector's per-file report protocol.
//!
//! Two shapes carry a construct and its minimum versions on the legacy
//! (2.x) and major (3.x) tracks:
//!
//! ```text
//! L12 C4: 'argparse' module requires 2.7, 3.2
//! src/pkg/mod.py:12:4:2.7:3.2:'argparse' module
//! ```
//!
//! Everything else the detector prints (progress chatter, `|`-prefixed AST
//! dumps, tips) is noise.

use std::sync::OnceLock;

use regex::Regex;
use vintage_core::VersionBucket;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportLine {
    Feature {
        construct: String,
        /// `None` when the track is unconstrained.
        legacy: Option<VersionBucket>,
        major: Option<VersionBucket>,
    },
    Noise,
}

/// A line that has the shape of a feature report but whose fields do not parse.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReportLineError {
    #[error("invalid version token {token:?}")]
    InvalidVersion { token: String },
    #[error("empty construct name")]
    EmptyConstruct,
}

fn verbose_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"^(?:L\d+(?:\s+C\d+)?:\s*)?(?P<construct>.+?)\s+requires?\s+(?P<legacy>[^,]*),\s*(?P<major>\S*)$",
        )
        .expect("valid verbose report regex")
    })
}

fn parsable_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // Greedy path: fields are taken from the right, so paths may contain `:`.
    RE.get_or_init(|| {
        Regex::new(r"^.*:\d+:\d+:(?P<legacy>[^:]*):(?P<major>[^:]*):(?P<construct>.*)$")
            .expect("valid parsable report regex")
    })
}

pub fn parse_report_line(line: &str) -> Result<ReportLine, ReportLineError> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('|') {
        return Ok(ReportLine::Noise);
    }

    let captures = match verbose_pattern().captures(line) {
        Some(captures) => captures,
        None => match parsable_pattern().captures(line) {
            Some(captures) => captures,
            None => return Ok(ReportLine::Noise),
        },
    };

    let construct = captures["construct"].trim().trim_matches('`').trim();
    if construct.is_empty() {
        return Err(ReportLineError::EmptyConstruct);
    }

    Ok(ReportLine::Feature {
        construct: construct.to_owned(),
        legacy: parse_version_token(&captures["legacy"])?,
        major: parse_version_token(&captures["major"])?,
    })
}

/// `Ok(None)` for the "unconstrained" sentinels: `!N` (not supported on
/// that track), `~N`, `-`, `0`, `0.0` and the empty token.
pub fn parse_version_token(token: &str) -> Result<Option<VersionBucket>, ReportLineError> {
    let token = token.trim();
    if token.is_empty() || token == "-" || token.starts_with(['!', '~']) {
        return Ok(None);
    }

    // `3.2-` / `3.2+` carry a direction the aggregate does not track.
    let version = token.strip_suffix(['-', '+']).unwrap_or(token);
    if version == "0" || version == "0.0" {
        return Ok(None);
    }

    version
        .parse::<VersionBucket>()
        .map(Some)
        .map_err(|_| ReportLineError::InvalidVersion {
            token: token.to_owned(),
        })
}
