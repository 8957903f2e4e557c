use serde::{Serialize, Serializer};
use time::Date;
use vintage_signature::{Anomaly, Signature};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ReleaseOutcome {
    Signature {
        signature: Signature,
        total_constructs: u64,
        anomalies: Vec<Anomaly>,
    },
    /// Detection ran (or was cached) but found no version-gated constructs.
    NoSignal,
    /// The artifact could not be acquired.
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReleaseReport {
    pub version: String,
    #[serde(serialize_with = "serialize_date")]
    pub upload_date: Date,
    #[serde(flatten)]
    pub outcome: ReleaseOutcome,
}

fn serialize_date<S: Serializer>(date: &Date, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(date)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PackageReport {
    pub package: String,
    pub releases: Vec<ReleaseReport>,
    pub warnings: Vec<String>,
}

impl PackageReport {
    /// Releases that produced a signature.
    pub fn signatures(&self) -> usize {
        self.releases
            .iter()
            .filter(|release| matches!(release.outcome, ReleaseOutcome::Signature { .. }))
            .count()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PackageOutcome {
    Analyzed(PackageReport),
    Failed { package: String, reason: String },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchReport {
    pub packages: Vec<PackageOutcome>,
}

impl BatchReport {
    /// Whether some package failed outright or produced no signature at all.
    pub fn any_failed(&self) -> bool {
        self.packages.iter().any(|outcome| match outcome {
            PackageOutcome::Analyzed(report) => report.signatures() == 0,
            PackageOutcome::Failed { .. } => true,
        })
    }
}
