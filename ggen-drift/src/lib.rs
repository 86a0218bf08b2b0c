// ggen-drift: drift detection
// Compares current artifact bytes against their attestation or baseline,
// classifies the difference (none / cosmetic / semantic) with RDF-aware
// diffing, and optionally restores drifted files.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

pub mod baseline;
pub mod classify;
pub mod detector;
pub mod error;
pub mod report;

pub use baseline::{BaselineEntry, BaselineStore};
pub use detector::{
    DriftDetector, DriftDetectorConfig, DriftMode, DriftResult, DriftSeverity, DriftType,
    ExpectedState, FixAction,
};
pub use error::{DriftError, DriftResult as DriftOpResult};
pub use report::{ComplianceStatus, DriftReport, DriftSummary, RiskLevel};
