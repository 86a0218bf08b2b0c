//! Drift report
//!
//! Aggregates per-file drift results into the public report: a drift score
//! in [0, 100], a risk level, a compliance status and recommendations.

use crate::detector::{DriftMode, DriftResult, DriftSeverity, DriftType};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Aggregate risk level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

/// Aggregate compliance status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ComplianceStatus {
    Compliant,
    Violations,
    Unknown,
}

/// Report summary block
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriftSummary {
    /// 0..100, weighted average of per-file significance
    pub drift_score: u8,
    pub risk_level: RiskLevel,
    pub compliance_status: ComplianceStatus,
    pub action_required: bool,
}

/// The public drift report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriftReport {
    pub success: bool,
    pub summary: DriftSummary,
    pub changes: Vec<DriftResult>,
    pub recommendations: Vec<String>,
}

impl DriftReport {
    /// Assemble from detection results under the given mode.
    pub fn assemble(results: Vec<DriftResult>, mode: DriftMode) -> DriftReport {
        let drifted: Vec<&DriftResult> = results.iter().filter(|r| r.is_drifted()).collect();

        let drift_score = if results.is_empty() {
            0
        } else {
            let total: f64 = results.iter().map(|r| r.significance).sum();
            ((total / results.len() as f64) * 100.0).round().min(100.0) as u8
        };

        let risk_level = results
            .iter()
            .map(|r| match r.severity {
                DriftSeverity::Low => RiskLevel::Low,
                DriftSeverity::Medium => RiskLevel::Medium,
                DriftSeverity::High => RiskLevel::High,
                DriftSeverity::Critical => RiskLevel::Critical,
            })
            .max()
            .unwrap_or(RiskLevel::Low);

        let compliance_status = if drifted.is_empty() {
            ComplianceStatus::Compliant
        } else {
            ComplianceStatus::Violations
        };

        let mut recommendations = Vec::new();
        for result in &drifted {
            match result.drift_type {
                DriftType::Deleted => recommendations.push(format!(
                    "{}: restore the deleted artifact or update the baseline",
                    result.path
                )),
                DriftType::Semantic => recommendations.push(format!(
                    "{}: review the semantic change (significance {:.2}) and regenerate or re-baseline",
                    result.path, result.significance
                )),
                DriftType::Cosmetic => recommendations.push(format!(
                    "{}: cosmetic change; regenerate to restore canonical form",
                    result.path
                )),
                DriftType::Unchanged | DriftType::Regenerated => {}
            }
        }

        // warn and fix modes absorb drift; fail does not
        let success = drifted.is_empty() || !matches!(mode, DriftMode::Fail);

        DriftReport {
            success,
            summary: DriftSummary {
                drift_score,
                risk_level,
                compliance_status,
                action_required: !drifted.is_empty(),
            },
            changes: results,
            recommendations,
        }
    }

    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// Human-readable text summary
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!(
            "Drift {}: score {}, risk {:?}, {} change(s)\n",
            if self.success { "check passed" } else { "DETECTED" },
            self.summary.drift_score,
            self.summary.risk_level,
            self.changes.iter().filter(|c| c.is_drifted()).count()
        ));
        for change in self.changes.iter().filter(|c| c.is_drifted()) {
            out.push_str(&format!(
                "  {:?} [{:?}] {} (significance {:.2})\n",
                change.drift_type, change.severity, change.path, change.significance
            ));
        }
        for recommendation in &self.recommendations {
            out.push_str(&format!("  -> {}\n", recommendation));
        }
        out
    }
}
