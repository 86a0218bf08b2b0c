//! Engine metrics
//!
//! Plain atomic counters, snapshotted for reports. Rendering counters come
//! from the template engine's own stats.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters owned by the orchestrator
#[derive(Debug, Default)]
pub struct EngineMetrics {
    pub artifacts_written: AtomicU64,
    pub entries_skipped: AtomicU64,
    pub validations: AtomicU64,
    pub violations: AtomicU64,
    pub drift_checks: AtomicU64,
    pub drifts_detected: AtomicU64,
    pub regenerations: AtomicU64,
    pub errors: AtomicU64,
}

/// Point-in-time view, including renderer stats
#[derive(Debug, Clone, Copy, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    pub renders: u64,
    pub render_cache_hits: u64,
    pub artifacts_written: u64,
    pub entries_skipped: u64,
    pub validations: u64,
    pub violations: u64,
    pub drift_checks: u64,
    pub drifts_detected: u64,
    pub regenerations: u64,
    pub errors: u64,
}

impl EngineMetrics {
    pub fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add(counter: &AtomicU64, n: u64) {
        counter.fetch_add(n, Ordering::Relaxed);
    }

    pub fn snapshot(&self, render_stats: ggen_template::RenderStats) -> MetricsSnapshot {
        MetricsSnapshot {
            renders: render_stats.renders,
            render_cache_hits: render_stats.cache_hits,
            artifacts_written: self.artifacts_written.load(Ordering::Relaxed),
            entries_skipped: self.entries_skipped.load(Ordering::Relaxed),
            validations: self.validations.load(Ordering::Relaxed),
            violations: self.violations.load(Ordering::Relaxed),
            drift_checks: self.drift_checks.load(Ordering::Relaxed),
            drifts_detected: self.drifts_detected.load(Ordering::Relaxed),
            regenerations: self.regenerations.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_reflects_counters() {
        let metrics = EngineMetrics::default();
        EngineMetrics::incr(&metrics.artifacts_written);
        EngineMetrics::add(&metrics.violations, 3);
        let snapshot = metrics.snapshot(ggen_template::RenderStats::default());
        assert_eq!(snapshot.artifacts_written, 1);
        assert_eq!(snapshot.violations, 3);
        assert_eq!(snapshot.renders, 0);
    }
}
