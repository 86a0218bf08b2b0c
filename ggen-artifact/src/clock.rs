//! Injected time source
//!
//! The core never reads the process clock directly. In deterministic mode
//! the source is a fixed value taken from the plan (or nothing at all, in
//! which case timestamps are omitted from attestations).

use std::sync::Arc;

/// Supplies the timestamp recorded in attestations and baselines
pub trait TimeSource: Send + Sync {
    /// ISO-8601 timestamp, or `None` to omit timestamps entirely
    fn now_iso8601(&self) -> Option<String>;
}

/// Wall-clock time source for non-deterministic runs
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl TimeSource for SystemClock {
    fn now_iso8601(&self) -> Option<String> {
        Some(chrono::Utc::now().to_rfc3339())
    }
}

/// Fixed time source for deterministic runs; the value comes from the plan
#[derive(Debug, Clone, Default)]
pub struct FixedTime {
    timestamp: Option<String>,
}

impl FixedTime {
    /// Omit timestamps entirely
    pub fn omitted() -> Self {
        Self { timestamp: None }
    }

    /// Use a fixed plan-provided timestamp
    pub fn at(timestamp: impl Into<String>) -> Self {
        Self {
            timestamp: Some(timestamp.into()),
        }
    }
}

impl TimeSource for FixedTime {
    fn now_iso8601(&self) -> Option<String> {
        self.timestamp.clone()
    }
}

/// Shared handle used across the engine
pub type SharedTimeSource = Arc<dyn TimeSource>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_time_is_stable() {
        let t = FixedTime::at("2024-01-01T00:00:00Z");
        assert_eq!(t.now_iso8601().as_deref(), Some("2024-01-01T00:00:00Z"));
        assert_eq!(t.now_iso8601(), t.now_iso8601());
    }

    #[test]
    fn test_omitted_time() {
        assert!(FixedTime::omitted().now_iso8601().is_none());
    }
}
