//! Event bus
//!
//! Explicit observer interface with a finite event taxonomy. Subscription
//! is synchronous; emission snapshots the observer list first so no
//! internal lock is held while observers run. Every event carries a
//! monotonically assigned sequence number.

use ggen_drift::DriftType;
use parking_lot::RwLock;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// The closed event taxonomy
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum EngineEvent {
    RenderStarted {
        template: String,
    },
    ArtifactWritten {
        path: String,
        hash: String,
    },
    DriftDetected {
        path: String,
        drift_type: DriftType,
        significance: f64,
    },
    ValidationCompleted {
        conforms: bool,
        violations: usize,
    },
    ErrorRaised {
        kind: String,
        message: String,
    },
}

/// An event plus its sequence number
#[derive(Debug, Clone, Serialize)]
pub struct EventRecord {
    pub sequence: u64,
    #[serde(flatten)]
    pub event: EngineEvent,
}

/// Synchronous observer
pub trait EventObserver: Send + Sync {
    fn on_event(&self, record: &EventRecord);
}

/// Fan-out to subscribed observers
#[derive(Default)]
pub struct EventBus {
    observers: RwLock<Vec<Arc<dyn EventObserver>>>,
    sequence: AtomicU64,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, observer: Arc<dyn EventObserver>) {
        self.observers.write().push(observer);
    }

    pub fn observer_count(&self) -> usize {
        self.observers.read().len()
    }

    /// Emit to every observer. The observer list is cloned under the read
    /// lock and the lock released before any observer runs.
    pub fn emit(&self, event: EngineEvent) -> u64 {
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);
        let record = EventRecord { sequence, event };
        let observers: Vec<Arc<dyn EventObserver>> = self.observers.read().clone();
        for observer in observers {
            observer.on_event(&record);
        }
        sequence
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Collector {
        seen: Mutex<Vec<u64>>,
    }

    impl EventObserver for Collector {
        fn on_event(&self, record: &EventRecord) {
            self.seen.lock().push(record.sequence);
        }
    }

    #[test]
    fn test_sequence_numbers_are_monotonic() {
        let bus = EventBus::new();
        let collector = Arc::new(Collector::default());
        bus.subscribe(collector.clone());

        bus.emit(EngineEvent::RenderStarted {
            template: "a".to_string(),
        });
        bus.emit(EngineEvent::ValidationCompleted {
            conforms: true,
            violations: 0,
        });

        let seen = collector.seen.lock();
        assert_eq!(*seen, vec![0, 1]);
    }

    #[test]
    fn test_emit_without_observers() {
        let bus = EventBus::new();
        let first = bus.emit(EngineEvent::ErrorRaised {
            kind: "parse-error".to_string(),
            message: "bad input".to_string(),
        });
        assert_eq!(first, 0);
    }
}
