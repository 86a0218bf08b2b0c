// ggen-engine: orchestrator facade
// Composes the hasher, graph store, template engine, artifact generator,
// validators and drift detector behind one lifecycle-managed entry point.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

pub mod config;
pub mod error;
pub mod events;
pub mod metrics;
pub mod orchestrator;
pub mod state;

pub use config::EngineConfig;
pub use error::{EngineError, EngineResult};
pub use events::{EngineEvent, EventBus, EventObserver, EventRecord};
pub use metrics::{EngineMetrics, MetricsSnapshot};
pub use orchestrator::Engine;
pub use state::EngineState;

// The types callers hand to and get back from the facade
pub use ggen_artifact::{CancellationToken, PlanEntry, RunReport, VerifyOutcome};
pub use ggen_drift::{DriftMode, DriftReport};
pub use ggen_validation::ConformanceReport;
