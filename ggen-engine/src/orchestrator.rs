//! The orchestrator
//!
//! Public facade over generation, verification, validation and drift
//! detection. Owns the shapes cache, the baseline store, the
//! active-operations map and the metrics. No lock is held across I/O, and
//! the state lock is never held while user-supplied rules run.

use crate::config::{EngineConfig, VariablesPolicy};
use crate::error::{EngineError, EngineResult};
use crate::events::{EngineEvent, EventBus};
use crate::metrics::{EngineMetrics, MetricsSnapshot};
use crate::state::EngineState;
use ggen_artifact::clock::SharedTimeSource;
use ggen_artifact::{
    ArtifactGenerator, CancellationToken, FixedTime, GenerateOutcome, GeneratorConfig, Lockfile,
    PlanDriver, PlanEntry, RunReport, SystemClock, VerifyOutcome,
};
use ggen_drift::{
    BaselineStore, DriftDetector, DriftDetectorConfig, DriftMode, DriftReport, DriftResult,
};
use ggen_graph::Graph;
use ggen_template::{RenderContext, TemplateEngine};
use ggen_validation::{ConformanceReport, Rule, ValidationOptions, ValidationPipeline};
use parking_lot::{Mutex, RwLock};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// The engine facade
pub struct Engine {
    config: EngineConfig,
    state: RwLock<EngineState>,
    active_operations: Mutex<BTreeMap<u64, String>>,
    operation_counter: AtomicU64,
    time: SharedTimeSource,
    template_engine: Arc<TemplateEngine>,
    generator: Arc<ArtifactGenerator>,
    driver: PlanDriver,
    pipeline: RwLock<ValidationPipeline>,
    baseline: Mutex<Option<BaselineStore>>,
    detector: DriftDetector,
    events: EventBus,
    metrics: EngineMetrics,
}

impl Engine {
    /// Build an engine in the `Uninitialized` state.
    pub fn new(config: EngineConfig) -> EngineResult<Engine> {
        config.validate()?;

        let time: SharedTimeSource = if config.deterministic {
            match &config.fixed_timestamp {
                Some(ts) => Arc::new(FixedTime::at(ts.clone())),
                None => Arc::new(FixedTime::omitted()),
            }
        } else {
            Arc::new(SystemClock)
        };

        let template_engine = Arc::new(TemplateEngine::with_build_env(
            config.build_env.clone(),
            config.render_cache_size,
        ));

        let generator = Arc::new(ArtifactGenerator::new(
            Arc::clone(&template_engine),
            GeneratorConfig {
                output_root: config.output_root.clone(),
                strict_frontmatter: config.strict_frontmatter,
                variables_policy: match config.variables_policy {
                    VariablesPolicy::Embed => ggen_artifact::VariablesPolicy::Embed,
                    VariablesPolicy::HashOnly => ggen_artifact::VariablesPolicy::HashOnly,
                },
                time: Arc::clone(&time),
                blank_node_threshold: config.blank_node_threshold,
            },
        ));

        let driver = PlanDriver::new(Arc::clone(&generator), config.max_parallelism);

        let pipeline = ValidationPipeline::with_builtin_rules(
            config.shapes_cache_size,
            config.max_graph_triples,
        )?;

        let detector = DriftDetector::new(
            DriftDetectorConfig {
                mode: config.drift_mode,
                attempt_regeneration: config.attempt_regeneration,
                backup_on_fix: config.backup_on_fix,
                strict_frontmatter: config.strict_frontmatter,
            },
            Arc::clone(&template_engine),
        );

        Ok(Engine {
            config,
            state: RwLock::new(EngineState::Uninitialized),
            active_operations: Mutex::new(BTreeMap::new()),
            operation_counter: AtomicU64::new(0),
            time,
            template_engine,
            generator,
            driver,
            pipeline: RwLock::new(pipeline),
            baseline: Mutex::new(None),
            detector,
            events: EventBus::new(),
            metrics: EngineMetrics::default(),
        })
    }

    /// Load persistent state and become ready.
    pub fn initialize(&self) -> EngineResult<()> {
        self.transition(EngineState::Uninitialized, EngineState::Initializing)?;

        match BaselineStore::load(
            self.config.baseline_path.clone(),
            self.config.baseline_content,
            Arc::clone(&self.time),
        ) {
            Ok(store) => {
                *self.baseline.lock() = Some(store);
            }
            Err(e) => {
                *self.state.write() = EngineState::Error;
                self.metrics_error(&e.to_string(), e.kind());
                return Err(e.into());
            }
        }

        self.transition(EngineState::Initializing, EngineState::Ready)?;
        tracing::info!(parallelism = self.config.max_parallelism, "engine ready");
        Ok(())
    }

    /// Flush persistent state and stop accepting operations.
    pub fn shutdown(&self) -> EngineResult<()> {
        {
            let mut state = self.state.write();
            if !matches!(*state, EngineState::Ready | EngineState::Busy) {
                return Err(EngineError::NotReady { state: *state });
            }
            *state = EngineState::ShuttingDown;
        }

        let result = {
            let baseline = self.baseline.lock();
            match baseline.as_ref() {
                Some(store) => store.save().map_err(EngineError::from),
                None => Ok(()),
            }
        };

        *self.state.write() = EngineState::Shutdown;
        tracing::info!("engine shut down");
        result
    }

    pub fn state(&self) -> EngineState {
        *self.state.read()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot(self.template_engine.stats())
    }

    /// Register a custom rule. Clears the compiled-shapes cache.
    pub fn register_rule(&self, rule: Arc<dyn Rule>) -> EngineResult<()> {
        let mut pipeline = self.pipeline.write();
        pipeline.register_rule(rule)?;
        Ok(())
    }

    /// Execute a generation plan.
    pub async fn generate(
        &self,
        entries: Vec<PlanEntry>,
        cancel: &CancellationToken,
    ) -> EngineResult<RunReport> {
        let _guard = self.begin_operation("generate")?;
        let report = self.driver.run(entries, cancel).await?;
        self.record_run(&report);
        Ok(report)
    }

    /// Generate a single template entry.
    pub fn generate_one(
        &self,
        template_path: &Path,
        context: &RenderContext,
        output: Option<&Path>,
    ) -> EngineResult<GenerateOutcome> {
        let _guard = self.begin_operation("generate-one")?;
        self.events.emit(EngineEvent::RenderStarted {
            template: template_path.display().to_string(),
        });
        let outcome = self.generator.generate(template_path, context, output)?;
        match &outcome {
            GenerateOutcome::Written { artifact, .. } => {
                EngineMetrics::incr(&self.metrics.artifacts_written);
                self.events.emit(EngineEvent::ArtifactWritten {
                    path: artifact.output_path.display().to_string(),
                    hash: artifact.content_hash.clone(),
                });
            }
            GenerateOutcome::Skipped { .. } => {
                EngineMetrics::incr(&self.metrics.entries_skipped);
            }
        }
        Ok(outcome)
    }

    /// Build a lockfile from a plan without writing artifacts.
    pub fn build_lockfile(&self, entries: &[PlanEntry]) -> EngineResult<Lockfile> {
        let _guard = self.begin_operation("build-lockfile")?;
        Ok(self.driver.build_lockfile(entries)?)
    }

    /// Re-run a lockfile, asserting reproducibility.
    pub async fn run_lockfile(
        &self,
        lockfile: &Lockfile,
        entries: Vec<PlanEntry>,
        cancel: &CancellationToken,
    ) -> EngineResult<RunReport> {
        let _guard = self.begin_operation("run-lockfile")?;
        let report = self.driver.run_lockfile(lockfile, entries, cancel).await?;
        self.record_run(&report);
        Ok(report)
    }

    /// Verify an artifact against its attestation sidecar.
    pub fn verify(&self, path: &Path) -> EngineResult<VerifyOutcome> {
        let _guard = self.begin_operation("verify")?;
        Ok(self.generator.verify(path)?)
    }

    /// Validate a data graph against shapes and all registered rules.
    pub fn validate(
        &self,
        data: &Graph,
        shapes: &Graph,
        cancel: Option<&CancellationToken>,
    ) -> EngineResult<ConformanceReport> {
        let _guard = self.begin_operation("validate")?;
        let started = Instant::now();

        let options = ValidationOptions {
            deadline: self.config.validation_timeout_ms.map(Duration::from_millis),
            cancel_flag: cancel.map(|c| c.flag()),
        };

        let (shacl_outcome, rule_outcomes, shapes_count) = {
            let pipeline = self.pipeline.read();
            let compiled = pipeline.shacl().compile_cached(shapes)?;
            let shapes_count = compiled.len();
            let (shacl_outcome, rule_outcomes) = pipeline.validate(data, shapes, &options)?;
            (shacl_outcome, rule_outcomes, shapes_count)
        };

        let report = ConformanceReport::assemble(
            &shacl_outcome,
            &rule_outcomes,
            data.len(),
            started.elapsed().as_millis() as u64,
            shapes_count,
        );

        EngineMetrics::incr(&self.metrics.validations);
        EngineMetrics::add(&self.metrics.violations, report.errors.len() as u64);
        self.events.emit(EngineEvent::ValidationCompleted {
            conforms: report.ok,
            violations: report.errors.len(),
        });

        Ok(report)
    }

    /// Drift-check a set of tracked paths.
    ///
    /// In `fix` mode drifted files are replaced (regeneration preferred,
    /// baseline content otherwise). The baseline file itself is never
    /// mutated here, so cancellation cannot corrupt it.
    pub fn drift(
        &self,
        paths: &[PathBuf],
        cancel: &CancellationToken,
    ) -> EngineResult<DriftReport> {
        let _guard = self.begin_operation("drift")?;
        let mut results: Vec<DriftResult> = Vec::new();

        for path in paths {
            if cancel.is_cancelled() {
                return Err(EngineError::Cancelled);
            }

            EngineMetrics::incr(&self.metrics.drift_checks);
            // Pre-fetch the baseline entry so no lock spans the file I/O
            let entry = {
                let baseline = self.baseline.lock();
                baseline.as_ref().and_then(|s| s.get(path)).cloned()
            };
            let result = self.detector.detect(path, None, entry.as_ref())?;

            if result.is_drifted() {
                EngineMetrics::incr(&self.metrics.drifts_detected);
                self.events.emit(EngineEvent::DriftDetected {
                    path: result.path.clone(),
                    drift_type: result.drift_type,
                    significance: result.significance,
                });
            }

            let result = if self.config.drift_mode == DriftMode::Fix && result.is_drifted() {
                self.detector.fix(path, &result)?;
                EngineMetrics::incr(&self.metrics.regenerations);
                // Re-detect so the report shows the repaired state
                self.detector.detect(path, None, entry.as_ref())?
            } else {
                result
            };

            results.push(result);
        }

        Ok(DriftReport::assemble(results, self.config.drift_mode))
    }

    /// Record (or refresh) baseline entries for the given paths.
    ///
    /// The store is only persisted after every entry succeeded; a
    /// cancellation or failure leaves the on-disk baseline untouched.
    pub fn baseline_update(
        &self,
        paths: &[PathBuf],
        cancel: &CancellationToken,
    ) -> EngineResult<usize> {
        let _guard = self.begin_operation("baseline-update")?;
        let mut baseline = self.baseline.lock();
        let store = baseline.as_mut().ok_or(EngineError::NotReady {
            state: EngineState::Uninitialized,
        })?;

        for path in paths {
            if cancel.is_cancelled() {
                return Err(EngineError::Cancelled);
            }
            store.record(path)?;
        }
        store.save()?;
        Ok(paths.len())
    }

    /// Names of operations currently in flight
    pub fn active_operations(&self) -> Vec<String> {
        self.active_operations.lock().values().cloned().collect()
    }

    fn record_run(&self, report: &RunReport) {
        EngineMetrics::add(&self.metrics.artifacts_written, report.written.len() as u64);
        EngineMetrics::add(&self.metrics.entries_skipped, report.skipped.len() as u64);
        EngineMetrics::add(&self.metrics.errors, report.failures.len() as u64);
        for artifact in &report.written {
            self.events.emit(EngineEvent::ArtifactWritten {
                path: artifact.output_path.display().to_string(),
                hash: artifact.content_hash.clone(),
            });
        }
        for failure in &report.failures {
            self.events.emit(EngineEvent::ErrorRaised {
                kind: failure.kind.clone(),
                message: failure.message.clone(),
            });
        }
    }

    fn metrics_error(&self, message: &str, kind: &str) {
        EngineMetrics::incr(&self.metrics.errors);
        self.events.emit(EngineEvent::ErrorRaised {
            kind: kind.to_string(),
            message: message.to_string(),
        });
    }

    fn transition(&self, from: EngineState, to: EngineState) -> EngineResult<()> {
        let mut state = self.state.write();
        if *state != from || !from.can_transition_to(to) {
            return Err(EngineError::NotReady { state: *state });
        }
        *state = to;
        Ok(())
    }

    /// Mark an operation active; the guard restores `Ready` when the last
    /// operation finishes.
    fn begin_operation(&self, name: &str) -> EngineResult<OperationGuard<'_>> {
        let id = self.operation_counter.fetch_add(1, Ordering::Relaxed);
        {
            let mut state = self.state.write();
            if !state.accepts_operations() {
                return Err(EngineError::NotReady { state: *state });
            }
            *state = EngineState::Busy;
        }
        self.active_operations.lock().insert(id, name.to_string());
        Ok(OperationGuard { engine: self, id })
    }
}

struct OperationGuard<'a> {
    engine: &'a Engine,
    id: u64,
}

impl Drop for OperationGuard<'_> {
    fn drop(&mut self) {
        let mut active = self.engine.active_operations.lock();
        active.remove(&self.id);
        let idle = active.is_empty();
        drop(active);
        if idle {
            let mut state = self.engine.state.write();
            if *state == EngineState::Busy {
                *state = EngineState::Ready;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ggen_graph::GraphFormat;
    use serde_json::json;

    fn engine_in(dir: &Path) -> Engine {
        let mut config = EngineConfig::default();
        config.output_root = dir.to_path_buf();
        config.baseline_path = dir.join(".ggen-baseline.json");
        config.max_parallelism = 2;
        let engine = Engine::new(config).unwrap();
        engine.initialize().unwrap();
        engine
    }

    fn ctx(value: serde_json::Value) -> RenderContext {
        RenderContext::from_value(value).unwrap()
    }

    #[test]
    fn test_lifecycle_and_not_ready() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = EngineConfig::default();
        config.output_root = dir.path().to_path_buf();
        config.baseline_path = dir.path().join(".ggen-baseline.json");
        let engine = Engine::new(config).unwrap();

        assert_eq!(engine.state(), EngineState::Uninitialized);
        let err = engine.verify(Path::new("x")).unwrap_err();
        assert_eq!(err.kind(), "engine-not-ready");

        engine.initialize().unwrap();
        assert_eq!(engine.state(), EngineState::Ready);

        engine.shutdown().unwrap();
        assert_eq!(engine.state(), EngineState::Shutdown);
        let err = engine.verify(Path::new("x")).unwrap_err();
        assert_eq!(err.kind(), "engine-not-ready");
    }

    #[test]
    fn test_generate_one_and_verify() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine_in(dir.path());
        let template = dir.path().join("hello.tmpl");
        std::fs::write(
            &template,
            "---\nto: hello.txt\ncontentAddressed: false\n---\nHello {{ name }}!",
        )
        .unwrap();

        let outcome = engine
            .generate_one(&template, &ctx(json!({"name": "World"})), None)
            .unwrap();
        let artifact = match outcome {
            GenerateOutcome::Written { artifact, .. } => artifact,
            other => panic!("unexpected outcome {:?}", other),
        };

        let verify = engine.verify(&artifact.output_path).unwrap();
        assert!(verify.verified);
        assert_eq!(engine.metrics().artifacts_written, 1);
    }

    #[test]
    fn test_validate_updates_metrics() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine_in(dir.path());

        let data = Graph::parse(
            b"@prefix foaf: <http://xmlns.com/foaf/0.1/> .\n@prefix ex: <http://example.org/> .\nex:john a foaf:Person ; foaf:name \"John\" .",
            GraphFormat::Turtle,
            "<data>",
        )
        .unwrap();
        let shapes = Graph::parse(
            b"@prefix sh: <http://www.w3.org/ns/shacl#> .\n@prefix foaf: <http://xmlns.com/foaf/0.1/> .\n@prefix ex: <http://example.org/shapes/> .\nex:PersonShape a sh:NodeShape ; sh:targetClass foaf:Person ; sh:property [ sh:path foaf:email ; sh:minCount 1 ] .",
            GraphFormat::Turtle,
            "<shapes>",
        )
        .unwrap();

        let report = engine.validate(&data, &shapes, None).unwrap();
        assert!(!report.ok);
        assert_eq!(report.errors[0].constraint, "minCount");
        assert_eq!(
            report.errors[0].path.as_deref(),
            Some("http://xmlns.com/foaf/0.1/email")
        );
        assert_eq!(engine.metrics().validations, 1);
        assert!(engine.metrics().violations >= 1);
    }

    #[test]
    fn test_drift_cancellation_leaves_baseline_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine_in(dir.path());
        let tracked = dir.path().join("tracked.txt");
        std::fs::write(&tracked, "v1").unwrap();

        engine
            .baseline_update(&[tracked.clone()], &CancellationToken::new())
            .unwrap();
        let baseline_bytes = std::fs::read(dir.path().join(".ggen-baseline.json")).unwrap();

        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = engine.drift(&[tracked], &cancel).unwrap_err();
        assert_eq!(err.kind(), "cancelled");

        let after = std::fs::read(dir.path().join(".ggen-baseline.json")).unwrap();
        assert_eq!(baseline_bytes, after);
    }

    #[test]
    fn test_drift_detects_change() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine_in(dir.path());
        let tracked = dir.path().join("tracked.txt");
        std::fs::write(&tracked, "v1").unwrap();
        engine
            .baseline_update(&[tracked.clone()], &CancellationToken::new())
            .unwrap();

        std::fs::write(&tracked, "v2").unwrap();
        let report = engine.drift(&[tracked], &CancellationToken::new()).unwrap();
        assert!(!report.success);
        assert!(report.summary.action_required);
        assert_eq!(engine.metrics().drifts_detected, 1);
    }

    #[tokio::test]
    async fn test_plan_generation_via_facade() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine_in(dir.path());
        let template = dir.path().join("a.tmpl");
        std::fs::write(
            &template,
            "---\nto: a.txt\ncontentAddressed: false\n---\nvalue {{ n }}",
        )
        .unwrap();

        let entries = vec![PlanEntry {
            id: "e1".to_string(),
            template_path: template,
            context: ctx(json!({"n": 7})),
            output_path: None,
        }];

        let report = engine
            .generate(entries, &CancellationToken::new())
            .await
            .unwrap();
        assert!(report.ok());
        assert!(dir.path().join("a.txt").exists());
    }
}
