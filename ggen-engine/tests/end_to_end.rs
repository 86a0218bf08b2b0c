//! Engine end-to-end flows
//!
//! Generate, verify, drift and validate through the public facade,
//! including cancellation purity and warn/fail exit semantics.

use ggen_artifact::{CancellationToken, PlanEntry};
use ggen_engine::{DriftMode, Engine, EngineConfig, EngineState};
use ggen_graph::{Graph, GraphFormat};
use ggen_template::RenderContext;
use ggen_validation::{exit_code, ExitStatus};
use serde_json::json;
use std::path::Path;

fn config_in(dir: &Path) -> EngineConfig {
    let mut config = EngineConfig::default();
    config.output_root = dir.to_path_buf();
    config.baseline_path = dir.join(".ggen-baseline.json");
    config.max_parallelism = 2;
    config
}

fn ready_engine(config: EngineConfig) -> Engine {
    let engine = Engine::new(config).expect("engine");
    engine.initialize().expect("initialize");
    engine
}

fn ctx(value: serde_json::Value) -> RenderContext {
    RenderContext::from_value(value).expect("context")
}

#[tokio::test]
async fn generate_then_verify_then_drift_roundtrip() {
    let dir = tempfile::tempdir().expect("tempdir");
    let engine = ready_engine(config_in(dir.path()));

    let template = dir.path().join("greeting.tmpl");
    std::fs::write(
        &template,
        "---\nto: greeting.txt\ncontentAddressed: false\n---\nHello {{ name }}!",
    )
    .expect("template");

    let report = engine
        .generate(
            vec![PlanEntry {
                id: "greet".to_string(),
                template_path: template,
                context: ctx(json!({"name": "World"})),
                output_path: None,
            }],
            &CancellationToken::new(),
        )
        .await
        .expect("generate");
    assert!(report.ok());
    let artifact = &report.written[0];
    assert_eq!(
        artifact.content_hash,
        "7f83b1657ff1fc53b92dc18148a1d65dfc2d4b1fa3d677284addd200126d9069"
    );

    // Verified right after write; flips after mutation
    let verify = engine.verify(&artifact.output_path).expect("verify");
    assert!(verify.verified);

    std::fs::write(&artifact.output_path, "Hello world!").expect("tamper");
    let verify = engine.verify(&artifact.output_path).expect("verify again");
    assert!(!verify.verified);

    // Drift sees the tampering through the attestation and, because the
    // sidecar embeds full provenance, reclassifies it as regenerable.
    let drift = engine
        .drift(
            &[artifact.output_path.clone()],
            &CancellationToken::new(),
        )
        .expect("drift");
    assert!(drift.success, "regenerable drift is not fatal");
}

#[tokio::test]
async fn cancellation_leaves_disk_untouched() {
    let dir = tempfile::tempdir().expect("tempdir");
    let engine = ready_engine(config_in(dir.path()));

    let template = dir.path().join("a.tmpl");
    std::fs::write(
        &template,
        "---\nto: a.txt\ncontentAddressed: false\n---\ndata",
    )
    .expect("template");

    let cancel = CancellationToken::new();
    cancel.cancel();
    let report = engine
        .generate(
            vec![PlanEntry {
                id: "a".to_string(),
                template_path: template,
                context: ctx(json!({})),
                output_path: None,
            }],
            &cancel,
        )
        .await
        .expect("run returns");
    assert!(report.cancelled);
    assert!(report.written.is_empty());
    assert!(!dir.path().join("a.txt").exists());
    assert!(!dir.path().join("a.txt.attest.json").exists());
}

#[test]
fn warn_mode_exits_zero_with_semantic_drift() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut config = config_in(dir.path());
    config.drift_mode = DriftMode::Warn;
    let engine = ready_engine(config);

    let tracked = dir.path().join("data.ttl");
    std::fs::write(
        &tracked,
        "@prefix ex: <http://example.org/> .\nex:a ex:p ex:b .\n",
    )
    .expect("write");
    engine
        .baseline_update(&[tracked.clone()], &CancellationToken::new())
        .expect("baseline");

    std::fs::write(
        &tracked,
        "@prefix ex: <http://example.org/> .\nex:a ex:p ex:b .\nex:a a ex:Thing .\n",
    )
    .expect("rewrite");

    let report = engine
        .drift(&[tracked], &CancellationToken::new())
        .expect("drift");
    assert!(report.summary.action_required);
    assert!(report.success, "warn mode absorbs drift");

    let code = exit_code(ExitStatus {
        had_error: false,
        found_violations: report.summary.action_required,
        fail_mode: false,
    });
    assert_eq!(code, 0);

    // fail mode: same findings exit 3
    let code = exit_code(ExitStatus {
        had_error: false,
        found_violations: true,
        fail_mode: true,
    });
    assert_eq!(code, 3);
}

#[test]
fn validation_flow_reports_conformance() {
    let dir = tempfile::tempdir().expect("tempdir");
    let engine = ready_engine(config_in(dir.path()));

    let data = Graph::parse(
        br#"
@prefix foaf: <http://xmlns.com/foaf/0.1/> .
@prefix ex: <http://example.org/> .
ex:john a foaf:Person ; foaf:name "John" .
ex:anna a foaf:Person ; foaf:name "Anna" ; foaf:email "anna@example.org" .
"#,
        GraphFormat::Turtle,
        "<data>",
    )
    .expect("data");
    let shapes = Graph::parse(
        br#"
@prefix sh: <http://www.w3.org/ns/shacl#> .
@prefix foaf: <http://xmlns.com/foaf/0.1/> .
@prefix ex: <http://example.org/shapes/> .
ex:PersonShape a sh:NodeShape ;
    sh:targetClass foaf:Person ;
    sh:property [ sh:path foaf:email ; sh:minCount 1 ] .
"#,
        GraphFormat::Turtle,
        "<shapes>",
    )
    .expect("shapes");

    let report = engine.validate(&data, &shapes, None).expect("validate");
    assert!(!report.ok);
    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.graph.triple_count, data.len());

    // Second run hits the compiled-shapes cache and agrees
    let second = engine.validate(&data, &shapes, None).expect("revalidate");
    assert_eq!(second.errors.len(), report.errors.len());
}

#[test]
fn state_machine_blocks_after_shutdown() {
    let dir = tempfile::tempdir().expect("tempdir");
    let engine = ready_engine(config_in(dir.path()));
    assert_eq!(engine.state(), EngineState::Ready);

    engine.shutdown().expect("shutdown");
    assert_eq!(engine.state(), EngineState::Shutdown);

    let err = engine
        .baseline_update(&[], &CancellationToken::new())
        .expect_err("blocked");
    assert_eq!(err.kind(), "engine-not-ready");
}
