//! Lockfile reproducibility and concurrent generation
//!
//! A lockfile run on a clean directory writes exactly the planned files
//! with matching hashes; concurrent generates of the same entry agree on
//! the result and never leave a partial sidecar.

use ggen_artifact::clock::FixedTime;
use ggen_artifact::{
    ArtifactGenerator, Attestation, CancellationToken, GenerateOutcome, GeneratorConfig,
    Lockfile, PlanDriver, PlanEntry, VariablesPolicy,
};
use ggen_template::{RenderContext, TemplateEngine};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;

fn generator(root: &Path) -> Arc<ArtifactGenerator> {
    Arc::new(ArtifactGenerator::new(
        Arc::new(TemplateEngine::new()),
        GeneratorConfig {
            output_root: root.to_path_buf(),
            strict_frontmatter: true,
            variables_policy: VariablesPolicy::Embed,
            time: Arc::new(FixedTime::omitted()),
            blank_node_threshold: 128,
        },
    ))
}

fn ctx(value: serde_json::Value) -> RenderContext {
    RenderContext::from_value(value).expect("valid context")
}

fn write_template(dir: &Path, name: &str, text: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, text).expect("write template");
    path
}

#[tokio::test]
async fn lockfile_reproduces_on_clean_directory() {
    let templates = tempfile::tempdir().expect("tempdir");
    let t1 = write_template(
        templates.path(),
        "alpha.tmpl",
        "---\nto: alpha.txt\ncontentAddressed: false\n---\nalpha {{ v }}\n",
    );
    let t2 = write_template(
        templates.path(),
        "beta.tmpl",
        "---\nto: beta.txt\ncontentAddressed: false\n---\nbeta {{ v }}\n",
    );
    let plan = vec![
        PlanEntry {
            id: "a".to_string(),
            template_path: t1,
            context: ctx(json!({"v": 1})),
            output_path: None,
        },
        PlanEntry {
            id: "b".to_string(),
            template_path: t2,
            context: ctx(json!({"v": 2})),
            output_path: None,
        },
    ];

    // Build the lockfile in one "machine"
    let build_dir = tempfile::tempdir().expect("tempdir");
    let lockfile = PlanDriver::new(generator(build_dir.path()), 4)
        .build_lockfile(&plan)
        .expect("build lockfile");
    let lock_path = build_dir.path().join("plan.lock");
    lockfile.write(&lock_path).expect("write lockfile");

    // Run it on a clean directory in another
    let clean_dir = tempfile::tempdir().expect("tempdir");
    let reloaded = Lockfile::read(&lock_path).expect("read lockfile");
    let report = PlanDriver::new(generator(clean_dir.path()), 4)
        .run_lockfile(&reloaded, plan, &CancellationToken::new())
        .await
        .expect("run lockfile");

    assert!(report.ok());
    for (id, entry) in &reloaded.templates {
        let path = clean_dir.path().join(&entry.output_path);
        let bytes = std::fs::read(&path)
            .unwrap_or_else(|_| panic!("missing output for entry {}", id));
        assert_eq!(
            ggen_hash::hash_bytes(&bytes),
            entry.expected_content_hash,
            "hash mismatch for {}",
            id
        );
    }
}

// Multi-threaded runtime so the spawned generates genuinely overlap; the
// render has no await point, and a current_thread runtime would run the
// tasks back to back without ever exercising the chain-state race.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_generates_share_result_and_hash() {
    let dir = tempfile::tempdir().expect("tempdir");
    let template = write_template(
        dir.path(),
        "shared.tmpl",
        "---\nto: shared.txt\ncontentAddressed: false\n---\npayload {{ n }}\n",
    );
    let generator = generator(dir.path());

    let mut handles = Vec::new();
    for _ in 0..8 {
        let generator = Arc::clone(&generator);
        let template = template.clone();
        handles.push(tokio::spawn(async move {
            generator
                .generate(&template, &ctx(json!({"n": 5})), None)
                .expect("generate")
        }));
    }

    let mut hashes = Vec::new();
    let mut chain_indices = Vec::new();
    for handle in handles {
        match handle.await.expect("join") {
            GenerateOutcome::Written {
                artifact,
                attestation,
            } => {
                hashes.push(artifact.content_hash);
                chain_indices.push(attestation.expect("sidecar emitted").integrity.chain_index);
            }
            other => panic!("unexpected outcome {:?}", other),
        }
    }
    hashes.dedup();
    assert_eq!(hashes.len(), 1, "all generates agree on one hash");

    // No two generates may claim the same chain position, and the counter
    // must not skip: indices are exactly 0..8 in some order.
    chain_indices.sort_unstable();
    assert_eq!(
        chain_indices,
        (0..8).collect::<Vec<u64>>(),
        "chain indices must be distinct and contiguous"
    );

    // The sidecar on disk is complete and self-consistent
    let artifact = dir.path().join("shared.txt");
    let attestation = Attestation::read_beside(&artifact).expect("sidecar readable");
    assert!(attestation.verify_self().expect("self check"));
    assert_eq!(attestation.artifact.hash, hashes[0]);

    let outcome = Attestation::verify_artifact(&artifact).expect("verify");
    assert!(outcome.verified);
}

#[test]
fn attestation_chain_survives_reload() {
    let dir = tempfile::tempdir().expect("tempdir");
    let t1 = write_template(
        dir.path(),
        "one.tmpl",
        "---\nto: one.txt\ncontentAddressed: false\n---\nfirst\n",
    );
    let t2 = write_template(
        dir.path(),
        "two.tmpl",
        "---\nto: two.txt\ncontentAddressed: false\n---\nsecond\n",
    );
    let generator = generator(dir.path());

    for template in [&t1, &t2] {
        generator
            .generate(template, &ctx(json!({})), None)
            .expect("generate");
    }

    let first = Attestation::read_beside(&dir.path().join("one.txt")).expect("first sidecar");
    let second = Attestation::read_beside(&dir.path().join("two.txt")).expect("second sidecar");
    assert_eq!(first.integrity.chain_index, 0);
    assert_eq!(second.integrity.chain_index, 1);
    assert_eq!(second.integrity.previous_hash, first.attestation_hash);
}
