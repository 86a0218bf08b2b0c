//! Plan driver
//!
//! Executes a list of `{id, template, context, output}` entries. Entries
//! render concurrently on a bounded pool; commits happen in lexicographic
//! id order in a final phase so the on-disk path set is identical across
//! runs. Render failures are confined to their entry; reproducibility
//! mismatches are fatal.

use crate::cancel::CancellationToken;
use crate::error::{ArtifactError, ArtifactResult};
use crate::generator::{content_addressed_name, Artifact, ArtifactGenerator, GenerateOutcome};
use crate::lockfile::{LockEntry, Lockfile};
use ggen_template::{RenderContext, Template};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Semaphore;

/// One unit of generation work
#[derive(Debug, Clone)]
pub struct PlanEntry {
    /// Stable id; commit order is the lexicographic order of ids
    pub id: String,
    pub template_path: PathBuf,
    pub context: RenderContext,
    /// Overrides the template's `to` directive when set
    pub output_path: Option<PathBuf>,
}

/// Failure confined to a single entry
#[derive(Debug, Clone)]
pub struct EntryFailure {
    pub id: String,
    pub kind: String,
    pub message: String,
}

/// Outcome of a plan run
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub written: Vec<Artifact>,
    pub skipped: Vec<String>,
    pub failures: Vec<EntryFailure>,
    pub cancelled: bool,
}

impl RunReport {
    pub fn ok(&self) -> bool {
        self.failures.is_empty() && !self.cancelled
    }
}

/// Drives a plan through the generator
pub struct PlanDriver {
    generator: Arc<ArtifactGenerator>,
    max_parallelism: usize,
}

impl PlanDriver {
    pub fn new(generator: Arc<ArtifactGenerator>, max_parallelism: usize) -> Self {
        Self {
            generator,
            max_parallelism: max_parallelism.max(1),
        }
    }

    /// Render every entry once and record the hashes.
    ///
    /// Pure: no artifact is written. Entries are ordered by id.
    pub fn build_lockfile(&self, entries: &[PlanEntry]) -> ArtifactResult<Lockfile> {
        let engine = self.generator.engine();
        let mut templates = BTreeMap::new();
        let mut merged_contexts: BTreeMap<String, Value> = BTreeMap::new();
        let mut engine_version = ggen_template::ENGINE_VERSION.to_string();

        let mut ordered: Vec<&PlanEntry> = entries.iter().collect();
        ordered.sort_by(|a, b| a.id.cmp(&b.id));

        for entry in ordered {
            let template = Template::load(&entry.template_path, true)?;
            engine_version = template.engine_version.clone();

            let rendered = engine.render_template(&template, &entry.context)?;
            let content_hash = ggen_hash::hash_bytes(rendered.as_bytes());

            let output = resolve_entry_output(engine, &template, entry, &content_hash)?;

            merged_contexts.insert(entry.id.clone(), entry.context.to_value());
            templates.insert(
                entry.id.clone(),
                LockEntry {
                    template_path: entry.template_path.display().to_string(),
                    template_hash: template.source_hash,
                    context_hash: entry.context.content_hash(),
                    output_path: output.display().to_string(),
                    expected_content_hash: content_hash,
                },
            );
        }

        let merged: serde_json::Map<String, Value> = merged_contexts.into_iter().collect();
        Ok(Lockfile {
            engine_version,
            context_hash: ggen_hash::hash_json(&Value::Object(merged)),
            templates,
        })
    }

    /// Execute every entry, committing in id order.
    pub async fn run(
        &self,
        entries: Vec<PlanEntry>,
        cancel: &CancellationToken,
    ) -> ArtifactResult<RunReport> {
        let rendered = self.render_phase(&entries, cancel).await;
        self.commit_phase(entries, rendered, cancel, None).await
    }

    /// Re-render every lockfile entry and assert the recorded hashes.
    ///
    /// Any hash mismatch is a fatal reproducibility failure naming the
    /// offending entry. Contexts come from the plan entries, matched by id;
    /// a context whose hash disagrees with the lockfile is also fatal.
    pub async fn run_lockfile(
        &self,
        lockfile: &Lockfile,
        entries: Vec<PlanEntry>,
        cancel: &CancellationToken,
    ) -> ArtifactResult<RunReport> {
        for entry in &entries {
            let locked = lockfile.templates.get(&entry.id).ok_or_else(|| {
                ArtifactError::LockfileCorrupt {
                    message: format!("entry '{}' missing from lockfile", entry.id),
                }
            })?;
            let context_hash = entry.context.content_hash();
            if context_hash != locked.context_hash {
                return Err(ArtifactError::Reproducibility {
                    entry: entry.id.clone(),
                    expected: locked.context_hash.clone(),
                    actual: context_hash,
                });
            }
        }

        let rendered = self.render_phase(&entries, cancel).await;
        self.commit_phase(entries, rendered, cancel, Some(lockfile)).await
    }

    /// Concurrent render + hash. CPU-bound; bounded by the pool size.
    async fn render_phase(
        &self,
        entries: &[PlanEntry],
        cancel: &CancellationToken,
    ) -> BTreeMap<String, Result<String, EntryFailure>> {
        let semaphore = Arc::new(Semaphore::new(self.max_parallelism));
        let mut handles = Vec::new();

        for entry in entries {
            if cancel.is_cancelled() {
                break;
            }
            let semaphore = Arc::clone(&semaphore);
            let generator = Arc::clone(&self.generator);
            let entry = entry.clone();
            handles.push(tokio::spawn(async move {
                let _permit = semaphore.acquire_owned().await;
                let result = (|| -> ArtifactResult<String> {
                    let template = Template::load(&entry.template_path, true)?;
                    let rendered = generator.engine().render_template(&template, &entry.context)?;
                    Ok(ggen_hash::hash_bytes(rendered.as_bytes()))
                })();
                let outcome = result.map_err(|e| EntryFailure {
                    id: entry.id.clone(),
                    kind: e.kind().to_string(),
                    message: e.to_string(),
                });
                (entry.id, outcome)
            }));
        }

        let mut results = BTreeMap::new();
        for handle in handles {
            if let Ok((id, outcome)) = handle.await {
                results.insert(id, outcome);
            }
        }
        results
    }

    /// Sequential commit in lexicographic id order.
    async fn commit_phase(
        &self,
        entries: Vec<PlanEntry>,
        rendered: BTreeMap<String, Result<String, EntryFailure>>,
        cancel: &CancellationToken,
        lockfile: Option<&Lockfile>,
    ) -> ArtifactResult<RunReport> {
        let mut report = RunReport::default();
        if cancel.is_cancelled() {
            report.cancelled = true;
            return Ok(report);
        }
        let mut by_id: BTreeMap<String, PlanEntry> =
            entries.into_iter().map(|e| (e.id.clone(), e)).collect();

        for (id, outcome) in rendered {
            if cancel.is_cancelled() {
                report.cancelled = true;
                tracing::warn!(entry = %id, "plan cancelled before commit");
                break;
            }

            let entry = match by_id.remove(&id) {
                Some(e) => e,
                None => continue,
            };

            let hash = match outcome {
                Ok(hash) => hash,
                Err(failure) => {
                    tracing::warn!(entry = %failure.id, kind = %failure.kind, "entry failed");
                    report.failures.push(failure);
                    continue;
                }
            };

            if let Some(lockfile) = lockfile {
                if let Some(locked) = lockfile.templates.get(&id) {
                    if locked.expected_content_hash != hash {
                        return Err(ArtifactError::Reproducibility {
                            entry: id,
                            expected: locked.expected_content_hash.clone(),
                            actual: hash,
                        });
                    }
                }
            }

            match self.generator.generate(
                &entry.template_path,
                &entry.context,
                entry.output_path.as_deref(),
            ) {
                Ok(GenerateOutcome::Written { artifact, .. }) => report.written.push(artifact),
                Ok(GenerateOutcome::Skipped { reason }) => {
                    report.skipped.push(format!("{}: {}", id, reason))
                }
                Err(e) => report.failures.push(EntryFailure {
                    id,
                    kind: e.kind().to_string(),
                    message: e.to_string(),
                }),
            }
        }

        Ok(report)
    }
}

/// Final output path of an entry: explicit path, or the rendered `to`
/// directive, with the content-addressed suffix applied when enabled.
fn resolve_entry_output(
    engine: &Arc<ggen_template::TemplateEngine>,
    template: &Template,
    entry: &PlanEntry,
    content_hash: &str,
) -> ArtifactResult<PathBuf> {
    let base = match &entry.output_path {
        Some(path) => path.clone(),
        None => {
            let to = engine
                .render_output_path(template, &entry.context)?
                .ok_or_else(|| ArtifactError::MissingOutputPath {
                    template: template.path.clone(),
                })?;
            PathBuf::from(to)
        }
    };
    Ok(if template.frontmatter.content_addressed {
        content_addressed_name(&base, &ggen_hash::short_hash_str(content_hash))
    } else {
        base
    })
}
