//! Content-addressed artifact generator
//!
//! Render, hash, write atomically, attest. The artifact file is always
//! created before its sidecar; a missing sidecar therefore means
//! in-progress or legacy, never "valid without attestation".

use crate::attestation::{ArtifactRecord, Attestation, Provenance, VerifyOutcome};
use crate::clock::SharedTimeSource;
use crate::error::{ArtifactError, ArtifactResult};
use crate::inject::{self, InjectionOutcome};
use ggen_graph::{Graph, GraphFormat};
use ggen_template::{OperationMode, RdfSourceKind, RenderContext, Template, TemplateEngine};
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// Whether attestations embed the full variable context or only its hash
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VariablesPolicy {
    #[default]
    Embed,
    HashOnly,
}

/// Generator configuration
pub struct GeneratorConfig {
    /// All outputs resolve under this root
    pub output_root: PathBuf,
    /// Reject unknown frontmatter directives
    pub strict_frontmatter: bool,
    /// Attestation variables policy
    pub variables_policy: VariablesPolicy,
    /// Injected time source; `None` timestamps mean deterministic sidecars
    pub time: SharedTimeSource,
    /// Bound above which graph hashing is refused
    pub blank_node_threshold: usize,
}

/// A generated artifact
#[derive(Debug, Clone, PartialEq)]
pub struct Artifact {
    pub output_path: PathBuf,
    /// SHA-256 of the bytes on disk at `output_path`
    pub content_hash: String,
    pub size: u64,
    pub media_type: Option<String>,
}

/// Result of one generate call
#[derive(Debug, Clone)]
pub enum GenerateOutcome {
    Written {
        artifact: Artifact,
        attestation: Option<Attestation>,
    },
    /// skipIf/unless held, or an injection block was already present
    Skipped { reason: String },
}

struct ChainState {
    index: u64,
    previous_hash: Option<String>,
}

/// Renders templates into content-addressed artifacts with sidecars
pub struct ArtifactGenerator {
    engine: Arc<TemplateEngine>,
    config: GeneratorConfig,
    chain: Mutex<ChainState>,
}

impl ArtifactGenerator {
    pub fn new(engine: Arc<TemplateEngine>, config: GeneratorConfig) -> Self {
        Self {
            engine,
            config,
            chain: Mutex::new(ChainState {
                index: 0,
                previous_hash: None,
            }),
        }
    }

    /// Shared template engine
    pub fn engine(&self) -> &Arc<TemplateEngine> {
        &self.engine
    }

    /// Generate one artifact from a template file.
    pub fn generate(
        &self,
        template_path: &Path,
        context: &RenderContext,
        explicit_output: Option<&Path>,
    ) -> ArtifactResult<GenerateOutcome> {
        let template = Template::load(template_path, self.config.strict_frontmatter)?;
        self.generate_from_template(&template, context, explicit_output)
    }

    /// Generate from an already-parsed template.
    pub fn generate_from_template(
        &self,
        template: &Template,
        context: &RenderContext,
        explicit_output: Option<&Path>,
    ) -> ArtifactResult<GenerateOutcome> {
        if template.frontmatter.should_skip(context) {
            tracing::debug!(template = %template.path, "entry skipped by frontmatter");
            return Ok(GenerateOutcome::Skipped {
                reason: "skip-directive".to_string(),
            });
        }

        let source_graph_hash = self.source_graph_hash(template)?;
        let rendered = self.engine.render_template(template, context)?;
        let rendered_hash = ggen_hash::hash_bytes(rendered.as_bytes());

        let rel_output = match explicit_output {
            Some(path) => path.to_path_buf(),
            None => {
                let to = self
                    .engine
                    .render_output_path(template, context)?
                    .ok_or_else(|| ArtifactError::MissingOutputPath {
                        template: template.path.clone(),
                    })?;
                PathBuf::from(to)
            }
        };

        let rel_output = if template.frontmatter.content_addressed {
            content_addressed_name(&rel_output, &ggen_hash::short_hash_str(&rendered_hash))
        } else {
            rel_output
        };

        let output_path = self.resolve_under_root(&rel_output)?;

        let final_bytes = match template.frontmatter.operation_mode() {
            OperationMode::Write => rendered.clone().into_bytes(),
            mode => {
                let existing = self.read_injection_target(&output_path, mode)?;
                match inject::apply(
                    &existing,
                    &rendered,
                    mode,
                    template.frontmatter.before.as_deref(),
                    template.frontmatter.after.as_deref(),
                    &output_path.display().to_string(),
                )? {
                    InjectionOutcome::Applied(content) => content.into_bytes(),
                    InjectionOutcome::AlreadyPresent => {
                        return Ok(GenerateOutcome::Skipped {
                            reason: "already-present".to_string(),
                        })
                    }
                }
            }
        };

        let content_hash = ggen_hash::hash_bytes(&final_bytes);
        let size = final_bytes.len() as u64;

        atomic_write(&output_path, &final_bytes)?;
        self.apply_chmod(&output_path, template)?;

        let media_type = media_type_of(&output_path);
        let artifact = Artifact {
            output_path: output_path.clone(),
            content_hash: content_hash.clone(),
            size,
            media_type: media_type.clone(),
        };

        let attestation = if template.frontmatter.attestations {
            let record = ArtifactRecord {
                path: rel_output.to_string_lossy().into_owned(),
                name: output_path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default(),
                hash: content_hash,
                size,
                mime_type: media_type,
            };
            let variables = match self.config.variables_policy {
                VariablesPolicy::Embed => Some(context.to_value()),
                VariablesPolicy::HashOnly => None,
            };
            let provenance = Provenance {
                template_path: Some(template.path.clone()),
                template_hash: Some(template.source_hash.clone()),
                source_graph_hash,
                variables_hash: context.content_hash(),
                variables,
                engine_version: template.engine_version.clone(),
            };

            let timestamp = if template.frontmatter.deterministic {
                None
            } else {
                self.config.time.now_iso8601()
            };

            // One critical section across read index/prev, seal, sidecar
            // write and advance: concurrent generates must never claim the
            // same chain position or skip an index. Sidecar writes for one
            // generator serialize here; the chain is only advanced once the
            // sidecar is on disk.
            let mut chain = self.chain.lock().map_err(|_| ArtifactError::WriteFailed {
                path: output_path.display().to_string(),
                message: "chain state poisoned".to_string(),
            })?;

            let mut attestation = Attestation::new(
                record,
                provenance,
                chain.index,
                chain.previous_hash.clone(),
                timestamp,
            );
            attestation.seal()?;
            // Artifact first, then sidecar (never transactional across both).
            attestation.write_beside(&output_path)?;

            chain.index += 1;
            chain.previous_hash = attestation.attestation_hash.clone();
            drop(chain);

            Some(attestation)
        } else {
            None
        };

        tracing::info!(
            template = %template.path,
            output = %artifact.output_path.display(),
            hash = %artifact.content_hash,
            "artifact written"
        );

        Ok(GenerateOutcome::Written {
            artifact,
            attestation,
        })
    }

    /// Verify an artifact against its sidecar.
    pub fn verify(&self, output_path: &Path) -> ArtifactResult<VerifyOutcome> {
        Attestation::verify_artifact(output_path)
    }

    /// Hash of the graph bound by the template's `rdf` directive
    fn source_graph_hash(&self, template: &Template) -> ArtifactResult<Option<String>> {
        let binding = match &template.frontmatter.rdf {
            Some(b) => b,
            None => return Ok(None),
        };

        let graph = match binding.kind {
            RdfSourceKind::File => {
                let template_dir = Path::new(&template.path)
                    .parent()
                    .unwrap_or_else(|| Path::new("."));
                let path = template_dir.join(&binding.source);
                let format = match &binding.format {
                    Some(name) => format_by_name(name)?,
                    None => {
                        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("ttl");
                        GraphFormat::from_extension(ext)?
                    }
                };
                let bytes = std::fs::read(&path).map_err(|_| ArtifactError::FileNotFound {
                    path: path.display().to_string(),
                })?;
                Graph::parse(&bytes, format, path.display().to_string())?
            }
            RdfSourceKind::Str | RdfSourceKind::Inline => {
                let format = match &binding.format {
                    Some(name) => format_by_name(name)?,
                    None => GraphFormat::Turtle,
                };
                Graph::parse(binding.source.as_bytes(), format, "<inline>")?
            }
        };

        Ok(Some(graph.canonical_hash(self.config.blank_node_threshold)?))
    }

    /// Lexically resolve a relative output path under the output root.
    fn resolve_under_root(&self, rel: &Path) -> ArtifactResult<PathBuf> {
        if rel.is_absolute() {
            return Err(ArtifactError::PathEscape {
                path: rel.display().to_string(),
            });
        }
        let mut depth: i64 = 0;
        for component in rel.components() {
            match component {
                Component::Normal(_) => depth += 1,
                Component::CurDir => {}
                Component::ParentDir => {
                    depth -= 1;
                    if depth < 0 {
                        return Err(ArtifactError::PathEscape {
                            path: rel.display().to_string(),
                        });
                    }
                }
                _ => {
                    return Err(ArtifactError::PathEscape {
                        path: rel.display().to_string(),
                    })
                }
            }
        }
        Ok(self.config.output_root.join(rel))
    }

    /// Injection targets must exist for inject/lineAt; append/prepend
    /// create the file when absent.
    fn read_injection_target(&self, path: &Path, mode: OperationMode) -> ArtifactResult<String> {
        match std::fs::read_to_string(path) {
            Ok(content) => Ok(content),
            Err(_) => match mode {
                OperationMode::Append | OperationMode::Prepend => Ok(String::new()),
                _ => Err(ArtifactError::FileNotFound {
                    path: path.display().to_string(),
                }),
            },
        }
    }

    #[cfg(unix)]
    fn apply_chmod(&self, path: &Path, template: &Template) -> ArtifactResult<()> {
        use std::os::unix::fs::PermissionsExt;
        if let Some(mode) = template.frontmatter.chmod {
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode)).map_err(|e| {
                ArtifactError::WriteFailed {
                    path: path.display().to_string(),
                    message: format!("chmod failed: {}", e),
                }
            })?;
        }
        Ok(())
    }

    #[cfg(not(unix))]
    fn apply_chmod(&self, _path: &Path, _template: &Template) -> ArtifactResult<()> {
        Ok(())
    }
}

/// Insert the short hash before the extension: `dir/name.txt` becomes
/// `dir/name.<16hex>.txt`.
pub fn content_addressed_name(path: &Path, short_hash: &str) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match path.extension() {
        Some(ext) => format!("{}.{}.{}", stem, short_hash, ext.to_string_lossy()),
        None => format!("{}.{}", stem, short_hash),
    };
    path.with_file_name(name)
}

/// Atomic write: temp file in the target directory, fsync, rename.
pub fn atomic_write(path: &Path, bytes: &[u8]) -> ArtifactResult<()> {
    use std::io::Write;

    static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir).map_err(|e| ArtifactError::WriteFailed {
        path: path.display().to_string(),
        message: format!("create dir failed: {}", e),
    })?;

    let temp = dir.join(format!(
        ".ggen-tmp-{}-{}",
        std::process::id(),
        TEMP_COUNTER.fetch_add(1, Ordering::Relaxed)
    ));

    let result = (|| -> std::io::Result<()> {
        let mut file = std::fs::File::create(&temp)?;
        file.write_all(bytes)?;
        file.sync_all()?;
        std::fs::rename(&temp, path)
    })();

    if let Err(e) = result {
        let _ = std::fs::remove_file(&temp);
        return Err(ArtifactError::WriteFailed {
            path: path.display().to_string(),
            message: e.to_string(),
        });
    }
    Ok(())
}

/// Best-effort media type from the file extension
fn media_type_of(path: &Path) -> Option<String> {
    let ext = path.extension()?.to_str()?;
    let media = match ext.to_ascii_lowercase().as_str() {
        "txt" => "text/plain",
        "md" => "text/markdown",
        "html" | "htm" => "text/html",
        "json" => "application/json",
        "ttl" => "text/turtle",
        "nt" => "application/n-triples",
        "rdf" | "xml" => "application/rdf+xml",
        "jsonld" => "application/ld+json",
        "rs" => "text/x-rust",
        "py" => "text/x-python",
        "js" => "text/javascript",
        "ts" => "text/typescript",
        "yaml" | "yml" => "application/yaml",
        "toml" => "application/toml",
        _ => return None,
    };
    Some(media.to_string())
}

fn format_by_name(name: &str) -> ArtifactResult<GraphFormat> {
    GraphFormat::from_extension(name)
        .or_else(|_| GraphFormat::from_media_type(name))
        .map_err(ArtifactError::Graph)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedTime;
    use serde_json::json;

    fn generator(root: &Path) -> ArtifactGenerator {
        ArtifactGenerator::new(
            Arc::new(TemplateEngine::new()),
            GeneratorConfig {
                output_root: root.to_path_buf(),
                strict_frontmatter: true,
                variables_policy: VariablesPolicy::Embed,
                time: Arc::new(FixedTime::omitted()),
                blank_node_threshold: 128,
            },
        )
    }

    fn ctx(value: serde_json::Value) -> RenderContext {
        RenderContext::from_value(value).unwrap()
    }

    fn write_template(dir: &Path, name: &str, text: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, text).unwrap();
        path
    }

    #[test]
    fn test_generate_write_mode_with_attestation() {
        let dir = tempfile::tempdir().unwrap();
        let tmpl = write_template(
            dir.path(),
            "hello.tmpl",
            "---\nto: hello.txt\ncontentAddressed: false\n---\nHello {{ name }}!",
        );

        let generator = generator(dir.path());
        let outcome = generator
            .generate(&tmpl, &ctx(json!({"name": "World"})), None)
            .unwrap();

        let (artifact, attestation) = match outcome {
            GenerateOutcome::Written {
                artifact,
                attestation,
            } => (artifact, attestation.unwrap()),
            other => panic!("expected written outcome, got {:?}", other),
        };

        assert_eq!(
            artifact.content_hash,
            "7f83b1657ff1fc53b92dc18148a1d65dfc2d4b1fa3d677284addd200126d9069"
        );
        assert!(artifact.output_path.exists());
        assert!(Attestation::sidecar_path(&artifact.output_path).exists());
        assert!(attestation.verify_self().unwrap());

        // Verified immediately after write; any byte change flips it
        let outcome = generator.verify(&artifact.output_path).unwrap();
        assert!(outcome.verified);
        std::fs::write(&artifact.output_path, "tampered").unwrap();
        let outcome = generator.verify(&artifact.output_path).unwrap();
        assert!(!outcome.verified);
    }

    #[test]
    fn test_content_addressed_naming() {
        let dir = tempfile::tempdir().unwrap();
        let tmpl = write_template(dir.path(), "hello.tmpl", "---\nto: hello.txt\n---\nHello!");

        let generator = generator(dir.path());
        let outcome = generator.generate(&tmpl, &ctx(json!({})), None).unwrap();
        let artifact = match outcome {
            GenerateOutcome::Written { artifact, .. } => artifact,
            other => panic!("expected written outcome, got {:?}", other),
        };

        let name = artifact.output_path.file_name().unwrap().to_string_lossy().into_owned();
        let short = ggen_hash::short_hash(b"Hello!");
        assert_eq!(name, format!("hello.{}.txt", short));
    }

    #[test]
    fn test_skip_directive_returns_sentinel() {
        let dir = tempfile::tempdir().unwrap();
        let tmpl = write_template(
            dir.path(),
            "skip.tmpl",
            "---\nto: out.txt\nskipIf: done\n---\nbody",
        );
        let generator = generator(dir.path());
        let outcome = generator.generate(&tmpl, &ctx(json!({"done": true})), None).unwrap();
        assert!(matches!(outcome, GenerateOutcome::Skipped { .. }));
        assert!(!dir.path().join("out.txt").exists());
    }

    #[test]
    fn test_path_escape_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let tmpl = write_template(
            dir.path(),
            "evil.tmpl",
            "---\nto: \"../outside.txt\"\ncontentAddressed: false\n---\nbody",
        );
        let generator = generator(dir.path());
        let err = generator.generate(&tmpl, &ctx(json!({})), None).unwrap_err();
        assert_eq!(err.kind(), "path-escape");
    }

    #[test]
    fn test_inject_mode_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("main.rs");
        std::fs::write(&target, "// imports\nfn main() {}\n").unwrap();

        let tmpl = write_template(
            dir.path(),
            "inject.tmpl",
            "---\nto: main.rs\ninject: true\nafter: \"// imports\"\ncontentAddressed: false\nattestations: false\n---\nuse std::fs;",
        );
        let generator = generator(dir.path());
        let outcome = generator.generate(&tmpl, &ctx(json!({})), None).unwrap();
        assert!(matches!(outcome, GenerateOutcome::Written { .. }));
        let content = std::fs::read_to_string(&target).unwrap();
        assert_eq!(content, "// imports\nuse std::fs;\nfn main() {}\n");

        // Second run is idempotent
        let outcome = generator.generate(&tmpl, &ctx(json!({})), None).unwrap();
        assert!(matches!(outcome, GenerateOutcome::Skipped { .. }));
        let unchanged = std::fs::read_to_string(&target).unwrap();
        assert_eq!(unchanged, content);
    }

    #[test]
    fn test_atomic_write_creates_parents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a/b/c.txt");
        atomic_write(&path, b"data").unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"data");
    }

    #[test]
    fn test_chain_indices_increment() {
        let dir = tempfile::tempdir().unwrap();
        let t1 = write_template(dir.path(), "a.tmpl", "---\nto: a.txt\ncontentAddressed: false\n---\nA");
        let t2 = write_template(dir.path(), "b.tmpl", "---\nto: b.txt\ncontentAddressed: false\n---\nB");
        let generator = generator(dir.path());

        let a1 = match generator.generate(&t1, &ctx(json!({})), None).unwrap() {
            GenerateOutcome::Written { attestation, .. } => attestation.unwrap(),
            other => panic!("unexpected {:?}", other),
        };
        let a2 = match generator.generate(&t2, &ctx(json!({})), None).unwrap() {
            GenerateOutcome::Written { attestation, .. } => attestation.unwrap(),
            other => panic!("unexpected {:?}", other),
        };

        assert_eq!(a1.integrity.chain_index, 0);
        assert_eq!(a2.integrity.chain_index, 1);
        assert_eq!(a2.integrity.previous_hash, a1.attestation_hash);
    }
}
