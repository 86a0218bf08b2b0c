//! RDF document parsing
//!
//! All formats go through oxigraph's parsers; the resulting quads are
//! extracted into the engine's sorted triple set.

use crate::error::{GraphError, GraphResult};
use crate::graph::Graph;
use crate::term::Term;
use crate::triple::Triple;
use oxigraph::io::RdfFormat;
use oxigraph::model::{GraphName, Subject, Term as OxTerm};
use oxigraph::store::Store;

/// Supported RDF document formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GraphFormat {
    Turtle,
    NTriples,
    /// N3 is parsed as Turtle with a few additions
    N3,
    JsonLd,
    RdfXml,
}

impl GraphFormat {
    /// Format from a file extension (`ttl`, `nt`, `n3`, `jsonld`, `rdf`, ...)
    pub fn from_extension(ext: &str) -> GraphResult<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "ttl" | "turtle" => Ok(GraphFormat::Turtle),
            "nt" | "ntriples" => Ok(GraphFormat::NTriples),
            "n3" => Ok(GraphFormat::N3),
            "jsonld" | "json-ld" => Ok(GraphFormat::JsonLd),
            "rdf" | "xml" | "rdfxml" | "owl" => Ok(GraphFormat::RdfXml),
            other => Err(GraphError::UnknownFormat(other.to_string())),
        }
    }

    /// Format from a media type
    pub fn from_media_type(media_type: &str) -> GraphResult<Self> {
        match media_type {
            "text/turtle" => Ok(GraphFormat::Turtle),
            "application/n-triples" => Ok(GraphFormat::NTriples),
            "text/n3" => Ok(GraphFormat::N3),
            "application/ld+json" => Ok(GraphFormat::JsonLd),
            "application/rdf+xml" => Ok(GraphFormat::RdfXml),
            other => Err(GraphError::UnknownFormat(other.to_string())),
        }
    }

    /// Canonical name used in error messages and reports
    pub fn name(&self) -> &'static str {
        match self {
            GraphFormat::Turtle => "turtle",
            GraphFormat::NTriples => "n-triples",
            GraphFormat::N3 => "n3",
            GraphFormat::JsonLd => "json-ld",
            GraphFormat::RdfXml => "rdf-xml",
        }
    }

    fn to_rdf_format(self) -> RdfFormat {
        match self {
            GraphFormat::Turtle => RdfFormat::Turtle,
            GraphFormat::NTriples => RdfFormat::NTriples,
            GraphFormat::N3 => RdfFormat::N3,
            GraphFormat::JsonLd => RdfFormat::JsonLd {
                profile: oxigraph::io::JsonLdProfile::Expanded.into(),
            },
            GraphFormat::RdfXml => RdfFormat::RdfXml,
        }
    }
}

impl Graph {
    /// Parse a document into a triple set.
    ///
    /// `source` tags the graph for error messages and provenance (file path
    /// or `"<string>"`). Malformed input surfaces `parse-error` with the
    /// parser's message, which carries line/column when available.
    pub fn parse(bytes: &[u8], format: GraphFormat, source: impl Into<String>) -> GraphResult<Graph> {
        let source = source.into();
        let store = Store::new().map_err(|e| GraphError::Store(e.to_string()))?;

        store
            .load_from_reader(format.to_rdf_format(), bytes)
            .map_err(|e| GraphError::Parse {
                format: format.name().to_string(),
                source_name: source.clone(),
                message: e.to_string(),
            })?;

        let mut graph = Graph::new(source.clone());
        for quad in store.iter() {
            let quad = quad.map_err(|e| GraphError::Store(e.to_string()))?;

            let subject = match quad.subject {
                Subject::NamedNode(n) => Term::Iri(n.into_string()),
                Subject::BlankNode(b) => Term::Blank(b.into_string()),
                other => {
                    return Err(GraphError::InvalidTerm(format!(
                        "Unsupported subject term in {}: {}",
                        source, other
                    )))
                }
            };

            let predicate = quad.predicate.into_string();

            let object = match quad.object {
                OxTerm::NamedNode(n) => Term::Iri(n.into_string()),
                OxTerm::BlankNode(b) => Term::Blank(b.into_string()),
                OxTerm::Literal(lit) => {
                    let language = lit.language().map(|l| l.to_string());
                    let datatype = lit.datatype().as_str().to_string();
                    Term::Literal {
                        lexical: lit.value().to_string(),
                        datatype,
                        language,
                    }
                }
                other => {
                    return Err(GraphError::InvalidTerm(format!(
                        "Unsupported object term in {}: {}",
                        source, other
                    )))
                }
            };

            let graph_name = match quad.graph_name {
                GraphName::DefaultGraph => None,
                GraphName::NamedNode(n) => Some(n.into_string()),
                GraphName::BlankNode(b) => Some(format!("_:{}", b.into_string())),
            };

            graph.insert(Triple {
                subject,
                predicate,
                object,
                graph: graph_name,
            });
        }

        tracing::debug!(
            source = %graph.source(),
            format = format.name(),
            triples = graph.len(),
            "parsed RDF document"
        );
        Ok(graph)
    }

    /// Parse from a file, inferring the format from the extension
    pub fn parse_file(path: &std::path::Path) -> GraphResult<Graph> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .ok_or_else(|| GraphError::UnknownFormat(path.display().to_string()))?;
        let format = GraphFormat::from_extension(ext)?;
        let bytes = std::fs::read(path).map_err(|e| GraphError::Parse {
            format: format.name().to_string(),
            source_name: path.display().to_string(),
            message: e.to_string(),
        })?;
        Graph::parse(&bytes, format, path.display().to_string())
    }
}
