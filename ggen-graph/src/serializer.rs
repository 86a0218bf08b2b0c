//! Graph serialization
//!
//! Writes a triple set back out through oxigraph's serializers. Named-graph
//! tags are dropped: every supported output format is a triple format and
//! the engine's artifacts live in the default graph.

use crate::error::{GraphError, GraphResult};
use crate::graph::Graph;
use crate::parser::GraphFormat;
use crate::term::Term;
use oxigraph::io::{RdfFormat, RdfSerializer};
use oxigraph::model::{BlankNode, GraphNameRef, Literal, NamedNode, Quad, Subject, Term as OxTerm};
use oxigraph::store::Store;

impl Graph {
    /// Serialize the graph in the requested format.
    pub fn serialize(&self, format: GraphFormat) -> GraphResult<Vec<u8>> {
        let store = Store::new().map_err(|e| GraphError::Store(e.to_string()))?;

        for triple in self.iter() {
            let subject: Subject = match &triple.subject {
                Term::Iri(iri) => NamedNode::new(iri.clone())
                    .map_err(|e| GraphError::InvalidTerm(e.to_string()))?
                    .into(),
                Term::Blank(label) => BlankNode::new(label.clone())
                    .map_err(|e| GraphError::InvalidTerm(e.to_string()))?
                    .into(),
                Term::Literal { .. } => {
                    return Err(GraphError::InvalidTerm(
                        "Literal in subject position".to_string(),
                    ))
                }
            };

            let predicate = NamedNode::new(triple.predicate.clone())
                .map_err(|e| GraphError::InvalidTerm(e.to_string()))?;

            let object: OxTerm = match &triple.object {
                Term::Iri(iri) => NamedNode::new(iri.clone())
                    .map_err(|e| GraphError::InvalidTerm(e.to_string()))?
                    .into(),
                Term::Blank(label) => BlankNode::new(label.clone())
                    .map_err(|e| GraphError::InvalidTerm(e.to_string()))?
                    .into(),
                Term::Literal {
                    lexical,
                    datatype,
                    language,
                } => match language {
                    Some(lang) => Literal::new_language_tagged_literal(lexical.clone(), lang.clone())
                        .map_err(|e| GraphError::InvalidTerm(e.to_string()))?
                        .into(),
                    None => {
                        let dt = NamedNode::new(datatype.clone())
                            .map_err(|e| GraphError::InvalidTerm(e.to_string()))?;
                        Literal::new_typed_literal(lexical.clone(), dt).into()
                    }
                },
            };

            let quad = Quad::new(subject, predicate, object, oxigraph::model::GraphName::DefaultGraph);
            store
                .insert(&quad)
                .map_err(|e| GraphError::Store(e.to_string()))?;
        }

        let rdf_format = match format {
            GraphFormat::Turtle => RdfFormat::Turtle,
            GraphFormat::NTriples => RdfFormat::NTriples,
            GraphFormat::N3 => RdfFormat::N3,
            GraphFormat::JsonLd => RdfFormat::JsonLd {
                profile: oxigraph::io::JsonLdProfile::Expanded.into(),
            },
            GraphFormat::RdfXml => RdfFormat::RdfXml,
        };

        let mut buffer = Vec::new();
        store
            .dump_graph_to_writer(
                GraphNameRef::DefaultGraph,
                RdfSerializer::from_format(rdf_format),
                &mut buffer,
            )
            .map_err(|e| GraphError::Serialize {
                format: format.name().to_string(),
                message: e.to_string(),
            })?;

        Ok(buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TURTLE: &str = r#"
@prefix foaf: <http://xmlns.com/foaf/0.1/> .
@prefix ex: <http://example.org/> .

ex:john a foaf:Person ;
    foaf:name "John" .
"#;

    #[test]
    fn test_serialize_roundtrip_ntriples() {
        let g = Graph::parse(TURTLE.as_bytes(), GraphFormat::Turtle, "<test>").unwrap();
        let bytes = g.serialize(GraphFormat::NTriples).unwrap();
        let back = Graph::parse(&bytes, GraphFormat::NTriples, "<roundtrip>").unwrap();
        assert_eq!(g.triples(), back.triples());
    }

    #[test]
    fn test_serialize_roundtrip_turtle() {
        let g = Graph::parse(TURTLE.as_bytes(), GraphFormat::Turtle, "<test>").unwrap();
        let bytes = g.serialize(GraphFormat::Turtle).unwrap();
        let back = Graph::parse(&bytes, GraphFormat::Turtle, "<roundtrip>").unwrap();
        assert_eq!(g.triples(), back.triples());
    }
}
