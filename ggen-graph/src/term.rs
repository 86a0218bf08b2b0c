//! RDF terms
//!
//! Subjects are IRIs or blank nodes; predicates are IRIs; objects are IRIs,
//! blank nodes or literals. Blank-node identity is per-document, never global.

use crate::vocab;
use serde::{Deserialize, Serialize};
use std::fmt;

/// An RDF term in lexical form
///
/// The derived `Ord` (variant order, then fields) is the canonical term
/// order used for sorted enumeration; it is stable across hosts.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Term {
    /// An IRI, stored without angle brackets
    Iri(String),
    /// A blank node label, stored without the `_:` prefix
    Blank(String),
    /// A literal with lexical form, datatype IRI and optional language tag
    Literal {
        lexical: String,
        datatype: String,
        language: Option<String>,
    },
}

impl Term {
    /// Plain string literal (`xsd:string`, no language tag)
    pub fn string_literal(lexical: impl Into<String>) -> Self {
        Term::Literal {
            lexical: lexical.into(),
            datatype: vocab::XSD_STRING.to_string(),
            language: None,
        }
    }

    /// Typed literal
    pub fn typed_literal(lexical: impl Into<String>, datatype: impl Into<String>) -> Self {
        Term::Literal {
            lexical: lexical.into(),
            datatype: datatype.into(),
            language: None,
        }
    }

    /// Language-tagged literal (`rdf:langString`)
    pub fn lang_literal(lexical: impl Into<String>, language: impl Into<String>) -> Self {
        Term::Literal {
            lexical: lexical.into(),
            datatype: vocab::RDF_LANG_STRING.to_string(),
            language: Some(language.into()),
        }
    }

    pub fn is_iri(&self) -> bool {
        matches!(self, Term::Iri(_))
    }

    pub fn is_blank(&self) -> bool {
        matches!(self, Term::Blank(_))
    }

    pub fn is_literal(&self) -> bool {
        matches!(self, Term::Literal { .. })
    }

    /// The IRI when this term is one
    pub fn as_iri(&self) -> Option<&str> {
        match self {
            Term::Iri(iri) => Some(iri),
            _ => None,
        }
    }

    /// The literal lexical form when this term is a literal
    pub fn literal_value(&self) -> Option<&str> {
        match self {
            Term::Literal { lexical, .. } => Some(lexical),
            _ => None,
        }
    }

    /// The literal datatype IRI when this term is a literal
    pub fn literal_datatype(&self) -> Option<&str> {
        match self {
            Term::Literal { datatype, .. } => Some(datatype),
            _ => None,
        }
    }

    /// N-Quads-style lexical form of the term
    pub fn to_nquads(&self) -> String {
        match self {
            Term::Iri(iri) => format!("<{}>", iri),
            Term::Blank(label) => format!("_:{}", label),
            Term::Literal {
                lexical,
                datatype,
                language,
            } => {
                let escaped = escape_literal(lexical);
                if let Some(lang) = language {
                    format!("\"{}\"@{}", escaped, lang)
                } else if datatype == vocab::XSD_STRING {
                    format!("\"{}\"", escaped)
                } else {
                    format!("\"{}\"^^<{}>", escaped, datatype)
                }
            }
        }
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_nquads())
    }
}

/// Escape a literal lexical form for N-Quads output
fn escape_literal(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out
}
