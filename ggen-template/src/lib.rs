// ggen-template: deterministic template rendering
// A restricted Tera profile: fixed globals, denylisted host-dependent
// filters, sorted iteration, and a render cache keyed by content hashes.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

pub mod context;
pub mod engine;
pub mod error;
pub mod filters;
pub mod frontmatter;

pub use context::RenderContext;
pub use engine::{RenderStats, TemplateEngine};
pub use error::{TemplateError, TemplateResult};
pub use frontmatter::{Frontmatter, OperationMode, RdfBinding, RdfSourceKind, Template};

/// Engine version recorded in attestations and lockfiles
pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");
