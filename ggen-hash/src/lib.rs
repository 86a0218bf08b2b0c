// ggen-hash: canonical hashing primitives
// Every digest in the engine flows through this crate so that artifact
// hashes, attestation hashes and graph hashes agree on one algorithm.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

pub mod canonical;
pub mod digest;

pub use canonical::canonical_json;
pub use digest::{hash_bytes, hash_json, hash_sorted_lines, hash_text, short_hash, short_hash_str};

use thiserror::Error;

/// Result type for hashing operations
pub type HashResult<T> = Result<T, HashError>;

/// Hashing errors
///
/// The only failure mode is undecodable input; byte-level digests never fail.
#[derive(Debug, Error)]
pub enum HashError {
    #[error("Input is not valid UTF-8 at byte {position}")]
    InvalidUtf8 {
        /// Byte offset of the first invalid sequence
        position: usize,
    },
}

impl HashError {
    /// Stable error kind identifier
    pub fn kind(&self) -> &'static str {
        match self {
            HashError::InvalidUtf8 { .. } => "invalid-utf8",
        }
    }
}
