//! SHA-256 digests over bytes, canonical JSON and sorted line sets

use crate::canonical::canonical_json;
use crate::{HashError, HashResult};
use serde_json::Value;
use sha2::{Digest, Sha256};

/// Number of hex characters in a short content id
pub const SHORT_HASH_LEN: usize = 16;

/// Hash raw bytes to a 64-character lowercase hex digest.
pub fn hash_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Hash text input, surfacing `invalid-utf8` for undecodable bytes.
pub fn hash_text(bytes: &[u8]) -> HashResult<String> {
    let text = std::str::from_utf8(bytes)
        .map_err(|e| HashError::InvalidUtf8 { position: e.valid_up_to() })?;
    Ok(hash_bytes(text.as_bytes()))
}

/// Hash a JSON value via its canonical form.
///
/// Key order in the input never affects the digest.
pub fn hash_json(value: &Value) -> String {
    hash_bytes(canonical_json(value).as_bytes())
}

/// Hash a set of lines after lexical sorting, newline-joined.
///
/// This is the primitive under graph hashing: the caller supplies one
/// N-Quads-style line per triple and the digest is order-independent.
pub fn hash_sorted_lines<I, S>(lines: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut sorted: Vec<String> = lines.into_iter().map(|l| l.as_ref().to_string()).collect();
    sorted.sort();
    hash_bytes(sorted.join("\n").as_bytes())
}

/// First 16 hex characters of the SHA-256 of `bytes`.
///
/// Used for content-addressed filename suffixes and `content_id` template
/// output.
pub fn short_hash(bytes: &[u8]) -> String {
    let full = hash_bytes(bytes);
    full[..SHORT_HASH_LEN].to_string()
}

/// Shorten an existing 64-hex digest to its 16-hex content id.
pub fn short_hash_str(digest: &str) -> String {
    digest.chars().take(SHORT_HASH_LEN).collect()
}
