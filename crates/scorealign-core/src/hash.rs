//! Content hashing.
//!
//! Hashes are hex-encoded BLAKE3 digests. Score hashes identify a score
//! document independently of where it was fetched from, and MAPS hashes let
//! two reconciliation runs be compared byte for byte.

use crate::error::CoreResult;
use crate::observation::{maps_to_json, MapsObservation};

/// Computes the BLAKE3 hash of a score document.
///
/// # Returns
/// * A 64-character lowercase hexadecimal string
pub fn score_content_hash(data: &[u8]) -> String {
    blake3::hash(data).to_hex().to_string()
}

/// Computes the BLAKE3 hash of the serialised MAPS observations.
pub fn maps_hash(observations: &[MapsObservation]) -> CoreResult<String> {
    let json = maps_to_json(observations)?;
    Ok(blake3::hash(json.as_bytes()).to_hex().to_string())
}

/// Short form of a content hash for use in file names.
pub fn short_hash(hash: &str) -> &str {
    &hash[..hash.len().min(12)]
}
