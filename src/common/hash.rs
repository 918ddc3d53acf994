//! Hashing utilities for minicouch
//!
//! BLAKE3 digests back the revision-ID scheme: both replicas of a
//! document must derive identical revids from identical inputs.

/// Compute BLAKE3 hash of data, return hex string
pub fn blake3_hex(data: &[u8]) -> String {
    let hash = blake3::hash(data);
    format!("{}", hash)
}

/// First 16 bytes of the BLAKE3 hash as hex. Revision digests use this
/// shorter form to keep revids at the length CouchDB peers expect.
pub fn short_digest(data: &[u8]) -> String {
    let hash = blake3::hash(data);
    hash.as_bytes()[..16]
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}
