//! # Hashing Utilities
//!
//! Two hash functions, each with one job:
//!
//! - **BLAKE3** derives addresses (from public keys and from factory
//!   instance sequences). Domain-separated via `derive_key` so an address
//!   can never collide with a hash computed for another purpose.
//! - **SHA-256** fingerprints registry templates and role identifiers, the
//!   same construction access-control libraries on EVM chains use for role
//!   ids, so external tooling can recompute them.

use sha2::{Digest, Sha256};

/// Compute the SHA-256 hash of the input data as a fixed-size array.
///
/// # Example
///
/// ```
/// use humanpass_protocol::crypto::sha256;
///
/// let hash = sha256(b"ADMIN_ROLE");
/// assert_eq!(hash.len(), 32);
/// ```
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    let result = hasher.finalize();
    let mut output = [0u8; 32];
    output.copy_from_slice(&result);
    output
}

/// Compute a domain-separated BLAKE3 hash over several parts.
///
/// Uses BLAKE3's `derive_key` mode: the context string selects a distinct
/// IV, so `domain_hash("a", x)` and `domain_hash("b", x)` never collide.
/// Parts are fed sequentially without building a temporary buffer.
pub fn domain_hash(context: &str, parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = blake3::Hasher::new_derive_key(context);
    for part in parts {
        hasher.update(part);
    }
    *hasher.finalize().as_bytes()
}
