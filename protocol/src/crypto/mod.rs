//! # Cryptographic Primitives
//!
//! Thin, type-safe wrappers around audited implementations:
//!
//! - **Ed25519** (`ed25519-dalek`) for caller signatures.
//! - **BLAKE3** for address derivation.
//! - **SHA-256** for template and role fingerprints.

pub mod hash;
pub mod keys;

pub use hash::{domain_hash, sha256};
pub use keys::{KeyError, PassKeypair, PassPublicKey, PassSignature};
