//! # Identity Module
//!
//! Participants are Ed25519 keypairs; the protocol only ever refers to them
//! by [`Address`]. Keeping the key out of the identity lets registries store
//! fixed-size, hashable addresses and lets the node decide how callers prove
//! control of one (see [`crate::envelope`]).

pub mod address;

pub use crate::crypto::keys::{PassKeypair, PassPublicKey};
pub use address::{Address, AddressError};
