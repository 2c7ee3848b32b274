// Copyright (c) 2026 Human Pass Contributors. MIT License.
// See LICENSE for details.

//! # Human Pass Protocol Library
//!
//! Shared primitives for the Human Pass credential system. The contracts
//! crate builds soulbound registries on top of these; the node binary uses
//! them to authenticate callers and persist state.
//!
//! ## Modules
//!
//! - **crypto**: Ed25519 keys and signatures, BLAKE3 and SHA-256 helpers.
//! - **identity**: Bech32 [`Address`](identity::Address) derivation.
//! - **envelope**: signed request envelopes that yield an authenticated caller.
//! - **storage**: sled-backed persistence for registry instances.
//! - **config**: protocol constants and node defaults.

pub mod config;
pub mod crypto;
pub mod envelope;
pub mod identity;
pub mod storage;
