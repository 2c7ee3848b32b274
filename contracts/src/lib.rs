//! # Human Pass Contracts
//!
//! Soulbound credential registries and the factory that mass-produces them:
//!
//! - **Credential Registry**: one non-transferable pass per holder, minted
//!   by self-issuing issuers and burned according to a per-credential
//!   revocation mode.
//! - **Instance Factory**: compiles one registry template and creates cheap
//!   instances that share it, each with isolated state.
//! - **Roles**: explicit admin/issuer/burner membership per registry.
//! - **Cost**: the deterministic price list that compares instance creation
//!   to a full standalone deployment.
//!
//! ## Design Principles
//!
//! 1. Validate first, write second. A failed call never leaves partial state.
//! 2. Custody never changes. Transfer-shaped entry points exist only to fail.
//! 3. Template logic is shared and immutable; state is per instance.
//! 4. Every public type is serializable (serde) for wire transport and
//!    persistent storage.

pub mod cost;
pub mod credential_registry;
pub mod instance_factory;
pub mod roles;
pub mod template;
