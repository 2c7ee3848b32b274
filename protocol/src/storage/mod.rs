//! # Storage Module
//!
//! Durable storage for the node: factory instances, the caller index, and
//! the factory sequence counter, kept in sled trees and encoded with bincode
//! (JSON is for the API; bincode is for disk).
//!
//! The credential core itself is storage-agnostic. It hands out serde
//! snapshots, and this layer decides where they live.

pub mod db;

pub use db::{DbError, DbResult, PassDB};
