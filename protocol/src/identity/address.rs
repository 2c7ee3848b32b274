//! # Addresses
//!
//! An [`Address`] is how every participant and every registry instance is
//! named. For participants it is derived from an Ed25519 public key:
//!
//! ```text
//! public_key (32 bytes)
//!     -> BLAKE3/derive_key("humanpass/address") -> 32 bytes
//!     -> Bech32("hp", hash)                     -> hp1qw508d6qe...
//! ```
//!
//! Registry instances produced by the factory get addresses derived from the
//! factory's own address and a creation sequence number, so no key exists
//! for them and nobody can sign as an instance.
//!
//! In JSON an address is its Bech32 string; in bincode it is the raw
//! 32 bytes.

use bech32::{Bech32, Hrp};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::config::ADDRESS_HRP;
use crate::crypto::hash::domain_hash;
use crate::crypto::keys::PassPublicKey;

const ADDRESS_CONTEXT: &str = "humanpass/address";
const INSTANCE_CONTEXT: &str = "humanpass/instance";

/// Errors raised while parsing an address string.
#[derive(Debug, Error)]
pub enum AddressError {
    #[error("bech32 decode error: {0}")]
    Bech32Decode(String),

    #[error("invalid HRP: expected '{expected}', got '{got}'")]
    InvalidHrp { expected: String, got: String },

    #[error("invalid address data length: expected 32 bytes, got {0}")]
    InvalidDataLength(usize),
}

/// A 32-byte identity, displayed as Bech32 with the `hp` prefix.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address([u8; 32]);

impl Address {
    /// Wrap raw bytes. No derivation is applied.
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// The address controlled by the holder of `public_key`.
    pub fn from_public_key(public_key: &PassPublicKey) -> Self {
        Self(domain_hash(ADDRESS_CONTEXT, &[public_key.as_bytes()]))
    }

    /// Address of the `sequence`-th instance created by `factory`.
    ///
    /// Deterministic, so a restored factory re-derives the same addresses.
    pub fn derive_instance(factory: &Address, sequence: u64) -> Self {
        Self(domain_hash(
            INSTANCE_CONTEXT,
            &[factory.as_bytes(), &sequence.to_be_bytes()],
        ))
    }

    /// Raw bytes of the address.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Short form for log lines: prefix plus the first few data characters.
    pub fn short(&self) -> String {
        let full = self.to_string();
        full.chars().take(ADDRESS_HRP.len() + 9).collect()
    }

    fn hrp() -> Hrp {
        Hrp::parse_unchecked(ADDRESS_HRP)
    }
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (hrp, data) =
            bech32::decode(s).map_err(|e| AddressError::Bech32Decode(e.to_string()))?;

        if hrp != Self::hrp() {
            return Err(AddressError::InvalidHrp {
                expected: ADDRESS_HRP.to_string(),
                got: hrp.to_string(),
            });
        }

        let bytes: [u8; 32] = data
            .as_slice()
            .try_into()
            .map_err(|_| AddressError::InvalidDataLength(data.len()))?;
        Ok(Self(bytes))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        bech32::encode_to_fmt::<Bech32, _>(f, Self::hrp(), &self.0).map_err(|_| fmt::Error)
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self)
    }
}

impl Serialize for Address {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            serializer.collect_str(self)
        } else {
            self.0.serialize(serializer)
        }
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        if deserializer.is_human_readable() {
            let s = String::deserialize(deserializer)?;
            s.parse().map_err(serde::de::Error::custom)
        } else {
            let bytes = <[u8; 32]>::deserialize(deserializer)?;
            Ok(Self(bytes))
        }
    }
}
