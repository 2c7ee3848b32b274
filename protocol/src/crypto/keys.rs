//! # Caller Keys
//!
//! Everyone who talks to a node signs with an Ed25519 key: the factory
//! deployer, registry admins and issuers, and credential holders burning
//! their own credentials. Registries never see these keys. They see the
//! [`Address`](crate::identity::Address) derived from the public half once
//! an envelope has been verified.
//!
//! Keys and signatures cross the wire as hex, so each type here parses from
//! and renders to hex and validates on the way in: a [`PassPublicKey`] is
//! always a valid curve point and a [`PassSignature`] always 64 bytes.

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey, SECRET_KEY_LENGTH};
use rand::rngs::OsRng;
use std::fmt;
use thiserror::Error;

use crate::config::SIGNATURE_LENGTH;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum KeyError {
    #[error("secret key must be {len} hex-encoded bytes", len = SECRET_KEY_LENGTH)]
    InvalidSecretKey,

    #[error("public key is not a valid Ed25519 point")]
    InvalidPublicKey,

    #[error("signature must be {len} hex-encoded bytes", len = SIGNATURE_LENGTH)]
    InvalidSignature,
}

/// A signing identity. Deliberately not `Serialize`: the only way out for
/// the secret is [`secret_key_hex`](Self::secret_key_hex), which the node
/// uses for its deployer key file.
pub struct PassKeypair {
    signing_key: SigningKey,
}

impl PassKeypair {
    /// Fresh keypair from the OS RNG.
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::generate(&mut OsRng),
        }
    }

    /// Deterministic keypair, mostly for tests and fixtures.
    pub fn from_seed(seed: &[u8; SECRET_KEY_LENGTH]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(seed),
        }
    }

    /// Parse a hex secret key. Surrounding whitespace is ignored, since key
    /// files usually end with a newline.
    pub fn from_hex(text: &str) -> Result<Self, KeyError> {
        let seed: [u8; SECRET_KEY_LENGTH] = hex::decode(text.trim())
            .ok()
            .and_then(|bytes| bytes.try_into().ok())
            .ok_or(KeyError::InvalidSecretKey)?;
        Ok(Self::from_seed(&seed))
    }

    pub fn public_key(&self) -> PassPublicKey {
        PassPublicKey(self.signing_key.verifying_key())
    }

    pub fn sign(&self, message: &[u8]) -> PassSignature {
        PassSignature(self.signing_key.sign(message))
    }

    pub fn secret_key_hex(&self) -> String {
        hex::encode(self.signing_key.to_bytes())
    }

    pub fn public_key_hex(&self) -> String {
        self.public_key().to_hex()
    }
}

impl fmt::Debug for PassKeypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PassKeypair(pub={})", self.public_key_hex())
    }
}

/// Keypairs compare by public key only.
impl PartialEq for PassKeypair {
    fn eq(&self, other: &Self) -> bool {
        self.public_key() == other.public_key()
    }
}

impl Eq for PassKeypair {}

/// A validated Ed25519 public key.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct PassPublicKey(VerifyingKey);

impl PassPublicKey {
    pub fn from_hex(text: &str) -> Result<Self, KeyError> {
        let bytes: [u8; 32] = hex::decode(text)
            .ok()
            .and_then(|bytes| bytes.try_into().ok())
            .ok_or(KeyError::InvalidPublicKey)?;
        VerifyingKey::from_bytes(&bytes)
            .map(Self)
            .map_err(|_| KeyError::InvalidPublicKey)
    }

    /// Compressed point bytes; what addresses are derived from.
    pub fn as_bytes(&self) -> &[u8; 32] {
        self.0.as_bytes()
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.as_bytes())
    }

    /// `true` iff `signature` was made over `message` by this key.
    pub fn verify(&self, message: &[u8], signature: &PassSignature) -> bool {
        self.0.verify(message, &signature.0).is_ok()
    }
}

impl fmt::Debug for PassPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PassPublicKey({})", &self.to_hex()[..16])
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
pub struct PassSignature(Signature);

impl PassSignature {
    pub fn from_hex(text: &str) -> Result<Self, KeyError> {
        let bytes: [u8; SIGNATURE_LENGTH] = hex::decode(text)
            .ok()
            .and_then(|bytes| bytes.try_into().ok())
            .ok_or(KeyError::InvalidSignature)?;
        Ok(Self(Signature::from_bytes(&bytes)))
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0.to_bytes())
    }
}

impl fmt::Debug for PassSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = self.to_hex();
        write!(f, "PassSignature({}..{})", &text[..8], &text[text.len() - 8..])
    }
}
