//! # Signed Envelopes
//!
//! A [`SignedEnvelope`] binds a request body to the key that sent it. The
//! credential registry trusts the caller address it is handed, so the node
//! must establish that address before dispatching anything; this module is
//! how it does so.
//!
//! The signed message is the bincode encoding of
//! `(ENVELOPE_DOMAIN, target, nonce, body)`. The domain tag keeps a
//! signature made for some other purpose from being replayed as a registry
//! call. The target is the address the request is meant for (a registry
//! instance, or the factory for creations), so an envelope lifted from one
//! instance's traffic is refused by every other. The nonce lets the
//! receiver reject replays of the same envelope.
//!
//! Signing is a separate step from building the body because the keypair
//! may live somewhere else (a wallet, a remote signer).

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::ENVELOPE_DOMAIN;
use crate::crypto::keys::{PassKeypair, PassPublicKey, PassSignature};
use crate::identity::Address;

/// Reasons an envelope is refused.
#[derive(Debug, Error)]
pub enum EnvelopeError {
    #[error("malformed public key")]
    MalformedPublicKey,

    #[error("malformed signature")]
    MalformedSignature,

    #[error("signature verification failed")]
    BadSignature,

    #[error("envelope was signed for {signed}, not {expected}")]
    WrongTarget { signed: Address, expected: Address },

    #[error("could not encode envelope body: {0}")]
    Encoding(String),
}

/// A request body signed by its caller.
///
/// Keys and signatures travel hex-encoded so the envelope is readable JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignedEnvelope<T> {
    /// Hex-encoded Ed25519 public key of the caller.
    pub public_key: String,
    /// Address the request is addressed to.
    pub target: Address,
    /// Strictly increasing per caller; the receiver enforces ordering.
    pub nonce: u64,
    /// The request itself.
    pub body: T,
    /// Hex-encoded signature over [`signable_bytes`](Self::signable_bytes).
    pub signature: String,
}

impl<T> SignedEnvelope<T>
where
    T: Serialize + DeserializeOwned,
{
    /// Sign `body` for `target` as `keypair` with the given nonce.
    pub fn sign(
        keypair: &PassKeypair,
        target: Address,
        nonce: u64,
        body: T,
    ) -> Result<Self, EnvelopeError> {
        let message = signable_bytes(&target, nonce, &body)?;
        let signature = keypair.sign(&message);
        Ok(Self {
            public_key: keypair.public_key_hex(),
            target,
            nonce,
            body,
            signature: signature.to_hex(),
        })
    }

    /// The exact bytes covered by the signature.
    pub fn signable_bytes(&self) -> Result<Vec<u8>, EnvelopeError> {
        signable_bytes(&self.target, self.nonce, &self.body)
    }

    /// Check the signature and return the authenticated caller address.
    pub fn verify(&self) -> Result<Address, EnvelopeError> {
        let public_key = PassPublicKey::from_hex(&self.public_key)
            .map_err(|_| EnvelopeError::MalformedPublicKey)?;
        let signature = PassSignature::from_hex(&self.signature)
            .map_err(|_| EnvelopeError::MalformedSignature)?;

        let message = self.signable_bytes()?;
        if !public_key.verify(&message, &signature) {
            return Err(EnvelopeError::BadSignature);
        }

        Ok(Address::from_public_key(&public_key))
    }

    /// Consume the envelope as received at `target`, returning the caller,
    /// nonce, and body once both the signature and the target check out.
    pub fn open(self, target: &Address) -> Result<(Address, u64, T), EnvelopeError> {
        let caller = self.verify()?;
        if self.target != *target {
            return Err(EnvelopeError::WrongTarget {
                signed: self.target,
                expected: *target,
            });
        }
        Ok((caller, self.nonce, self.body))
    }
}

fn signable_bytes<T: Serialize>(
    target: &Address,
    nonce: u64,
    body: &T,
) -> Result<Vec<u8>, EnvelopeError> {
    bincode::serialize(&(ENVELOPE_DOMAIN, target, nonce, body))
        .map_err(|e| EnvelopeError::Encoding(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Body {
        action: String,
        id: u64,
    }

    fn body() -> Body {
        Body {
            action: "mint".into(),
            id: 1,
        }
    }

    fn target() -> Address {
        Address::from_bytes([5u8; 32])
    }

    #[test]
    fn verify_returns_signer_address() {
        let kp = PassKeypair::generate();
        let env = SignedEnvelope::sign(&kp, target(), 1, body()).unwrap();
        let caller = env.verify().unwrap();
        assert_eq!(caller, Address::from_public_key(&kp.public_key()));
    }

    #[test]
    fn tampered_body_rejected() {
        let kp = PassKeypair::generate();
        let mut env = SignedEnvelope::sign(&kp, target(), 1, body()).unwrap();
        env.body.id = 2;
        assert!(matches!(env.verify(), Err(EnvelopeError::BadSignature)));
    }

    #[test]
    fn tampered_nonce_rejected() {
        let kp = PassKeypair::generate();
        let mut env = SignedEnvelope::sign(&kp, target(), 1, body()).unwrap();
        env.nonce = 99;
        assert!(matches!(env.verify(), Err(EnvelopeError::BadSignature)));
    }

    #[test]
    fn retargeted_envelope_rejected() {
        let kp = PassKeypair::generate();
        let elsewhere = Address::from_bytes([6u8; 32]);

        // Pointing the envelope somewhere else breaks the signature.
        let mut env = SignedEnvelope::sign(&kp, target(), 1, body()).unwrap();
        env.target = elsewhere;
        assert!(matches!(env.verify(), Err(EnvelopeError::BadSignature)));

        // Delivering it untouched to another address fails the target check.
        let env = SignedEnvelope::sign(&kp, target(), 1, body()).unwrap();
        assert!(matches!(
            env.open(&elsewhere),
            Err(EnvelopeError::WrongTarget { signed, expected })
                if signed == target() && expected == elsewhere
        ));
    }

    #[test]
    fn swapped_key_rejected() {
        let signer = PassKeypair::generate();
        let impostor = PassKeypair::generate();
        let mut env = SignedEnvelope::sign(&signer, target(), 1, body()).unwrap();
        env.public_key = impostor.public_key_hex();
        assert!(matches!(env.verify(), Err(EnvelopeError::BadSignature)));
    }

    #[test]
    fn malformed_fields_rejected() {
        let kp = PassKeypair::generate();
        let mut env = SignedEnvelope::sign(&kp, target(), 1, body()).unwrap();
        env.signature = "zz".into();
        assert!(matches!(
            env.verify(),
            Err(EnvelopeError::MalformedSignature)
        ));

        let mut env = SignedEnvelope::sign(&kp, target(), 1, body()).unwrap();
        env.public_key = "00".into();
        assert!(matches!(
            env.verify(),
            Err(EnvelopeError::MalformedPublicKey)
        ));
    }

    #[test]
    fn json_roundtrip_still_verifies() {
        let kp = PassKeypair::generate();
        let env = SignedEnvelope::sign(&kp, target(), 5, body()).unwrap();
        let json = serde_json::to_string(&env).unwrap();
        let parsed: SignedEnvelope<Body> = serde_json::from_str(&json).unwrap();
        let (caller, nonce, opened) = parsed.open(&target()).unwrap();
        assert_eq!(caller, Address::from_public_key(&kp.public_key()));
        assert_eq!(nonce, 5);
        assert_eq!(opened, body());
    }
}
