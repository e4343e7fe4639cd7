//! ECDSA message signing for copayer identities
//!
//! Provides key parsing, text signing and verification using the
//! secp256k1 elliptic curve.
//!
//! # Signature convention
//!
//! [`hash_message`] yields the double SHA-256 digest with its bytes
//! reversed. That reversed digest is interpreted as a little-endian
//! integer when it is handed to ECDSA, so the 32-byte message actually
//! signed is the original big-endian double SHA-256 digest. Signatures
//! are DER encoded and exchanged as lowercase hex.

use log::debug;
use secp256k1::ecdsa::Signature;
use secp256k1::{Message, PublicKey, Secp256k1, SecretKey};
use thiserror::Error;

use super::hash::hash_message;

/// Errors that can occur during key operations
#[derive(Error, Debug)]
pub enum KeyError {
    #[error("Invalid private key")]
    InvalidPrivateKey,
    #[error("Invalid public key")]
    InvalidPublicKey,
    #[error("Invalid signature")]
    InvalidSignature,
    #[error("Invalid extended key: {0}")]
    InvalidExtendedKey(String),
    #[error("Invalid derivation path: {0}")]
    InvalidDerivationPath(String),
    #[error("Secp256k1 error: {0}")]
    Secp256k1Error(#[from] secp256k1::Error),
}

/// A key pair consisting of a private key and its corresponding public key
#[derive(Clone)]
pub struct KeyPair {
    pub secret_key: SecretKey,
    pub public_key: PublicKey,
}

impl KeyPair {
    /// Create a key pair from an existing secret key
    pub fn from_secret_key(secret_key: SecretKey) -> Self {
        let secp = Secp256k1::signing_only();
        let public_key = PublicKey::from_secret_key(&secp, &secret_key);
        Self {
            secret_key,
            public_key,
        }
    }

    /// Create a key pair from a hex-encoded private key
    pub fn from_private_key_hex(hex_key: &str) -> Result<Self, KeyError> {
        Ok(Self::from_secret_key(secret_key_from_hex(hex_key)?))
    }

    /// Get the public key as a hex string (compressed format)
    pub fn public_key_hex(&self) -> String {
        hex::encode(self.public_key.serialize())
    }

    /// Sign a text message with the private key
    pub fn sign(&self, text: &str) -> Result<String, KeyError> {
        sign_message(text, &self.secret_key)
    }

    /// Verify a signature over a text message against this key pair
    pub fn verify(&self, text: &str, signature: &str) -> bool {
        verify_message(text, signature, &self.public_key_hex())
    }
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPair")
            .field("public_key", &self.public_key_hex())
            .finish_non_exhaustive()
    }
}

/// Parse a secret key from a hex string
pub fn secret_key_from_hex(hex_key: &str) -> Result<SecretKey, KeyError> {
    let bytes = hex::decode(hex_key).map_err(|_| KeyError::InvalidPrivateKey)?;
    SecretKey::from_slice(&bytes).map_err(|_| KeyError::InvalidPrivateKey)
}

/// Parse a public key from hex string
pub fn public_key_from_hex(hex_key: &str) -> Result<PublicKey, KeyError> {
    let bytes = hex::decode(hex_key).map_err(|_| KeyError::InvalidPublicKey)?;
    PublicKey::from_slice(&bytes).map_err(|_| KeyError::InvalidPublicKey)
}

/// Public counterpart of a hex-encoded private key, compressed hex
pub fn public_key_hex_for(private_key_hex: &str) -> Result<String, KeyError> {
    Ok(KeyPair::from_private_key_hex(private_key_hex)?.public_key_hex())
}

/// The 32-byte ECDSA message for a text: [`hash_message`] read little-endian
fn ecdsa_message(text: &str) -> Result<Message, KeyError> {
    let mut digest = hash_message(text);
    digest.reverse();
    Ok(Message::from_digest_slice(&digest)?)
}

/// Sign a text message with a secret key, returning a hex DER signature
pub fn sign_message(text: &str, secret_key: &SecretKey) -> Result<String, KeyError> {
    let secp = Secp256k1::signing_only();
    let message = ecdsa_message(text)?;
    let signature = secp.sign_ecdsa(&message, secret_key);
    Ok(hex::encode(&*signature.serialize_der()))
}

/// Verify a hex DER signature over a text message
///
/// Malformed keys or signatures verify as `false`.
pub fn verify_message(text: &str, signature: &str, public_key_hex: &str) -> bool {
    match try_verify(text, signature, public_key_hex) {
        Ok(valid) => valid,
        Err(e) => {
            debug!("signature check rejected malformed input: {}", e);
            false
        }
    }
}

fn try_verify(text: &str, signature: &str, public_key_hex: &str) -> Result<bool, KeyError> {
    let public_key = public_key_from_hex(public_key_hex)?;
    let bytes = hex::decode(signature).map_err(|_| KeyError::InvalidSignature)?;
    let mut sig = Signature::from_der(&bytes).map_err(|_| KeyError::InvalidSignature)?;
    sig.normalize_s();

    let secp = Secp256k1::verification_only();
    let message = ecdsa_message(text)?;
    Ok(secp.verify_ecdsa(&message, &sig, &public_key).is_ok())
}
