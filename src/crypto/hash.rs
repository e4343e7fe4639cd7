//! Hashing utilities for proposal and identity verification
//!
//! Provides the SHA-256 based digests used for message signing,
//! copayer identifiers and log-safe fingerprints.

use sha2::{Digest, Sha256};

/// Computes SHA-256 hash of the input data
pub fn sha256(data: &[u8]) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().to_vec()
}

/// Computes double SHA-256 hash (SHA-256 of SHA-256)
pub fn double_sha256(data: &[u8]) -> [u8; 32] {
    let first = Sha256::digest(data);
    Sha256::digest(first).into()
}

/// Computes SHA-256 hash and returns it as a hex string
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(sha256(data))
}

/// Hash a text message for signing
///
/// The digest is the double SHA-256 of the UTF-8 bytes with its byte
/// order reversed. Signers and verifiers must both go through this
/// function; see [`crate::crypto::keys::sign_message`] for how the
/// reversed digest is turned back into an ECDSA message.
pub fn hash_message(text: &str) -> [u8; 32] {
    let mut digest = double_sha256(text.as_bytes());
    digest.reverse();
    digest
}

/// Derive the copayer identifier for an extended public key
///
/// One-way hash of the xPubKey string, hex encoded.
pub fn copayer_id(xpub_key: &str) -> String {
    sha256_hex(xpub_key.as_bytes())
}

/// Short, non-reversible fingerprint of a value for log output
pub fn fingerprint(data: &[u8]) -> String {
    hex::encode(&sha256(data)[..4])
}
