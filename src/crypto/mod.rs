//! Cryptographic utilities for proposal verification
//!
//! This module provides:
//! - SHA-256 hashing and the reversed-digest message hash
//! - ECDSA message signing (secp256k1)
//! - HD key derivation and request-key attestation
//! - Symmetric encryption of proposal messages

pub mod encryption;
pub mod hash;
pub mod hd;
pub mod keys;

pub use encryption::{
    decrypt_message, encrypt_message, EncryptionConfig, EncryptionError, KeySize,
    SharedEncryptingKey,
};
pub use hash::{copayer_id, double_sha256, fingerprint, hash_message, sha256, sha256_hex};
pub use hd::{
    derive_public_key, parse_path, parse_xpriv, parse_xpub, sign_request_pub_key,
    verify_request_pub_key, REQUEST_KEY_AUTH_PATH,
};
pub use keys::{
    public_key_from_hex, public_key_hex_for, secret_key_from_hex, sign_message, verify_message,
    KeyError, KeyPair,
};
