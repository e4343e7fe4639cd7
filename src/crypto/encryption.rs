//! Symmetric encryption of proposal messages
//!
//! Messages attached to proposals and outputs travel through the
//! coordinating server encrypted under a key every copayer derives from
//! the wallet-shared private key. Each ciphertext is a small JSON
//! envelope carrying its own salt and nonce:
//!
//! ```text
//! {"v":1,"ks":128,"iter":1,"mem":4096,"salt":"<hex>","iv":"<hex>","ct":"<hex>"}
//! ```
//!
//! - KDF: Argon2id over the shared key and a random 16-byte salt, with
//!   the iteration count and memory cost from [`EncryptionConfig`].
//! - AEAD: AES-GCM (128 or 256 bit key) with a random 12-byte nonce.
//!
//! Decryption only accepts envelopes produced with the caller's own
//! configuration, so a server cannot make a client burn memory by
//! inflating the KDF parameters.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes128Gcm, Aes256Gcm, Nonce};
use argon2::{Algorithm, Argon2, Params, Version};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::hash::sha256;
use super::keys::{secret_key_from_hex, KeyError};

const ENVELOPE_VERSION: u8 = 1;
const SALT_LEN: usize = 16;
const NONCE_LEN: usize = 12;
const SHARED_KEY_LEN: usize = 16;

/// Errors from message encryption and decryption
#[derive(Error, Debug)]
pub enum EncryptionError {
    #[error("Malformed ciphertext: {0}")]
    Malformed(String),
    #[error("Ciphertext parameters do not match configuration")]
    ParameterMismatch,
    #[error("Key derivation failed: {0}")]
    Kdf(String),
    #[error("Encryption failed")]
    EncryptionFailed,
    #[error("Authentication failed")]
    AuthenticationFailed,
    #[error("Decrypted message is not valid UTF-8")]
    InvalidUtf8,
}

/// AES key size
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeySize {
    Aes128,
    Aes256,
}

impl KeySize {
    /// Key length in bits, as recorded in the envelope
    pub fn bits(&self) -> u16 {
        match self {
            KeySize::Aes128 => 128,
            KeySize::Aes256 => 256,
        }
    }

    fn bytes(&self) -> usize {
        self.bits() as usize / 8
    }
}

/// Tunables for message encryption
///
/// Passed explicitly to every encrypt/decrypt call; both sides of a
/// wallet must agree on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptionConfig {
    /// AES key size
    pub key_size: KeySize,
    /// Argon2id time cost
    pub iterations: u32,
    /// Argon2id memory cost in KiB
    pub memory_kib: u32,
}

impl Default for EncryptionConfig {
    fn default() -> Self {
        // The shared key is already uniformly random; stretching only
        // needs to be cheap and deterministic.
        Self {
            key_size: KeySize::Aes128,
            iterations: 1,
            memory_kib: 4096,
        }
    }
}

/// Wallet-wide message key, derived once from the wallet private key
#[derive(Clone, PartialEq, Eq)]
pub struct SharedEncryptingKey([u8; SHARED_KEY_LEN]);

impl SharedEncryptingKey {
    /// First 16 bytes of SHA-256 over the raw wallet private key
    pub fn from_wallet_priv_key(wallet_priv_key: &str) -> Result<Self, KeyError> {
        let secret = secret_key_from_hex(wallet_priv_key)?;
        let digest = sha256(&secret.secret_bytes());
        let mut key = [0u8; SHARED_KEY_LEN];
        key.copy_from_slice(&digest[..SHARED_KEY_LEN]);
        Ok(Self(key))
    }

    /// Wrap raw key bytes
    pub fn from_bytes(key: [u8; SHARED_KEY_LEN]) -> Self {
        Self(key)
    }

    fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl std::fmt::Debug for SharedEncryptingKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SharedEncryptingKey(<redacted>)")
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    v: u8,
    ks: u16,
    iter: u32,
    mem: u32,
    salt: String,
    iv: String,
    ct: String,
}

fn derive_cipher_key(
    key: &SharedEncryptingKey,
    salt: &[u8],
    config: &EncryptionConfig,
) -> Result<Vec<u8>, EncryptionError> {
    let params = Params::new(
        config.memory_kib,
        config.iterations,
        1,
        Some(config.key_size.bytes()),
    )
    .map_err(|e| EncryptionError::Kdf(e.to_string()))?;
    let argon = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

    let mut out = vec![0u8; config.key_size.bytes()];
    argon
        .hash_password_into(key.as_bytes(), salt, &mut out)
        .map_err(|e| EncryptionError::Kdf(e.to_string()))?;
    Ok(out)
}

/// Encrypt a short message under the wallet's shared key
pub fn encrypt_message(
    plaintext: &str,
    key: &SharedEncryptingKey,
    config: &EncryptionConfig,
) -> Result<String, EncryptionError> {
    let mut salt = [0u8; SALT_LEN];
    let mut iv = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut salt);
    OsRng.fill_bytes(&mut iv);

    let cipher_key = derive_cipher_key(key, &salt, config)?;
    let nonce = Nonce::from_slice(&iv);
    let ct = match config.key_size {
        KeySize::Aes128 => Aes128Gcm::new_from_slice(&cipher_key)
            .map_err(|_| EncryptionError::EncryptionFailed)?
            .encrypt(nonce, plaintext.as_bytes()),
        KeySize::Aes256 => Aes256Gcm::new_from_slice(&cipher_key)
            .map_err(|_| EncryptionError::EncryptionFailed)?
            .encrypt(nonce, plaintext.as_bytes()),
    }
    .map_err(|_| EncryptionError::EncryptionFailed)?;

    let envelope = Envelope {
        v: ENVELOPE_VERSION,
        ks: config.key_size.bits(),
        iter: config.iterations,
        mem: config.memory_kib,
        salt: hex::encode(salt),
        iv: hex::encode(iv),
        ct: hex::encode(ct),
    };
    serde_json::to_string(&envelope).map_err(|e| EncryptionError::Malformed(e.to_string()))
}

/// Decrypt a message produced by [`encrypt_message`]
///
/// Any malformed, tampered or foreign ciphertext is an error; callers
/// comparing contents treat it as a mismatch.
pub fn decrypt_message(
    ciphertext: &str,
    key: &SharedEncryptingKey,
    config: &EncryptionConfig,
) -> Result<String, EncryptionError> {
    let envelope: Envelope =
        serde_json::from_str(ciphertext).map_err(|e| EncryptionError::Malformed(e.to_string()))?;

    if envelope.v != ENVELOPE_VERSION
        || envelope.ks != config.key_size.bits()
        || envelope.iter != config.iterations
        || envelope.mem != config.memory_kib
    {
        return Err(EncryptionError::ParameterMismatch);
    }

    let salt = hex::decode(&envelope.salt).map_err(|e| EncryptionError::Malformed(e.to_string()))?;
    let iv = hex::decode(&envelope.iv).map_err(|e| EncryptionError::Malformed(e.to_string()))?;
    let ct = hex::decode(&envelope.ct).map_err(|e| EncryptionError::Malformed(e.to_string()))?;
    if salt.len() != SALT_LEN || iv.len() != NONCE_LEN {
        return Err(EncryptionError::Malformed("bad salt or nonce length".to_string()));
    }

    let cipher_key = derive_cipher_key(key, &salt, config)?;
    let nonce = Nonce::from_slice(&iv);
    let plaintext = match config.key_size {
        KeySize::Aes128 => Aes128Gcm::new_from_slice(&cipher_key)
            .map_err(|_| EncryptionError::AuthenticationFailed)?
            .decrypt(nonce, ct.as_slice()),
        KeySize::Aes256 => Aes256Gcm::new_from_slice(&cipher_key)
            .map_err(|_| EncryptionError::AuthenticationFailed)?
            .decrypt(nonce, ct.as_slice()),
    }
    .map_err(|_| EncryptionError::AuthenticationFailed)?;

    String::from_utf8(plaintext).map_err(|_| EncryptionError::InvalidUtf8)
}
