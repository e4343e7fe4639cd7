//! Hierarchical deterministic key handling
//!
//! Extended key parsing, child derivation and the request-key
//! attestation used to bind short-lived signing keys to a copayer.

use std::str::FromStr;

use bitcoin::bip32::{DerivationPath, Xpriv, Xpub};
use secp256k1::{PublicKey, Secp256k1};

use super::keys::{sign_message, verify_message, KeyError};

/// Child path of the key that attests request public keys
///
/// Non-hardened so the public counterpart can be derived from the
/// copayer's xPubKey alone.
pub const REQUEST_KEY_AUTH_PATH: &str = "m/2";

/// Parse a base58 extended public key
pub fn parse_xpub(xpub: &str) -> Result<Xpub, KeyError> {
    Xpub::from_str(xpub).map_err(|e| KeyError::InvalidExtendedKey(e.to_string()))
}

/// Parse a base58 extended private key
pub fn parse_xpriv(xpriv: &str) -> Result<Xpriv, KeyError> {
    Xpriv::from_str(xpriv).map_err(|e| KeyError::InvalidExtendedKey(e.to_string()))
}

/// Parse a derivation path such as `m/0/3`
pub fn parse_path(path: &str) -> Result<DerivationPath, KeyError> {
    DerivationPath::from_str(path.trim())
        .map_err(|e| KeyError::InvalidDerivationPath(format!("{}: {}", path, e)))
}

/// Derive the child public key of an xPubKey at `path`
pub fn derive_public_key(xpub: &Xpub, path: &DerivationPath) -> Result<PublicKey, KeyError> {
    let secp = Secp256k1::verification_only();
    let child = xpub
        .derive_pub(&secp, path)
        .map_err(|e| KeyError::InvalidDerivationPath(e.to_string()))?;
    Ok(child.public_key)
}

/// Sign a request public key with the key at [`REQUEST_KEY_AUTH_PATH`]
pub fn sign_request_pub_key(request_pub_key: &str, xpriv: &str) -> Result<String, KeyError> {
    let secp = Secp256k1::signing_only();
    let auth = parse_xpriv(xpriv)?
        .derive_priv(&secp, &parse_path(REQUEST_KEY_AUTH_PATH)?)
        .map_err(|e| KeyError::InvalidDerivationPath(e.to_string()))?;
    sign_message(request_pub_key, &auth.private_key)
}

/// Verify a request public key attestation against a copayer's xPubKey
///
/// Unparseable keys or signatures verify as `false`.
pub fn verify_request_pub_key(request_pub_key: &str, signature: &str, xpub: &str) -> bool {
    let auth = parse_xpub(xpub)
        .and_then(|xpub| derive_public_key(&xpub, &parse_path(REQUEST_KEY_AUTH_PATH)?));
    match auth {
        Ok(auth) => verify_message(
            request_pub_key,
            signature,
            &hex::encode(auth.serialize()),
        ),
        Err(_) => false,
    }
}
