//! Copayer roster verification
//!
//! Every copayer joins a wallet by signing `name|xPubKey|requestPubKey`
//! with the wallet-shared private key. A roster relayed by the server is
//! trusted only if every entry carries a valid attestation, no extended
//! key repeats, the size equals the wallet's `n`, and the local copayer
//! is among the entries.

use std::collections::HashSet;

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use super::verifier::VerifyError;
use crate::core::{copayer_hash, sign_copayer_hash, CanonicalError};
use crate::crypto::{copayer_id, public_key_hex_for, verify_message};
use crate::wallet::Credentials;

/// A copayer as reported by the server
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Copayer {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Name encrypted with the wallet's shared key, preferred over `name`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encrypted_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x_pub_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_pub_key: Option<String>,
    /// Attestation by the wallet-shared key over the copayer hash
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
}

impl Copayer {
    /// Build a copayer entry attested with the wallet-shared private key
    pub fn signed(
        name: &str,
        x_pub_key: &str,
        request_pub_key: &str,
        wallet_priv_key: &str,
    ) -> Result<Self, CanonicalError> {
        let signature = sign_copayer_hash(name, x_pub_key, request_pub_key, wallet_priv_key)?;
        Ok(Self {
            id: Some(copayer_id(x_pub_key)),
            name: Some(name.to_string()),
            encrypted_name: None,
            x_pub_key: Some(x_pub_key.to_string()),
            request_pub_key: Some(request_pub_key.to_string()),
            signature: Some(signature),
        })
    }

    /// Name bound by the attestation
    fn attested_name(&self) -> Option<&str> {
        self.encrypted_name.as_deref().or(self.name.as_deref())
    }

    /// Whether the attestation verifies against the wallet public key
    pub fn verify_attestation(&self, wallet_public_key: &str) -> bool {
        let (Some(name), Some(xpub), Some(request), Some(signature)) = (
            self.attested_name(),
            self.x_pub_key.as_deref(),
            self.request_pub_key.as_deref(),
            self.signature.as_deref(),
        ) else {
            return false;
        };
        verify_message(&copayer_hash(name, xpub, request), signature, wallet_public_key)
    }
}

/// Check a server-reported roster against the local credentials
///
/// Returns `Ok(false)` on any roster discrepancy. Fails with
/// [`VerifyError::InvalidUsage`] if the credentials lack the wallet
/// private key, the local extended public key, or `n`.
pub fn check_copayers(credentials: &Credentials, copayers: &[Copayer]) -> Result<bool, VerifyError> {
    let wallet_priv_key = credentials
        .wallet_priv_key
        .as_deref()
        .ok_or_else(|| VerifyError::InvalidUsage("credentials lack walletPrivKey".to_string()))?;
    let own_xpub = credentials
        .x_pub_key
        .as_deref()
        .ok_or_else(|| VerifyError::InvalidUsage("credentials lack xPubKey".to_string()))?;
    let n = credentials
        .n
        .ok_or_else(|| VerifyError::InvalidUsage("credentials lack n".to_string()))?;
    let wallet_public_key = public_key_hex_for(wallet_priv_key)
        .map_err(|e| VerifyError::InvalidUsage(format!("walletPrivKey: {}", e)))?;

    if copayers.len() != n {
        warn!("roster has {} copayers, wallet expects {}", copayers.len(), n);
        return Ok(false);
    }

    let mut seen = HashSet::new();
    for copayer in copayers {
        if let Some(xpub) = copayer.x_pub_key.as_deref() {
            if !seen.insert(xpub) {
                warn!("roster repeats copayer {}", copayer_id(xpub));
                return Ok(false);
            }
        }
    }

    for (index, copayer) in copayers.iter().enumerate() {
        if !copayer.verify_attestation(&wallet_public_key) {
            warn!("roster entry {} has a missing field or bad attestation", index);
            return Ok(false);
        }
    }

    if !seen.contains(own_xpub) {
        warn!("local copayer {} missing from roster", copayer_id(own_xpub));
        return Ok(false);
    }

    debug!("roster of {} copayers verified", copayers.len());
    Ok(true)
}
