//! Wallet credentials
//!
//! The local wallet-membership descriptor the verifiers read from:
//! network, script type, threshold, the copayer public-key ring and the
//! local key material. Verifiers that need the ring take a
//! [`CompleteCredentials`], which can only be obtained through
//! `TryFrom<&Credentials>` after the ring and threshold have been checked.

use std::collections::HashSet;
use std::str::FromStr;

use bitcoin::Network;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

use crate::core::{ScriptType, SpendPolicy, MAX_MULTISIG_KEYS};
use crate::crypto::{
    copayer_id, parse_xpub, public_key_from_hex, public_key_hex_for, KeyError,
    SharedEncryptingKey,
};

/// Credentials related errors
#[derive(Error, Debug)]
pub enum CredentialsError {
    #[error("Missing credentials field: {0}")]
    MissingField(&'static str),
    #[error("Invalid threshold: {m}-of-{n}")]
    InvalidThreshold { m: usize, n: usize },
    #[error("Incomplete public key ring: expected {expected} entries, got {got}")]
    IncompleteRing { expected: usize, got: usize },
    #[error("Duplicate extended public key in ring")]
    DuplicateRingEntry,
    #[error("Invalid ring entry {index}: {reason}")]
    InvalidRingEntry { index: usize, reason: String },
    #[error("Unknown network: {0}")]
    UnknownNetwork(String),
    #[error("Key error: {0}")]
    KeyError(#[from] KeyError),
}

// =============================================================================
// Network names
// =============================================================================

/// Parse a network name; `livenet` is accepted for mainnet
pub fn parse_network(name: &str) -> Result<Network, CredentialsError> {
    match name {
        "livenet" | "mainnet" => Ok(Network::Bitcoin),
        other => {
            Network::from_str(other).map_err(|_| CredentialsError::UnknownNetwork(other.to_string()))
        }
    }
}

/// Wallet-facing name of a network
pub fn network_name(network: Network) -> String {
    match network {
        Network::Bitcoin => "livenet".to_string(),
        other => other.to_string(),
    }
}

mod network_serde {
    use super::*;

    pub fn serialize<S: Serializer>(network: &Network, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&network_name(*network))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Network, D::Error> {
        let name = String::deserialize(deserializer)?;
        parse_network(&name).map_err(serde::de::Error::custom)
    }
}

// =============================================================================
// Credentials
// =============================================================================

/// One copayer's entry in the wallet's public-key ring
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicKeyRingEntry {
    pub x_pub_key: String,
    pub request_pub_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub copayer_name: Option<String>,
    /// Name encrypted with the wallet's shared key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encrypted_name: Option<String>,
}

impl PublicKeyRingEntry {
    /// Copayer identifier derived from the extended public key
    pub fn copayer_id(&self) -> String {
        copayer_id(&self.x_pub_key)
    }
}

fn default_address_type() -> ScriptType {
    ScriptType::P2SH
}

/// Wallet membership descriptor held by the local client
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credentials {
    #[serde(with = "network_serde")]
    pub network: Network,
    #[serde(default = "default_address_type")]
    pub address_type: ScriptType,
    /// Required signatures
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub m: Option<usize>,
    /// Total copayers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub n: Option<usize>,
    #[serde(default)]
    pub public_key_ring: Vec<PublicKeyRingEntry>,
    /// Wallet-shared private key (hex)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wallet_priv_key: Option<String>,
    /// Local copayer's extended public key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x_pub_key: Option<String>,
    /// Local copayer's extended private key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x_priv_key: Option<String>,
    /// Local copayer's request private key (hex)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_priv_key: Option<String>,
}

impl Credentials {
    /// Whether [`CompleteCredentials`] can be built from these credentials
    pub fn is_complete(&self) -> bool {
        CompleteCredentials::try_from(self).is_ok()
    }

    /// Public counterpart of the wallet-shared private key
    pub fn wallet_public_key_hex(&self) -> Result<String, CredentialsError> {
        let key = self
            .wallet_priv_key
            .as_deref()
            .ok_or(CredentialsError::MissingField("walletPrivKey"))?;
        Ok(public_key_hex_for(key)?)
    }

    /// Symmetric key for proposal messages
    pub fn shared_encrypting_key(&self) -> Result<SharedEncryptingKey, CredentialsError> {
        let key = self
            .wallet_priv_key
            .as_deref()
            .ok_or(CredentialsError::MissingField("walletPrivKey"))?;
        Ok(SharedEncryptingKey::from_wallet_priv_key(key)?)
    }

    /// Identifier of the local copayer
    pub fn copayer_id(&self) -> Option<String> {
        self.x_pub_key.as_deref().map(copayer_id)
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("network", &self.network)
            .field("address_type", &self.address_type)
            .field("m", &self.m)
            .field("n", &self.n)
            .field("public_key_ring", &self.public_key_ring.len())
            .field("wallet_priv_key", &self.wallet_priv_key.as_ref().map(|_| "[REDACTED]"))
            .field("x_pub_key", &self.x_pub_key)
            .field("x_priv_key", &self.x_priv_key.as_ref().map(|_| "[REDACTED]"))
            .field("request_priv_key", &self.request_priv_key.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

// =============================================================================
// Complete Credentials
// =============================================================================

/// Credentials whose threshold and public-key ring have been validated
#[derive(Debug, Clone, Copy)]
pub struct CompleteCredentials<'a> {
    credentials: &'a Credentials,
    m: usize,
    n: usize,
}

impl<'a> TryFrom<&'a Credentials> for CompleteCredentials<'a> {
    type Error = CredentialsError;

    fn try_from(credentials: &'a Credentials) -> Result<Self, Self::Error> {
        let m = credentials.m.ok_or(CredentialsError::MissingField("m"))?;
        let n = credentials.n.ok_or(CredentialsError::MissingField("n"))?;
        if m == 0 || m > n || n > MAX_MULTISIG_KEYS {
            return Err(CredentialsError::InvalidThreshold { m, n });
        }
        if !credentials.address_type.is_multisig() && n != 1 {
            return Err(CredentialsError::InvalidThreshold { m, n });
        }

        let ring = &credentials.public_key_ring;
        if ring.len() != n {
            return Err(CredentialsError::IncompleteRing {
                expected: n,
                got: ring.len(),
            });
        }

        let mut seen = HashSet::new();
        for (index, entry) in ring.iter().enumerate() {
            parse_xpub(&entry.x_pub_key).map_err(|e| CredentialsError::InvalidRingEntry {
                index,
                reason: e.to_string(),
            })?;
            public_key_from_hex(&entry.request_pub_key).map_err(|e| {
                CredentialsError::InvalidRingEntry {
                    index,
                    reason: e.to_string(),
                }
            })?;
            if !seen.insert(entry.x_pub_key.as_str()) {
                return Err(CredentialsError::DuplicateRingEntry);
            }
        }

        Ok(Self { credentials, m, n })
    }
}

impl<'a> CompleteCredentials<'a> {
    pub fn m(&self) -> usize {
        self.m
    }

    pub fn n(&self) -> usize {
        self.n
    }

    pub fn network(&self) -> Network {
        self.credentials.network
    }

    pub fn address_type(&self) -> ScriptType {
        self.credentials.address_type
    }

    pub fn ring(&self) -> &'a [PublicKeyRingEntry] {
        &self.credentials.public_key_ring
    }

    pub fn credentials(&self) -> &'a Credentials {
        self.credentials
    }

    /// Extended public keys of the ring, in ring order
    pub fn xpubs(&self) -> Vec<&'a str> {
        self.ring().iter().map(|e| e.x_pub_key.as_str()).collect()
    }

    /// Ring entry of the copayer with the given identifier
    pub fn ring_entry_by_copayer_id(&self, id: &str) -> Option<&'a PublicKeyRingEntry> {
        self.ring().iter().find(|entry| entry.copayer_id() == id)
    }

    /// Policy used to rebuild this wallet's spending templates
    pub fn spend_policy(&self) -> SpendPolicy {
        SpendPolicy {
            script_type: self.address_type(),
            required_signatures: self.m,
            network: self.network(),
        }
    }
}
