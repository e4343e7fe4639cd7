//! Canonical proposal headers
//!
//! A proposal header is the human-meaningful part of a proposal
//! (destinations, amounts, messages) in the exact text form a creator
//! signs. Two encodings exist and the proposal `version` alone picks
//! one; nothing here ever tries the other encoding as a fallback.
//!
//! - Legacy: `toAddress|amount|message|payProUrl`
//! - Current: RFC 8785 (JCS) JSON of the header object, sorted keys and
//!   compact separators, optional fields omitted when absent.

use serde::Serialize;
use thiserror::Error;

use super::proposal::{ProposalOutput, TxProposal};
use crate::crypto::{sign_message, verify_message, KeyError, KeyPair};

/// Header canonicalization errors
#[derive(Error, Debug)]
pub enum CanonicalError {
    #[error("Legacy header needs exactly one destination address")]
    MissingLegacyDestination,
    #[error("Serialization failed: {0}")]
    SerializationFailed(#[from] serde_json::Error),
    #[error("Key error: {0}")]
    KeyError(#[from] KeyError),
}

/// Fields of a legacy (pre-version-3) proposal header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyHeader {
    pub to_address: String,
    pub amount: u64,
    pub message: Option<String>,
    pub pay_pro_url: Option<String>,
}

/// Output entry of a current-format header
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HeaderOutput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub script: Option<String>,
    pub amount: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl From<&ProposalOutput> for HeaderOutput {
    fn from(output: &ProposalOutput) -> Self {
        Self {
            to_address: output.to_address.clone(),
            script: output.script.clone(),
            amount: output.amount,
            message: output.message.clone(),
        }
    }
}

/// Current-format header object
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentHeader {
    pub outputs: Vec<HeaderOutput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pay_pro_url: Option<String>,
}

/// A proposal header in exactly one of the two signed encodings
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProposalHeader {
    Legacy(LegacyHeader),
    Current(CurrentHeader),
}

impl ProposalHeader {
    /// Header of a proposal, encoding selected by its `version`
    pub fn from_proposal(proposal: &TxProposal) -> Result<Self, CanonicalError> {
        if proposal.is_current_format() {
            return Ok(ProposalHeader::Current(CurrentHeader {
                outputs: proposal.outputs.iter().map(HeaderOutput::from).collect(),
                message: proposal.message.clone(),
                pay_pro_url: proposal.pay_pro_url.clone(),
            }));
        }

        let outputs = proposal.declared_outputs();
        let [output] = outputs.as_slice() else {
            return Err(CanonicalError::MissingLegacyDestination);
        };
        let to_address = output
            .to_address
            .clone()
            .ok_or(CanonicalError::MissingLegacyDestination)?;
        Ok(ProposalHeader::Legacy(LegacyHeader {
            to_address,
            amount: output.amount,
            message: proposal.message.clone(),
            pay_pro_url: proposal.pay_pro_url.clone(),
        }))
    }

    pub fn is_legacy(&self) -> bool {
        matches!(self, ProposalHeader::Legacy(_))
    }

    /// The exact text that is hashed and signed for this header
    pub fn canonical_string(&self) -> Result<String, CanonicalError> {
        match self {
            ProposalHeader::Legacy(h) => Ok([
                h.to_address.clone(),
                h.amount.to_string(),
                h.message.clone().unwrap_or_default(),
                h.pay_pro_url.clone().unwrap_or_default(),
            ]
            .join("|")),
            ProposalHeader::Current(h) => Ok(serde_jcs::to_string(h)?),
        }
    }

    /// Sign the canonical text with a creator key
    pub fn sign(&self, key: &KeyPair) -> Result<String, CanonicalError> {
        Ok(key.sign(&self.canonical_string()?)?)
    }

    /// Verify a signature over the canonical text of this encoding only
    pub fn verify(&self, signature: &str, public_key_hex: &str) -> bool {
        match self.canonical_string() {
            Ok(text) => verify_message(&text, signature, public_key_hex),
            Err(_) => false,
        }
    }
}

/// Canonical header text of a proposal, encoding chosen by its version
pub fn proposal_hash(proposal: &TxProposal) -> Result<String, CanonicalError> {
    ProposalHeader::from_proposal(proposal)?.canonical_string()
}

/// Text a copayer signs to bind its name to its two public keys
pub fn copayer_hash(name: &str, xpub_key: &str, request_pub_key: &str) -> String {
    [name, xpub_key, request_pub_key].join("|")
}

/// Sign a copayer attestation with the wallet-shared private key
pub fn sign_copayer_hash(
    name: &str,
    xpub_key: &str,
    request_pub_key: &str,
    wallet_priv_key: &str,
) -> Result<String, CanonicalError> {
    let key = KeyPair::from_private_key_hex(wallet_priv_key)?;
    Ok(sign_message(
        &copayer_hash(name, xpub_key, request_pub_key),
        &key.secret_key,
    )?)
}
