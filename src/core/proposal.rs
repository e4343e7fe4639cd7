//! Transaction proposal data model
//!
//! Mirrors the JSON documents exchanged with the coordinating server.
//! Everything in here is untrusted input until a verifier has checked it.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::script::ScriptType;

/// First proposal version whose signature covers the rebuilt transaction
pub const CURRENT_FORMAT_VERSION: u32 = 3;

/// A wallet address as reported by the server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressInfo {
    /// Encoded address string
    pub address: String,
    /// Derivation path claimed for the address
    pub path: String,
    /// Public keys claimed for the address (hex)
    #[serde(default)]
    pub public_keys: Vec<String>,
    /// Script type, defaults to the wallet's own
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub address_type: Option<ScriptType>,
}

/// An unspent output selected as proposal input
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProposalInput {
    /// Previous transaction id (display hex)
    pub txid: String,
    /// Output index in the previous transaction
    pub vout: u32,
    /// Value in base units
    pub satoshis: u64,
    /// Wallet address holding the output
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    /// Derivation path of the holding address
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Keys of the holding address; multisig inputs carry all of them
    #[serde(default)]
    pub public_keys: Vec<String>,
    /// Previous output script (hex)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script_pub_key: Option<String>,
}

/// A proposal output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProposalOutput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to_address: Option<String>,
    /// Raw output script (hex), takes precedence over `to_address`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script: Option<String>,
    pub amount: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ProposalOutput {
    /// Pay-to-address output without a message
    pub fn to_address(address: &str, amount: u64) -> Self {
        Self {
            to_address: Some(address.to_string()),
            script: None,
            amount,
            message: None,
        }
    }
}

/// A transaction proposal as stored and relayed by the server
///
/// Messages are expected to be already decrypted by the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxProposal {
    /// Format version; absent means the oldest legacy format
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<u32>,
    pub inputs: Vec<ProposalInput>,
    #[serde(default)]
    pub outputs: Vec<ProposalOutput>,
    /// Single destination of legacy proposals without `outputs`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to_address: Option<String>,
    /// Amount of legacy proposals without `outputs`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<u64>,
    pub fee: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fee_per_kb: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub change_address: Option<AddressInfo>,
    #[serde(default)]
    pub output_order: Vec<usize>,
    /// Copayer identifier of the creator
    #[serde(default)]
    pub creator_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proposal_signature: Option<String>,
    /// One-time signing key used instead of the creator's request key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proposal_signature_pub_key: Option<String>,
    /// Attestation of `proposal_signature_pub_key` by the creator
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proposal_signature_pub_key_sig: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pay_pro_url: Option<String>,
}

impl TxProposal {
    /// Whether the proposal uses the transaction-signing format
    pub fn is_current_format(&self) -> bool {
        self.version
            .map_or(false, |v| v >= CURRENT_FORMAT_VERSION)
    }

    /// Outputs as declared, folding the legacy single destination in
    pub fn declared_outputs(&self) -> Vec<ProposalOutput> {
        if !self.outputs.is_empty() {
            return self.outputs.clone();
        }
        match (&self.to_address, self.amount) {
            (Some(to), Some(amount)) => vec![ProposalOutput {
                to_address: Some(to.clone()),
                script: None,
                amount,
                message: self.message.clone(),
            }],
            _ => Vec::new(),
        }
    }
}

/// A proposal as submitted to the server, messages still encrypted
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProposalRequest {
    pub outputs: Vec<ProposalOutput>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Change address requested by the client
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub change_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fee_per_kb: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pay_pro_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_data: Option<Value>,
}
