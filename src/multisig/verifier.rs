//! Proposal integrity verification
//!
//! Client-side checks that let a copayer trust nothing the coordinating
//! server says about a spend:
//!
//! - [`check_address`] re-derives a wallet address from the local ring
//! - [`check_tx_proposal_signature`] rebuilds the transaction a proposal
//!   describes and verifies the creator's signature over it
//! - [`check_proposal_creation`] compares a submitted proposal with what
//!   the server stored
//! - [`check_paypro`] compares a proposal with a payment-protocol target
//! - [`check_tx_proposal`] combines the signature and payment checks
//!
//! Checks return `Ok(false)` when the data does not verify. Misuse, such
//! as passing incomplete credentials, is `Err(VerifyError::InvalidUsage)`,
//! and legacy proposals on the transaction-signature path are
//! `Err(VerifyError::UnsupportedVersion)`.

use std::collections::HashSet;

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::{
    build_transaction, derive_address, AddressInfo, ProposalHeader, ProposalOutput,
    ProposalRequest, TxProposal,
};
use crate::crypto::{
    decrypt_message, fingerprint, verify_message, verify_request_pub_key, EncryptionConfig,
    KeyPair, SharedEncryptingKey,
};
use crate::wallet::{CompleteCredentials, Credentials, CredentialsError};

// =============================================================================
// Errors and Options
// =============================================================================

/// Verification errors distinct from a plain `false`
#[derive(Error, Debug)]
pub enum VerifyError {
    #[error("Invalid usage: {0}")]
    InvalidUsage(String),
    #[error("Unsupported proposal version: {0:?}")]
    UnsupportedVersion(Option<u32>),
}

impl From<CredentialsError> for VerifyError {
    fn from(e: CredentialsError) -> Self {
        VerifyError::InvalidUsage(e.to_string())
    }
}

/// Destination and amount requested by a payment-protocol server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentTarget {
    pub to_address: String,
    pub amount: u64,
    /// Minimum fee rate in base units per byte
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required_fee_rate: Option<u64>,
}

/// Options for [`check_tx_proposal`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckOptions {
    pub payment_target: Option<PaymentTarget>,
}

impl CheckOptions {
    pub fn with_payment_target(target: PaymentTarget) -> Self {
        Self {
            payment_target: Some(target),
        }
    }
}

// =============================================================================
// Address Check
// =============================================================================

fn address_matches(credentials: &CompleteCredentials<'_>, address: &AddressInfo) -> bool {
    let script_type = address
        .address_type
        .unwrap_or_else(|| credentials.address_type());
    let derived = match derive_address(
        script_type,
        &credentials.xpubs(),
        &address.path,
        credentials.m(),
        credentials.network(),
    ) {
        Ok(derived) => derived,
        Err(e) => {
            warn!("cannot derive address at {}: {}", address.path, e);
            return false;
        }
    };

    if derived.address != address.address {
        warn!("address at {} does not match local derivation", address.path);
        return false;
    }

    let claimed: HashSet<String> = address
        .public_keys
        .iter()
        .map(|k| k.to_lowercase())
        .collect();
    let expected: HashSet<String> = derived.public_keys.into_iter().collect();
    if claimed != expected {
        warn!("public keys at {} do not match local derivation", address.path);
        return false;
    }
    true
}

/// Re-derive `address` from the local ring and compare
pub fn check_address(credentials: &Credentials, address: &AddressInfo) -> Result<bool, VerifyError> {
    let complete = CompleteCredentials::try_from(credentials)?;
    Ok(address_matches(&complete, address))
}

// =============================================================================
// Signature Checks
// =============================================================================

/// Public key that signed the proposal, if one can be trusted
fn establish_signer(credentials: &CompleteCredentials<'_>, proposal: &TxProposal) -> Option<String> {
    let Some(creator) = credentials.ring_entry_by_copayer_id(&proposal.creator_id) else {
        warn!("creator {} not in public key ring", proposal.creator_id);
        return None;
    };

    match (
        &proposal.proposal_signature_pub_key,
        &proposal.proposal_signature_pub_key_sig,
    ) {
        (Some(pub_key), Some(pub_key_sig)) => {
            if verify_request_pub_key(pub_key, pub_key_sig, &creator.x_pub_key) {
                Some(pub_key.clone())
            } else {
                warn!("one-time signing key of {} not attested", proposal.creator_id);
                None
            }
        }
        (None, None) => Some(creator.request_pub_key.clone()),
        _ => {
            warn!("one-time signing key of {} is incomplete", proposal.creator_id);
            None
        }
    }
}

fn signer_for<'a>(
    credentials: &'a Credentials,
    proposal: &TxProposal,
) -> Result<Option<(CompleteCredentials<'a>, String)>, VerifyError> {
    let complete = CompleteCredentials::try_from(credentials)?;
    if proposal.creator_id.is_empty() {
        warn!("proposal has no creator");
        return Ok(None);
    }
    Ok(establish_signer(&complete, proposal).map(|signer| (complete, signer)))
}

/// Verify a proposal's signature over its rebuilt transaction
///
/// The signature must cover the canonical serialization of the
/// transaction rebuilt from the proposal's own inputs, outputs, fee and
/// change, and the change address must re-derive from the local ring.
pub fn check_tx_proposal_signature(
    credentials: &Credentials,
    proposal: &TxProposal,
) -> Result<bool, VerifyError> {
    let Some((complete, signer)) = signer_for(credentials, proposal)? else {
        return Ok(false);
    };

    if !proposal.is_current_format() {
        return Err(VerifyError::UnsupportedVersion(proposal.version));
    }

    let rebuilt = match build_transaction(proposal, &complete.spend_policy()) {
        Ok(rebuilt) => rebuilt,
        Err(e) => {
            warn!("cannot rebuild proposal of {}: {}", proposal.creator_id, e);
            return Ok(false);
        }
    };
    let serialized = rebuilt.canonical_hex();

    let Some(signature) = proposal.proposal_signature.as_deref() else {
        warn!("proposal of {} is unsigned", proposal.creator_id);
        return Ok(false);
    };
    if !verify_message(&serialized, signature, &signer) {
        warn!(
            "signature of {} does not cover tx {}",
            proposal.creator_id,
            fingerprint(serialized.as_bytes())
        );
        return Ok(false);
    }

    if let Some(change) = &proposal.change_address {
        if !address_matches(&complete, change) {
            return Ok(false);
        }
    }

    debug!(
        "proposal of {} verified: tx {}, {} outputs, fee {}",
        proposal.creator_id,
        fingerprint(serialized.as_bytes()),
        rebuilt.tx.output.len(),
        rebuilt.implicit_fee()
    );
    Ok(true)
}

/// Verify a proposal's signature over its canonical header
///
/// The header encoding follows the proposal's version with no fallback,
/// so legacy proposals can be checked here.
pub fn check_proposal_header_signature(
    credentials: &Credentials,
    proposal: &TxProposal,
) -> Result<bool, VerifyError> {
    let Some((_, signer)) = signer_for(credentials, proposal)? else {
        return Ok(false);
    };
    let Some(signature) = proposal.proposal_signature.as_deref() else {
        return Ok(false);
    };
    match ProposalHeader::from_proposal(proposal) {
        Ok(header) => Ok(header.verify(signature, &signer)),
        Err(e) => {
            warn!("cannot canonicalize header of {}: {}", proposal.creator_id, e);
            Ok(false)
        }
    }
}

// =============================================================================
// Creation Check
// =============================================================================

fn blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

fn same_text(a: Option<&str>, b: Option<&str>) -> bool {
    blank(a) == blank(b)
}

/// Plaintext of an optional ciphertext; `None` on decryption failure
fn decrypted(
    ciphertext: Option<&str>,
    key: &SharedEncryptingKey,
    config: &EncryptionConfig,
) -> Option<Option<String>> {
    match blank(ciphertext) {
        None => Some(None),
        Some(ct) => decrypt_message(ct, key, config).ok().map(Some),
    }
}

fn same_message(
    encrypted: Option<&str>,
    plaintext: Option<&str>,
    key: &SharedEncryptingKey,
    config: &EncryptionConfig,
) -> bool {
    match decrypted(encrypted, key, config) {
        Some(message) => same_text(message.as_deref(), plaintext),
        None => false,
    }
}

fn same_output(
    submitted: &ProposalOutput,
    stored: &ProposalOutput,
    key: &SharedEncryptingKey,
    config: &EncryptionConfig,
) -> bool {
    same_text(submitted.to_address.as_deref(), stored.to_address.as_deref())
        && same_text(submitted.script.as_deref(), stored.script.as_deref())
        && submitted.amount == stored.amount
        && same_message(submitted.message.as_deref(), stored.message.as_deref(), key, config)
}

/// Compare a submitted proposal with the server's stored copy
///
/// `submitted` carries messages encrypted with the wallet's shared key;
/// `stored` carries them decrypted.
pub fn check_proposal_creation(
    submitted: &ProposalRequest,
    stored: &TxProposal,
    key: &SharedEncryptingKey,
    config: &EncryptionConfig,
) -> bool {
    if submitted.outputs.len() != stored.outputs.len() {
        warn!(
            "stored proposal has {} outputs, submitted {}",
            stored.outputs.len(),
            submitted.outputs.len()
        );
        return false;
    }
    for (index, (a, b)) in submitted.outputs.iter().zip(&stored.outputs).enumerate() {
        if !same_output(a, b, key, config) {
            warn!("stored output {} differs from submission", index);
            return false;
        }
    }

    if !same_message(submitted.message.as_deref(), stored.message.as_deref(), key, config) {
        warn!("stored proposal message differs from submission");
        return false;
    }

    if let Some(change) = &submitted.change_address {
        let stored_change = stored.change_address.as_ref().map(|c| c.address.as_str());
        if stored_change != Some(change.as_str()) {
            warn!("stored change address differs from submission");
            return false;
        }
    }

    if submitted.fee_per_kb.is_some() && submitted.fee_per_kb != stored.fee_per_kb {
        warn!("stored fee rate differs from submission");
        return false;
    }

    if !same_text(submitted.pay_pro_url.as_deref(), stored.pay_pro_url.as_deref()) {
        warn!("stored payment URL differs from submission");
        return false;
    }

    if submitted.custom_data != stored.custom_data {
        warn!("stored custom data differs from submission");
        return false;
    }

    debug!("stored proposal of {} matches submission", stored.creator_id);
    true
}

// =============================================================================
// Payment Protocol Check
// =============================================================================

/// Compare a proposal's destination with a payment-protocol target
pub fn check_paypro(proposal: &TxProposal, target: &PaymentTarget) -> bool {
    let outputs = if proposal.is_current_format() {
        proposal.outputs.clone()
    } else {
        proposal.declared_outputs()
    };
    let [output] = outputs.as_slice() else {
        warn!("payment proposal has {} destinations", outputs.len());
        return false;
    };

    if output.to_address.as_deref() != Some(target.to_address.as_str())
        || output.amount != target.amount
    {
        warn!("proposal does not pay the requested destination and amount");
        return false;
    }

    if let (Some(fee_per_kb), Some(rate)) = (proposal.fee_per_kb, target.required_fee_rate) {
        if fee_per_kb < rate.saturating_mul(1024) {
            warn!("fee rate {} per kB below requested {} per byte", fee_per_kb, rate);
            return false;
        }
    }
    true
}

/// Signature check and, if a payment target is given, the payment check
pub fn check_tx_proposal(
    credentials: &Credentials,
    proposal: &TxProposal,
    options: &CheckOptions,
) -> Result<bool, VerifyError> {
    if !check_tx_proposal_signature(credentials, proposal)? {
        return Ok(false);
    }
    Ok(match &options.payment_target {
        Some(target) => check_paypro(proposal, target),
        None => true,
    })
}

// =============================================================================
// Signing Helpers
// =============================================================================

/// Sign the rebuilt transaction of a proposal, as its creator would
pub fn sign_tx_proposal(
    credentials: &Credentials,
    proposal: &TxProposal,
    key: &KeyPair,
) -> Result<String, VerifyError> {
    let complete = CompleteCredentials::try_from(credentials)?;
    let rebuilt = build_transaction(proposal, &complete.spend_policy())
        .map_err(|e| VerifyError::InvalidUsage(e.to_string()))?;
    key.sign(&rebuilt.canonical_hex())
        .map_err(|e| VerifyError::InvalidUsage(e.to_string()))
}

/// Sign the canonical header of a proposal
pub fn sign_proposal_header(proposal: &TxProposal, key: &KeyPair) -> Result<String, VerifyError> {
    ProposalHeader::from_proposal(proposal)
        .and_then(|header| header.sign(key))
        .map_err(|e| VerifyError::InvalidUsage(e.to_string()))
}
