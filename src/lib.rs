//! txp-verify: client-side integrity checks for multisig wallet proposals
//!
//! A copayer in an m-of-n wallet receives everything through a
//! coordinating server it does not trust. This crate lets the copayer
//! confirm, before signing, that:
//! - the copayer roster is exactly the set of attested wallet members
//! - addresses re-derive from the local public-key ring
//! - a transaction proposal was signed by its creator over the exact
//!   transaction its inputs, outputs, fee and change describe
//! - the stored proposal matches what was submitted
//! - a payment-protocol proposal pays the requested destination
//!
//! # Example
//!
//! ```ignore
//! use txp_verify::multisig::{check_tx_proposal, CheckOptions};
//! use txp_verify::wallet::Credentials;
//! use txp_verify::core::TxProposal;
//!
//! let credentials: Credentials = serde_json::from_str(&credentials_json)?;
//! let proposal: TxProposal = serde_json::from_str(&proposal_json)?;
//!
//! if check_tx_proposal(&credentials, &proposal, &CheckOptions::default())? {
//!     println!("Proposal verified");
//! }
//! ```

pub mod cli;
pub mod core;
pub mod crypto;
pub mod multisig;
pub mod wallet;

#[cfg(test)]
pub(crate) mod test_utils;

// Re-export commonly used types
pub use crate::core::{build_transaction, ProposalHeader, ScriptType, TxProposal, MAX_TX_FEE};
pub use crypto::{EncryptionConfig, KeyPair, SharedEncryptingKey};
pub use multisig::{
    check_address, check_copayers, check_paypro, check_proposal_creation, check_tx_proposal,
    check_tx_proposal_signature, CheckOptions, Copayer, PaymentTarget, VerifyError,
};
pub use wallet::{CompleteCredentials, Credentials};
