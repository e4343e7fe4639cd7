//! Multi-signature wallet verification
//!
//! Checks a copayer runs locally before trusting anything the
//! coordinating server relays: the copayer roster, wallet addresses,
//! and transaction proposals.
//!
//! # Example
//!
//! ```ignore
//! use txp_verify::multisig::{check_copayers, check_tx_proposal, CheckOptions};
//!
//! // Trust the roster once, when the wallet becomes complete
//! assert!(check_copayers(&credentials, &copayers)?);
//!
//! // Before signing any proposal
//! if !check_tx_proposal(&credentials, &proposal, &CheckOptions::default())? {
//!     return Err("proposal failed verification".into());
//! }
//! ```

pub mod roster;
pub mod verifier;

pub use roster::{check_copayers, Copayer};
pub use verifier::{
    check_address, check_paypro, check_proposal_creation, check_proposal_header_signature,
    check_tx_proposal, check_tx_proposal_signature, sign_proposal_header, sign_tx_proposal,
    CheckOptions, PaymentTarget, VerifyError,
};
