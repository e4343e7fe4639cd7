//! Core proposal components
//!
//! This module contains the building blocks the verifiers work on:
//! - Script types and address derivation (P2SH multisig, P2PKH)
//! - Proposal data model (inputs, outputs, change, signatures)
//! - Canonical proposal headers (legacy pipe text, current JSON)
//! - Transaction reconstruction with fee and output-order checks

pub mod canonical;
pub mod proposal;
pub mod script;
pub mod transaction;

pub use canonical::{
    copayer_hash, proposal_hash, sign_copayer_hash, CanonicalError, CurrentHeader, HeaderOutput,
    LegacyHeader, ProposalHeader,
};
pub use proposal::{
    AddressInfo, ProposalInput, ProposalOutput, ProposalRequest, TxProposal,
    CURRENT_FORMAT_VERSION,
};
pub use script::{
    derive_address, multisig_redeem_script, multisig_redeem_script_hex, parse_address,
    sort_public_keys, DerivedAddress, ScriptError, ScriptType, MAX_MULTISIG_KEYS,
};
pub use transaction::{
    build_transaction, ReconstructedTx, SpendPolicy, TransactionError, DUST_THRESHOLD, MAX_TX_FEE,
};
