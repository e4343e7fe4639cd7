//! Transaction reconstruction from proposals
//!
//! Rebuilds the unsigned transaction a proposal describes, byte for byte,
//! from the proposal's declared inputs, outputs, fee and change. The hex
//! consensus serialization of the result is the text the creator signed.
//!
//! Reconstruction never trusts server-declared totals: input and output
//! sums are recomputed from the rebuilt structure and the implicit fee is
//! bounded by [`MAX_TX_FEE`].

use std::collections::HashSet;
use std::str::FromStr;

use bitcoin::absolute::LockTime;
use bitcoin::consensus::encode::serialize_hex;
use bitcoin::transaction::Version;
use bitcoin::{Amount, Network, OutPoint, ScriptBuf, Sequence, Transaction, TxIn, TxOut, Txid, Witness};
use log::debug;
use thiserror::Error;

use super::proposal::{ProposalInput, ProposalOutput, TxProposal};
use super::script::{multisig_redeem_script_hex, parse_address, ScriptError, ScriptType};

// =============================================================================
// Constants
// =============================================================================

/// Upper bound on the implicit fee of a reconstructed transaction
/// (0.1 coin in base units)
pub const MAX_TX_FEE: u64 = 10_000_000;

/// Change below this value is left to the fee instead of creating an output
pub const DUST_THRESHOLD: u64 = 546;

// =============================================================================
// Error Types
// =============================================================================

/// Reconstruction errors
#[derive(Error, Debug)]
pub enum TransactionError {
    #[error("Invalid input {index}: {reason}")]
    InvalidInput { index: usize, reason: String },
    #[error("Multisig input {0} carries no public keys")]
    MissingInputKeys(usize),
    #[error("Output {0} has neither script nor destination address")]
    MissingDestination(usize),
    #[error("Invalid output script at {index}: {reason}")]
    InvalidScript { index: usize, reason: String },
    #[error("Proposal declares no outputs")]
    NoOutputs,
    #[error("Output order does not match outputs: expected {expected} entries, got {got}")]
    OutputOrderMismatch { expected: usize, got: usize },
    #[error("Output order repeats an index")]
    DuplicateOutputIndex,
    #[error("Insufficient funds: inputs {available}, outputs plus fee {required}")]
    InsufficientFunds { available: u64, required: u64 },
    #[error("Amount overflow")]
    AmountOverflow,
    #[error("Outputs exceed inputs: inputs {inputs}, outputs {outputs}")]
    NegativeFee { inputs: u64, outputs: u64 },
    #[error("Fee {fee} exceeds maximum {max}")]
    FeeTooHigh { fee: u64, max: u64 },
    #[error("Script error: {0}")]
    ScriptError(#[from] ScriptError),
}

// =============================================================================
// Spend Policy
// =============================================================================

/// Wallet policy needed to rebuild spending templates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpendPolicy {
    pub script_type: ScriptType,
    pub required_signatures: usize,
    pub network: Network,
}

// =============================================================================
// Reconstructed Transaction
// =============================================================================

/// An unsigned transaction rebuilt from a proposal
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconstructedTx {
    pub tx: Transaction,
    /// Fee declared by the proposal
    pub fee: u64,
    /// Sum of input values
    pub total_input: u64,
    /// Sum of output values, change included
    pub total_output: u64,
}

impl ReconstructedTx {
    /// Canonical serialization covered by the proposal signature
    pub fn canonical_hex(&self) -> String {
        serialize_hex(&self.tx)
    }

    /// Implicit fee: inputs minus outputs
    pub fn implicit_fee(&self) -> u64 {
        self.total_input - self.total_output
    }

    /// Output values in final order
    pub fn output_amounts(&self) -> Vec<u64> {
        self.tx.output.iter().map(|o| o.value.to_sat()).collect()
    }
}

// =============================================================================
// Reconstruction
// =============================================================================

fn sum(values: impl IntoIterator<Item = u64>) -> Result<u64, TransactionError> {
    values
        .into_iter()
        .try_fold(0u64, |acc, v| acc.checked_add(v))
        .ok_or(TransactionError::AmountOverflow)
}

fn build_input(
    index: usize,
    input: &ProposalInput,
    policy: &SpendPolicy,
) -> Result<TxIn, TransactionError> {
    let txid = Txid::from_str(&input.txid).map_err(|e| TransactionError::InvalidInput {
        index,
        reason: e.to_string(),
    })?;

    // Unsigned inputs carry their spending template
    let script_sig = if policy.script_type.is_multisig() {
        if input.public_keys.is_empty() {
            return Err(TransactionError::MissingInputKeys(index));
        }
        multisig_redeem_script_hex(&input.public_keys, policy.required_signatures)?
    } else {
        match &input.script_pub_key {
            Some(script) => ScriptBuf::from_bytes(hex::decode(script).map_err(|e| {
                TransactionError::InvalidInput {
                    index,
                    reason: e.to_string(),
                }
            })?),
            None => ScriptBuf::new(),
        }
    };

    Ok(TxIn {
        previous_output: OutPoint::new(txid, input.vout),
        script_sig,
        sequence: Sequence::MAX,
        witness: Witness::new(),
    })
}

fn build_output(
    index: usize,
    output: &ProposalOutput,
    network: Network,
) -> Result<TxOut, TransactionError> {
    let script_pubkey = match (&output.script, &output.to_address) {
        (Some(script), _) => {
            ScriptBuf::from_bytes(hex::decode(script).map_err(|e| {
                TransactionError::InvalidScript {
                    index,
                    reason: e.to_string(),
                }
            })?)
        }
        (None, Some(address)) => parse_address(address, network)?.script_pubkey(),
        (None, None) => return Err(TransactionError::MissingDestination(index)),
    };
    Ok(TxOut {
        value: Amount::from_sat(output.amount),
        script_pubkey,
    })
}

/// Apply a declared output order, ignoring out-of-range indices
fn reorder_outputs(
    outputs: Vec<TxOut>,
    output_order: &[usize],
) -> Result<Vec<TxOut>, TransactionError> {
    let order: Vec<usize> = output_order
        .iter()
        .copied()
        .filter(|&i| i < outputs.len())
        .collect();
    if order.len() != outputs.len() {
        return Err(TransactionError::OutputOrderMismatch {
            expected: outputs.len(),
            got: order.len(),
        });
    }
    let mut seen = HashSet::new();
    if !order.iter().all(|i| seen.insert(*i)) {
        return Err(TransactionError::DuplicateOutputIndex);
    }
    Ok(order.into_iter().map(|i| outputs[i].clone()).collect())
}

/// Rebuild the unsigned transaction described by a proposal
pub fn build_transaction(
    proposal: &TxProposal,
    policy: &SpendPolicy,
) -> Result<ReconstructedTx, TransactionError> {
    let input = proposal
        .inputs
        .iter()
        .enumerate()
        .map(|(i, input)| build_input(i, input, policy))
        .collect::<Result<Vec<_>, _>>()?;

    let declared = proposal.declared_outputs();
    if declared.is_empty() {
        return Err(TransactionError::NoOutputs);
    }
    let mut output = declared
        .iter()
        .enumerate()
        .map(|(i, o)| build_output(i, o, policy.network))
        .collect::<Result<Vec<_>, _>>()?;

    let total_input = sum(proposal.inputs.iter().map(|i| i.satoshis))?;

    if let Some(change) = &proposal.change_address {
        let spent = sum(declared.iter().map(|o| o.amount).chain([proposal.fee]))?;
        let remainder = total_input
            .checked_sub(spent)
            .ok_or(TransactionError::InsufficientFunds {
                available: total_input,
                required: spent,
            })?;
        if remainder >= DUST_THRESHOLD {
            let script_pubkey = parse_address(&change.address, policy.network)?.script_pubkey();
            output.push(TxOut {
                value: Amount::from_sat(remainder),
                script_pubkey,
            });
        } else {
            debug!("change of {} below dust, left to fee", remainder);
        }
    }

    if output.len() > 1 {
        output = reorder_outputs(output, &proposal.output_order)?;
    }

    let total_output = sum(output.iter().map(|o| o.value.to_sat()))?;
    let implicit_fee = total_input
        .checked_sub(total_output)
        .ok_or(TransactionError::NegativeFee {
            inputs: total_input,
            outputs: total_output,
        })?;
    if implicit_fee > MAX_TX_FEE {
        return Err(TransactionError::FeeTooHigh {
            fee: implicit_fee,
            max: MAX_TX_FEE,
        });
    }

    let tx = Transaction {
        version: Version::ONE,
        lock_time: LockTime::ZERO,
        input,
        output,
    };
    debug!(
        "rebuilt transaction: {} inputs, {} outputs, fee {}",
        tx.input.len(),
        tx.output.len(),
        implicit_fee
    );

    Ok(ReconstructedTx {
        tx,
        fee: proposal.fee,
        total_input,
        total_output,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{Fixture, INPUT_TXID};

    fn policy() -> SpendPolicy {
        SpendPolicy {
            script_type: ScriptType::P2SH,
            required_signatures: 2,
            network: Network::Testnet,
        }
    }

    fn proposal(input_value: u64, outputs: &[u64]) -> TxProposal {
        let fixture = Fixture::new(2, 3);
        let mut txp = fixture.proposal(&[input_value], outputs, 0);
        txp.change_address = None;
        txp.output_order = (0..outputs.len()).collect();
        txp
    }

    #[test]
    fn test_fee_within_bounds() {
        let txp = proposal(100_000_000, &[99_990_000]);
        let rebuilt = build_transaction(&txp, &policy()).unwrap();
        assert_eq!(rebuilt.total_input, 100_000_000);
        assert_eq!(rebuilt.total_output, 99_990_000);
        assert_eq!(rebuilt.implicit_fee(), 10_000);
    }

    #[test]
    fn test_negative_fee_rejected() {
        let txp = proposal(100_000_000, &[100_000_001]);
        assert!(matches!(
            build_transaction(&txp, &policy()),
            Err(TransactionError::NegativeFee { .. })
        ));
    }

    #[test]
    fn test_excessive_fee_rejected() {
        let txp = proposal(100_000_000, &[0]);
        assert!(matches!(
            build_transaction(&txp, &policy()),
            Err(TransactionError::FeeTooHigh { fee: 100_000_000, .. })
        ));
    }

    #[test]
    fn test_fee_at_bound_accepted() {
        let txp = proposal(100_000_000, &[100_000_000 - MAX_TX_FEE]);
        assert!(build_transaction(&txp, &policy()).is_ok());

        let txp = proposal(100_000_000, &[100_000_000 - MAX_TX_FEE - 1]);
        assert!(build_transaction(&txp, &policy()).is_err());
    }

    #[test]
    fn test_change_output_added() {
        let fixture = Fixture::new(2, 3);
        let txp = fixture.proposal(&[60_000, 40_000], &[30_000], 1_000);
        let rebuilt = build_transaction(&txp, &policy()).unwrap();

        assert_eq!(rebuilt.tx.output.len(), 2);
        assert_eq!(rebuilt.implicit_fee(), 1_000);
        let mut amounts = rebuilt.output_amounts();
        amounts.sort();
        assert_eq!(amounts, vec![30_000, 69_000]);
    }

    #[test]
    fn test_dust_change_left_to_fee() {
        let fixture = Fixture::new(2, 3);
        let mut txp = fixture.proposal(&[31_500], &[30_000], 1_000);
        txp.output_order = vec![0];
        let rebuilt = build_transaction(&txp, &policy()).unwrap();
        assert_eq!(rebuilt.tx.output.len(), 1);
        assert_eq!(rebuilt.implicit_fee(), 1_500);
    }

    #[test]
    fn test_change_with_unpayable_fee() {
        let fixture = Fixture::new(2, 3);
        let txp = fixture.proposal(&[30_500], &[30_000], 1_000);
        assert!(matches!(
            build_transaction(&txp, &policy()),
            Err(TransactionError::InsufficientFunds { .. })
        ));
    }

    #[test]
    fn test_output_order_applied() {
        let fixture = Fixture::new(2, 3);
        let mut txp = fixture.proposal(&[100_000], &[10_000, 20_000], 1_000);
        txp.change_address = None;

        txp.output_order = vec![1, 0];
        let swapped = build_transaction(&txp, &policy()).unwrap();
        assert_eq!(swapped.output_amounts(), vec![20_000, 10_000]);

        // Out-of-range entries are discarded before applying
        txp.output_order = vec![0, 7, 1];
        let kept = build_transaction(&txp, &policy()).unwrap();
        assert_eq!(kept.output_amounts(), vec![10_000, 20_000]);
        assert_ne!(swapped.canonical_hex(), kept.canonical_hex());
    }

    #[test]
    fn test_truncated_output_order_rejected() {
        let fixture = Fixture::new(2, 3);
        let mut txp = fixture.proposal(&[100_000], &[10_000, 20_000], 1_000);
        txp.output_order = vec![0, 1];
        // change makes three outputs
        assert!(matches!(
            build_transaction(&txp, &policy()),
            Err(TransactionError::OutputOrderMismatch { expected: 3, got: 2 })
        ));

        txp.output_order = vec![0, 0, 1];
        assert!(matches!(
            build_transaction(&txp, &policy()),
            Err(TransactionError::DuplicateOutputIndex)
        ));
    }

    #[test]
    fn test_script_preferred_over_address() {
        let fixture = Fixture::new(2, 3);
        let mut txp = fixture.proposal(&[100_000], &[10_000], 1_000);
        txp.change_address = None;
        // OP_RETURN "hi"
        txp.outputs[0].script = Some("6a026869".to_string());
        let rebuilt = build_transaction(&txp, &policy()).unwrap();
        assert_eq!(
            rebuilt.tx.output[0].script_pubkey.as_bytes(),
            &[0x6a, 0x02, 0x68, 0x69]
        );
    }

    #[test]
    fn test_missing_destination_rejected() {
        let fixture = Fixture::new(2, 3);
        let mut txp = fixture.proposal(&[100_000], &[10_000], 1_000);
        txp.outputs[0].to_address = None;
        assert!(matches!(
            build_transaction(&txp, &policy()),
            Err(TransactionError::MissingDestination(0))
        ));

        txp.outputs.clear();
        assert!(matches!(
            build_transaction(&txp, &policy()),
            Err(TransactionError::NoOutputs)
        ));
    }

    #[test]
    fn test_multisig_inputs_need_keys() {
        let fixture = Fixture::new(2, 3);
        let mut txp = fixture.proposal(&[100_000], &[10_000], 1_000);
        txp.inputs[0].public_keys.clear();
        assert!(matches!(
            build_transaction(&txp, &policy()),
            Err(TransactionError::MissingInputKeys(0))
        ));
    }

    #[test]
    fn test_input_keys_order_independent() {
        let fixture = Fixture::new(2, 3);
        let txp = fixture.proposal(&[100_000], &[10_000], 1_000);
        let mut shuffled = txp.clone();
        shuffled.inputs[0].public_keys.reverse();
        assert_eq!(
            build_transaction(&txp, &policy()).unwrap().canonical_hex(),
            build_transaction(&shuffled, &policy()).unwrap().canonical_hex()
        );
    }

    #[test]
    fn test_serialization_is_deterministic() {
        let fixture = Fixture::new(2, 3);
        let txp = fixture.proposal(&[100_000], &[10_000], 1_000);
        let a = build_transaction(&txp, &policy()).unwrap().canonical_hex();
        let b = build_transaction(&txp, &policy()).unwrap().canonical_hex();
        assert_eq!(a, b);
        // version 1, little endian
        assert!(a.starts_with("01000000"));
    }

    #[test]
    fn test_amount_changes_serialization() {
        let fixture = Fixture::new(2, 3);
        let txp = fixture.proposal(&[100_000], &[10_000], 1_000);
        let mut tampered = txp.clone();
        tampered.outputs[0].amount += 1;
        assert_ne!(
            build_transaction(&txp, &policy()).unwrap().canonical_hex(),
            build_transaction(&tampered, &policy()).unwrap().canonical_hex()
        );
    }

    #[test]
    fn test_invalid_input_and_address() {
        let fixture = Fixture::new(2, 3);
        let mut txp = fixture.proposal(&[100_000], &[10_000], 1_000);
        txp.inputs[0].txid = "zz".to_string();
        assert!(matches!(
            build_transaction(&txp, &policy()),
            Err(TransactionError::InvalidInput { index: 0, .. })
        ));

        let mut txp = fixture.proposal(&[100_000], &[10_000], 1_000);
        // mainnet address on a testnet wallet
        txp.outputs[0].to_address = Some("1BoatSLRHtKNngkdXEeobR76b53LETtpyT".to_string());
        assert!(build_transaction(&txp, &policy()).is_err());
    }

    #[test]
    fn test_p2pkh_inputs_use_previous_script() {
        let fixture = Fixture::new(2, 3);
        let mut txp = fixture.proposal(&[100_000], &[10_000], 1_000);
        txp.change_address = None;
        txp.inputs[0].public_keys.clear();
        txp.inputs[0].script_pub_key =
            Some("76a914000000000000000000000000000000000000000088ac".to_string());
        let single = SpendPolicy {
            script_type: ScriptType::P2PKH,
            required_signatures: 1,
            network: Network::Testnet,
        };
        let rebuilt = build_transaction(&txp, &single).unwrap();
        assert_eq!(rebuilt.tx.input[0].script_sig.len(), 25);
        assert_eq!(rebuilt.tx.input[0].previous_output.txid.to_string(), INPUT_TXID);
    }
}
