//! Address derivation for wallet script types
//!
//! Derives pay-to-script-hash multisig and pay-to-public-key-hash
//! addresses from a ring of extended public keys.
//!
//! Multisig redeem scripts always list their keys sorted by compressed
//! SEC1 bytes (BIP67), so every copayer derives the same address no
//! matter in which order the ring was assembled.

use std::fmt;
use std::str::FromStr;

use bitcoin::opcodes::all::OP_CHECKMULTISIG;
use bitcoin::script::Builder;
use bitcoin::{Address, Network, ScriptBuf};
use secp256k1::PublicKey;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::crypto::{derive_public_key, parse_path, parse_xpub, public_key_from_hex, KeyError};

// =============================================================================
// Script Constants
// =============================================================================

/// Largest key count a standard P2SH multisig redeem script can carry
pub const MAX_MULTISIG_KEYS: usize = 15;

// =============================================================================
// Script Errors
// =============================================================================

/// Script and address related errors
#[derive(Error, Debug)]
pub enum ScriptError {
    #[error("Unknown script type: {0}")]
    UnknownScriptType(String),
    #[error("Invalid threshold: {m}-of-{n}")]
    InvalidThreshold { m: usize, n: usize },
    #[error("Single-signature address needs exactly one key, ring has {0}")]
    SingleSigRingSize(usize),
    #[error("Address construction failed: {0}")]
    AddressConstruction(String),
    #[error("Invalid address: {0}")]
    InvalidAddress(String),
    #[error("Key error: {0}")]
    KeyError(#[from] KeyError),
}

// =============================================================================
// Script Types
// =============================================================================

/// The script type of wallet addresses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScriptType {
    /// Pay to Script Hash wrapping an m-of-n multisig redeem script
    P2SH,
    /// Pay to Public Key Hash, single key
    P2PKH,
}

impl ScriptType {
    /// Whether spending needs a multisig redeem script
    pub fn is_multisig(&self) -> bool {
        matches!(self, ScriptType::P2SH)
    }
}

impl FromStr for ScriptType {
    type Err = ScriptError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "P2SH" => Ok(ScriptType::P2SH),
            "P2PKH" => Ok(ScriptType::P2PKH),
            other => Err(ScriptError::UnknownScriptType(other.to_string())),
        }
    }
}

impl fmt::Display for ScriptType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScriptType::P2SH => f.write_str("P2SH"),
            ScriptType::P2PKH => f.write_str("P2PKH"),
        }
    }
}

// =============================================================================
// Derived Address
// =============================================================================

/// Result of deriving a wallet address
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DerivedAddress {
    /// Encoded address string
    pub address: String,
    /// Derivation path used for every ring entry
    pub path: String,
    /// Derived public keys, compressed hex, in canonical (sorted) order
    pub public_keys: Vec<String>,
}

/// Sort keys into canonical multisig order (compressed bytes ascending)
pub fn sort_public_keys(keys: &mut [PublicKey]) {
    keys.sort_by_key(|key| key.serialize());
}

/// Build the `m`-of-`keys.len()` CHECKMULTISIG redeem script
pub fn multisig_redeem_script(keys: &[PublicKey], m: usize) -> Result<ScriptBuf, ScriptError> {
    let n = keys.len();
    if m == 0 || m > n || n > MAX_MULTISIG_KEYS {
        return Err(ScriptError::InvalidThreshold { m, n });
    }

    let mut sorted = keys.to_vec();
    sort_public_keys(&mut sorted);

    let mut builder = Builder::new().push_int(m as i64);
    for key in &sorted {
        builder = builder.push_key(&bitcoin::PublicKey::new(*key));
    }
    Ok(builder
        .push_int(n as i64)
        .push_opcode(OP_CHECKMULTISIG)
        .into_script())
}

/// Redeem script from hex-encoded keys
pub fn multisig_redeem_script_hex(keys: &[String], m: usize) -> Result<ScriptBuf, ScriptError> {
    let keys = keys
        .iter()
        .map(|k| public_key_from_hex(k))
        .collect::<Result<Vec<_>, _>>()?;
    multisig_redeem_script(&keys, m)
}

/// Parse an address string and require it to belong to `network`
pub fn parse_address(address: &str, network: Network) -> Result<Address, ScriptError> {
    Address::from_str(address)
        .map_err(|e| ScriptError::InvalidAddress(format!("{}: {}", address, e)))?
        .require_network(network)
        .map_err(|e| ScriptError::InvalidAddress(format!("{}: {}", address, e)))
}

/// Derive the address at `path` for a ring of extended public keys
///
/// For [`ScriptType::P2SH`] this is the `m`-of-`xpubs.len()` multisig
/// script-hash address; for [`ScriptType::P2PKH`] the ring must hold
/// exactly one key and `m` is ignored.
pub fn derive_address(
    script_type: ScriptType,
    xpubs: &[&str],
    path: &str,
    m: usize,
    network: Network,
) -> Result<DerivedAddress, ScriptError> {
    let derivation = parse_path(path)?;
    let mut public_keys = xpubs
        .iter()
        .map(|xpub| derive_public_key(&parse_xpub(xpub)?, &derivation))
        .collect::<Result<Vec<_>, KeyError>>()?;
    sort_public_keys(&mut public_keys);

    let address = match script_type {
        ScriptType::P2SH => {
            let script = multisig_redeem_script(&public_keys, m)?;
            Address::p2sh(&script, network)
                .map_err(|e| ScriptError::AddressConstruction(e.to_string()))?
        }
        ScriptType::P2PKH => {
            if public_keys.len() != 1 {
                return Err(ScriptError::SingleSigRingSize(public_keys.len()));
            }
            Address::p2pkh(&bitcoin::PublicKey::new(public_keys[0]), network)
        }
    };

    Ok(DerivedAddress {
        address: address.to_string(),
        path: path.to_string(),
        public_keys: public_keys
            .iter()
            .map(|key| hex::encode(key.serialize()))
            .collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{xpubs, Fixture};

    #[test]
    fn test_script_type_parsing() {
        assert_eq!("P2SH".parse::<ScriptType>().unwrap(), ScriptType::P2SH);
        assert_eq!("P2PKH".parse::<ScriptType>().unwrap(), ScriptType::P2PKH);
        assert!(matches!(
            "P2WSH".parse::<ScriptType>(),
            Err(ScriptError::UnknownScriptType(_))
        ));
        assert!(serde_json::from_str::<ScriptType>("\"P2TR\"").is_err());
    }

    #[test]
    fn test_multisig_address_is_deterministic() {
        let fixture = Fixture::new(2, 3);
        let ring = xpubs(&fixture);

        let a = derive_address(ScriptType::P2SH, &ring, "m/0/0", 2, Network::Testnet).unwrap();
        let b = derive_address(ScriptType::P2SH, &ring, "m/0/0", 2, Network::Testnet).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.public_keys.len(), 3);
        assert_eq!(a.path, "m/0/0");
        assert!(a.address.starts_with('2'));
    }

    #[test]
    fn test_ring_order_does_not_matter() {
        let fixture = Fixture::new(2, 3);
        let ring = xpubs(&fixture);
        let reversed: Vec<&str> = ring.iter().rev().copied().collect();

        let a = derive_address(ScriptType::P2SH, &ring, "m/0/4", 2, Network::Testnet).unwrap();
        let b =
            derive_address(ScriptType::P2SH, &reversed, "m/0/4", 2, Network::Testnet).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_path_and_threshold_change_address() {
        let fixture = Fixture::new(2, 3);
        let ring = xpubs(&fixture);

        let base = derive_address(ScriptType::P2SH, &ring, "m/0/0", 2, Network::Testnet).unwrap();
        let other_path =
            derive_address(ScriptType::P2SH, &ring, "m/0/1", 2, Network::Testnet).unwrap();
        let other_m = derive_address(ScriptType::P2SH, &ring, "m/0/0", 3, Network::Testnet).unwrap();
        assert_ne!(base.address, other_path.address);
        assert_ne!(base.public_keys, other_path.public_keys);
        assert_ne!(base.address, other_m.address);
        assert_eq!(base.public_keys, other_m.public_keys);
    }

    #[test]
    fn test_single_sig_requires_one_key() {
        let fixture = Fixture::new(1, 1);
        let ring = xpubs(&fixture);
        let derived =
            derive_address(ScriptType::P2PKH, &ring, "m/1/0", 1, Network::Testnet).unwrap();
        assert_eq!(derived.public_keys.len(), 1);
        assert!(derived.address.starts_with('m') || derived.address.starts_with('n'));

        let multi = Fixture::new(2, 3);
        assert!(matches!(
            derive_address(ScriptType::P2PKH, &xpubs(&multi), "m/0/0", 1, Network::Testnet),
            Err(ScriptError::SingleSigRingSize(3))
        ));
    }

    #[test]
    fn test_invalid_threshold() {
        let fixture = Fixture::new(2, 3);
        let ring = xpubs(&fixture);
        assert!(matches!(
            derive_address(ScriptType::P2SH, &ring, "m/0/0", 4, Network::Testnet),
            Err(ScriptError::InvalidThreshold { m: 4, n: 3 })
        ));
        assert!(derive_address(ScriptType::P2SH, &ring, "m/0/0", 0, Network::Testnet).is_err());
    }

    #[test]
    fn test_bad_inputs_fail() {
        let fixture = Fixture::new(2, 3);
        let ring = xpubs(&fixture);
        assert!(derive_address(ScriptType::P2SH, &ring, "garbage", 2, Network::Testnet).is_err());
        assert!(
            derive_address(ScriptType::P2SH, &["xpubnope"], "m/0/0", 1, Network::Testnet).is_err()
        );
    }

    #[test]
    fn test_redeem_script_layout() {
        let fixture = Fixture::new(2, 3);
        let derived =
            derive_address(ScriptType::P2SH, &xpubs(&fixture), "m/0/0", 2, Network::Testnet)
                .unwrap();
        let script = multisig_redeem_script_hex(&derived.public_keys, 2).unwrap();
        let bytes = script.as_bytes();

        // OP_2 <33> <33> <33> OP_3 OP_CHECKMULTISIG
        assert_eq!(bytes.len(), 1 + 3 * 34 + 2);
        assert_eq!(bytes[0], 0x52);
        assert_eq!(bytes[bytes.len() - 2], 0x53);
        assert_eq!(bytes[bytes.len() - 1], 0xae);

        let address = Address::p2sh(&script, Network::Testnet).unwrap();
        assert_eq!(address.to_string(), derived.address);
    }

    #[test]
    fn test_parse_address_checks_network() {
        let fixture = Fixture::new(2, 3);
        let derived =
            derive_address(ScriptType::P2SH, &xpubs(&fixture), "m/0/0", 2, Network::Testnet)
                .unwrap();
        assert!(parse_address(&derived.address, Network::Testnet).is_ok());
        assert!(parse_address(&derived.address, Network::Bitcoin).is_err());
        assert!(parse_address("nonsense", Network::Testnet).is_err());
    }
}
