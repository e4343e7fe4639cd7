//! CLI commands for proposal verification
//!
//! Each handler loads the JSON documents it needs, runs one check and
//! prints the verdict. Handlers return `Ok(false)` for a failed check so
//! the binary can set its exit status.

use std::fs;
use std::path::Path;

use bitcoin::Network;
use serde::de::DeserializeOwned;

use crate::core::{AddressInfo, ProposalRequest, TxProposal};
use crate::crypto::{EncryptionConfig, KeyPair, KeySize, SharedEncryptingKey};
use crate::multisig::{
    check_address, check_copayers, check_proposal_creation, check_tx_proposal, sign_tx_proposal,
    CheckOptions, Copayer, PaymentTarget,
};
use crate::wallet::{network_name, Credentials};

/// Result type for CLI operations
pub type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

/// Load and parse a JSON document
pub fn load_json<T: DeserializeOwned>(path: &Path) -> CliResult<T> {
    let data = fs::read_to_string(path)
        .map_err(|e| format!("cannot read {}: {}", path.display(), e))?;
    let value = serde_json::from_str(&data)
        .map_err(|e| format!("cannot parse {}: {}", path.display(), e))?;
    Ok(value)
}

/// Load credentials, optionally forcing their network
pub fn load_credentials(path: &Path, network: Option<Network>) -> CliResult<Credentials> {
    let mut credentials: Credentials = load_json(path)?;
    if let Some(network) = network {
        if network != credentials.network {
            log::info!(
                "overriding credentials network {} with {}",
                network_name(credentials.network),
                network_name(network)
            );
        }
        credentials.network = network;
    }
    log::debug!("loaded {:?}", credentials);
    Ok(credentials)
}

/// Map a key length in bits to an AES key size
pub fn key_size_from_bits(bits: u16) -> CliResult<KeySize> {
    match bits {
        128 => Ok(KeySize::Aes128),
        256 => Ok(KeySize::Aes256),
        other => Err(format!("unsupported key size: {} (expected 128 or 256)", other).into()),
    }
}

fn report(ok: bool, what: &str) -> bool {
    if ok {
        println!("✅ valid: {}", what);
    } else {
        println!("❌ INVALID: {}", what);
    }
    ok
}

/// Verify a proposal's signature, change address and payment target
pub fn cmd_check_proposal(
    credentials: &Path,
    proposal: &Path,
    paypro: Option<&Path>,
    network: Option<Network>,
) -> CliResult<bool> {
    let credentials = load_credentials(credentials, network)?;
    let proposal: TxProposal = load_json(proposal)?;
    let options = match paypro {
        Some(path) => CheckOptions::with_payment_target(load_json::<PaymentTarget>(path)?),
        None => CheckOptions::default(),
    };

    let ok = check_tx_proposal(&credentials, &proposal, &options)?;
    println!("   Creator:  {}", proposal.creator_id);
    println!("   Outputs:  {}", proposal.outputs.len());
    println!("   Fee:      {}", proposal.fee);
    Ok(report(ok, "transaction proposal"))
}

/// Verify a copayer roster
pub fn cmd_check_copayers(
    credentials: &Path,
    copayers: &Path,
    network: Option<Network>,
) -> CliResult<bool> {
    let credentials = load_credentials(credentials, network)?;
    let copayers: Vec<Copayer> = load_json(copayers)?;

    let ok = check_copayers(&credentials, &copayers)?;
    println!("   Copayers: {}", copayers.len());
    Ok(report(ok, "copayer roster"))
}

/// Verify a wallet address
pub fn cmd_check_address(
    credentials: &Path,
    address: &Path,
    network: Option<Network>,
) -> CliResult<bool> {
    let credentials = load_credentials(credentials, network)?;
    let address: AddressInfo = load_json(address)?;

    let ok = check_address(&credentials, &address)?;
    println!("   Address:  {}", address.address);
    println!("   Path:     {}", address.path);
    Ok(report(ok, "address"))
}

/// Compare a submitted proposal with the stored copy
pub fn cmd_check_creation(
    submitted: &Path,
    stored: &Path,
    wallet_priv_key: &str,
    config: &EncryptionConfig,
) -> CliResult<bool> {
    let submitted: ProposalRequest = load_json(submitted)?;
    let stored: TxProposal = load_json(stored)?;
    let key = SharedEncryptingKey::from_wallet_priv_key(wallet_priv_key)?;

    let ok = check_proposal_creation(&submitted, &stored, &key, config);
    Ok(report(ok, "stored proposal"))
}

/// Sign a proposal with the credentials' request key and print it
pub fn cmd_sign_proposal(
    credentials: &Path,
    proposal: &Path,
    network: Option<Network>,
) -> CliResult<TxProposal> {
    let credentials = load_credentials(credentials, network)?;
    let mut proposal: TxProposal = load_json(proposal)?;
    let request_priv_key = credentials
        .request_priv_key
        .as_deref()
        .ok_or("credentials lack requestPrivKey")?;
    let key = KeyPair::from_private_key_hex(request_priv_key)?;

    proposal.proposal_signature = Some(sign_tx_proposal(&credentials, &proposal, &key)?);
    println!("{}", serde_json::to_string_pretty(&proposal)?);
    Ok(proposal)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::encrypt_message;
    use crate::multisig::check_tx_proposal_signature;
    use crate::test_utils::{recipient, Fixture};
    use serde::Serialize;
    use tempfile::TempDir;

    fn write_json<T: Serialize>(dir: &TempDir, name: &str, value: &T) -> std::path::PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, serde_json::to_string_pretty(value).unwrap()).unwrap();
        path
    }

    #[test]
    fn test_check_proposal_command() {
        let dir = TempDir::new().unwrap();
        let fixture = Fixture::new(2, 3);
        let credentials = write_json(&dir, "credentials.json", &fixture.credentials());
        let proposal = write_json(
            &dir,
            "proposal.json",
            &fixture.signed_proposal(&[100_000], &[40_000], 2_000),
        );
        assert!(cmd_check_proposal(&credentials, &proposal, None, None).unwrap());

        let target = PaymentTarget {
            to_address: recipient(),
            amount: 40_001,
            required_fee_rate: None,
        };
        let paypro = write_json(&dir, "paypro.json", &target);
        assert!(!cmd_check_proposal(&credentials, &proposal, Some(&paypro), None).unwrap());

        // Forcing mainnet makes every testnet address foreign
        assert!(
            !cmd_check_proposal(&credentials, &proposal, None, Some(Network::Bitcoin)).unwrap()
        );
    }

    #[test]
    fn test_check_copayers_command() {
        let dir = TempDir::new().unwrap();
        let fixture = Fixture::new(2, 3);
        let credentials = write_json(&dir, "credentials.json", &fixture.credentials());
        let copayers = write_json(&dir, "copayers.json", &fixture.roster());
        assert!(cmd_check_copayers(&credentials, &copayers, None).unwrap());

        let mut roster = fixture.roster();
        roster.truncate(2);
        let short = write_json(&dir, "short.json", &roster);
        assert!(!cmd_check_copayers(&credentials, &short, None).unwrap());
    }

    #[test]
    fn test_check_address_command() {
        let dir = TempDir::new().unwrap();
        let fixture = Fixture::new(2, 3);
        let credentials = write_json(&dir, "credentials.json", &fixture.credentials());
        let address = write_json(&dir, "address.json", &fixture.address_info("m/0/7"));
        assert!(cmd_check_address(&credentials, &address, None).unwrap());
    }

    #[test]
    fn test_check_creation_command() {
        let dir = TempDir::new().unwrap();
        let fixture = Fixture::new(2, 3);
        let config = EncryptionConfig {
            key_size: KeySize::Aes256,
            ..Default::default()
        };
        let key = fixture.credentials().shared_encrypting_key().unwrap();

        let mut stored = fixture.proposal(&[100_000], &[40_000], 2_000);
        stored.message = Some("coffee".to_string());
        let submitted = ProposalRequest {
            outputs: stored.outputs.clone(),
            message: Some(encrypt_message("coffee", &key, &config).unwrap()),
            ..Default::default()
        };

        let submitted = write_json(&dir, "submitted.json", &submitted);
        let stored = write_json(&dir, "stored.json", &stored);
        assert!(
            cmd_check_creation(&submitted, &stored, &fixture.wallet_priv_key, &config).unwrap()
        );
        // Different tunables cannot open the envelope
        assert!(!cmd_check_creation(
            &submitted,
            &stored,
            &fixture.wallet_priv_key,
            &EncryptionConfig::default()
        )
        .unwrap());
    }

    #[test]
    fn test_sign_proposal_command() {
        let dir = TempDir::new().unwrap();
        let fixture = Fixture::new(2, 3);
        let credentials = write_json(&dir, "credentials.json", &fixture.credentials());
        let proposal = write_json(
            &dir,
            "proposal.json",
            &fixture.proposal(&[100_000], &[40_000], 2_000),
        );

        let signed = cmd_sign_proposal(&credentials, &proposal, None).unwrap();
        assert!(check_tx_proposal_signature(&fixture.credentials(), &signed).unwrap());
    }

    #[test]
    fn test_load_errors() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("missing.json");
        assert!(load_json::<TxProposal>(&missing).is_err());

        let garbage = dir.path().join("garbage.json");
        fs::write(&garbage, "{ not json").unwrap();
        assert!(load_credentials(&garbage, None).is_err());

        assert!(matches!(key_size_from_bits(256), Ok(KeySize::Aes256)));
        assert!(key_size_from_bits(192).is_err());
    }

    #[test]
    fn test_incomplete_credentials_is_an_error() {
        let dir = TempDir::new().unwrap();
        let fixture = Fixture::new(2, 3);
        let mut credentials = fixture.credentials();
        credentials.public_key_ring.pop();
        let credentials = write_json(&dir, "credentials.json", &credentials);
        let address = write_json(&dir, "address.json", &fixture.address_info("m/0/7"));
        assert!(cmd_check_address(&credentials, &address, None).is_err());
    }
}
