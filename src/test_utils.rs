//! Deterministic wallet fixtures for tests

use bitcoin::bip32::{Xpriv, Xpub};
use bitcoin::secp256k1::{Secp256k1, SecretKey};
use bitcoin::Network;

use crate::core::{
    derive_address, AddressInfo, ProposalInput, ProposalOutput, ScriptType, TxProposal,
    CURRENT_FORMAT_VERSION,
};
use crate::crypto::{copayer_id, KeyPair};
use crate::multisig::{sign_tx_proposal, Copayer};
use crate::wallet::{Credentials, PublicKeyRingEntry};

pub(crate) const INPUT_TXID: &str =
    "4a5e1e4baab89f3a32518a88c31bc87f618f76673e2cc77ab2127b7afdeda33b";

const NAMES: [&str; 6] = ["alice", "bob", "carol", "dave", "erin", "frank"];

pub(crate) struct TestCopayer {
    pub name: String,
    pub xpriv: String,
    pub xpub: String,
    pub request_key: KeyPair,
}

impl TestCopayer {
    fn new(index: usize) -> Self {
        let secp = Secp256k1::new();
        let seed = [index as u8 + 1; 32];
        let xpriv = Xpriv::new_master(Network::Testnet, &seed).unwrap();
        let xpub = Xpub::from_priv(&secp, &xpriv);
        let request_secret = SecretKey::from_slice(&[index as u8 + 0x10; 32]).unwrap();
        Self {
            name: NAMES[index % NAMES.len()].to_string(),
            xpriv: xpriv.to_string(),
            xpub: xpub.to_string(),
            request_key: KeyPair::from_secret_key(request_secret),
        }
    }
}

/// An m-of-n testnet wallet with fixed keys
pub(crate) struct Fixture {
    pub m: usize,
    pub n: usize,
    pub wallet_priv_key: String,
    pub copayers: Vec<TestCopayer>,
}

impl Fixture {
    pub fn new(m: usize, n: usize) -> Self {
        Self {
            m,
            n,
            wallet_priv_key: "42".repeat(32),
            copayers: (0..n).map(TestCopayer::new).collect(),
        }
    }

    pub fn address_type(&self) -> ScriptType {
        if self.n == 1 {
            ScriptType::P2PKH
        } else {
            ScriptType::P2SH
        }
    }

    /// Credentials as held by copayer `local`
    pub fn credentials_for(&self, local: usize) -> Credentials {
        let me = &self.copayers[local];
        Credentials {
            network: Network::Testnet,
            address_type: self.address_type(),
            m: Some(self.m),
            n: Some(self.n),
            public_key_ring: self
                .copayers
                .iter()
                .map(|c| PublicKeyRingEntry {
                    x_pub_key: c.xpub.clone(),
                    request_pub_key: c.request_key.public_key_hex(),
                    copayer_name: Some(c.name.clone()),
                    encrypted_name: None,
                })
                .collect(),
            wallet_priv_key: Some(self.wallet_priv_key.clone()),
            x_pub_key: Some(me.xpub.clone()),
            x_priv_key: Some(me.xpriv.clone()),
            request_priv_key: Some(hex::encode(me.request_key.secret_key.secret_bytes())),
        }
    }

    pub fn credentials(&self) -> Credentials {
        self.credentials_for(0)
    }

    pub fn roster(&self) -> Vec<Copayer> {
        self.copayers
            .iter()
            .map(|c| {
                Copayer::signed(
                    &c.name,
                    &c.xpub,
                    &c.request_key.public_key_hex(),
                    &self.wallet_priv_key,
                )
                .unwrap()
            })
            .collect()
    }

    pub fn address_info(&self, path: &str) -> AddressInfo {
        let derived = derive_address(
            self.address_type(),
            &xpubs(self),
            path,
            self.m,
            Network::Testnet,
        )
        .unwrap();
        AddressInfo {
            address: derived.address,
            path: derived.path,
            public_keys: derived.public_keys,
            address_type: Some(self.address_type()),
        }
    }

    /// Unsigned current-format proposal created by copayer 0
    ///
    /// Outputs pay [`recipient`]; change goes to `m/1/0` and the output
    /// order covers every output including change.
    pub fn proposal(&self, input_values: &[u64], amounts: &[u64], fee: u64) -> TxProposal {
        let inputs = input_values
            .iter()
            .enumerate()
            .map(|(i, &satoshis)| {
                let address = self.address_info(&format!("m/0/{}", i));
                ProposalInput {
                    txid: INPUT_TXID.to_string(),
                    vout: i as u32,
                    satoshis,
                    address: Some(address.address),
                    path: Some(address.path),
                    public_keys: address.public_keys,
                    script_pub_key: None,
                }
            })
            .collect();

        TxProposal {
            version: Some(CURRENT_FORMAT_VERSION),
            inputs,
            outputs: amounts
                .iter()
                .map(|&amount| ProposalOutput::to_address(&recipient(), amount))
                .collect(),
            to_address: None,
            amount: None,
            fee,
            fee_per_kb: None,
            change_address: Some(self.address_info("m/1/0")),
            output_order: (0..=amounts.len()).collect(),
            creator_id: copayer_id(&self.copayers[0].xpub),
            proposal_signature: None,
            proposal_signature_pub_key: None,
            proposal_signature_pub_key_sig: None,
            message: None,
            custom_data: None,
            pay_pro_url: None,
        }
    }

    /// [`Fixture::proposal`] signed with the creator's request key
    pub fn signed_proposal(&self, input_values: &[u64], amounts: &[u64], fee: u64) -> TxProposal {
        let mut txp = self.proposal(input_values, amounts, fee);
        let signature =
            sign_tx_proposal(&self.credentials(), &txp, &self.copayers[0].request_key).unwrap();
        txp.proposal_signature = Some(signature);
        txp
    }
}

pub(crate) fn xpubs(fixture: &Fixture) -> Vec<&str> {
    fixture.copayers.iter().map(|c| c.xpub.as_str()).collect()
}

/// External testnet address outside any fixture wallet
pub(crate) fn recipient() -> String {
    let secp = Secp256k1::new();
    let xpriv = Xpriv::new_master(Network::Testnet, &[0xaa; 32]).unwrap();
    let xpub = Xpub::from_priv(&secp, &xpriv).to_string();
    derive_address(ScriptType::P2PKH, &[xpub.as_str()], "m/0", 1, Network::Testnet)
        .unwrap()
        .address
}
