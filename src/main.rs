//! txp-verify CLI Application
//!
//! Verifies multisig wallet data relayed by a coordinating server
//! against locally held credentials.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process;
use txp_verify::cli;
use txp_verify::crypto::EncryptionConfig;
use txp_verify::wallet::parse_network;

#[derive(Parser)]
#[command(name = "txp-verify")]
#[command(author = "Darshan")]
#[command(version = "0.1.0")]
#[command(about = "Verify multisig wallet proposals before signing", long_about = None)]
struct Cli {
    /// Override the network recorded in the credentials (livenet, testnet, signet, regtest)
    #[arg(long, global = true)]
    network: Option<String>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Verify a transaction proposal's signature and change address
    CheckProposal {
        /// Credentials JSON file
        #[arg(short, long)]
        credentials: PathBuf,

        /// Proposal JSON file
        #[arg(short, long)]
        proposal: PathBuf,

        /// Payment-protocol target JSON file
        #[arg(long)]
        paypro: Option<PathBuf>,
    },

    /// Verify the wallet's copayer roster
    CheckCopayers {
        /// Credentials JSON file
        #[arg(short, long)]
        credentials: PathBuf,

        /// Copayer list JSON file
        #[arg(long)]
        copayers: PathBuf,
    },

    /// Verify a wallet address
    CheckAddress {
        /// Credentials JSON file
        #[arg(short, long)]
        credentials: PathBuf,

        /// Address JSON file
        #[arg(short, long)]
        address: PathBuf,
    },

    /// Compare a submitted proposal with the server's stored copy
    CheckCreation {
        /// Submitted proposal JSON file (encrypted messages)
        #[arg(long)]
        submitted: PathBuf,

        /// Stored proposal JSON file (decrypted messages)
        #[arg(long)]
        stored: PathBuf,

        /// Wallet-shared private key (hex)
        #[arg(long)]
        wallet_priv_key: String,

        /// AES key size in bits
        #[arg(long, default_value = "128")]
        key_size: u16,

        /// Argon2id iterations
        #[arg(long, default_value = "1")]
        iterations: u32,

        /// Argon2id memory in KiB
        #[arg(long, default_value = "4096")]
        memory_kib: u32,
    },

    /// Sign a proposal with the credentials' request key
    Sign {
        /// Credentials JSON file
        #[arg(short, long)]
        credentials: PathBuf,

        /// Proposal JSON file
        #[arg(short, long)]
        proposal: PathBuf,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logger
    let level = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let network = cli.network.as_deref().map(parse_network).transpose()?;

    let ok = match cli.command {
        Commands::CheckProposal {
            credentials,
            proposal,
            paypro,
        } => cli::cmd_check_proposal(&credentials, &proposal, paypro.as_deref(), network)?,

        Commands::CheckCopayers {
            credentials,
            copayers,
        } => cli::cmd_check_copayers(&credentials, &copayers, network)?,

        Commands::CheckAddress {
            credentials,
            address,
        } => cli::cmd_check_address(&credentials, &address, network)?,

        Commands::CheckCreation {
            submitted,
            stored,
            wallet_priv_key,
            key_size,
            iterations,
            memory_kib,
        } => {
            let config = EncryptionConfig {
                key_size: cli::key_size_from_bits(key_size)?,
                iterations,
                memory_kib,
            };
            cli::cmd_check_creation(&submitted, &stored, &wallet_priv_key, &config)?
        }

        Commands::Sign {
            credentials,
            proposal,
        } => {
            cli::cmd_sign_proposal(&credentials, &proposal, network)?;
            true
        }
    };

    if !ok {
        process::exit(1);
    }
    Ok(())
}
