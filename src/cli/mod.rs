//! Command handlers for the `txp-verify` binary

pub mod commands;

pub use commands::{
    cmd_check_address, cmd_check_copayers, cmd_check_creation, cmd_check_proposal,
    cmd_sign_proposal, key_size_from_bits, load_credentials, load_json, CliResult,
};
