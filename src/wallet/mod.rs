//! Wallet credentials and public-key ring

pub mod credentials;

pub use credentials::{
    network_name, parse_network, CompleteCredentials, Credentials, CredentialsError,
    PublicKeyRingEntry,
};
