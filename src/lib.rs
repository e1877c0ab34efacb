//! Off-chain core of the ForceMove state-channel protocol.
//!
//! Participants exchange signed, turn-ordered [channel::State]s and fall back
//! to the [adjudicator] when a counterparty stalls. Ledger channels agree on
//! reallocations through the [consensus] voting protocol, and the [funding]
//! coordinator uses both to fund channels directly, through a ledger channel
//! or virtually through a hub.

pub mod abiencode {
    mod error;
    mod hashing;
    mod ser;

    pub mod as_bytes;
    pub mod types;

    pub use error::{Error, Result};
    pub use hashing::{keccak256, to_args_hash, to_hash};
    pub use ser::{to_args_bytes, to_bytes, to_token, DynamicBytes, Token};

    #[cfg(test)]
    mod tests;
}
pub mod sig;

pub mod adjudicator;
pub mod channel;
pub mod consensus;
pub mod funding;
pub mod store;

mod client;
pub mod config;
mod error;
pub mod messages;
pub mod wire;

pub use abiencode::types::{Address, Destination, Hash, Signature, U256};
pub use client::{ClientEvent, WalletClient};
pub use config::WalletConfig;
pub use error::Error;
