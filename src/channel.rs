//! Channels, states and the rules deciding which state is supported.

mod allocation;
pub mod app;
mod outcome;
mod signed;
mod state;
mod support;

use crate::abiencode::{
    self,
    types::{Address, Hash, U256},
};
use thiserror::Error;

pub use allocation::*;
pub use app::{App, AppRegistry};
pub use outcome::*;
pub use signed::*;
pub use state::*;
pub use support::*;

/// Index of a participant in [Channel::participants].
pub type PartIdx = usize;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ChannelError {
    #[error("a channel needs at least one participant")]
    NoParticipants,
    #[error("participant {0:?} appears more than once")]
    DuplicateParticipant(Address),
}

/// The fixed part of a channel. Its digest is the channel id, which every
/// [State] of the channel refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Channel {
    chain_id: U256,
    participants: Vec<Address>,
    channel_nonce: U256,
}

impl Channel {
    pub fn new(
        chain_id: U256,
        participants: Vec<Address>,
        channel_nonce: U256,
    ) -> Result<Self, ChannelError> {
        if participants.is_empty() {
            return Err(ChannelError::NoParticipants);
        }
        for (i, p) in participants.iter().enumerate() {
            if participants[..i].contains(p) {
                return Err(ChannelError::DuplicateParticipant(*p));
            }
        }
        Ok(Self {
            chain_id,
            participants,
            channel_nonce,
        })
    }

    pub fn chain_id(&self) -> U256 {
        self.chain_id
    }

    pub fn participants(&self) -> &[Address] {
        &self.participants
    }

    pub fn channel_nonce(&self) -> U256 {
        self.channel_nonce
    }

    pub fn num_participants(&self) -> usize {
        self.participants.len()
    }

    /// `keccak256(abi.encode(chainId, participants, channelNonce))`
    pub fn id(&self) -> Result<Hash, abiencode::Error> {
        abiencode::to_args_hash(&(self.chain_id, &self.participants, self.channel_nonce))
    }

    /// Index of the participant whose turn it is at `turn_num`.
    pub fn mover_idx(&self, turn_num: u64) -> PartIdx {
        (turn_num % self.participants.len() as u64) as PartIdx
    }

    pub fn mover(&self, turn_num: u64) -> Address {
        self.participants[self.mover_idx(turn_num)]
    }

    pub fn part_idx_of(&self, addr: &Address) -> Option<PartIdx> {
        self.participants.iter().position(|p| p == addr)
    }
}
