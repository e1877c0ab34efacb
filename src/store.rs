//! Per-participant record of channels and their states.
//!
//! The store is owned by the wallet and passed explicitly to the funding and
//! consensus code. Once a state is supported, nothing at or below its turn
//! number is accepted any more.

use crate::{
    abiencode::{self, types::Hash},
    channel::{validate_unanimous, Channel, SignedState, State, SupportError, Supported},
};
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("unknown channel {0:?}")]
    UnknownChannel(Hash),
    #[error("channel {0:?} is already stored")]
    ChannelExists(Hash),
    #[error("turn {received} is not newer than the supported turn {supported}")]
    StaleState { supported: u64, received: u64 },
    #[error(transparent)]
    Support(#[from] SupportError),
    #[error(transparent)]
    Encoding(#[from] abiencode::Error),
}

/// A state every participant signed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupportedState {
    pub state: State,
    pub signed: Vec<SignedState>,
    pub supported: Supported,
}

#[derive(Debug, Clone)]
struct Entry {
    channel: Channel,
    supported: Option<SupportedState>,
    /// Signatures on states newer than `supported`.
    pending: Vec<SignedState>,
}

impl Entry {
    fn supported_turn(&self) -> Option<u64> {
        self.supported.as_ref().map(|s| s.supported.turn_num)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ChannelStore {
    channels: HashMap<Hash, Entry>,
}

impl ChannelStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_channel(&mut self, channel: Channel) -> Result<Hash, StoreError> {
        let id = channel.id()?;
        if self.channels.contains_key(&id) {
            return Err(StoreError::ChannelExists(id));
        }
        self.channels.insert(
            id,
            Entry {
                channel,
                supported: None,
                pending: Vec::new(),
            },
        );
        tracing::debug!(channel_id = ?id, "channel added");
        Ok(id)
    }

    fn entry(&self, id: &Hash) -> Result<&Entry, StoreError> {
        self.channels.get(id).ok_or(StoreError::UnknownChannel(*id))
    }

    pub fn channel(&self, id: &Hash) -> Result<&Channel, StoreError> {
        Ok(&self.entry(id)?.channel)
    }

    pub fn contains(&self, id: &Hash) -> bool {
        self.channels.contains_key(id)
    }

    pub fn latest_supported(&self, id: &Hash) -> Result<Option<&SupportedState>, StoreError> {
        Ok(self.entry(id)?.supported.as_ref())
    }

    pub fn latest_supported_state(&self, id: &Hash) -> Result<Option<&State>, StoreError> {
        Ok(self.latest_supported(id)?.map(|s| &s.state))
    }

    /// Signatures collected for states that are not supported yet.
    pub fn pending(&self, id: &Hash) -> Result<&[SignedState], StoreError> {
        Ok(&self.entry(id)?.pending)
    }

    /// Record a verified signature. Returns the new support once every
    /// participant signed the state.
    pub fn add_signed_state(
        &mut self,
        signed: SignedState,
    ) -> Result<Option<Supported>, StoreError> {
        let id = signed.state.channel_id;
        let entry = self
            .channels
            .get_mut(&id)
            .ok_or(StoreError::UnknownChannel(id))?;

        if let Some(supported) = entry.supported_turn() {
            if signed.state.turn_num <= supported {
                return Err(StoreError::StaleState {
                    supported,
                    received: signed.state.turn_num,
                });
            }
        }
        signed.verify()?;
        if entry.channel.part_idx_of(&signed.signer).is_none() {
            return Err(SupportError::NotAParticipant(signed.signer).into());
        }

        // A later signature by the same participant on the same turn
        // replaces the earlier one.
        entry.pending.retain(|s| {
            !(s.signer == signed.signer && s.state.turn_num == signed.state.turn_num)
        });
        entry.pending.push(signed.clone());

        let same: Vec<SignedState> = entry
            .pending
            .iter()
            .filter(|s| s.state == signed.state)
            .cloned()
            .collect();
        if same.len() < entry.channel.num_participants() {
            return Ok(None);
        }

        let supported = validate_unanimous(&entry.channel, &same, signed.state.turn_num)?;
        let turn = supported.turn_num;
        entry.pending.retain(|s| s.state.turn_num > turn);
        entry.supported = Some(SupportedState {
            state: signed.state,
            signed: same,
            supported: supported.clone(),
        });
        tracing::debug!(channel_id = ?id, turn_num = turn, "state supported");
        Ok(Some(supported))
    }
}
