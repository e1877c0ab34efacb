use crate::abiencode::{
    self,
    types::{Address, Hash},
};
use serde::Serialize;

/// Where a channel is in the dispute process at a given time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelStatus {
    Open,
    Challenged,
    Finalized,
}

/// What the adjudicator remembers about a channel. On-chain only
/// [ChannelStorage::fingerprint] is stored, callers resubmit the fields.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChannelStorage {
    pub turn_num_record: u64,
    /// Zero while no challenge is running.
    pub finalizes_at: u64,
    pub state_hash: Hash,
    pub challenger: Address,
    pub outcome_hash: Hash,
}

#[derive(Serialize)]
struct ChallengeParts {
    state_hash: Hash,
    challenger: Address,
    outcome_hash: Hash,
}

impl ChannelStorage {
    /// Storage after a challenge was cleared at `turn_num_record`.
    pub fn cleared(turn_num_record: u64) -> Self {
        Self {
            turn_num_record,
            ..Default::default()
        }
    }

    pub fn status(&self, now: u64) -> ChannelStatus {
        if self.finalizes_at == 0 {
            ChannelStatus::Open
        } else if self.finalizes_at > now {
            ChannelStatus::Challenged
        } else {
            ChannelStatus::Finalized
        }
    }

    /// `keccak256(abi.encode(turnNumRecord, finalizesAt,
    /// keccak256(abi.encode(stateHash, challenger, outcomeHash))))`
    pub fn fingerprint(&self) -> Result<Hash, abiencode::Error> {
        let challenge = abiencode::to_args_hash(&ChallengeParts {
            state_hash: self.state_hash,
            challenger: self.challenger,
            outcome_hash: self.outcome_hash,
        })?;
        abiencode::to_args_hash(&(self.turn_num_record, self.finalizes_at, challenge))
    }
}
