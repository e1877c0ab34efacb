//! Getting funds into a channel: directly on-chain, out of a ledger channel
//! or virtually through a hub. Which one is used is negotiated first.

mod direct;
mod ledger;
mod negotiation;
mod virtual_funding;

pub use direct::{DirectFunding, DirectFundingStatus};
pub use ledger::{is_funded_by_ledger, ledger_defunding_proposal, ledger_funding_proposal};
pub use negotiation::{NegotiationStatus, StrategyNegotiation};
pub use virtual_funding::{
    plan_virtual_funding, validate_joint_allocation, VirtualFundingPlan, VirtualRole,
};

use crate::{
    abiencode::{
        self,
        types::{Address, Hash},
    },
    channel::{AllocationError, ChannelError},
    consensus::ConsensusError,
    store::StoreError,
};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FundingError {
    #[error("no agreement on a funding strategy for {target_channel_id:?} after {attempts} attempts")]
    StrategyNegotiationFailed { target_channel_id: Hash, attempts: u32 },
    #[error("a strategy proposal for {0:?} is open or agreed")]
    ProposalOpen(Hash),
    #[error("message is for channel {actual:?}, expected {expected:?}")]
    WrongTarget { expected: Hash, actual: Hash },
    #[error("{0:?} is not a participant")]
    NotAParticipant(Address),
    #[error("channel {0:?} has no supported state")]
    NoSupportedState(Hash),
    #[error("participant index {index} out of range for {participants} participants")]
    ParticipantIndex { index: usize, participants: usize },
    #[error("asset outcome of {0:?} is not an allocation")]
    NotAnAllocation(Address),
    #[error("joint channel allocation does not match its participants")]
    InvalidJointAllocation,
    #[error("the hub does not fund virtually as a leaf")]
    HubIsNotALeaf,
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Consensus(#[from] ConsensusError),
    #[error(transparent)]
    Allocation(#[from] AllocationError),
    #[error(transparent)]
    Channel(#[from] ChannelError),
    #[error(transparent)]
    Encoding(#[from] abiencode::Error),
}
