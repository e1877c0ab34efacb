use crate::{
    abiencode,
    adjudicator::AdjudicatorError,
    channel::{AllocationError, ChannelError, OutcomeError, SupportError},
    config::ConfigError,
    consensus::ConsensusError,
    funding::FundingError,
    messages::ConversionError,
    sig,
    store::StoreError,
    wire::WireError,
};
use thiserror::Error;

/// Any error of this crate.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Encoding(#[from] abiencode::Error),
    #[error(transparent)]
    Signature(#[from] sig::Error),
    #[error(transparent)]
    Channel(#[from] ChannelError),
    #[error(transparent)]
    Outcome(#[from] OutcomeError),
    #[error(transparent)]
    Allocation(#[from] AllocationError),
    #[error(transparent)]
    InvalidSupportProof(#[from] SupportError),
    #[error(transparent)]
    Adjudicator(#[from] AdjudicatorError),
    #[error(transparent)]
    Consensus(#[from] ConsensusError),
    #[error(transparent)]
    Funding(#[from] FundingError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Conversion(#[from] ConversionError),
    #[error(transparent)]
    Wire(#[from] WireError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("invalid transition to turn {0}")]
    InvalidTransition(u64),
    #[error("{0:?} is not a participant of the channel")]
    NotAParticipant(crate::Address),
}
