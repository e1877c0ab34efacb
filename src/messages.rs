//! Messages exchanged between participants and their protobuf conversions.

mod state;
mod strategy;

pub use strategy::{FundingStrategy, StrategyMessage};

use crate::{channel::SignedState, wire::proto};
use thiserror::Error;

/// Errors converting a decoded protobuf message into the domain types. Peers
/// can send anything, so every length and presence is checked.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConversionError {
    #[error("{field}: expected {expected} bytes, got {actual}")]
    ByteLengthMismatch {
        field: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("{0} is missing")]
    ExpectedSome(&'static str),
    #[error("unknown funding strategy {0}")]
    UnknownStrategy(i32),
    #[error("invalid outcome: {0}")]
    InvalidOutcome(#[from] crate::channel::OutcomeError),
}

/// Messages sent between participants of a channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParticipantMessage {
    /// New signatures on one or more states of a channel.
    SignedStates(Vec<SignedState>),
    /// Funding strategy negotiation.
    Strategy(StrategyMessage),
}

impl From<ParticipantMessage> for proto::envelope::Msg {
    fn from(value: ParticipantMessage) -> Self {
        match value {
            ParticipantMessage::SignedStates(states) => {
                proto::envelope::Msg::SignedStates(proto::SignedStates {
                    states: states.iter().map(Into::into).collect(),
                })
            }
            ParticipantMessage::Strategy(msg) => msg.into(),
        }
    }
}

impl TryFrom<proto::envelope::Msg> for ParticipantMessage {
    type Error = ConversionError;

    fn try_from(value: proto::envelope::Msg) -> Result<Self, Self::Error> {
        Ok(match value {
            proto::envelope::Msg::SignedStates(msg) => ParticipantMessage::SignedStates(
                msg.states
                    .into_iter()
                    .map(TryInto::try_into)
                    .collect::<Result<_, _>>()?,
            ),
            other => ParticipantMessage::Strategy(other.try_into()?),
        })
    }
}
