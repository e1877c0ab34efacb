use super::{state::hash_from, ConversionError};
use crate::{abiencode::types::Hash, wire::proto};

/// How a channel gets its funds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FundingStrategy {
    /// Every participant deposits on-chain.
    Direct,
    /// Funds are reserved in a ledger channel shared with the counterparty.
    Ledger,
    /// Funded through ledger channels with a common hub.
    Virtual,
}

impl From<FundingStrategy> for proto::Strategy {
    fn from(value: FundingStrategy) -> Self {
        match value {
            FundingStrategy::Direct => proto::Strategy::Direct,
            FundingStrategy::Ledger => proto::Strategy::Ledger,
            FundingStrategy::Virtual => proto::Strategy::Virtual,
        }
    }
}

impl TryFrom<i32> for FundingStrategy {
    type Error = ConversionError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match proto::Strategy::from_i32(value) {
            Some(proto::Strategy::Direct) => Ok(FundingStrategy::Direct),
            Some(proto::Strategy::Ledger) => Ok(FundingStrategy::Ledger),
            Some(proto::Strategy::Virtual) => Ok(FundingStrategy::Virtual),
            None => Err(ConversionError::UnknownStrategy(value)),
        }
    }
}

/// Negotiation of the [FundingStrategy] for a target channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyMessage {
    ProposalReceived {
        target_channel_id: Hash,
        strategy: FundingStrategy,
        attempt: u32,
    },
    StrategyAgreed {
        target_channel_id: Hash,
        strategy: FundingStrategy,
    },
    StrategyRejected {
        target_channel_id: Hash,
        strategy: FundingStrategy,
    },
}

impl StrategyMessage {
    pub fn target_channel_id(&self) -> Hash {
        match self {
            StrategyMessage::ProposalReceived {
                target_channel_id, ..
            }
            | StrategyMessage::StrategyAgreed {
                target_channel_id, ..
            }
            | StrategyMessage::StrategyRejected {
                target_channel_id, ..
            } => *target_channel_id,
        }
    }
}

impl From<StrategyMessage> for proto::envelope::Msg {
    fn from(value: StrategyMessage) -> Self {
        match value {
            StrategyMessage::ProposalReceived {
                target_channel_id,
                strategy,
                attempt,
            } => proto::envelope::Msg::StrategyProposal(proto::StrategyProposal {
                target_channel_id: target_channel_id.0.to_vec(),
                strategy: proto::Strategy::from(strategy) as i32,
                attempt,
            }),
            StrategyMessage::StrategyAgreed {
                target_channel_id,
                strategy,
            } => proto::envelope::Msg::StrategyAgreed(proto::StrategyAgreed {
                target_channel_id: target_channel_id.0.to_vec(),
                strategy: proto::Strategy::from(strategy) as i32,
            }),
            StrategyMessage::StrategyRejected {
                target_channel_id,
                strategy,
            } => proto::envelope::Msg::StrategyRejected(proto::StrategyRejected {
                target_channel_id: target_channel_id.0.to_vec(),
                strategy: proto::Strategy::from(strategy) as i32,
            }),
        }
    }
}

impl TryFrom<proto::envelope::Msg> for StrategyMessage {
    type Error = ConversionError;

    fn try_from(value: proto::envelope::Msg) -> Result<Self, Self::Error> {
        Ok(match value {
            proto::envelope::Msg::StrategyProposal(msg) => StrategyMessage::ProposalReceived {
                target_channel_id: hash_from("target_channel_id", &msg.target_channel_id)?,
                strategy: msg.strategy.try_into()?,
                attempt: msg.attempt,
            },
            proto::envelope::Msg::StrategyAgreed(msg) => StrategyMessage::StrategyAgreed {
                target_channel_id: hash_from("target_channel_id", &msg.target_channel_id)?,
                strategy: msg.strategy.try_into()?,
            },
            proto::envelope::Msg::StrategyRejected(msg) => StrategyMessage::StrategyRejected {
                target_channel_id: hash_from("target_channel_id", &msg.target_channel_id)?,
                strategy: msg.strategy.try_into()?,
            },
            proto::envelope::Msg::SignedStates(_) => {
                return Err(ConversionError::ExpectedSome("strategy message"))
            }
        })
    }
}
