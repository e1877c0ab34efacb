//! Voting protocol used by ledger channels to agree on a new outcome.
//!
//! The [ConsensusState] lives in `State::app_data`. A proposal needs a vote
//! from every other participant, the last vote commits it. Anyone can veto
//! while a vote is running.

use crate::{
    channel::{App, Outcome, State},
    messages::ConversionError,
    wire::proto,
};
use prost::Message;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConsensusError {
    #[error("{transition} is not allowed with {further_votes_required} further votes required")]
    InvalidConsensusTransition {
        transition: &'static str,
        further_votes_required: u32,
    },
    #[error("consensus needs at least two participants, got {0}")]
    TooFewParticipants(usize),
    #[error("idle consensus state carries a proposal")]
    ProposalAtRest,
    #[error("cannot decode consensus data: {0}")]
    Decode(#[from] prost::DecodeError),
    #[error("invalid proposed outcome: {0}")]
    Conversion(#[from] ConversionError),
}

/// Application data of a ledger channel.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConsensusState {
    pub further_votes_required: u32,
    pub proposed_outcome: Outcome,
}

impl ConsensusState {
    pub fn idle() -> Self {
        Self::default()
    }

    pub fn voting(further_votes_required: u32, proposed_outcome: Outcome) -> Self {
        Self {
            further_votes_required,
            proposed_outcome,
        }
    }

    pub fn is_idle(&self) -> bool {
        self.further_votes_required == 0
    }

    pub fn encode(&self) -> Vec<u8> {
        proto::ConsensusData {
            further_votes_required: self.further_votes_required,
            proposed_outcome: if self.is_idle() {
                None
            } else {
                Some((&self.proposed_outcome).into())
            },
        }
        .encode_to_vec()
    }

    /// Decode `app_data`. Empty data is the idle state.
    pub fn decode(app_data: &[u8]) -> Result<Self, ConsensusError> {
        let data = proto::ConsensusData::decode(app_data)?;
        let proposed_outcome = match data.proposed_outcome {
            Some(o) => o.try_into()?,
            None => Outcome::default(),
        };
        if data.further_votes_required == 0 && !proposed_outcome.0.is_empty() {
            return Err(ConsensusError::ProposalAtRest);
        }
        Ok(Self {
            further_votes_required: data.further_votes_required,
            proposed_outcome,
        })
    }

    pub fn of(state: &State) -> Result<Self, ConsensusError> {
        Self::decode(&state.app_data)
    }
}

fn votes_for(num_participants: usize) -> Result<u32, ConsensusError> {
    match u32::try_from(num_participants) {
        Ok(n) if n >= 2 => Ok(n - 1),
        _ => Err(ConsensusError::TooFewParticipants(num_participants)),
    }
}

fn invalid(transition: &'static str, current: &ConsensusState) -> ConsensusError {
    ConsensusError::InvalidConsensusTransition {
        transition,
        further_votes_required: current.further_votes_required,
    }
}

fn successor(current: &State, consensus: &ConsensusState) -> State {
    let mut next = current.next();
    next.app_data = consensus.encode();
    next
}

/// Idle to voting on `proposed_outcome`.
pub fn propose(
    current: &State,
    proposed_outcome: Outcome,
    num_participants: usize,
) -> Result<State, ConsensusError> {
    let consensus = ConsensusState::of(current)?;
    if !consensus.is_idle() {
        return Err(invalid("propose", &consensus));
    }
    let votes = votes_for(num_participants)?;
    Ok(successor(current, &ConsensusState::voting(votes, proposed_outcome)))
}

/// Replace a running proposal, restarting the vote.
pub fn propose_alternative(
    current: &State,
    proposed_outcome: Outcome,
    num_participants: usize,
) -> Result<State, ConsensusError> {
    let consensus = ConsensusState::of(current)?;
    if consensus.is_idle() {
        return Err(invalid("propose_alternative", &consensus));
    }
    let votes = votes_for(num_participants)?;
    Ok(successor(current, &ConsensusState::voting(votes, proposed_outcome)))
}

pub fn vote(current: &State) -> Result<State, ConsensusError> {
    let consensus = ConsensusState::of(current)?;
    if consensus.further_votes_required <= 1 {
        return Err(invalid("vote", &consensus));
    }
    Ok(successor(
        current,
        &ConsensusState::voting(
            consensus.further_votes_required - 1,
            consensus.proposed_outcome,
        ),
    ))
}

/// The last vote: the proposal becomes the channel outcome.
pub fn final_vote(current: &State) -> Result<State, ConsensusError> {
    let consensus = ConsensusState::of(current)?;
    if consensus.further_votes_required != 1 {
        return Err(invalid("final_vote", &consensus));
    }
    let mut next = successor(current, &ConsensusState::idle());
    next.outcome = consensus.proposed_outcome;
    Ok(next)
}

pub fn veto(current: &State) -> Result<State, ConsensusError> {
    let consensus = ConsensusState::of(current)?;
    if consensus.is_idle() {
        return Err(invalid("veto", &consensus));
    }
    Ok(successor(current, &ConsensusState::idle()))
}

/// Advance the turn without changing anything.
pub fn pass(current: &State) -> Result<State, ConsensusError> {
    let consensus = ConsensusState::of(current)?;
    if !consensus.is_idle() {
        return Err(invalid("pass", &consensus));
    }
    Ok(successor(current, &consensus))
}

/// Transition rules of a ledger channel: exactly the steps produced by the
/// functions of this module.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsensusApp;

impl App for ConsensusApp {
    fn valid_transition(&self, from: &State, to: &State, num_participants: usize) -> bool {
        let (Ok(a), Ok(b)) = (ConsensusState::of(from), ConsensusState::of(to)) else {
            return false;
        };
        let Ok(restart) = votes_for(num_participants) else {
            return false;
        };
        let outcome_kept = from.outcome == to.outcome;

        match (a.is_idle(), b.is_idle()) {
            // pass
            (true, true) => outcome_kept,
            // propose
            (true, false) => outcome_kept && b.further_votes_required == restart,
            (false, false) => {
                let voted = b.further_votes_required + 1 == a.further_votes_required
                    && b.proposed_outcome == a.proposed_outcome;
                let alternative = b.further_votes_required == restart;
                outcome_kept && (voted || alternative)
            }
            (false, true) => {
                let committed =
                    a.further_votes_required == 1 && to.outcome == a.proposed_outcome;
                committed || outcome_kept
            }
        }
    }
}
