//! Reference model of the on-chain adjudicator.
//!
//! The adjudicator only keeps a digest per channel and a timer. Anyone can
//! challenge with a support proof; the challenge is cleared by the next
//! mover's response, by a newer proof or by a checkpoint, and otherwise the
//! challenged outcome becomes final once the timer runs out.
//!
//! Every call either applies completely or leaves storage untouched.

mod ledger;
mod storage;

pub use ledger::{AdjudicatorCall, Ledger, Receipt};
pub use storage::{ChannelStatus, ChannelStorage};

use crate::{
    abiencode::{
        self,
        types::{Address, Destination, Hash, Signature, U256},
    },
    channel::{
        app, AllocationError, AllocationItem, App, AppRegistry, AssetOutcomeContent, Channel,
        Outcome, SignedState, State, SupportError, SupportProof, Supported,
    },
    sig,
};
use std::{
    collections::HashMap,
    sync::atomic::{AtomicU64, Ordering},
    time::{SystemTime, UNIX_EPOCH},
};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AdjudicatorError {
    #[error("turnNumRecord is {actual}, caller expected {expected}")]
    StaleTurnNumRecord { expected: u64, actual: u64 },
    #[error("invalid support proof: {0}")]
    InvalidSupportProof(#[from] SupportError),
    #[error("no challenge is active")]
    ChallengeNotActive,
    #[error("a challenge is active or the channel is finalized")]
    ChallengeAlreadyActive,
    #[error("challenge state does not match the stored digest")]
    WrongPredecessorDigest,
    #[error("signature recovers to {recovered:?}, expected {expected:?}")]
    SignerMismatch {
        expected: Address,
        recovered: Address,
    },
    #[error("outcome does not match the stored outcome hash")]
    OutcomeHashMismatch,
    #[error("turn {proposed} does not advance turnNumRecord {record}")]
    TurnNumNotIncreased { record: u64, proposed: u64 },
    #[error("response must be at turn {expected}, got {actual}")]
    WrongTurnNum { expected: u64, actual: u64 },
    #[error("response is not a valid transition from the challenge state")]
    InvalidTransition,
    #[error("conclusion proof contains a non-final state")]
    NotAllStatesFinal,
    #[error("challenger {0:?} is not a participant")]
    ChallengerNotParticipant(Address),
    #[error("no app registered at {0:?}")]
    UnknownApp(Address),
    #[error("channel is not finalized")]
    ChannelNotFinalized,
    #[error("holdings are {held}, below the expected {expected}")]
    HoldingsBelowExpected { expected: U256, held: U256 },
    #[error("holdings of {held} already cover the deposit")]
    DepositAlreadyMade { held: U256 },
    #[error("cannot deposit to external destination {0:?}")]
    ExternalDestination(Destination),
    #[error(transparent)]
    Allocation(#[from] AllocationError),
    #[error(transparent)]
    Signature(#[from] sig::Error),
    #[error(transparent)]
    Encoding(#[from] abiencode::Error),
}

/// Source of the block timestamp.
pub trait Clock {
    fn now(&self) -> u64;
}

/// Seconds since the unix epoch.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default()
    }
}

/// Clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock(AtomicU64);

impl ManualClock {
    pub fn new(now: u64) -> Self {
        Self(AtomicU64::new(now))
    }

    pub fn set(&self, now: u64) {
        self.0.store(now, Ordering::SeqCst);
    }

    pub fn advance(&self, secs: u64) {
        self.0.fetch_add(secs, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }
}

/// Funds paid out of a finalized channel to an external address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Withdrawal {
    pub asset_holder: Address,
    pub channel_id: Hash,
    pub to: Address,
    pub amount: U256,
}

#[derive(Debug)]
pub struct Adjudicator<C: Clock> {
    clock: C,
    apps: AppRegistry,
    channels: HashMap<Hash, ChannelStorage>,
    holdings: HashMap<(Address, Destination), U256>,
    withdrawals: Vec<Withdrawal>,
}

impl<C: Clock> Adjudicator<C> {
    pub fn new(clock: C, apps: AppRegistry) -> Self {
        Self {
            clock,
            apps,
            channels: HashMap::new(),
            holdings: HashMap::new(),
            withdrawals: Vec::new(),
        }
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Block timestamp, never below 1. A `finalizes_at` of zero marks an
    /// open channel, so a conclusion at time zero has to land on 1.
    fn now(&self) -> u64 {
        self.clock.now().max(1)
    }

    pub fn get_channel_storage(&self, channel_id: &Hash) -> ChannelStorage {
        self.channels.get(channel_id).copied().unwrap_or_default()
    }

    pub fn status(&self, channel_id: &Hash) -> ChannelStatus {
        self.get_channel_storage(channel_id).status(self.now())
    }

    pub fn withdrawals(&self) -> &[Withdrawal] {
        &self.withdrawals
    }

    fn app(&self, app_definition: &Address) -> Result<&dyn App, AdjudicatorError> {
        self.apps
            .get(app_definition)
            .ok_or(AdjudicatorError::UnknownApp(*app_definition))
    }

    fn validate(
        &self,
        channel: &Channel,
        proof: &SupportProof,
    ) -> Result<Supported, AdjudicatorError> {
        let latest = proof.latest().ok_or(SupportError::EmptyProof)?;
        let app = self.app(&latest.app_definition)?;
        Ok(crate::channel::validate(channel, proof, Some(app))?)
    }

    /// Current storage of a channel that is not finalized, after checking
    /// the caller's view of `turnNumRecord`.
    fn unfinalized(
        &self,
        channel_id: &Hash,
        expected_turn_num_record: u64,
    ) -> Result<(ChannelStorage, ChannelStatus), AdjudicatorError> {
        let stored = self.get_channel_storage(channel_id);
        let status = stored.status(self.now());
        if status == ChannelStatus::Finalized {
            return Err(AdjudicatorError::ChallengeAlreadyActive);
        }
        if stored.turn_num_record != expected_turn_num_record {
            return Err(AdjudicatorError::StaleTurnNumRecord {
                expected: expected_turn_num_record,
                actual: stored.turn_num_record,
            });
        }
        Ok((stored, status))
    }

    /// Register a challenge with the latest state of `proof`.
    ///
    /// `challenger_signature` is an Ethereum signature on
    /// [State::hash_challenge_message] of that state by a participant.
    pub fn force_move(
        &mut self,
        channel: &Channel,
        expected_turn_num_record: u64,
        proof: &SupportProof,
        challenger_signature: Signature,
    ) -> Result<ChannelStorage, AdjudicatorError> {
        let channel_id = channel.id()?;
        let (stored, _) = self.unfinalized(&channel_id, expected_turn_num_record)?;

        let supported = self.validate(channel, proof)?;
        if supported.turn_num <= stored.turn_num_record {
            return Err(AdjudicatorError::TurnNumNotIncreased {
                record: stored.turn_num_record,
                proposed: supported.turn_num,
            });
        }

        let latest = proof.latest().ok_or(SupportError::EmptyProof)?;
        let challenger =
            sig::recover_signer(latest.hash_challenge_message()?, challenger_signature)?;
        if channel.part_idx_of(&challenger).is_none() {
            return Err(AdjudicatorError::ChallengerNotParticipant(challenger));
        }

        let storage = ChannelStorage {
            turn_num_record: supported.turn_num,
            finalizes_at: self.now().saturating_add(latest.challenge_duration),
            state_hash: supported.state_hash,
            challenger,
            outcome_hash: supported.outcome_hash,
        };
        self.channels.insert(channel_id, storage);
        tracing::info!(
            ?channel_id,
            turn_num = storage.turn_num_record,
            finalizes_at = storage.finalizes_at,
            ?challenger,
            "challenge registered"
        );
        Ok(storage)
    }

    /// Clear a challenge by signing the next state on top of it.
    pub fn respond(
        &mut self,
        channel: &Channel,
        expected_turn_num_record: u64,
        challenge_state: &State,
        response: &SignedState,
    ) -> Result<ChannelStorage, AdjudicatorError> {
        let channel_id = channel.id()?;
        let (stored, status) = self.unfinalized(&channel_id, expected_turn_num_record)?;
        if status != ChannelStatus::Challenged {
            return Err(AdjudicatorError::ChallengeNotActive);
        }
        if challenge_state.hash()? != stored.state_hash {
            return Err(AdjudicatorError::WrongPredecessorDigest);
        }

        let to = &response.state;
        let expected_turn = stored
            .turn_num_record
            .checked_add(1)
            .ok_or(AdjudicatorError::WrongTurnNum {
                expected: stored.turn_num_record,
                actual: to.turn_num,
            })?;
        if to.turn_num != expected_turn {
            return Err(AdjudicatorError::WrongTurnNum {
                expected: expected_turn,
                actual: to.turn_num,
            });
        }
        if to.channel_id != channel_id {
            return Err(SupportError::ChannelIdMismatch {
                expected: channel_id,
                actual: to.channel_id,
            }
            .into());
        }

        let mover = channel.mover(expected_turn);
        let recovered = sig::recover_signer(to.hash()?, response.signature)?;
        if recovered != mover {
            return Err(AdjudicatorError::SignerMismatch {
                expected: mover,
                recovered,
            });
        }

        let app = self.app(&challenge_state.app_definition)?;
        if !app::valid_transition(app, challenge_state, to, channel.num_participants()) {
            return Err(AdjudicatorError::InvalidTransition);
        }

        let storage = ChannelStorage::cleared(expected_turn);
        self.channels.insert(channel_id, storage);
        tracing::info!(?channel_id, turn_num = expected_turn, "challenge cleared by response");
        Ok(storage)
    }

    /// Clear a challenge with a newer support proof.
    pub fn respond_with_alternative(
        &mut self,
        channel: &Channel,
        expected_turn_num_record: u64,
        proof: &SupportProof,
    ) -> Result<ChannelStorage, AdjudicatorError> {
        let channel_id = channel.id()?;
        let (stored, status) = self.unfinalized(&channel_id, expected_turn_num_record)?;
        if status != ChannelStatus::Challenged {
            return Err(AdjudicatorError::ChallengeNotActive);
        }

        let supported = self.validate(channel, proof)?;
        if supported.turn_num <= stored.turn_num_record {
            return Err(AdjudicatorError::TurnNumNotIncreased {
                record: stored.turn_num_record,
                proposed: supported.turn_num,
            });
        }

        let storage = ChannelStorage::cleared(supported.turn_num);
        self.channels.insert(channel_id, storage);
        tracing::info!(
            ?channel_id,
            turn_num = supported.turn_num,
            "challenge cleared by alternative"
        );
        Ok(storage)
    }

    /// Record a supported turn number, clearing any challenge.
    pub fn checkpoint(
        &mut self,
        channel: &Channel,
        expected_turn_num_record: u64,
        proof: &SupportProof,
    ) -> Result<ChannelStorage, AdjudicatorError> {
        let channel_id = channel.id()?;
        let (stored, _) = self.unfinalized(&channel_id, expected_turn_num_record)?;

        let supported = self.validate(channel, proof)?;
        if supported.turn_num < stored.turn_num_record {
            return Err(AdjudicatorError::TurnNumNotIncreased {
                record: stored.turn_num_record,
                proposed: supported.turn_num,
            });
        }

        let storage = ChannelStorage::cleared(supported.turn_num);
        self.channels.insert(channel_id, storage);
        tracing::debug!(?channel_id, turn_num = supported.turn_num, "checkpoint");
        Ok(storage)
    }

    /// Finalize immediately with a proof of final states.
    pub fn conclude(
        &mut self,
        channel: &Channel,
        proof: &SupportProof,
    ) -> Result<ChannelStorage, AdjudicatorError> {
        let channel_id = channel.id()?;
        let stored = self.get_channel_storage(&channel_id);
        if stored.status(self.now()) == ChannelStatus::Finalized {
            return Err(AdjudicatorError::ChallengeAlreadyActive);
        }
        if proof.states.iter().any(|s| !s.is_final) {
            return Err(AdjudicatorError::NotAllStatesFinal);
        }

        let supported = self.validate(channel, proof)?;
        let storage = ChannelStorage {
            finalizes_at: self.now(),
            outcome_hash: supported.outcome_hash,
            ..Default::default()
        };
        self.channels.insert(channel_id, storage);
        tracing::info!(?channel_id, turn_num = supported.turn_num, "channel concluded");
        Ok(storage)
    }

    pub fn holdings(&self, asset_holder: &Address, destination: &Destination) -> U256 {
        self.holdings
            .get(&(*asset_holder, *destination))
            .copied()
            .unwrap_or_default()
    }

    /// Deposit so that holdings reach `expected_held + amount`.
    ///
    /// Fails if holdings are below `expected_held` (an earlier deposit is
    /// missing) or already at the target. Only the missing part is
    /// deposited, so a repeated call never pays twice. Returns the amount
    /// actually deposited.
    pub fn deposit(
        &mut self,
        asset_holder: Address,
        destination: Destination,
        expected_held: U256,
        amount: U256,
    ) -> Result<U256, AdjudicatorError> {
        if destination.is_external() {
            return Err(AdjudicatorError::ExternalDestination(destination));
        }
        let held = self.holdings(&asset_holder, &destination);
        if held < expected_held {
            return Err(AdjudicatorError::HoldingsBelowExpected {
                expected: expected_held,
                held,
            });
        }
        let target = expected_held
            .checked_add(amount)
            .ok_or(AllocationError::Overflow)?;
        if held >= target {
            return Err(AdjudicatorError::DepositAlreadyMade { held });
        }

        let deposited = target - held;
        self.holdings.insert((asset_holder, destination), target);
        tracing::debug!(?asset_holder, ?destination, %deposited, held = %target, "deposit");
        Ok(deposited)
    }

    /// Pay out every allocation of a finalized channel, in order and capped
    /// by what the channel holds. Guarantees are left untouched.
    ///
    /// Returns the outcome that is left, its hash replaces the stored one.
    pub fn transfer_all(
        &mut self,
        channel_id: Hash,
        outcome: &Outcome,
    ) -> Result<Outcome, AdjudicatorError> {
        let stored = self.get_channel_storage(&channel_id);
        if stored.status(self.now()) != ChannelStatus::Finalized {
            return Err(AdjudicatorError::ChannelNotFinalized);
        }
        if outcome.hash()? != stored.outcome_hash {
            return Err(AdjudicatorError::OutcomeHashMismatch);
        }

        let source: Destination = channel_id.into();
        let mut remaining = outcome.clone();
        let mut credits = Vec::new();
        let mut withdrawals = Vec::new();
        let mut balances = Vec::new();

        for asset in remaining.0.iter_mut() {
            let AssetOutcomeContent::Allocation(allocation) = &mut asset.content else {
                continue;
            };
            let mut available = self.holdings(&asset.asset_holder, &source);
            let mut left = Vec::new();
            for item in allocation.iter() {
                let paid = item.amount.min(available);
                available -= paid;
                if !paid.is_zero() {
                    match item.destination.as_address() {
                        Some(to) => withdrawals.push(Withdrawal {
                            asset_holder: asset.asset_holder,
                            channel_id,
                            to,
                            amount: paid,
                        }),
                        None => credits.push((asset.asset_holder, item.destination, paid)),
                    }
                }
                if item.amount > paid {
                    left.push(AllocationItem {
                        destination: item.destination,
                        amount: item.amount - paid,
                    });
                }
            }
            *allocation = left.into();
            balances.push((asset.asset_holder, available));
        }

        // Compute every new balance before touching state.
        let mut updates = HashMap::new();
        for (asset_holder, available) in balances {
            updates.insert((asset_holder, source), available);
        }
        for (asset_holder, destination, paid) in credits {
            let key = (asset_holder, destination);
            let current = updates
                .get(&key)
                .copied()
                .unwrap_or_else(|| self.holdings(&asset_holder, &destination));
            let credited = current
                .checked_add(paid)
                .ok_or(AllocationError::Overflow)?;
            updates.insert(key, credited);
        }
        let outcome_hash = remaining.hash()?;

        self.holdings.extend(updates);
        for w in &withdrawals {
            tracing::info!(?channel_id, to = ?w.to, amount = %w.amount, "withdrawal");
        }
        self.withdrawals.extend(withdrawals);
        self.channels.insert(
            channel_id,
            ChannelStorage {
                outcome_hash,
                ..stored
            },
        );
        Ok(remaining)
    }
}
