use crate::{
    abiencode::types::{Address, Hash, U256},
    channel::{app, Allocation, AppRegistry, Channel, SignedState, State, Supported},
    config::WalletConfig,
    consensus::{self, ConsensusState},
    funding::{self, FundingError, NegotiationStatus, StrategyNegotiation, VirtualFundingPlan},
    messages::{FundingStrategy, ParticipantMessage, StrategyMessage},
    sig::Signer,
    store::ChannelStore,
    wire::{decode_envelope, MessageBus, OutboundQueue},
    Error,
};
use std::collections::{hash_map::Entry, HashMap};

/// Something that changed while handling a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    /// Every participant signed the state at `supported.turn_num`.
    Supported {
        channel_id: Hash,
        supported: Supported,
    },
    StrategyAgreed {
        target_channel_id: Hash,
        strategy: FundingStrategy,
    },
    StrategyNegotiationFailed {
        target_channel_id: Hash,
    },
}

/// One participant's wallet.
///
/// Outgoing messages are queued and only handed to the [MessageBus] by
/// [WalletClient::flush], so the caller decides when the transport runs.
/// Invalid incoming messages are logged and dropped.
#[derive(Debug)]
pub struct WalletClient<B: MessageBus> {
    bus: B,
    signer: Signer,
    config: WalletConfig,
    apps: AppRegistry,
    store: ChannelStore,
    queue: OutboundQueue,
    negotiations: HashMap<Hash, StrategyNegotiation>,
    acceptable_strategies: Vec<FundingStrategy>,
}

impl<B: MessageBus> WalletClient<B> {
    pub fn new(
        bus: B,
        signer: Signer,
        config: WalletConfig,
        apps: AppRegistry,
    ) -> Result<Self, Error> {
        config.validate()?;
        Ok(Self {
            bus,
            signer,
            queue: OutboundQueue::new(config.outbound_queue_capacity, config.backpressure),
            config,
            apps,
            store: ChannelStore::new(),
            negotiations: HashMap::new(),
            acceptable_strategies: vec![
                FundingStrategy::Direct,
                FundingStrategy::Ledger,
                FundingStrategy::Virtual,
            ],
        })
    }

    /// Strategies accepted when a peer proposes one.
    pub fn with_acceptable_strategies(mut self, strategies: Vec<FundingStrategy>) -> Self {
        self.acceptable_strategies = strategies;
        self
    }

    pub fn address(&self) -> Address {
        self.signer.address()
    }

    pub fn config(&self) -> &WalletConfig {
        &self.config
    }

    pub fn store(&self) -> &ChannelStore {
        &self.store
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    pub fn add_channel(&mut self, channel: Channel) -> Result<Hash, Error> {
        if channel.part_idx_of(&self.address()).is_none() {
            return Err(Error::NotAParticipant(self.address()));
        }
        Ok(self.store.add_channel(channel)?)
    }

    /// Hand every queued message to the bus. Returns how many were sent.
    pub fn flush(&mut self) -> usize {
        self.queue.flush(&self.bus)
    }

    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    fn enqueue(&mut self, recipient: Address, msg: ParticipantMessage) -> Result<(), Error> {
        if let Some((dropped, _)) = self.queue.push(recipient, msg)? {
            tracing::debug!(recipient = ?dropped, "dropped queued message");
        }
        Ok(())
    }

    fn broadcast(&mut self, participants: &[Address], msg: ParticipantMessage) -> Result<(), Error> {
        let me = self.address();
        for p in participants.iter().filter(|p| **p != me) {
            self.enqueue(*p, msg.clone())?;
        }
        Ok(())
    }

    /// Reject `state` if it directly follows the supported state and the
    /// app of the channel does not allow the transition.
    fn check_transition(&self, state: &State) -> Result<(), Error> {
        let Some(app) = self.apps.get(&state.app_definition) else {
            return Ok(());
        };
        let Some(prev) = self.store.latest_supported_state(&state.channel_id)? else {
            return Ok(());
        };
        let n = self.store.channel(&state.channel_id)?.num_participants();
        if state.turn_num == prev.turn_num + 1 && !app::valid_transition(app, prev, state, n) {
            return Err(Error::InvalidTransition(state.turn_num));
        }
        Ok(())
    }

    /// Sign `state` and queue the signature for the other participants.
    pub fn sign_and_send(&mut self, state: State) -> Result<Option<Supported>, Error> {
        self.check_transition(&state)?;
        let channel_id = state.channel_id;
        let participants = self.store.channel(&channel_id)?.participants().to_vec();

        let signed = SignedState::sign(state, &self.signer)?;
        let supported = self.store.add_signed_state(signed.clone())?;
        tracing::debug!(?channel_id, turn_num = signed.state.turn_num, "signed state");
        self.broadcast(&participants, ParticipantMessage::SignedStates(vec![signed]))?;
        Ok(supported)
    }

    /// Propose to reserve `target` for `target_channel_id` in a ledger
    /// channel.
    pub fn propose_ledger_funding(
        &mut self,
        ledger_channel_id: Hash,
        asset_holder: Address,
        target_channel_id: Hash,
        target: &Allocation,
    ) -> Result<Option<Supported>, Error> {
        let proposal = funding::ledger_funding_proposal(
            &self.store,
            ledger_channel_id,
            asset_holder,
            target_channel_id,
            target,
        )?;
        self.sign_and_send(proposal)
    }

    /// Vote for the open proposal of a ledger channel, committing it if ours
    /// is the last vote.
    pub fn vote_on_ledger(&mut self, ledger_channel_id: Hash) -> Result<Option<Supported>, Error> {
        let current = self
            .store
            .latest_supported_state(&ledger_channel_id)?
            .ok_or(FundingError::NoSupportedState(ledger_channel_id))?;
        let next = if ConsensusState::of(current)?.further_votes_required == 1 {
            consensus::final_vote(current)?
        } else {
            consensus::vote(current)?
        };
        self.sign_and_send(next)
    }

    /// Plan the virtual funding of `target_channel_id` through the joint
    /// channel, store the guarantor channel and send our signature on its
    /// pre-fund state. The ledger proposal and the joint update of the plan
    /// are left to the caller.
    pub fn fund_virtually(
        &mut self,
        joint_channel_id: Hash,
        ledger_channel_id: Hash,
        asset_holder: Address,
        target_channel_id: Hash,
        guarantor_nonce: U256,
    ) -> Result<VirtualFundingPlan, Error> {
        let my_index = self
            .store
            .channel(&joint_channel_id)?
            .part_idx_of(&self.address())
            .ok_or(Error::NotAParticipant(self.address()))?;
        let plan = funding::plan_virtual_funding(
            &self.store,
            joint_channel_id,
            my_index,
            ledger_channel_id,
            asset_holder,
            target_channel_id,
            guarantor_nonce,
            self.config.default_challenge_duration,
        )?;
        if !self.store.contains(&plan.guarantor_state.channel_id) {
            self.store.add_channel(plan.guarantor.clone())?;
        }
        self.sign_and_send(plan.guarantor_state.clone())?;
        Ok(plan)
    }

    /// Start negotiating the funding strategy of a stored channel.
    pub fn propose_funding_strategy(
        &mut self,
        target_channel_id: Hash,
        strategy: FundingStrategy,
    ) -> Result<(), Error> {
        let participants = self.store.channel(&target_channel_id)?.participants().to_vec();
        let negotiation = match self.negotiations.entry(target_channel_id) {
            Entry::Occupied(e) => e.into_mut(),
            Entry::Vacant(e) => e.insert(StrategyNegotiation::new(
                target_channel_id,
                participants.clone(),
                self.signer.address(),
                self.config.max_strategy_attempts,
            )?),
        };
        let msg = negotiation.propose(strategy)?;
        self.broadcast(&participants, ParticipantMessage::Strategy(msg))
    }

    pub fn negotiation_status(&self, target_channel_id: &Hash) -> Option<NegotiationStatus> {
        self.negotiations.get(target_channel_id).map(|n| n.status())
    }

    /// Decode a frame from the transport and handle it.
    pub fn handle_bytes(&mut self, buf: &[u8]) -> Vec<ClientEvent> {
        match decode_envelope(buf) {
            Ok((sender, msg)) => self.handle_message(sender, msg),
            Err(e) => {
                tracing::warn!(error = %e, "dropping undecodable message");
                Vec::new()
            }
        }
    }

    pub fn handle_message(&mut self, from: Address, msg: ParticipantMessage) -> Vec<ClientEvent> {
        let mut events = Vec::new();
        match msg {
            ParticipantMessage::SignedStates(states) => {
                for signed in states {
                    let turn_num = signed.state.turn_num;
                    match self.handle_signed_state(signed) {
                        Ok(Some(event)) => events.push(event),
                        Ok(None) => {}
                        Err(e) => {
                            tracing::warn!(?from, turn_num, error = %e, "dropping signed state")
                        }
                    }
                }
            }
            ParticipantMessage::Strategy(msg) => match self.handle_strategy(from, msg) {
                Ok(event) => events.extend(event),
                Err(Error::Funding(FundingError::StrategyNegotiationFailed {
                    target_channel_id,
                    ..
                })) => events.push(ClientEvent::StrategyNegotiationFailed { target_channel_id }),
                Err(e) => tracing::warn!(?from, error = %e, "dropping strategy message"),
            },
        }
        events
    }

    fn handle_signed_state(&mut self, signed: SignedState) -> Result<Option<ClientEvent>, Error> {
        self.check_transition(&signed.state)?;
        let channel_id = signed.state.channel_id;
        Ok(self
            .store
            .add_signed_state(signed)?
            .map(|supported| ClientEvent::Supported {
                channel_id,
                supported,
            }))
    }

    fn handle_strategy(
        &mut self,
        from: Address,
        msg: StrategyMessage,
    ) -> Result<Option<ClientEvent>, Error> {
        let target_channel_id = msg.target_channel_id();
        let participants = self.store.channel(&target_channel_id)?.participants().to_vec();
        let negotiation = match self.negotiations.entry(target_channel_id) {
            Entry::Occupied(e) => e.into_mut(),
            Entry::Vacant(e) => e.insert(StrategyNegotiation::new(
                target_channel_id,
                participants.clone(),
                self.signer.address(),
                self.config.max_strategy_attempts,
            )?),
        };

        let before = negotiation.status();
        let reply = negotiation.handle(from, msg, &self.acceptable_strategies);
        let after = negotiation.status();
        // A rejection that exhausts the attempts is still sent.
        if let Some(reply) = reply.as_ref().ok().and_then(|r| *r) {
            self.broadcast(&participants, ParticipantMessage::Strategy(reply))?;
        } else if let (
            Err(FundingError::StrategyNegotiationFailed { .. }),
            StrategyMessage::ProposalReceived { strategy, .. },
        ) = (&reply, msg)
        {
            let reject = StrategyMessage::StrategyRejected {
                target_channel_id,
                strategy,
            };
            self.broadcast(&participants, ParticipantMessage::Strategy(reject))?;
        }
        reply?;

        Ok(match after {
            NegotiationStatus::Agreed(strategy) if before != after => {
                Some(ClientEvent::StrategyAgreed {
                    target_channel_id,
                    strategy,
                })
            }
            _ => None,
        })
    }
}
