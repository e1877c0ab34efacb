use super::FundingError;
use crate::{
    abiencode::types::{Address, Hash},
    messages::{FundingStrategy, StrategyMessage},
};
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NegotiationStatus {
    /// No proposal is open.
    Idle,
    /// Waiting for the other participants to accept `strategy`.
    Pending(FundingStrategy),
    Agreed(FundingStrategy),
    Failed,
}

/// Agreement on a [FundingStrategy] for one target channel. Every
/// participant has to accept the same proposal; a rejection ends the
/// attempt, and after `max_attempts` the negotiation fails.
#[derive(Debug, Clone)]
pub struct StrategyNegotiation {
    target_channel_id: Hash,
    participants: Vec<Address>,
    me: Address,
    max_attempts: u32,
    attempts: u32,
    status: NegotiationStatus,
    accepted_by: HashSet<Address>,
}

impl StrategyNegotiation {
    pub fn new(
        target_channel_id: Hash,
        participants: Vec<Address>,
        me: Address,
        max_attempts: u32,
    ) -> Result<Self, FundingError> {
        if !participants.contains(&me) {
            return Err(FundingError::NotAParticipant(me));
        }
        Ok(Self {
            target_channel_id,
            participants,
            me,
            max_attempts,
            attempts: 0,
            status: NegotiationStatus::Idle,
            accepted_by: HashSet::new(),
        })
    }

    pub fn status(&self) -> NegotiationStatus {
        self.status
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn target_channel_id(&self) -> Hash {
        self.target_channel_id
    }

    fn failed(&mut self) -> FundingError {
        self.status = NegotiationStatus::Failed;
        tracing::warn!(
            target_channel_id = ?self.target_channel_id,
            attempts = self.attempts,
            "funding strategy negotiation failed"
        );
        FundingError::StrategyNegotiationFailed {
            target_channel_id: self.target_channel_id,
            attempts: self.attempts,
        }
    }

    fn start_attempt(&mut self, attempt: u32, strategy: FundingStrategy, proposer: Address) {
        self.attempts = self.attempts.max(attempt);
        self.status = NegotiationStatus::Pending(strategy);
        self.accepted_by.clear();
        self.accepted_by.insert(proposer);
    }

    fn check_agreed(&mut self) {
        if let NegotiationStatus::Pending(strategy) = self.status {
            if self.participants.iter().all(|p| self.accepted_by.contains(p)) {
                self.status = NegotiationStatus::Agreed(strategy);
                tracing::info!(
                    target_channel_id = ?self.target_channel_id,
                    ?strategy,
                    "funding strategy agreed"
                );
            }
        }
    }

    /// Open a new attempt with `strategy`. The returned message goes to
    /// every other participant.
    pub fn propose(&mut self, strategy: FundingStrategy) -> Result<StrategyMessage, FundingError> {
        match self.status {
            NegotiationStatus::Failed => return Err(self.failed()),
            NegotiationStatus::Agreed(_) | NegotiationStatus::Pending(_) => {
                return Err(FundingError::ProposalOpen(self.target_channel_id))
            }
            NegotiationStatus::Idle => {}
        }
        if self.attempts >= self.max_attempts {
            return Err(self.failed());
        }
        let attempt = self.attempts + 1;
        self.start_attempt(attempt, strategy, self.me);
        self.check_agreed();
        Ok(StrategyMessage::ProposalReceived {
            target_channel_id: self.target_channel_id,
            strategy,
            attempt,
        })
    }

    /// Process a message from `from`. A proposal is answered with an
    /// acceptance if the strategy is in `acceptable`, otherwise with a
    /// rejection.
    pub fn handle(
        &mut self,
        from: Address,
        msg: StrategyMessage,
        acceptable: &[FundingStrategy],
    ) -> Result<Option<StrategyMessage>, FundingError> {
        if msg.target_channel_id() != self.target_channel_id {
            return Err(FundingError::WrongTarget {
                expected: self.target_channel_id,
                actual: msg.target_channel_id(),
            });
        }
        if !self.participants.contains(&from) || from == self.me {
            return Err(FundingError::NotAParticipant(from));
        }
        if let NegotiationStatus::Agreed(_) | NegotiationStatus::Failed = self.status {
            return Ok(None);
        }

        match msg {
            StrategyMessage::ProposalReceived {
                strategy, attempt, ..
            } => {
                if attempt <= self.attempts || attempt > self.max_attempts {
                    tracing::debug!(attempt, "ignoring outdated strategy proposal");
                    return Ok(None);
                }
                self.start_attempt(attempt, strategy, from);
                if acceptable.contains(&strategy) {
                    self.accepted_by.insert(self.me);
                    self.check_agreed();
                    Ok(Some(StrategyMessage::StrategyAgreed {
                        target_channel_id: self.target_channel_id,
                        strategy,
                    }))
                } else {
                    self.rejected()?;
                    Ok(Some(StrategyMessage::StrategyRejected {
                        target_channel_id: self.target_channel_id,
                        strategy,
                    }))
                }
            }
            StrategyMessage::StrategyAgreed { strategy, .. } => {
                if self.status == NegotiationStatus::Pending(strategy) {
                    self.accepted_by.insert(from);
                    self.check_agreed();
                }
                Ok(None)
            }
            StrategyMessage::StrategyRejected { strategy, .. } => {
                if self.status == NegotiationStatus::Pending(strategy) {
                    self.rejected()?;
                }
                Ok(None)
            }
        }
    }

    fn rejected(&mut self) -> Result<(), FundingError> {
        if self.attempts >= self.max_attempts {
            return Err(self.failed());
        }
        self.status = NegotiationStatus::Idle;
        self.accepted_by.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TARGET: Hash = Hash([0x42; 32]);

    fn parties(n: u8) -> Vec<Address> {
        (1..=n).map(|i| Address([i; 20])).collect()
    }

    fn negotiation(me: usize, n: u8, max_attempts: u32) -> StrategyNegotiation {
        let p = parties(n);
        StrategyNegotiation::new(TARGET, p.clone(), p[me], max_attempts).unwrap()
    }

    #[test]
    fn unanimous_acceptance() {
        let p = parties(3);
        let mut alice = negotiation(0, 3, 2);
        let mut bob = negotiation(1, 3, 2);

        let proposal = alice.propose(FundingStrategy::Ledger).unwrap();
        let reply = bob
            .handle(p[0], proposal, &[FundingStrategy::Ledger])
            .unwrap()
            .unwrap();
        assert_eq!(
            reply,
            StrategyMessage::StrategyAgreed {
                target_channel_id: TARGET,
                strategy: FundingStrategy::Ledger
            }
        );
        assert_eq!(bob.status(), NegotiationStatus::Pending(FundingStrategy::Ledger));

        alice.handle(p[1], reply, &[]).unwrap();
        assert_eq!(alice.status(), NegotiationStatus::Pending(FundingStrategy::Ledger));
        alice.handle(p[2], reply, &[]).unwrap();
        assert_eq!(alice.status(), NegotiationStatus::Agreed(FundingStrategy::Ledger));
    }

    #[test]
    fn rejection_then_retry() {
        let p = parties(2);
        let mut alice = negotiation(0, 2, 2);
        let mut bob = negotiation(1, 2, 2);
        let acceptable = [FundingStrategy::Direct];

        let proposal = alice.propose(FundingStrategy::Virtual).unwrap();
        let reply = bob.handle(p[0], proposal, &acceptable).unwrap().unwrap();
        assert!(matches!(reply, StrategyMessage::StrategyRejected { .. }));
        alice.handle(p[1], reply, &[]).unwrap();
        assert_eq!(alice.status(), NegotiationStatus::Idle);

        let proposal = alice.propose(FundingStrategy::Direct).unwrap();
        assert!(matches!(
            proposal,
            StrategyMessage::ProposalReceived { attempt: 2, .. }
        ));
        let reply = bob.handle(p[0], proposal, &acceptable).unwrap().unwrap();
        assert_eq!(bob.status(), NegotiationStatus::Agreed(FundingStrategy::Direct));
        alice.handle(p[1], reply, &[]).unwrap();
        assert_eq!(alice.status(), NegotiationStatus::Agreed(FundingStrategy::Direct));
    }

    #[test]
    fn attempts_are_bounded() {
        let p = parties(2);
        let mut alice = negotiation(0, 2, 1);
        let mut bob = negotiation(1, 2, 1);

        let proposal = alice.propose(FundingStrategy::Virtual).unwrap();
        assert_eq!(
            bob.handle(p[0], proposal, &[]),
            Err(FundingError::StrategyNegotiationFailed {
                target_channel_id: TARGET,
                attempts: 1
            })
        );
        let reply = StrategyMessage::StrategyRejected {
            target_channel_id: TARGET,
            strategy: FundingStrategy::Virtual,
        };
        assert!(matches!(
            alice.handle(p[1], reply, &[]),
            Err(FundingError::StrategyNegotiationFailed { .. })
        ));
        assert_eq!(alice.status(), NegotiationStatus::Failed);
        assert!(alice.propose(FundingStrategy::Direct).is_err());
    }

    #[test]
    fn one_proposal_at_a_time() {
        let mut alice = negotiation(0, 2, 3);
        alice.propose(FundingStrategy::Direct).unwrap();
        assert_eq!(
            alice.propose(FundingStrategy::Ledger),
            Err(FundingError::ProposalOpen(TARGET))
        );
        assert_eq!(alice.attempts(), 1);
    }

    #[test]
    fn foreign_messages_are_rejected() {
        let p = parties(2);
        let mut bob = negotiation(1, 2, 3);
        let proposal = StrategyMessage::ProposalReceived {
            target_channel_id: Hash([1; 32]),
            strategy: FundingStrategy::Direct,
            attempt: 1,
        };
        assert!(matches!(
            bob.handle(p[0], proposal, &[]),
            Err(FundingError::WrongTarget { .. })
        ));
        let proposal = StrategyMessage::ProposalReceived {
            target_channel_id: TARGET,
            strategy: FundingStrategy::Direct,
            attempt: 1,
        };
        assert_eq!(
            bob.handle(Address([9; 20]), proposal, &[]),
            Err(FundingError::NotAParticipant(Address([9; 20])))
        );
        // replayed proposal
        bob.handle(p[0], proposal, &[FundingStrategy::Direct]).unwrap();
        let replay = StrategyMessage::ProposalReceived {
            target_channel_id: TARGET,
            strategy: FundingStrategy::Ledger,
            attempt: 1,
        };
        assert_eq!(bob.handle(p[0], replay, &[FundingStrategy::Ledger]), Ok(None));
    }
}
