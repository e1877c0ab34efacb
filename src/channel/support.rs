//! Decides whether a set of signed states supports a state.
//!
//! Two flavours exist. Off-chain, participants require every participant to
//! sign the same state ([validate_unanimous]). On-chain, a proof of `m <= n`
//! consecutive states is enough if every participant signed either their own
//! latest move or a later state ([validate]), since signing a later state
//! implicitly ratifies everything before it.

use super::{app, App, Channel, Outcome, PartIdx, SignedState, State};
use crate::{
    abiencode::{
        self,
        types::{Address, Hash, Signature},
    },
    sig,
};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SupportError {
    #[error("support proof contains no states")]
    EmptyProof,
    #[error("{states} states cannot be signed by {participants} participants")]
    TooManyStates { states: usize, participants: usize },
    #[error("whoSignedWhat has {actual} entries, expected {expected}")]
    WhoSignedWhatLength { expected: usize, actual: usize },
    #[error("proof has {actual} signatures, expected {expected}")]
    SignatureCount { expected: usize, actual: usize },
    #[error("participant {participant} is assigned state {index}, which is not in the proof")]
    StateIndexOutOfRange { participant: PartIdx, index: usize },
    #[error("participant {participant} signed a state older than their own latest move")]
    UnacceptableWhoSignedWhat { participant: PartIdx },
    #[error("signature recovers to {recovered:?}, expected {expected:?}")]
    SignerMismatch {
        expected: Address,
        recovered: Address,
    },
    #[error("state {index} of the proof is not consecutive to its predecessor")]
    NonConsecutiveTurnNums { index: usize },
    #[error("state belongs to channel {actual:?}, expected {expected:?}")]
    ChannelIdMismatch { expected: Hash, actual: Hash },
    #[error("invalid transition to turn {turn_num}")]
    InvalidTransition { turn_num: u64 },
    #[error("supported turn is {actual}, expected {expected}")]
    TurnNumMismatch { expected: u64, actual: u64 },
    #[error("signatures are over different states")]
    DifferentStates,
    #[error("{0:?} is not a participant of the channel")]
    NotAParticipant(Address),
    #[error("participant {0} did not sign")]
    MissingSignature(PartIdx),
    #[error(transparent)]
    Signature(#[from] sig::Error),
    #[error(transparent)]
    Encoding(#[from] abiencode::Error),
}

/// Proof in the layout the adjudicator accepts: consecutive states, one
/// signature per participant and the index of the state each participant
/// signed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupportProof {
    pub states: Vec<State>,
    pub signatures: Vec<Signature>,
    pub who_signed_what: Vec<usize>,
}

/// Result of a successful validation, describing the latest proof state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Supported {
    pub turn_num: u64,
    pub outcome: Outcome,
    pub state_hash: Hash,
    pub outcome_hash: Hash,
}

impl Supported {
    fn of(state: &State, state_hash: Hash) -> Result<Self, SupportError> {
        Ok(Self {
            turn_num: state.turn_num,
            outcome: state.outcome.clone(),
            state_hash,
            outcome_hash: state.outcome.hash()?,
        })
    }
}

impl SupportProof {
    /// A single state signed by everybody.
    pub fn unanimous(state: State, signatures: Vec<Signature>) -> Self {
        let n = signatures.len();
        Self {
            states: vec![state],
            signatures,
            who_signed_what: vec![0; n],
        }
    }

    /// Assemble a proof from individually signed states.
    ///
    /// Distinct states are ordered by turn number; every participant is
    /// assigned the latest state they signed. Signatures are not checked
    /// here, that is what [validate] is for.
    pub fn from_signed_states(
        channel: &Channel,
        signed: &[SignedState],
    ) -> Result<Self, SupportError> {
        let mut states: Vec<State> = Vec::new();
        for s in signed {
            if !states.contains(&s.state) {
                states.push(s.state.clone());
            }
        }
        states.sort_by_key(|s| s.turn_num);

        let n = channel.num_participants();
        let mut assigned: Vec<Option<(usize, Signature)>> = vec![None; n];
        for s in signed {
            let part = channel
                .part_idx_of(&s.signer)
                .ok_or(SupportError::NotAParticipant(s.signer))?;
            let index = states
                .iter()
                .position(|x| *x == s.state)
                .ok_or(SupportError::DifferentStates)?;
            if assigned[part].map_or(true, |(prev, _)| index > prev) {
                assigned[part] = Some((index, s.signature));
            }
        }

        let mut signatures = Vec::with_capacity(n);
        let mut who_signed_what = Vec::with_capacity(n);
        for (part, a) in assigned.into_iter().enumerate() {
            let (index, signature) = a.ok_or(SupportError::MissingSignature(part))?;
            who_signed_what.push(index);
            signatures.push(signature);
        }

        Ok(Self {
            states,
            signatures,
            who_signed_what,
        })
    }

    pub fn latest(&self) -> Option<&State> {
        self.states.last()
    }

    pub fn largest_turn_num(&self) -> Option<u64> {
        self.latest().map(|s| s.turn_num)
    }
}

/// `whoSignedWhat` is acceptable iff for every participant `i` the assigned
/// state is not older than `i`'s own latest move within the proof window.
pub fn acceptable_who_signed_what(
    who_signed_what: &[usize],
    largest_turn_num: u64,
    num_participants: usize,
    num_states: usize,
) -> Result<(), SupportError> {
    if who_signed_what.len() != num_participants {
        return Err(SupportError::WhoSignedWhatLength {
            expected: num_participants,
            actual: who_signed_what.len(),
        });
    }
    let n = num_participants as u64;
    for (i, &index) in who_signed_what.iter().enumerate() {
        if index >= num_states {
            return Err(SupportError::StateIndexOutOfRange {
                participant: i,
                index,
            });
        }
        // Distance between participant i and the mover of the largest turn.
        let offset = ((largest_turn_num % n) + n - i as u64) % n;
        if (index as u64) + offset + 1 < num_states as u64 {
            return Err(SupportError::UnacceptableWhoSignedWhat { participant: i });
        }
    }
    Ok(())
}

/// Validate an adjudicator style proof for `channel`.
///
/// If `app` is given, every consecutive pair of proof states has to be a
/// valid transition.
pub fn validate(
    channel: &Channel,
    proof: &SupportProof,
    app: Option<&dyn App>,
) -> Result<Supported, SupportError> {
    let n = channel.num_participants();
    let m = proof.states.len();
    let latest = proof.latest().ok_or(SupportError::EmptyProof)?;
    if m > n {
        return Err(SupportError::TooManyStates {
            states: m,
            participants: n,
        });
    }

    let channel_id = channel.id()?;
    for s in &proof.states {
        if s.channel_id != channel_id {
            return Err(SupportError::ChannelIdMismatch {
                expected: channel_id,
                actual: s.channel_id,
            });
        }
    }
    for (index, pair) in proof.states.windows(2).enumerate() {
        if !pair[1].is_consecutive_to(&pair[0]) {
            return Err(SupportError::NonConsecutiveTurnNums { index: index + 1 });
        }
        if let Some(app) = app {
            if !app::valid_transition(app, &pair[0], &pair[1], n) {
                return Err(SupportError::InvalidTransition {
                    turn_num: pair[1].turn_num,
                });
            }
        }
    }

    acceptable_who_signed_what(&proof.who_signed_what, latest.turn_num, n, m)?;
    if proof.signatures.len() != n {
        return Err(SupportError::SignatureCount {
            expected: n,
            actual: proof.signatures.len(),
        });
    }

    let hashes = proof
        .states
        .iter()
        .map(State::hash)
        .collect::<Result<Vec<Hash>, abiencode::Error>>()?;
    for (i, participant) in channel.participants().iter().enumerate() {
        let hash = hashes[proof.who_signed_what[i]];
        let recovered = sig::recover_signer(hash, proof.signatures[i])?;
        if recovered != *participant {
            return Err(SupportError::SignerMismatch {
                expected: *participant,
                recovered,
            });
        }
    }

    Supported::of(latest, hashes[m - 1])
}

/// Validate that every participant signed the same state at `turn_num`.
pub fn validate_unanimous(
    channel: &Channel,
    signed: &[SignedState],
    turn_num: u64,
) -> Result<Supported, SupportError> {
    let state = &signed.first().ok_or(SupportError::EmptyProof)?.state;
    if signed.iter().any(|s| s.state != *state) {
        return Err(SupportError::DifferentStates);
    }
    if state.turn_num != turn_num {
        return Err(SupportError::TurnNumMismatch {
            expected: turn_num,
            actual: state.turn_num,
        });
    }
    let channel_id = channel.id()?;
    if state.channel_id != channel_id {
        return Err(SupportError::ChannelIdMismatch {
            expected: channel_id,
            actual: state.channel_id,
        });
    }

    let hash = state.hash()?;
    let mut signed_by = vec![false; channel.num_participants()];
    for s in signed {
        let recovered = sig::recover_signer(hash, s.signature)?;
        if recovered != s.signer {
            return Err(SupportError::SignerMismatch {
                expected: s.signer,
                recovered,
            });
        }
        let part = channel
            .part_idx_of(&recovered)
            .ok_or(SupportError::NotAParticipant(recovered))?;
        signed_by[part] = true;
    }
    if let Some(missing) = signed_by.iter().position(|s| !s) {
        return Err(SupportError::MissingSignature(missing));
    }

    Supported::of(state, hash)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        channel::{
            app::{CountingApp, TrivialApp},
            test_utils::{setup, state},
        },
        sig::Signer,
    };

    /// Proof of the states `first..=last`, participant `i` signing the state
    /// at index `who_signed_what[i]`.
    fn proof(
        channel: &Channel,
        signers: &[Signer],
        first: u64,
        last: u64,
        who_signed_what: &[usize],
    ) -> SupportProof {
        let states: Vec<State> = (first..=last).map(|t| state(channel, t)).collect();
        let signatures = who_signed_what
            .iter()
            .zip(signers)
            .map(|(&idx, s)| s.sign_eth(states[idx].hash().unwrap()))
            .collect();
        SupportProof {
            states,
            signatures,
            who_signed_what: who_signed_what.to_vec(),
        }
    }

    #[test]
    fn three_movers_sign_their_own_turns() {
        let (channel, signers) = setup(3, 0);
        let p = proof(&channel, &signers, 6, 8, &[0, 1, 2]);

        // Each state is signed by its mover.
        for (i, s) in p.states.iter().enumerate() {
            assert_eq!(channel.mover_idx(s.turn_num), i);
        }

        let supported = validate(&channel, &p, None).unwrap();
        assert_eq!(supported.turn_num, 8);
        assert_eq!(supported.state_hash, p.states[2].hash().unwrap());
        assert_eq!(supported.outcome, p.states[2].outcome);
    }

    #[test]
    fn reassigning_any_signature_is_rejected() {
        let (channel, signers) = setup(3, 0);
        let p = proof(&channel, &signers, 6, 8, &[0, 1, 2]);

        for participant in 0..3 {
            for index in 0..3 {
                if index == participant {
                    continue;
                }
                let mut tampered = p.clone();
                tampered.who_signed_what[participant] = index;
                assert!(
                    validate(&channel, &tampered, None).is_err(),
                    "participant {} pointing at {}",
                    participant,
                    index
                );
            }
        }
    }

    #[test]
    fn tampered_signature_is_rejected() {
        let (channel, signers) = setup(3, 0);
        let p = proof(&channel, &signers, 6, 8, &[0, 1, 2]);

        for participant in 0..3 {
            let mut tampered = p.clone();
            tampered.signatures[participant].0[5] ^= 1;
            assert!(validate(&channel, &tampered, None).is_err());
        }
    }

    #[test]
    fn later_states_ratify_earlier_ones() {
        let (channel, signers) = setup(3, 0);
        // Everybody signed the latest state.
        assert!(validate(&channel, &proof(&channel, &signers, 6, 8, &[2, 2, 2]), None).is_ok());
        // Participant 0 moved at 6 and signed 7 as well.
        assert!(validate(&channel, &proof(&channel, &signers, 6, 8, &[1, 1, 2]), None).is_ok());
        // A single state signed by all.
        assert!(validate(&channel, &proof(&channel, &signers, 8, 8, &[0, 0, 0]), None).is_ok());
    }

    #[test]
    fn stale_signatures_are_unacceptable() {
        let (channel, signers) = setup(3, 0);
        // Participant 1 moved at 7, a signature on 6 is older than that.
        assert_eq!(
            validate(&channel, &proof(&channel, &signers, 6, 8, &[0, 0, 2]), None),
            Err(SupportError::UnacceptableWhoSignedWhat { participant: 1 })
        );
    }

    #[test]
    fn acceptable_who_signed_what_matches_round_window() {
        // Exhaustive over small channels.
        for n in 1..=4usize {
            for m in 1..=n {
                for largest in (m as u64 - 1)..(m as u64 + 2 * n as u64) {
                    let first = largest + 1 - m as u64;
                    for i in 0..n {
                        for index in 0..m {
                            let turn = first + index as u64;
                            // Acceptable iff i does not move after the
                            // state they signed.
                            let expected =
                                !(turn + 1..=largest).any(|t| t % n as u64 == i as u64);
                            let mut wsw = vec![m - 1; n];
                            wsw[i] = index;
                            assert_eq!(
                                acceptable_who_signed_what(&wsw, largest, n, m).is_ok(),
                                expected,
                                "n={} m={} largest={} i={} index={}",
                                n,
                                m,
                                largest,
                                i,
                                index
                            );
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn malformed_proofs() {
        let (channel, signers) = setup(3, 0);
        let p = proof(&channel, &signers, 6, 8, &[0, 1, 2]);

        let mut short = p.clone();
        short.who_signed_what.pop();
        assert_eq!(
            validate(&channel, &short, None),
            Err(SupportError::WhoSignedWhatLength {
                expected: 3,
                actual: 2
            })
        );

        let mut out_of_range = p.clone();
        out_of_range.who_signed_what[2] = 3;
        assert_eq!(
            validate(&channel, &out_of_range, None),
            Err(SupportError::StateIndexOutOfRange {
                participant: 2,
                index: 3
            })
        );

        let mut gap = p.clone();
        gap.states[2].turn_num = 9;
        assert_eq!(
            validate(&channel, &gap, None),
            Err(SupportError::NonConsecutiveTurnNums { index: 2 })
        );

        let mut other_channel = p.clone();
        other_channel.states[0].channel_id = Hash([1; 32]);
        assert!(matches!(
            validate(&channel, &other_channel, None),
            Err(SupportError::ChannelIdMismatch { .. })
        ));

        let empty = SupportProof {
            states: vec![],
            signatures: p.signatures.clone(),
            who_signed_what: vec![0, 0, 0],
        };
        assert_eq!(validate(&channel, &empty, None), Err(SupportError::EmptyProof));

        let mut missing_sig = p.clone();
        missing_sig.signatures.pop();
        assert_eq!(
            validate(&channel, &missing_sig, None),
            Err(SupportError::SignatureCount {
                expected: 3,
                actual: 2
            })
        );
    }

    #[test]
    fn app_rules_apply_to_the_chain() {
        let (channel, signers) = setup(2, 0);
        let mut p = proof(&channel, &signers, 10, 11, &[0, 1]);
        assert!(validate(&channel, &p, Some(&TrivialApp)).is_ok());
        assert_eq!(
            validate(&channel, &p, Some(&CountingApp)),
            Err(SupportError::InvalidTransition { turn_num: 11 })
        );

        p.states[0].app_data = CountingApp::app_data(1.into());
        p.states[1].app_data = CountingApp::app_data(2.into());
        p.signatures = vec![
            signers[0].sign_eth(p.states[0].hash().unwrap()),
            signers[1].sign_eth(p.states[1].hash().unwrap()),
        ];
        assert!(validate(&channel, &p, Some(&CountingApp)).is_ok());
    }

    #[test]
    fn unanimous_support() {
        let (channel, signers) = setup(3, 0);
        let s = state(&channel, 2);
        let signed: Vec<SignedState> = signers
            .iter()
            .map(|signer| SignedState::sign(s.clone(), signer).unwrap())
            .collect();

        let supported = validate_unanimous(&channel, &signed, 2).unwrap();
        assert_eq!(supported.turn_num, 2);

        assert_eq!(
            validate_unanimous(&channel, &signed, 3),
            Err(SupportError::TurnNumMismatch {
                expected: 3,
                actual: 2
            })
        );
        assert_eq!(
            validate_unanimous(&channel, &signed[..2], 2),
            Err(SupportError::MissingSignature(2))
        );
        assert_eq!(validate_unanimous(&channel, &[], 2), Err(SupportError::EmptyProof));

        let mut other = signed.clone();
        other[1] = SignedState::sign(state(&channel, 3), &signers[1]).unwrap();
        assert_eq!(
            validate_unanimous(&channel, &other, 2),
            Err(SupportError::DifferentStates)
        );

        let (_, strangers) = setup(1, 99);
        let mut foreign = signed.clone();
        foreign.push(SignedState::sign(s.clone(), &strangers[0]).unwrap());
        assert_eq!(
            validate_unanimous(&channel, &foreign, 2),
            Err(SupportError::NotAParticipant(strangers[0].address()))
        );
    }

    #[test]
    fn proof_from_signed_states() {
        let (channel, signers) = setup(3, 0);
        let signed = vec![
            SignedState::sign(state(&channel, 7), &signers[1]).unwrap(),
            SignedState::sign(state(&channel, 6), &signers[0]).unwrap(),
            SignedState::sign(state(&channel, 8), &signers[2]).unwrap(),
            SignedState::sign(state(&channel, 8), &signers[1]).unwrap(),
        ];
        let p = SupportProof::from_signed_states(&channel, &signed).unwrap();
        assert_eq!(p.states.len(), 3);
        assert_eq!(p.who_signed_what, vec![0, 2, 2]);
        assert_eq!(validate(&channel, &p, None).unwrap().turn_num, 8);

        assert_eq!(
            SupportProof::from_signed_states(&channel, &signed[..2]),
            Err(SupportError::MissingSignature(2))
        );
    }
}
