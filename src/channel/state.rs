use super::{Channel, Outcome};
use crate::abiencode::{
    self, as_bytes,
    types::{Address, Hash},
};
use serde::Serialize;

/// One step of a channel. Off-chain this is what participants sign, on-chain
/// it is what the adjudicator stores the digest of.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct State {
    pub channel_id: Hash,
    pub turn_num: u64,
    pub is_final: bool,
    pub outcome: Outcome,
    pub app_definition: Address,
    pub app_data: Vec<u8>,
    pub challenge_duration: u64,
}

#[derive(Serialize)]
struct AppPart<'a> {
    challenge_duration: u64,
    app_definition: Address,
    #[serde(with = "as_bytes")]
    app_data: &'a [u8],
}

#[derive(Serialize)]
struct StateDigestParts {
    turn_num: u64,
    is_final: bool,
    channel_id: Hash,
    app_part_hash: Hash,
    outcome_hash: Hash,
}

impl State {
    /// Initial state (turn 0) of `channel`.
    pub fn new(
        channel: &Channel,
        outcome: Outcome,
        app_definition: Address,
        app_data: Vec<u8>,
        challenge_duration: u64,
    ) -> Result<Self, abiencode::Error> {
        Ok(Self {
            channel_id: channel.id()?,
            turn_num: 0,
            is_final: false,
            outcome,
            app_definition,
            app_data,
            challenge_duration,
        })
    }

    /// `keccak256(abi.encode(challengeDuration, appDefinition, appData))`
    pub fn app_part_hash(&self) -> Result<Hash, abiencode::Error> {
        abiencode::to_args_hash(&AppPart {
            challenge_duration: self.challenge_duration,
            app_definition: self.app_definition,
            app_data: &self.app_data,
        })
    }

    /// Digest signed by the participants:
    /// `keccak256(abi.encode(turnNum, isFinal, channelId, appPartHash, outcomeHash))`.
    pub fn hash(&self) -> Result<Hash, abiencode::Error> {
        abiencode::to_args_hash(&StateDigestParts {
            turn_num: self.turn_num,
            is_final: self.is_final,
            channel_id: self.channel_id,
            app_part_hash: self.app_part_hash()?,
            outcome_hash: self.outcome.hash()?,
        })
    }

    /// Digest a challenger signs to call forceMove with this state:
    /// `keccak256(abi.encode(stateHash, "forceMove"))`.
    pub fn hash_challenge_message(&self) -> Result<Hash, abiencode::Error> {
        abiencode::to_args_hash(&(self.hash()?, "forceMove"))
    }

    /// The successor of this state. Everything but the turn number is
    /// carried over, the caller adjusts the fields that change.
    pub fn next(&self) -> Self {
        Self {
            turn_num: self.turn_num + 1,
            ..self.clone()
        }
    }

    /// Same channel and turn numbers differ by exactly one (in order).
    pub fn is_consecutive_to(&self, prev: &State) -> bool {
        self.channel_id == prev.channel_id && prev.turn_num.checked_add(1) == Some(self.turn_num)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::test_utils::{allocation, asset_holder, setup, state};
    use crate::Destination;

    #[test]
    fn hash_binds_every_field() {
        let (channel, _) = setup(2, 0);
        let base = state(&channel, 5);
        let h = base.hash().unwrap();

        let mut variants = Vec::new();
        variants.push(State {
            channel_id: Hash([1; 32]),
            ..base.clone()
        });
        variants.push(State {
            turn_num: 6,
            ..base.clone()
        });
        variants.push(State {
            is_final: true,
            ..base.clone()
        });
        variants.push(State {
            outcome: Outcome::single_allocation(
                asset_holder(),
                allocation(&[(Destination::from(channel.participants()[0]), 10)]),
            ),
            ..base.clone()
        });
        variants.push(State {
            app_definition: Address([9; 20]),
            ..base.clone()
        });
        variants.push(State {
            app_data: vec![0],
            ..base.clone()
        });
        variants.push(State {
            challenge_duration: 1001,
            ..base.clone()
        });

        for v in variants {
            assert_ne!(v.hash().unwrap(), h, "{:?}", v);
        }
        assert_eq!(base.clone().hash().unwrap(), h);
    }

    #[test]
    fn challenge_message_differs_from_state_hash() {
        let (channel, _) = setup(2, 0);
        let s = state(&channel, 3);
        assert_ne!(s.hash_challenge_message().unwrap(), s.hash().unwrap());
    }

    #[test]
    fn next_is_consecutive() {
        let (channel, _) = setup(2, 0);
        let s = state(&channel, 3);
        let n = s.next();
        assert_eq!(n.turn_num, 4);
        assert!(n.is_consecutive_to(&s));
        assert!(!s.is_consecutive_to(&n));
        assert!(!n.next().is_consecutive_to(&s));

        let other_channel = State {
            channel_id: Hash([7; 32]),
            ..n
        };
        assert!(!other_channel.is_consecutive_to(&s));
    }
}
