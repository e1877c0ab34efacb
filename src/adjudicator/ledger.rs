use super::{Adjudicator, AdjudicatorError, ChannelStorage, Clock};
use crate::{
    abiencode::types::{Address, Destination, Hash, Signature, U256},
    channel::{Channel, Outcome, SignedState, State, SupportProof},
};

/// A transaction against the adjudicator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdjudicatorCall {
    ForceMove {
        channel: Channel,
        expected_turn_num_record: u64,
        proof: SupportProof,
        challenger_signature: Signature,
    },
    Respond {
        channel: Channel,
        expected_turn_num_record: u64,
        challenge_state: State,
        response: SignedState,
    },
    RespondWithAlternative {
        channel: Channel,
        expected_turn_num_record: u64,
        proof: SupportProof,
    },
    Checkpoint {
        channel: Channel,
        expected_turn_num_record: u64,
        proof: SupportProof,
    },
    Conclude {
        channel: Channel,
        proof: SupportProof,
    },
    Deposit {
        asset_holder: Address,
        destination: Destination,
        expected_held: U256,
        amount: U256,
    },
    TransferAll {
        channel_id: Hash,
        outcome: Outcome,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Receipt {
    /// Storage of the channel after a dispute call.
    Storage {
        channel_id: Hash,
        storage: ChannelStorage,
    },
    Deposited {
        destination: Destination,
        amount: U256,
    },
    /// What is left of the outcome after a payout.
    Transferred { channel_id: Hash, remaining: Outcome },
}

/// The chain as seen by a participant: calls go in, storage and holdings
/// can be read back.
pub trait Ledger {
    fn submit(&mut self, call: AdjudicatorCall) -> Result<Receipt, AdjudicatorError>;

    fn read_storage(&self, channel_id: &Hash) -> ChannelStorage;

    fn holdings(&self, asset_holder: &Address, destination: &Destination) -> U256;
}

impl<C: Clock> Ledger for Adjudicator<C> {
    fn submit(&mut self, call: AdjudicatorCall) -> Result<Receipt, AdjudicatorError> {
        let (channel, storage) = match call {
            AdjudicatorCall::ForceMove {
                channel,
                expected_turn_num_record,
                proof,
                challenger_signature,
            } => {
                let storage = self.force_move(
                    &channel,
                    expected_turn_num_record,
                    &proof,
                    challenger_signature,
                )?;
                (channel, storage)
            }
            AdjudicatorCall::Respond {
                channel,
                expected_turn_num_record,
                challenge_state,
                response,
            } => {
                let storage = self.respond(
                    &channel,
                    expected_turn_num_record,
                    &challenge_state,
                    &response,
                )?;
                (channel, storage)
            }
            AdjudicatorCall::RespondWithAlternative {
                channel,
                expected_turn_num_record,
                proof,
            } => {
                let storage =
                    self.respond_with_alternative(&channel, expected_turn_num_record, &proof)?;
                (channel, storage)
            }
            AdjudicatorCall::Checkpoint {
                channel,
                expected_turn_num_record,
                proof,
            } => {
                let storage = self.checkpoint(&channel, expected_turn_num_record, &proof)?;
                (channel, storage)
            }
            AdjudicatorCall::Conclude { channel, proof } => {
                let storage = self.conclude(&channel, &proof)?;
                (channel, storage)
            }
            AdjudicatorCall::Deposit {
                asset_holder,
                destination,
                expected_held,
                amount,
            } => {
                let amount = self.deposit(asset_holder, destination, expected_held, amount)?;
                return Ok(Receipt::Deposited {
                    destination,
                    amount,
                });
            }
            AdjudicatorCall::TransferAll {
                channel_id,
                outcome,
            } => {
                let remaining = self.transfer_all(channel_id, &outcome)?;
                return Ok(Receipt::Transferred {
                    channel_id,
                    remaining,
                });
            }
        };
        Ok(Receipt::Storage {
            channel_id: channel.id()?,
            storage,
        })
    }

    fn read_storage(&self, channel_id: &Hash) -> ChannelStorage {
        self.get_channel_storage(channel_id)
    }

    fn holdings(&self, asset_holder: &Address, destination: &Destination) -> U256 {
        Adjudicator::holdings(self, asset_holder, destination)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        adjudicator::ManualClock,
        channel::{
            app::TrivialApp,
            test_utils::{asset_holder, setup, state},
            AppRegistry,
        },
    };
    use std::sync::Arc;

    #[test]
    fn submit_dispatches_calls() {
        let (channel, signers) = setup(2, 1);
        let id = channel.id().unwrap();
        let mut ledger: Box<dyn Ledger> = Box::new(Adjudicator::new(
            ManualClock::new(0),
            AppRegistry::new().with_app(Address::default(), Arc::new(TrivialApp)),
        ));

        let receipt = ledger
            .submit(AdjudicatorCall::Deposit {
                asset_holder: asset_holder(),
                destination: id.into(),
                expected_held: 0.into(),
                amount: 3.into(),
            })
            .unwrap();
        assert_eq!(
            receipt,
            Receipt::Deposited {
                destination: id.into(),
                amount: 3.into()
            }
        );
        assert_eq!(ledger.holdings(&asset_holder(), &id.into()), 3.into());

        let s = state(&channel, 2);
        let sigs = signers
            .iter()
            .map(|signer| signer.sign_eth(s.hash().unwrap()))
            .collect();
        let receipt = ledger
            .submit(AdjudicatorCall::Checkpoint {
                channel: channel.clone(),
                expected_turn_num_record: 0,
                proof: SupportProof::unanimous(s, sigs),
            })
            .unwrap();
        assert_eq!(
            receipt,
            Receipt::Storage {
                channel_id: id,
                storage: ChannelStorage::cleared(2)
            }
        );
        assert_eq!(ledger.read_storage(&id), ChannelStorage::cleared(2));
    }
}
