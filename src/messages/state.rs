use super::ConversionError;
use crate::{
    abiencode::types::{u256_to_bytes, Address, Destination, Hash, Signature, U256},
    channel::{
        Allocation, AllocationItem, AssetOutcome, AssetOutcomeContent, Guarantee, Outcome,
        SignedState, State,
    },
    wire::proto,
};

fn fixed<const N: usize>(field: &'static str, bytes: &[u8]) -> Result<[u8; N], ConversionError> {
    bytes.try_into().or(Err(ConversionError::ByteLengthMismatch {
        field,
        expected: N,
        actual: bytes.len(),
    }))
}

pub(crate) fn hash_from(field: &'static str, bytes: &[u8]) -> Result<Hash, ConversionError> {
    Ok(Hash(fixed(field, bytes)?))
}

fn address_from(field: &'static str, bytes: &[u8]) -> Result<Address, ConversionError> {
    Ok(Address(fixed(field, bytes)?))
}

fn destination_from(bytes: &[u8]) -> Result<Destination, ConversionError> {
    Ok(Destination(fixed("destination", bytes)?))
}

fn u256_from(bytes: &[u8]) -> Result<U256, ConversionError> {
    if bytes.len() > 32 {
        return Err(ConversionError::ByteLengthMismatch {
            field: "amount",
            expected: 32,
            actual: bytes.len(),
        });
    }
    Ok(U256::from_big_endian(bytes))
}

impl From<&Allocation> for proto::Allocation {
    fn from(value: &Allocation) -> Self {
        Self {
            items: value
                .iter()
                .map(|item| proto::AllocationItem {
                    destination: item.destination.0.to_vec(),
                    amount: u256_to_bytes(item.amount).to_vec(),
                })
                .collect(),
        }
    }
}

impl TryFrom<proto::Allocation> for Allocation {
    type Error = ConversionError;

    fn try_from(value: proto::Allocation) -> Result<Self, Self::Error> {
        value
            .items
            .into_iter()
            .map(|item| {
                Ok(AllocationItem {
                    destination: destination_from(&item.destination)?,
                    amount: u256_from(&item.amount)?,
                })
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Allocation::new)
    }
}

impl From<&Outcome> for proto::Outcome {
    fn from(value: &Outcome) -> Self {
        use proto::asset_outcome::Content;

        Self {
            assets: value
                .0
                .iter()
                .map(|o| proto::AssetOutcome {
                    asset_holder: o.asset_holder.0.to_vec(),
                    content: Some(match &o.content {
                        AssetOutcomeContent::Allocation(a) => Content::Allocation(a.into()),
                        AssetOutcomeContent::Guarantee(g) => Content::Guarantee(proto::Guarantee {
                            target_channel_id: g.target_channel_id.0.to_vec(),
                            destinations: g.destinations.iter().map(|d| d.0.to_vec()).collect(),
                        }),
                    }),
                })
                .collect(),
        }
    }
}

impl TryFrom<proto::Outcome> for Outcome {
    type Error = ConversionError;

    fn try_from(value: proto::Outcome) -> Result<Self, Self::Error> {
        use proto::asset_outcome::Content;

        let mut assets = Vec::with_capacity(value.assets.len());
        for o in value.assets {
            let content = match o.content.ok_or(ConversionError::ExpectedSome("content"))? {
                Content::Allocation(a) => AssetOutcomeContent::Allocation(a.try_into()?),
                Content::Guarantee(g) => AssetOutcomeContent::Guarantee(Guarantee {
                    target_channel_id: hash_from("target_channel_id", &g.target_channel_id)?,
                    destinations: g
                        .destinations
                        .iter()
                        .map(|d| destination_from(d))
                        .collect::<Result<_, _>>()?,
                }),
            };
            assets.push(AssetOutcome {
                asset_holder: address_from("asset_holder", &o.asset_holder)?,
                content,
            });
        }

        let outcome = Outcome(assets);
        outcome.validate()?;
        Ok(outcome)
    }
}

impl From<&State> for proto::State {
    fn from(value: &State) -> Self {
        Self {
            channel_id: value.channel_id.0.to_vec(),
            turn_num: value.turn_num,
            is_final: value.is_final,
            outcome: Some((&value.outcome).into()),
            app_definition: value.app_definition.0.to_vec(),
            app_data: value.app_data.clone(),
            challenge_duration: value.challenge_duration,
        }
    }
}

impl TryFrom<proto::State> for State {
    type Error = ConversionError;

    fn try_from(value: proto::State) -> Result<Self, Self::Error> {
        Ok(Self {
            channel_id: hash_from("channel_id", &value.channel_id)?,
            turn_num: value.turn_num,
            is_final: value.is_final,
            outcome: value
                .outcome
                .ok_or(ConversionError::ExpectedSome("outcome"))?
                .try_into()?,
            app_definition: address_from("app_definition", &value.app_definition)?,
            app_data: value.app_data,
            challenge_duration: value.challenge_duration,
        })
    }
}

impl From<&SignedState> for proto::SignedState {
    fn from(value: &SignedState) -> Self {
        Self {
            state: Some((&value.state).into()),
            signer: value.signer.0.to_vec(),
            signature: value.signature.0.to_vec(),
        }
    }
}

impl TryFrom<proto::SignedState> for SignedState {
    type Error = ConversionError;

    fn try_from(value: proto::SignedState) -> Result<Self, Self::Error> {
        Ok(Self {
            state: value
                .state
                .ok_or(ConversionError::ExpectedSome("state"))?
                .try_into()?,
            signer: address_from("signer", &value.signer)?,
            signature: Signature(fixed("signature", &value.signature)?),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::test_utils::{setup, state};

    #[test]
    fn state_survives_the_wire() {
        let (channel, signers) = setup(2, 0);
        let mut s = state(&channel, 4);
        s.outcome.0.push(AssetOutcome::guarantee(
            Address([3; 20]),
            Guarantee {
                target_channel_id: Hash([4; 32]),
                destinations: vec![Destination([5; 32])],
            },
        ));
        s.app_data = vec![1, 2, 3];
        let signed = SignedState::sign(s, &signers[0]).unwrap();

        let wire: proto::SignedState = (&signed).into();
        assert_eq!(SignedState::try_from(wire), Ok(signed));
    }

    #[test]
    fn malformed_fields_are_rejected() {
        let (channel, _) = setup(2, 0);
        let mut wire: proto::State = (&state(&channel, 4)).into();
        wire.channel_id.pop();
        assert_eq!(
            State::try_from(wire),
            Err(ConversionError::ByteLengthMismatch {
                field: "channel_id",
                expected: 32,
                actual: 31
            })
        );

        let mut wire: proto::State = (&state(&channel, 4)).into();
        wire.outcome = None;
        assert_eq!(
            State::try_from(wire),
            Err(ConversionError::ExpectedSome("outcome"))
        );

        let mut wire: proto::State = (&state(&channel, 4)).into();
        wire.outcome.as_mut().unwrap().assets[0].content = None;
        assert_eq!(
            State::try_from(wire),
            Err(ConversionError::ExpectedSome("content"))
        );
    }

    #[test]
    fn amounts_longer_than_32_bytes_are_rejected() {
        let wire = proto::Allocation {
            items: vec![proto::AllocationItem {
                destination: vec![0; 32],
                amount: vec![1; 33],
            }],
        };
        assert!(matches!(
            Allocation::try_from(wire),
            Err(ConversionError::ByteLengthMismatch { field: "amount", .. })
        ));
    }

    #[test]
    fn duplicate_asset_holders_are_rejected() {
        let (channel, _) = setup(2, 0);
        let mut wire: proto::State = (&state(&channel, 4)).into();
        let outcome = wire.outcome.as_mut().unwrap();
        outcome.assets.push(outcome.assets[0].clone());
        assert!(matches!(
            State::try_from(wire),
            Err(ConversionError::InvalidOutcome(_))
        ));
    }
}
