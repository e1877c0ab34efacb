//! Outcomes: who gets which part of the funds held for a channel.
//!
//! The ABI layout follows the Nitro contracts, an outcome is encoded as
//! `OutcomeItem[]` where each item carries the asset holder and the encoded
//! asset outcome:
//!
//! ```solidity
//! struct OutcomeItem { address assetHolder; bytes assetOutcomeBytes; }
//! struct AssetOutcome { uint8 assetOutcomeType; bytes allocationOrGuaranteeBytes; }
//! struct AllocationItem { bytes32 destination; uint256 amount; }
//! struct Guarantee { bytes32 targetChannelId; bytes32[] destinations; }
//! ```

use crate::abiencode::{
    self, as_bytes,
    types::{Address, Destination, Hash, U256},
};
use serde::Serialize;
use thiserror::Error;

const ALLOCATION_TYPE: u8 = 0;
const GUARANTEE_TYPE: u8 = 1;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum OutcomeError {
    #[error("asset holder {0:?} appears more than once")]
    DuplicateAssetHolder(Address),
    #[error("destination {0:?} appears more than once in an allocation")]
    DuplicateDestination(Destination),
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllocationItem {
    pub destination: Destination,
    pub amount: U256,
}

/// Ordered payout list. The order matters: funds are paid out front to back
/// when the holdings do not cover everything.
#[derive(Serialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(transparent)]
pub struct Allocation(Vec<AllocationItem>);

impl Allocation {
    pub fn new(items: Vec<AllocationItem>) -> Self {
        Self(items)
    }

    pub fn items(&self) -> &[AllocationItem] {
        &self.0
    }

    pub fn into_items(self) -> Vec<AllocationItem> {
        self.0
    }

    pub fn iter(&self) -> core::slice::Iter<'_, AllocationItem> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Amount of the first entry for `destination`.
    pub fn amount_of(&self, destination: &Destination) -> Option<U256> {
        self.0
            .iter()
            .find(|item| item.destination == *destination)
            .map(|item| item.amount)
    }

    pub(super) fn items_mut(&mut self) -> &mut Vec<AllocationItem> {
        &mut self.0
    }

    pub fn check_distinct_destinations(&self) -> Result<(), OutcomeError> {
        for (i, item) in self.0.iter().enumerate() {
            if self.0[..i].iter().any(|x| x.destination == item.destination) {
                return Err(OutcomeError::DuplicateDestination(item.destination));
            }
        }
        Ok(())
    }
}

impl From<Vec<AllocationItem>> for Allocation {
    fn from(items: Vec<AllocationItem>) -> Self {
        Self(items)
    }
}

/// Funds of the guarantor channel are reserved for `target_channel_id` and
/// paid out to the destinations in the given priority order.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct Guarantee {
    pub target_channel_id: Hash,
    pub destinations: Vec<Destination>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetOutcomeContent {
    Allocation(Allocation),
    Guarantee(Guarantee),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetOutcome {
    pub asset_holder: Address,
    pub content: AssetOutcomeContent,
}

#[derive(Serialize)]
struct LabelledContent {
    asset_outcome_type: u8,
    #[serde(with = "as_bytes")]
    allocation_or_guarantee_bytes: Vec<u8>,
}

#[derive(Serialize)]
struct OutcomeItem {
    asset_holder: Address,
    #[serde(with = "as_bytes")]
    asset_outcome_bytes: Vec<u8>,
}

impl AssetOutcome {
    pub fn allocation(asset_holder: Address, allocation: Allocation) -> Self {
        Self {
            asset_holder,
            content: AssetOutcomeContent::Allocation(allocation),
        }
    }

    pub fn guarantee(asset_holder: Address, guarantee: Guarantee) -> Self {
        Self {
            asset_holder,
            content: AssetOutcomeContent::Guarantee(guarantee),
        }
    }

    pub fn as_allocation(&self) -> Option<&Allocation> {
        match &self.content {
            AssetOutcomeContent::Allocation(a) => Some(a),
            AssetOutcomeContent::Guarantee(_) => None,
        }
    }

    pub fn as_guarantee(&self) -> Option<&Guarantee> {
        match &self.content {
            AssetOutcomeContent::Allocation(_) => None,
            AssetOutcomeContent::Guarantee(g) => Some(g),
        }
    }

    /// `abi.encode(AssetOutcome)`
    pub fn encode(&self) -> Result<Vec<u8>, abiencode::Error> {
        let labelled = match &self.content {
            AssetOutcomeContent::Allocation(a) => LabelledContent {
                asset_outcome_type: ALLOCATION_TYPE,
                allocation_or_guarantee_bytes: abiencode::to_bytes(a)?,
            },
            AssetOutcomeContent::Guarantee(g) => LabelledContent {
                asset_outcome_type: GUARANTEE_TYPE,
                allocation_or_guarantee_bytes: abiencode::to_bytes(g)?,
            },
        };
        abiencode::to_bytes(&labelled)
    }
}

/// One [AssetOutcome] per asset holder.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Outcome(pub Vec<AssetOutcome>);

impl Outcome {
    pub fn single_allocation(asset_holder: Address, allocation: Allocation) -> Self {
        Self(vec![AssetOutcome::allocation(asset_holder, allocation)])
    }

    pub fn asset_outcome(&self, asset_holder: &Address) -> Option<&AssetOutcome> {
        self.0.iter().find(|o| o.asset_holder == *asset_holder)
    }

    pub fn allocation_for(&self, asset_holder: &Address) -> Option<&Allocation> {
        self.asset_outcome(asset_holder)
            .and_then(AssetOutcome::as_allocation)
    }

    /// Replace the content for `asset_holder`, appending it if it is new.
    pub fn set(&mut self, asset_outcome: AssetOutcome) {
        match self
            .0
            .iter_mut()
            .find(|o| o.asset_holder == asset_outcome.asset_holder)
        {
            Some(o) => *o = asset_outcome,
            None => self.0.push(asset_outcome),
        }
    }

    pub fn validate(&self) -> Result<(), OutcomeError> {
        for (i, o) in self.0.iter().enumerate() {
            if self.0[..i].iter().any(|x| x.asset_holder == o.asset_holder) {
                return Err(OutcomeError::DuplicateAssetHolder(o.asset_holder));
            }
            if let AssetOutcomeContent::Allocation(a) = &o.content {
                a.check_distinct_destinations()?;
            }
        }
        Ok(())
    }

    /// `abi.encode(OutcomeItem[])`
    pub fn encode(&self) -> Result<Vec<u8>, abiencode::Error> {
        let items = self
            .0
            .iter()
            .map(|o| {
                Ok(OutcomeItem {
                    asset_holder: o.asset_holder,
                    asset_outcome_bytes: o.encode()?,
                })
            })
            .collect::<Result<Vec<_>, abiencode::Error>>()?;
        abiencode::to_bytes(&items)
    }

    pub fn hash(&self) -> Result<Hash, abiencode::Error> {
        Ok(abiencode::keccak256(&self.encode()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::test_utils::allocation;

    fn dest(b: u8) -> Destination {
        Destination::from(Address([b; 20]))
    }

    #[test]
    fn allocation_encoding_layout() {
        let a = allocation(&[(dest(0xaa), 3)]);
        let outcome = AssetOutcome::allocation(Address([0x11; 20]), a);

        let expected = "
0000000000000000000000000000000000000000000000000000000000000020 // offset of AssetOutcome
0000000000000000000000000000000000000000000000000000000000000000 // type: allocation
0000000000000000000000000000000000000000000000000000000000000040 // offset of the bytes
0000000000000000000000000000000000000000000000000000000000000080 // length: 4 slots
0000000000000000000000000000000000000000000000000000000000000020 // offset of AllocationItem[]
0000000000000000000000000000000000000000000000000000000000000001 // one item
000000000000000000000000aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa // destination
0000000000000000000000000000000000000000000000000000000000000003 // amount
        ";
        let bytes = outcome.encode().unwrap();
        let want: Vec<u8> = expected
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .flat_map(|l| hex::decode(&l[..64]).unwrap())
            .collect();
        assert_eq!(bytes, want);
    }

    #[test]
    fn hash_distinguishes_allocation_and_guarantee() {
        let holder = Address([0x11; 20]);
        let a = Outcome(vec![AssetOutcome::allocation(
            holder,
            allocation(&[(dest(1), 1)]),
        )]);
        let g = Outcome(vec![AssetOutcome::guarantee(
            holder,
            Guarantee {
                target_channel_id: Hash([1; 32]),
                destinations: vec![dest(1)],
            },
        )]);
        assert_ne!(a.hash().unwrap(), g.hash().unwrap());
        assert_ne!(a.hash().unwrap(), Outcome::default().hash().unwrap());
    }

    #[test]
    fn validate_rejects_duplicates() {
        let holder = Address([0x11; 20]);
        let a = AssetOutcome::allocation(holder, allocation(&[(dest(1), 1)]));
        assert_eq!(
            Outcome(vec![a.clone(), a.clone()]).validate(),
            Err(OutcomeError::DuplicateAssetHolder(holder))
        );

        let dup = AssetOutcome::allocation(holder, allocation(&[(dest(1), 1), (dest(1), 2)]));
        assert_eq!(
            Outcome(vec![dup]).validate(),
            Err(OutcomeError::DuplicateDestination(dest(1)))
        );
        assert_eq!(Outcome(vec![a]).validate(), Ok(()));
    }

    #[test]
    fn set_replaces_or_appends() {
        let mut o = Outcome::default();
        let holder = Address([0x11; 20]);
        o.set(AssetOutcome::allocation(holder, allocation(&[(dest(1), 1)])));
        o.set(AssetOutcome::allocation(holder, allocation(&[(dest(2), 2)])));
        o.set(AssetOutcome::allocation(Address([0x22; 20]), Allocation::default()));
        assert_eq!(o.0.len(), 2);
        assert_eq!(
            o.allocation_for(&holder).unwrap().amount_of(&dest(2)),
            Some(2.into())
        );
    }
}
