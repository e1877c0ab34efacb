//! Checked arithmetic on allocations.
//!
//! Money is only ever moved between entries, never created or destroyed.
//! Every participant computes the same result from the same inputs, so the
//! processing order of the target allocation is part of the contract.

use super::{Allocation, AllocationItem, AssetOutcome, AssetOutcomeContent, Outcome};
use crate::abiencode::types::{Address, Destination, Hash, U256};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AllocationError {
    #[error("destination {0:?} is not part of the allocation")]
    DestinationMissing(Destination),
    #[error("destination {destination:?} holds {available}, cannot take {requested}")]
    InsufficientFunds {
        destination: Destination,
        available: U256,
        requested: U256,
    },
    #[error("amount overflow")]
    Overflow,
    #[error("target {0:?} must appear exactly once in the allocation")]
    TargetMissing(Destination),
    #[error("target holds {held}, but its allocation sums to {expected}")]
    TargetAmountMismatch { held: U256, expected: U256 },
    #[error("no allocation for asset holder {0:?}")]
    AssetHolderMissing(Address),
}

impl Allocation {
    /// Checked sum of all amounts.
    pub fn total(&self) -> Result<U256, AllocationError> {
        self.iter().try_fold(U256::zero(), |acc, item| {
            acc.checked_add(item.amount).ok_or(AllocationError::Overflow)
        })
    }
}

/// Take `amount` from the entry of `destination`. Entries reaching zero are
/// removed. Subtracting zero is a no-op, even if the destination is absent.
pub fn subtract_from_allocation(
    allocation: &Allocation,
    amount: U256,
    destination: Destination,
) -> Result<Allocation, AllocationError> {
    let mut result = allocation.clone();
    if amount.is_zero() {
        return Ok(result);
    }

    let items = result.items_mut();
    let idx = items
        .iter()
        .position(|item| item.destination == destination)
        .ok_or(AllocationError::DestinationMissing(destination))?;

    let available = items[idx].amount;
    let remaining = available
        .checked_sub(amount)
        .ok_or(AllocationError::InsufficientFunds {
            destination,
            available,
            requested: amount,
        })?;

    if remaining.is_zero() {
        items.remove(idx);
    } else {
        items[idx].amount = remaining;
    }
    Ok(result)
}

/// Move the funds described by `target` out of `ledger` into a single new
/// entry for `target_channel_id`, appended at the end.
pub fn allocate_to_target(
    ledger: &Allocation,
    target: &Allocation,
    target_channel_id: Hash,
) -> Result<Allocation, AllocationError> {
    let mut result = ledger.clone();
    let mut total = U256::zero();

    for item in target.iter() {
        result = subtract_from_allocation(&result, item.amount, item.destination)?;
        total = total
            .checked_add(item.amount)
            .ok_or(AllocationError::Overflow)?;
    }

    result.items_mut().push(AllocationItem {
        destination: target_channel_id.into(),
        amount: total,
    });
    Ok(result)
}

/// Inverse of [allocate_to_target], used when a funded channel is closed:
/// the entry of `target_channel_id` is replaced by crediting each item of
/// `target` back to its destination (appended if absent).
pub fn remove_target(
    ledger: &Allocation,
    target_channel_id: Hash,
    target: &Allocation,
) -> Result<Allocation, AllocationError> {
    let target_dest: Destination = target_channel_id.into();
    let mut positions = ledger
        .iter()
        .enumerate()
        .filter(|(_, item)| item.destination == target_dest)
        .map(|(i, _)| i);
    let idx = match (positions.next(), positions.next()) {
        (Some(idx), None) => idx,
        _ => return Err(AllocationError::TargetMissing(target_dest)),
    };

    let held = ledger.items()[idx].amount;
    let expected = target.total()?;
    if held != expected {
        return Err(AllocationError::TargetAmountMismatch { held, expected });
    }

    let mut result = ledger.clone();
    let items = result.items_mut();
    items.remove(idx);

    for credit in target.iter().filter(|item| !item.amount.is_zero()) {
        match items
            .iter_mut()
            .find(|item| item.destination == credit.destination)
        {
            Some(item) => {
                item.amount = item
                    .amount
                    .checked_add(credit.amount)
                    .ok_or(AllocationError::Overflow)?
            }
            None => items.push(*credit),
        }
    }
    Ok(result)
}

/// [allocate_to_target] applied to the allocation of `asset_holder`.
pub fn allocate_to_target_in_outcome(
    outcome: &Outcome,
    asset_holder: Address,
    target: &Allocation,
    target_channel_id: Hash,
) -> Result<Outcome, AllocationError> {
    let ledger = outcome
        .allocation_for(&asset_holder)
        .ok_or(AllocationError::AssetHolderMissing(asset_holder))?;
    let mut result = outcome.clone();
    result.set(AssetOutcome {
        asset_holder,
        content: AssetOutcomeContent::Allocation(allocate_to_target(
            ledger,
            target,
            target_channel_id,
        )?),
    });
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::test_utils::allocation;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    fn addr_dest(last: u8) -> Destination {
        let mut a = Address::default();
        a.0[19] = last;
        a.into()
    }

    fn left() -> Destination {
        addr_dest(1)
    }
    fn right() -> Destination {
        addr_dest(2)
    }
    fn middle() -> Destination {
        addr_dest(3)
    }
    fn target_id() -> Hash {
        let mut h = [0u8; 32];
        for pair in h.chunks_mut(2) {
            pair.copy_from_slice(&[0x12, 0x34]);
        }
        Hash(h)
    }
    fn target_dest() -> Destination {
        target_id().into()
    }

    type Items = Vec<(Destination, u64)>;

    #[test]
    fn allocate_to_target_valid() {
        // (target, ledger, expected)
        let cases: [(Items, Items, Items); 5] = [
            (
                vec![(left(), 1), (right(), 1)],
                vec![(left(), 1), (right(), 1)],
                vec![(target_dest(), 2)],
            ),
            (
                vec![(left(), 1), (right(), 2)],
                vec![(left(), 3), (right(), 3)],
                vec![(left(), 2), (right(), 1), (target_dest(), 3)],
            ),
            (
                vec![(left(), 1), (right(), 2)],
                vec![(right(), 3), (left(), 3)],
                vec![(right(), 1), (left(), 2), (target_dest(), 3)],
            ),
            (
                vec![(left(), 1), (right(), 2)],
                vec![(left(), 3), (middle(), 3), (right(), 3)],
                vec![(left(), 2), (middle(), 3), (right(), 1), (target_dest(), 3)],
            ),
            (
                vec![(left(), 1), (right(), 0)],
                vec![(left(), 1)],
                vec![(target_dest(), 1)],
            ),
        ];

        for (i, (target, ledger, expected)) in cases.iter().enumerate() {
            let result = allocate_to_target(&allocation(ledger), &allocation(target), target_id());
            assert_eq!(result, Ok(allocation(expected)), "case {}", i + 1);
        }
    }

    #[test]
    fn allocate_to_target_missing_destination() {
        let result = allocate_to_target(
            &allocation(&[(left(), 1), (right(), 1)]),
            &allocation(&[(left(), 1), (middle(), 1)]),
            target_id(),
        );
        assert_eq!(result, Err(AllocationError::DestinationMissing(middle())));
    }

    #[test]
    fn allocate_to_target_insufficient_funds() {
        let result = allocate_to_target(
            &allocation(&[(left(), 1), (right(), 2)]),
            &allocation(&[(left(), 3), (right(), 3)]),
            target_id(),
        );
        assert_eq!(
            result,
            Err(AllocationError::InsufficientFunds {
                destination: left(),
                available: 1.into(),
                requested: 3.into(),
            })
        );
    }

    #[test]
    fn subtract_removes_empty_entries() {
        let a = allocation(&[(left(), 2), (right(), 2)]);
        assert_eq!(
            subtract_from_allocation(&a, 2.into(), left()),
            Ok(allocation(&[(right(), 2)]))
        );
        assert_eq!(
            subtract_from_allocation(&a, 1.into(), right()),
            Ok(allocation(&[(left(), 2), (right(), 1)]))
        );
        assert_eq!(subtract_from_allocation(&a, 0.into(), middle()), Ok(a.clone()));
        assert_eq!(
            subtract_from_allocation(&a, 1.into(), middle()),
            Err(AllocationError::DestinationMissing(middle()))
        );
    }

    #[test]
    fn total_is_checked() {
        let a = Allocation::new(vec![
            AllocationItem {
                destination: left(),
                amount: U256::MAX,
            },
            AllocationItem {
                destination: right(),
                amount: 1.into(),
            },
        ]);
        assert_eq!(a.total(), Err(AllocationError::Overflow));
        assert_eq!(allocation(&[(left(), 2), (right(), 3)]).total(), Ok(5.into()));
    }

    #[test]
    fn remove_target_restores_funds() {
        let ledger = allocation(&[(left(), 3), (right(), 3)]);
        let target = allocation(&[(left(), 1), (right(), 2)]);
        let funded = allocate_to_target(&ledger, &target, target_id()).unwrap();

        let defunded = remove_target(&funded, target_id(), &target).unwrap();
        assert_eq!(defunded, ledger);

        // Destinations that were emptied come back at the end.
        let all = allocation(&[(left(), 3), (right(), 3)]);
        let funded = allocate_to_target(&ledger, &all, target_id()).unwrap();
        assert_eq!(
            remove_target(&funded, target_id(), &all),
            Ok(allocation(&[(left(), 3), (right(), 3)]))
        );
    }

    #[test]
    fn remove_target_rejects_wrong_amount_or_missing_target() {
        let funded = allocation(&[(left(), 2), (target_dest(), 3)]);
        assert_eq!(
            remove_target(&funded, target_id(), &allocation(&[(left(), 1)])),
            Err(AllocationError::TargetAmountMismatch {
                held: 3.into(),
                expected: 1.into()
            })
        );
        assert_eq!(
            remove_target(&allocation(&[(left(), 2)]), target_id(), &allocation(&[])),
            Err(AllocationError::TargetMissing(target_dest()))
        );
    }

    #[test]
    fn allocate_to_target_in_outcome_touches_one_asset() {
        let eth = Address([0xee; 20]);
        let token = Address([0x70; 20]);
        let outcome = Outcome(vec![
            AssetOutcome::allocation(eth, allocation(&[(left(), 3), (right(), 3)])),
            AssetOutcome::allocation(token, allocation(&[(left(), 7)])),
        ]);
        let result = allocate_to_target_in_outcome(
            &outcome,
            eth,
            &allocation(&[(left(), 1), (right(), 2)]),
            target_id(),
        )
        .unwrap();
        assert_eq!(
            result.allocation_for(&eth),
            Some(&allocation(&[(left(), 2), (right(), 1), (target_dest(), 3)]))
        );
        assert_eq!(result.0[1], outcome.0[1]);

        assert_eq!(
            allocate_to_target_in_outcome(&outcome, Address([1; 20]), &allocation(&[]), target_id()),
            Err(AllocationError::AssetHolderMissing(Address([1; 20])))
        );
    }

    #[test]
    fn allocate_to_target_conserves_funds() {
        let mut rng = StdRng::seed_from_u64(0);
        let dests: Vec<Destination> = (1..=4).map(addr_dest).collect();
        let mut successes = 0;

        for _ in 0..500 {
            let mut ledger = Vec::new();
            let mut target = Vec::new();
            for d in &dests {
                if rng.gen_bool(0.8) {
                    ledger.push((*d, rng.gen_range(1..10)));
                }
                if rng.gen_bool(0.6) {
                    target.push((*d, rng.gen_range(0..6)));
                }
            }

            let ledger = allocation(&ledger);
            if let Ok(result) = allocate_to_target(&ledger, &allocation(&target), target_id()) {
                successes += 1;
                assert_eq!(result.total(), ledger.total());
                assert!(result.iter().all(|item| !item.amount.is_zero()
                    || item.destination == target_dest()));
            }
        }
        assert!(successes > 0);
    }
}
