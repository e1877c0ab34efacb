use super::FundingError;
use crate::{
    abiencode::types::{Address, Destination, Hash, U256},
    adjudicator::{AdjudicatorCall, Ledger},
    channel::{Allocation, PartIdx},
};

/// What a participant should do next while funding directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectFundingStatus {
    /// Earlier participants have not deposited yet, or our deposit is done
    /// and later participants have not.
    WaitForTurn,
    /// Our turn: top the holdings up from `expected_held` by `amount`.
    Deposit { expected_held: U256, amount: U256 },
    Funded,
}

/// Deposits are made one participant after another, in allocation order.
/// Depositing before everyone in front of us is covered would put our funds
/// at risk if the channel was finalized with the current holdings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectFunding {
    pub channel_id: Hash,
    pub asset_holder: Address,
    /// Holdings at which it is our turn.
    pub safe_to_deposit: U256,
    pub required_deposit: U256,
    pub total: U256,
}

impl DirectFunding {
    /// Funding of the item at `index` of `allocation`.
    pub fn new(
        channel_id: Hash,
        asset_holder: Address,
        allocation: &Allocation,
        index: PartIdx,
    ) -> Result<Self, FundingError> {
        let items = allocation.items();
        let item = items.get(index).ok_or(FundingError::ParticipantIndex {
            index,
            participants: items.len(),
        })?;
        let safe_to_deposit = Allocation::new(items[..index].to_vec()).total()?;
        Ok(Self {
            channel_id,
            asset_holder,
            safe_to_deposit,
            required_deposit: item.amount,
            total: allocation.total()?,
        })
    }

    pub fn status(&self, held: U256) -> DirectFundingStatus {
        if held >= self.total {
            return DirectFundingStatus::Funded;
        }
        // Cannot overflow, safe_to_deposit + required_deposit <= total.
        let done = self.safe_to_deposit + self.required_deposit;
        if held < self.safe_to_deposit || held >= done {
            DirectFundingStatus::WaitForTurn
        } else {
            DirectFundingStatus::Deposit {
                expected_held: self.safe_to_deposit,
                amount: self.required_deposit,
            }
        }
    }

    /// Read the holdings from `ledger` and return the deposit to submit, if
    /// it is our turn.
    pub fn poll<L: Ledger + ?Sized>(
        &self,
        ledger: &L,
    ) -> (DirectFundingStatus, Option<AdjudicatorCall>) {
        let held = ledger.holdings(&self.asset_holder, &Destination::from(self.channel_id));
        let status = self.status(held);
        let call = match status {
            DirectFundingStatus::Deposit {
                expected_held,
                amount,
            } => Some(AdjudicatorCall::Deposit {
                asset_holder: self.asset_holder,
                destination: self.channel_id.into(),
                expected_held,
                amount,
            }),
            _ => None,
        };
        tracing::debug!(channel_id = ?self.channel_id, %held, ?status, "direct funding");
        (status, call)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        adjudicator::{Adjudicator, ManualClock},
        channel::{
            test_utils::{allocation, asset_holder},
            AppRegistry,
        },
    };

    fn funding(index: usize) -> DirectFunding {
        let alloc = allocation(&[
            (Destination([1; 32]), 3),
            (Destination([2; 32]), 0),
            (Destination([3; 32]), 4),
        ]);
        DirectFunding::new(Hash([9; 32]), asset_holder(), &alloc, index).unwrap()
    }

    #[test]
    fn thresholds() {
        let f = funding(2);
        assert_eq!(f.safe_to_deposit, 3.into());
        assert_eq!(f.required_deposit, 4.into());
        assert_eq!(f.total, 7.into());

        assert_eq!(f.status(0.into()), DirectFundingStatus::WaitForTurn);
        assert_eq!(
            f.status(3.into()),
            DirectFundingStatus::Deposit {
                expected_held: 3.into(),
                amount: 4.into()
            }
        );
        assert_eq!(
            f.status(5.into()),
            DirectFundingStatus::Deposit {
                expected_held: 3.into(),
                amount: 4.into()
            }
        );
        assert_eq!(f.status(7.into()), DirectFundingStatus::Funded);

        // a zero deposit never has a turn
        let f = funding(1);
        assert_eq!(f.status(3.into()), DirectFundingStatus::WaitForTurn);

        assert!(matches!(
            DirectFunding::new(Hash([9; 32]), asset_holder(), &allocation(&[]), 0),
            Err(FundingError::ParticipantIndex { .. })
        ));
    }

    #[test]
    fn participants_deposit_in_order() {
        let mut adj = Adjudicator::new(ManualClock::new(0), AppRegistry::new());
        let first = funding(0);
        let last = funding(2);

        let (status, call) = last.poll(&adj);
        assert_eq!(status, DirectFundingStatus::WaitForTurn);
        assert!(call.is_none());

        let (_, call) = first.poll(&adj);
        adj.submit(call.unwrap()).unwrap();
        assert_eq!(first.poll(&adj).0, DirectFundingStatus::WaitForTurn);

        let (_, call) = last.poll(&adj);
        adj.submit(call.unwrap()).unwrap();
        assert_eq!(first.poll(&adj).0, DirectFundingStatus::Funded);
        assert_eq!(last.poll(&adj).0, DirectFundingStatus::Funded);
    }
}
