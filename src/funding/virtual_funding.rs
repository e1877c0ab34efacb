//! Funding a channel between two leaves through a hub, without a deposit by
//! either leaf.
//!
//! The leaves `A` and `B` and the hub share a joint channel allocating
//! `[A: a, Hub: a + b, B: b]`. Each leaf opens a guarantor channel with the
//! hub whose outcome guarantees the joint channel, and funds it out of its
//! ledger channel with the hub. Finally the joint channel reallocates to
//! `[target: a + b, Hub: a + b]`.

use super::{ledger_funding_proposal, FundingError};
use crate::{
    abiencode::types::{Address, Destination, Hash, U256},
    channel::{
        Allocation, AllocationItem, AssetOutcome, Channel, Guarantee, Outcome, PartIdx, State,
    },
    store::ChannelStore,
};

/// Position in the joint channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VirtualRole {
    A = 0,
    Hub = 1,
    B = 2,
}

impl VirtualRole {
    pub fn of(index: PartIdx) -> Option<Self> {
        match index {
            0 => Some(VirtualRole::A),
            1 => Some(VirtualRole::Hub),
            2 => Some(VirtualRole::B),
            _ => None,
        }
    }
}

/// Everything a leaf has to get supported, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualFundingPlan {
    pub guarantor: Channel,
    /// Pre-fund state of the guarantor channel.
    pub guarantor_state: State,
    /// What the ledger channel reserves for the guarantor.
    pub deductions: Allocation,
    /// Consensus proposal on the ledger channel.
    pub ledger_proposal: State,
    /// Joint channel state funding the target.
    pub joint_update: State,
}

/// Check the joint channel's allocation `[A: a, Hub: a + b, B: b]`.
pub fn validate_joint_allocation(
    joint: &Channel,
    allocation: &Allocation,
) -> Result<(), FundingError> {
    let items = allocation.items();
    if joint.num_participants() != 3 || items.len() != 3 {
        return Err(FundingError::InvalidJointAllocation);
    }
    for (item, participant) in items.iter().zip(joint.participants()) {
        if item.destination != Destination::from(*participant) {
            return Err(FundingError::InvalidJointAllocation);
        }
    }
    let leaves = items[VirtualRole::A as usize]
        .amount
        .checked_add(items[VirtualRole::B as usize].amount);
    if leaves != Some(items[VirtualRole::Hub as usize].amount) {
        return Err(FundingError::InvalidJointAllocation);
    }
    Ok(())
}

/// Plan the virtual funding of `target_channel_id` for the leaf at
/// `my_index` of the joint channel.
///
/// The joint channel needs a supported pre-fund state and the ledger channel
/// between this leaf and the hub a supported idle state.
#[allow(clippy::too_many_arguments)]
pub fn plan_virtual_funding(
    store: &ChannelStore,
    joint_channel_id: Hash,
    my_index: PartIdx,
    ledger_channel_id: Hash,
    asset_holder: Address,
    target_channel_id: Hash,
    guarantor_nonce: U256,
    challenge_duration: u64,
) -> Result<VirtualFundingPlan, FundingError> {
    let joint = store.channel(&joint_channel_id)?;
    let role = VirtualRole::of(my_index).ok_or(FundingError::ParticipantIndex {
        index: my_index,
        participants: joint.num_participants(),
    })?;
    if role == VirtualRole::Hub {
        return Err(FundingError::HubIsNotALeaf);
    }

    let joint_state = store
        .latest_supported_state(&joint_channel_id)?
        .ok_or(FundingError::NoSupportedState(joint_channel_id))?;
    let allocation = joint_state
        .outcome
        .allocation_for(&asset_holder)
        .ok_or(FundingError::NotAnAllocation(asset_holder))?;
    validate_joint_allocation(joint, allocation)?;
    let items = allocation.items();

    let me = joint.participants()[my_index];
    let hub = joint.participants()[VirtualRole::Hub as usize];
    let guarantor = Channel::new(joint.chain_id(), vec![me, hub], guarantor_nonce)?;
    let guarantor_state = State::new(
        &guarantor,
        Outcome(vec![AssetOutcome::guarantee(
            asset_holder,
            Guarantee {
                target_channel_id: joint_channel_id,
                destinations: vec![me.into(), hub.into()],
            },
        )]),
        Address::default(),
        vec![],
        challenge_duration,
    )?;

    // The hub covers the other leaf's share, we cover ours.
    let other = items[2 - my_index];
    let deductions = Allocation::new(vec![
        AllocationItem {
            destination: hub.into(),
            amount: other.amount,
        },
        items[my_index],
    ]);
    let ledger_proposal = ledger_funding_proposal(
        store,
        ledger_channel_id,
        asset_holder,
        guarantor.id()?,
        &deductions,
    )?;

    let hub_amount = items[VirtualRole::Hub as usize].amount;
    let mut joint_update = joint_state.next();
    joint_update.outcome.set(AssetOutcome::allocation(
        asset_holder,
        Allocation::new(vec![
            AllocationItem {
                destination: target_channel_id.into(),
                amount: hub_amount,
            },
            AllocationItem {
                destination: hub.into(),
                amount: hub_amount,
            },
        ]),
    ));

    tracing::debug!(
        ?joint_channel_id,
        guarantor_id = ?guarantor_state.channel_id,
        ?role,
        "planned virtual funding"
    );
    Ok(VirtualFundingPlan {
        guarantor,
        guarantor_state,
        deductions,
        ledger_proposal,
        joint_update,
    })
}
