use super::FundingError;
use crate::{
    abiencode::types::{Address, Destination, Hash, U256},
    channel::{
        allocate_to_target_in_outcome, remove_target, Allocation, AssetOutcome, State,
    },
    consensus,
    store::ChannelStore,
};

fn latest(store: &ChannelStore, ledger_channel_id: &Hash) -> Result<State, FundingError> {
    store
        .latest_supported_state(ledger_channel_id)?
        .cloned()
        .ok_or(FundingError::NoSupportedState(*ledger_channel_id))
}

/// Next ledger state proposing to move `target` out of the ledger into a
/// single entry for `target_channel_id`.
pub fn ledger_funding_proposal(
    store: &ChannelStore,
    ledger_channel_id: Hash,
    asset_holder: Address,
    target_channel_id: Hash,
    target: &Allocation,
) -> Result<State, FundingError> {
    let current = latest(store, &ledger_channel_id)?;
    let n = store.channel(&ledger_channel_id)?.num_participants();
    let outcome =
        allocate_to_target_in_outcome(&current.outcome, asset_holder, target, target_channel_id)?;
    tracing::debug!(
        ?ledger_channel_id,
        ?target_channel_id,
        turn_num = current.turn_num + 1,
        "proposing ledger funding"
    );
    Ok(consensus::propose(&current, outcome, n)?)
}

/// Next ledger state proposing to release the entry of `target_channel_id`
/// according to the target's final allocation.
pub fn ledger_defunding_proposal(
    store: &ChannelStore,
    ledger_channel_id: Hash,
    asset_holder: Address,
    target_channel_id: Hash,
    target: &Allocation,
) -> Result<State, FundingError> {
    let current = latest(store, &ledger_channel_id)?;
    let n = store.channel(&ledger_channel_id)?.num_participants();
    let allocation = current
        .outcome
        .allocation_for(&asset_holder)
        .ok_or(FundingError::NotAnAllocation(asset_holder))?;
    let mut outcome = current.outcome.clone();
    outcome.set(AssetOutcome::allocation(
        asset_holder,
        remove_target(allocation, target_channel_id, target)?,
    ));
    Ok(consensus::propose(&current, outcome, n)?)
}

/// Whether the supported ledger outcome reserves at least `amount` for
/// `target_channel_id`.
pub fn is_funded_by_ledger(
    store: &ChannelStore,
    ledger_channel_id: &Hash,
    asset_holder: &Address,
    target_channel_id: Hash,
    amount: U256,
) -> Result<bool, FundingError> {
    let Some(state) = store.latest_supported_state(ledger_channel_id)? else {
        return Ok(false);
    };
    Ok(state
        .outcome
        .allocation_for(asset_holder)
        .and_then(|a| a.amount_of(&Destination::from(target_channel_id)))
        .map_or(false, |held| held >= amount))
}
