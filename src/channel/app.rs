//! Application rules deciding which state may follow which.

use super::State;
use crate::abiencode::types::{u256_to_bytes, Address, U256};
use std::{collections::HashMap, sync::Arc};

/// The application-specific part of the transition rules.
///
/// Only called for transitions the framework rules in [valid_transition]
/// leave to the application, i.e. non-final states after the setup phase.
pub trait App: Send + Sync {
    fn valid_transition(&self, from: &State, to: &State, num_participants: usize) -> bool;
}

/// Accepts every transition.
#[derive(Debug, Default, Clone, Copy)]
pub struct TrivialApp;

impl App for TrivialApp {
    fn valid_transition(&self, _from: &State, _to: &State, _num_participants: usize) -> bool {
        true
    }
}

/// `appData` is a 32 byte big-endian counter that has to increase by one on
/// every move, the outcome must not change.
#[derive(Debug, Default, Clone, Copy)]
pub struct CountingApp;

impl CountingApp {
    pub fn app_data(counter: U256) -> Vec<u8> {
        u256_to_bytes(counter).to_vec()
    }

    pub fn counter(app_data: &[u8]) -> Option<U256> {
        if app_data.len() == 32 {
            Some(U256::from_big_endian(app_data))
        } else {
            None
        }
    }
}

impl App for CountingApp {
    fn valid_transition(&self, from: &State, to: &State, _num_participants: usize) -> bool {
        let (Some(a), Some(b)) = (Self::counter(&from.app_data), Self::counter(&to.app_data)) else {
            return false;
        };
        a.checked_add(U256::one()) == Some(b) && from.outcome == to.outcome
    }
}

/// Rules every transition has to follow, independent of the application.
///
/// - channel, app definition and challenge duration are fixed,
/// - the turn number increases by one,
/// - a final state may only keep the outcome, nothing follows a final state,
/// - during setup (the first `2n` turns) only the turn number changes,
/// - afterwards the application decides.
pub fn valid_transition(app: &dyn App, from: &State, to: &State, num_participants: usize) -> bool {
    if !to.is_consecutive_to(from)
        || to.app_definition != from.app_definition
        || to.challenge_duration != from.challenge_duration
    {
        return false;
    }

    if to.is_final {
        return to.outcome == from.outcome;
    }
    if from.is_final {
        return false;
    }

    if to.turn_num < 2 * num_participants as u64 {
        return to.outcome == from.outcome && to.app_data == from.app_data;
    }

    app.valid_transition(from, to, num_participants)
}

/// Apps known to a participant or to the adjudicator, by `appDefinition`.
#[derive(Clone, Default)]
pub struct AppRegistry {
    apps: HashMap<Address, Arc<dyn App>>,
}

impl core::fmt::Debug for AppRegistry {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_set().entries(self.apps.keys()).finish()
    }
}

impl AppRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, app_definition: Address, app: Arc<dyn App>) {
        self.apps.insert(app_definition, app);
    }

    pub fn with_app(mut self, app_definition: Address, app: Arc<dyn App>) -> Self {
        self.register(app_definition, app);
        self
    }

    pub fn get(&self, app_definition: &Address) -> Option<&dyn App> {
        self.apps.get(app_definition).map(|app| app.as_ref())
    }

    pub fn contains(&self, app_definition: &Address) -> bool {
        self.apps.contains_key(app_definition)
    }
}
