//! Wallet settings.
//!
//! ```
//! use forcemove::{wire::Backpressure, WalletConfig};
//!
//! let config = WalletConfig::default()
//!     .with_max_strategy_attempts(5)
//!     .with_backpressure(Backpressure::Reject);
//! assert!(config.validate().is_ok());
//! ```

use crate::wire::Backpressure;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be at least 1")]
    Zero(&'static str),
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct WalletConfig {
    /// Funding strategy proposals per target channel before giving up.
    pub max_strategy_attempts: u32,
    /// Messages buffered for the transport.
    pub outbound_queue_capacity: usize,
    pub backpressure: Backpressure,
    /// Used for channels created by the wallet itself, in seconds.
    pub default_challenge_duration: u64,
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            max_strategy_attempts: 3,
            outbound_queue_capacity: 64,
            backpressure: Backpressure::DropOldest,
            default_challenge_duration: 86_400,
        }
    }
}

impl WalletConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_strategy_attempts == 0 {
            return Err(ConfigError::Zero("max_strategy_attempts"));
        }
        if self.outbound_queue_capacity == 0 {
            return Err(ConfigError::Zero("outbound_queue_capacity"));
        }
        if self.default_challenge_duration == 0 {
            return Err(ConfigError::Zero("default_challenge_duration"));
        }
        Ok(())
    }

    pub fn with_max_strategy_attempts(mut self, attempts: u32) -> Self {
        self.max_strategy_attempts = attempts;
        self
    }

    pub fn with_outbound_queue_capacity(mut self, capacity: usize) -> Self {
        self.outbound_queue_capacity = capacity;
        self
    }

    pub fn with_backpressure(mut self, policy: Backpressure) -> Self {
        self.backpressure = policy;
        self
    }

    pub fn with_default_challenge_duration(mut self, secs: u64) -> Self {
        self.default_challenge_duration = secs;
        self
    }
}
