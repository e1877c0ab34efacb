//! Error type and Return values used by the Serialization.

use serde::ser;
use thiserror::Error;

/// Represents all possible errors that can happen during Serialization.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// The struct contains a type that is not directly representable in
    /// Solidity types.
    ///
    /// For example floating point numbers, enums and maps. We don't pick a
    /// representation for those, as it could lead to loss of accuracy or force
    /// a specific representation on the Solidity side. Implement a custom
    /// serialize method instead.
    #[error("type is not representable in abi encoding: {0}")]
    TypeNotRepresentable(&'static str),
    /// Although the type is representable in Solidity (currently only used for
    /// `char`), the Serializer does not implement this functionality.
    #[error("type is not yet implemented: {0}")]
    TypeNotYetSupported(&'static str),
    /// Raised by a custom `Serialize` implementation.
    #[error("{0}")]
    Custom(String),
}

impl ser::Error for Error {
    fn custom<T>(msg: T) -> Self
    where
        T: core::fmt::Display,
    {
        Error::Custom(msg.to_string())
    }
}

/// Alias for `Result` using the [Error] returned by the Serializer.
pub type Result<T> = core::result::Result<T, Error>;
