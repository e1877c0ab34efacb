//! Serialize any `&[u8]` as solidity `bytes` (dynamic length bytes).
//!
//! Without this, it would be serialized to a `uint8[]` of fixed or dynamic
//! length.
//!
//! # Example usage
//! ```
//! use forcemove::abiencode::as_bytes;
//! use serde::Serialize;
//!
//! #[derive(Serialize, Debug)]
//! pub struct AppPart {
//!     pub challenge_duration: u64,
//!     #[serde(with = "as_bytes")]
//!     pub app_data: Vec<u8>,
//! }
//! ```

use super::ser::DynamicBytes;
use serde::{Serialize, Serializer};

pub fn serialize<S>(v: &[u8], serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    DynamicBytes(v).serialize(serializer)
}
