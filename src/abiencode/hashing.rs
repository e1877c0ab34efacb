use super::{ser, types::Hash, Error};

use serde::Serialize;
use sha3::{Digest, Keccak256};

/// `keccak256(abi.encode(value))`
pub fn to_hash<T>(value: &T) -> Result<Hash, Error>
where
    T: Serialize + ?Sized,
{
    Ok(keccak256(&ser::to_bytes(value)?))
}

/// `keccak256(abi.encode(a, b, ...))` for a tuple or struct of arguments.
pub fn to_args_hash<T>(args: &T) -> Result<Hash, Error>
where
    T: Serialize + ?Sized,
{
    Ok(keccak256(&ser::to_args_bytes(args)?))
}

pub fn keccak256(data: &[u8]) -> Hash {
    Hash(Keccak256::digest(data).into())
}
