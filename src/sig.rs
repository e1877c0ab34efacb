//! Creation and verification of (Ethereum) signatures over state digests.
//!
//! Exactly one backend provides [Signer]: `k256` (default, pure Rust) or
//! `secp256k1` (bindings to libsecp256k1), selected with the feature of the
//! same name. If both are enabled `secp256k1` wins. Signatures are 65 bytes
//! (`r || s || v`, `v` in `{27, 28}`) over the digest prefixed with
//! `"\x19Ethereum Signed Message:\n32"`, which is what `ecrecover` based
//! contracts expect.

use crate::abiencode::types::{Address, Hash, Signature};
use sha3::{Digest, Keccak256};
use thiserror::Error;

#[cfg(feature = "k256")]
mod k256;
#[cfg(feature = "secp256k1")]
mod secp256k1;

#[cfg(feature = "secp256k1")]
use self::secp256k1 as backend;
#[cfg(all(feature = "k256", not(feature = "secp256k1")))]
use self::k256 as backend;

#[cfg(not(any(feature = "k256", feature = "secp256k1")))]
compile_error!("enable either the `k256` or the `secp256k1` feature");

pub use backend::Signer;


#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// The last byte of an Ethereum signature must be 27 or 28.
    #[error("invalid recovery id {0}, expected 27 or 28")]
    InvalidRecoveryId(u8),
    #[error("could not recover signer: {0}")]
    Recovery(String),
}

/// Recover the address that produced `sig` over `msg`.
///
/// `msg` is the plain digest given to [Signer::sign_eth], without the
/// `Ethereum Signed Message` prefix. A signature over a different digest does
/// not fail, it recovers some unrelated address, so callers have to compare
/// the result with the expected signer.
pub fn recover_signer(msg: Hash, sig: Signature) -> Result<Address, Error> {
    backend::recover(msg, sig)
}

/// Add the `\x19Ethereum Signed Message\n<length>` prefix to hash.
fn hash_to_eth_signed_msg_hash(hash: Hash) -> Hash {
    // Packed encoding => We can't use the serializer
    let mut hasher = Keccak256::new();
    hasher.update(b"\x19Ethereum Signed Message:\n32");
    hasher.update(hash.0);
    Hash(hasher.finalize().into())
}

/// Split an Ethereum signature into `r || s` and the raw recovery id (0 or 1).
fn split_eth_signature(sig: &Signature) -> Result<([u8; 64], u8), Error> {
    let v = sig.0[64];
    if v != 27 && v != 28 {
        return Err(Error::InvalidRecoveryId(v));
    }
    let mut rs = [0u8; 64];
    rs.copy_from_slice(&sig.0[..64]);
    Ok((rs, v - 27))
}

/// The address is the last 20 bytes of the keccak hash of the uncompressed
/// public key without its leading `0x04` tag.
fn address_from_uncompressed(pk_bytes: &[u8]) -> Address {
    let hash: [u8; 32] = Keccak256::digest(&pk_bytes[1..]).into();
    let mut addr = Address([0; 20]);
    addr.0.copy_from_slice(&hash[32 - 20..]);
    addr
}
