//! Signer using the k256 Rust crate (implementation of ecdsa in Rust).

use crate::abiencode::types::{Address, Hash, Signature};
use k256::{
    ecdsa::{
        recoverable,
        signature::{hazmat::PrehashSigner, Signature as _},
        SigningKey, VerifyingKey,
    },
    elliptic_curve::sec1::ToEncodedPoint,
};

use super::{address_from_uncompressed, hash_to_eth_signed_msg_hash, split_eth_signature, Error};

pub struct Signer {
    key: SigningKey,
    addr: Address,
}

impl core::fmt::Debug for Signer {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Signer").field("addr", &self.addr).finish()
    }
}

fn address_of(key: &VerifyingKey) -> Address {
    address_from_uncompressed(key.to_encoded_point(false).as_bytes())
}

impl Signer {
    pub fn new<R: rand::Rng + rand::CryptoRng>(rng: &mut R) -> Self {
        let key = SigningKey::random(rng);
        let addr = address_of(&key.verifying_key());
        Self { key, addr }
    }

    pub fn address(&self) -> Address {
        self.addr
    }

    pub fn sign_eth(&self, msg: Hash) -> Signature {
        let hash = hash_to_eth_signed_msg_hash(msg);

        // Only fails for prehashes of the wrong length, ours is always 32 bytes.
        let sig: recoverable::Signature = self
            .key
            .sign_prehash(&hash.0)
            .expect("32 byte prehash is always accepted");

        // This Signature type already has the layout we need (r, s and v in
        // this order), we only have to add 27 to v for the EVM.
        let mut bytes = [0u8; 65];
        bytes.copy_from_slice(sig.as_bytes());
        debug_assert!(bytes[32] & 0x80 == 0);
        bytes[64] += 27;

        Signature(bytes)
    }
}

pub(super) fn recover(msg: Hash, eth_sig: Signature) -> Result<Address, Error> {
    let hash = hash_to_eth_signed_msg_hash(msg);
    let (rs, v) = split_eth_signature(&eth_sig)?;

    let mut sig_bytes = [0u8; 65];
    sig_bytes[..64].copy_from_slice(&rs);
    sig_bytes[64] = v;

    let sig = recoverable::Signature::from_bytes(&sig_bytes)
        .map_err(|e| Error::Recovery(e.to_string()))?;
    let verifying_key = sig
        .recover_verifying_key_from_digest_bytes(&hash.0.into())
        .map_err(|e| Error::Recovery(e.to_string()))?;
    Ok(address_of(&verifying_key))
}
