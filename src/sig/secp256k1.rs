//! Signer using libsecp256k1 through the secp256k1 crate.

use crate::abiencode::types::{Address, Hash, Signature};
use secp256k1::{
    ecdsa::{RecoverableSignature, RecoveryId},
    All, Message, PublicKey, Secp256k1, SecretKey,
};

use super::{address_from_uncompressed, hash_to_eth_signed_msg_hash, split_eth_signature, Error};

pub struct Signer {
    secp: Secp256k1<All>,
    sk: SecretKey,
    addr: Address,
}

impl core::fmt::Debug for Signer {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Signer").field("addr", &self.addr).finish()
    }
}

fn address_of(pk: &PublicKey) -> Address {
    address_from_uncompressed(&pk.serialize_uncompressed())
}

impl Signer {
    pub fn new<R: rand::Rng + rand::CryptoRng>(rng: &mut R) -> Self {
        let secp = Secp256k1::new();
        let sk = SecretKey::new(rng);
        let addr = address_of(&PublicKey::from_secret_key(&secp, &sk));
        Self { secp, sk, addr }
    }

    pub fn address(&self) -> Address {
        self.addr
    }

    pub fn sign_eth(&self, msg: Hash) -> Signature {
        let hash = hash_to_eth_signed_msg_hash(msg);

        // sign_ecdsa_recoverable gives us the information needed for v, which
        // the contract needs to recover the address.
        let sig = self
            .secp
            .sign_ecdsa_recoverable(&Message::from(hash), &self.sk);
        let (v, rs) = sig.serialize_compact();

        // EIP-2 makes non-canonical signatures (high s) invalid. The library
        // already produces canonical ones.
        debug_assert!(rs[32] & 0x80 == 0);

        // Ethereum keeps the Bitcoin offset of 27 for v. No EIP-155 chain id,
        // openzeppelin's ECDSA.sol would not accept it.
        Signature::new(&rs, 27 + v.to_i32() as u8)
    }
}

pub(super) fn recover(msg: Hash, eth_sig: Signature) -> Result<Address, Error> {
    let hash = hash_to_eth_signed_msg_hash(msg);
    let (rs, v) = split_eth_signature(&eth_sig)?;

    let recid = RecoveryId::from_i32(v.into()).map_err(|e| Error::Recovery(e.to_string()))?;
    let sig =
        RecoverableSignature::from_compact(&rs, recid).map_err(|e| Error::Recovery(e.to_string()))?;
    let pk = Secp256k1::verification_only()
        .recover_ecdsa(&Message::from(hash), &sig)
        .map_err(|e| Error::Recovery(e.to_string()))?;

    Ok(address_of(&pk))
}
