use core::fmt::Debug;

use rand::{distributions::Standard, prelude::Distribution};
use serde::Serialize;
use uint::construct_uint;

#[cfg(feature = "secp256k1")]
use secp256k1::ThirtyTwoByteHash;

macro_rules! impl_hex_debug {
    ($T:ident) => {
        impl Debug for $T {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                f.write_str("0x")?;
                for b in self.0 {
                    f.write_fmt(format_args!("{:02x}", b))?;
                }
                Ok(())
            }
        }
    };
}

macro_rules! bytesN {
    ( $T:ident, $N:literal ) => {
        #[derive(PartialEq, Eq, Hash, Copy, Clone)]
        pub struct $T(pub [u8; $N]);

        impl Serialize for $T {
            fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
            where
                S: serde::Serializer,
            {
                serializer.serialize_bytes(&self.0)
            }
        }

        impl Distribution<$T> for Standard {
            fn sample<R: rand::Rng + ?Sized>(&self, rng: &mut R) -> $T {
                $T(rng.gen())
            }
        }

        impl Default for $T {
            fn default() -> Self {
                Self([0; $N])
            }
        }

        impl TryFrom<&[u8]> for $T {
            type Error = core::array::TryFromSliceError;

            fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
                Ok(Self(value.try_into()?))
            }
        }

        impl_hex_debug!($T);
    };
}

bytesN!(Bytes32, 32);
bytesN!(Hash, 32);
bytesN!(Signature, 65);

// Either an external address (left-padded) or a channel id. Solidity calls
// this a `bytes32 destination`.
bytesN!(Destination, 32);

impl Hash {
    /// The all-zero digest, used on-chain to mean "nothing stored".
    pub const ZERO: Hash = Hash([0; 32]);

    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }
}

#[cfg(feature = "secp256k1")]
impl ThirtyTwoByteHash for Hash {
    fn into_32(self) -> [u8; 32] {
        self.0
    }
}

impl Signature {
    pub fn new(rs: &[u8; 64], v: u8) -> Self {
        let mut sig: Signature = Signature([0; 65]);
        sig.0[..64].copy_from_slice(rs);
        sig.0[64] = v;
        sig
    }
}

impl Destination {
    /// Returns the address if this destination is an external address, i.e.
    /// the first 12 bytes are zero.
    pub fn as_address(&self) -> Option<Address> {
        if self.0[..12].iter().all(|b| *b == 0) {
            let mut addr = Address::default();
            addr.0.copy_from_slice(&self.0[12..]);
            Some(addr)
        } else {
            None
        }
    }

    pub fn is_external(&self) -> bool {
        self.as_address().is_some()
    }
}

impl From<Address> for Destination {
    fn from(addr: Address) -> Self {
        let mut bytes = [0u8; 32];
        bytes[32 - 20..].copy_from_slice(&addr.0);
        Destination(bytes)
    }
}

impl From<Hash> for Destination {
    fn from(channel_id: Hash) -> Self {
        Destination(channel_id.0)
    }
}

// primitive_types::U256 would serialize to a hex string, which is not what
// the ABI encoder needs. construct_uint gives us the same arithmetic (including
// the checked_* family) and lets us pick the serialization.
construct_uint! {
    pub struct U256(4);
}

impl Serialize for U256 {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_bytes(&u256_to_bytes(*self))
    }
}

impl Distribution<U256> for Standard {
    fn sample<R: rand::Rng + ?Sized>(&self, rng: &mut R) -> U256 {
        let buf: [u8; 32] = rng.gen();
        U256::from_big_endian(&buf)
    }
}

pub fn u256_to_bytes(value: U256) -> [u8; 32] {
    let mut bytes = [0u8; 32];
    value.to_big_endian(&mut bytes);
    bytes
}

#[derive(Copy, Clone, PartialEq, Eq, Hash, Default)]
pub struct Address(pub [u8; 20]);
impl_hex_debug!(Address);

impl Address {
    pub fn is_zero(&self) -> bool {
        self.0 == [0; 20]
    }
}

impl Serialize for Address {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        // Addresses are right aligned (like uints) instead of left aligned
        // like bytesN.
        let mut bytes = [0u8; 32];
        bytes[32 - 20..].copy_from_slice(self.0.as_slice());
        serializer.serialize_bytes(&bytes)
    }
}

impl TryFrom<&[u8]> for Address {
    type Error = core::array::TryFromSliceError;

    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        Ok(Self(value.try_into()?))
    }
}

impl Distribution<Address> for Standard {
    fn sample<R: rand::Rng + ?Sized>(&self, rng: &mut R) -> Address {
        Address(rng.gen())
    }
}
