//! Ethereum address operations and verifications.

use crate::utils::keccak;
use ethereum_types::H160;
pub use secp256k1::{PublicKey, SecretKey as PrivateKey};
use serde::{Deserialize, Serialize};
use std::{
    fmt,
    ops::{Deref, DerefMut},
    result::Result,
    str::FromStr,
};

/// Ethereum address.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(H160);

impl DerefMut for Address {
    fn deref_mut(&mut self) -> &mut H160 {
        &mut self.0
    }
}
impl Deref for Address {
    type Target = H160;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}
impl FromStr for Address {
    type Err = rustc_hex::FromHexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(H160::from_str(s.strip_prefix("0x").unwrap_or(s))?))
    }
}
impl<T: Into<H160>> From<T> for Address {
    fn from(s: T) -> Self {
        Self(s.into())
    }
}
impl From<Address> for ethabi::Token {
    fn from(value: Address) -> Self {
        Self::Address(value.0)
    }
}
impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_checksum_address())
    }
}

impl Address {
    /// Size of underlying array in bytes.
    pub const WIDTH: usize = 20;
    /// The zero address, used on-chain as "unset".
    pub const ZERO: Self = Self(H160::zero());

    pub const fn new(bytes: [u8; 20]) -> Self {
        //! Address from its raw bytes.
        Self(H160(bytes))
    }

    pub const fn inner(&self) -> H160 {
        //! Underlying fixed-size hash.
        self.0
    }

    pub fn is_zero(&self) -> bool {
        //! Whether this is the zero address.
        self.0.is_zero()
    }

    pub fn to_hex(&self) -> String {
        //! Encode as a lowercase hex string with `0x` prefix.
        format!("{:#x}", self.0)
    }

    pub fn to_checksum_address(&self) -> String {
        //! Create an EIP-55 checksum address

        let body = self.to_hex();
        let hash = keccak(&body[2..42]);

        "0x".chars()
            .chain(
                body.chars()
                    .skip(2)
                    .zip(itertools::interleave(
                        hash.iter().map(|x| x >> 4),
                        hash.iter().map(|x| x & 15),
                    ))
                    .map(|(ch, h)| if h >= 8 { ch.to_ascii_uppercase() } else { ch }),
            )
            .collect()
    }
}

/// A trait for objects that can generate an on-chain address.
pub trait AddressConvertible {
    /// Create an address
    fn address(&self) -> Address;
}

impl AddressConvertible for secp256k1::PublicKey {
    fn address(&self) -> Address {
        //! Generate address from public key.
        // Get rid of the 0x04 (first byte) at the beginning.
        let hash = keccak(&self.serialize_uncompressed()[1..]);
        // last 20 bytes from the 32 bytes hash.
        Address(H160::from_slice(&hash[12..32]))
    }
}

impl AddressConvertible for PrivateKey {
    fn address(&self) -> Address {
        //! Generate address from the public key of this private key.
        let secp = secp256k1::Secp256k1::signing_only();
        self.public_key(&secp).address()
    }
}
