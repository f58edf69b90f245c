use rustc_hex::{FromHex, FromHexError};
use tiny_keccak::{Hasher, Keccak};

pub fn keccak<S: AsRef<[u8]>>(bytes: S) -> [u8; 32] {
    //! Compute a keccak hash.
    let mut hasher = Keccak::v256();
    hasher.update(bytes.as_ref());
    let mut hash = [0; 32];
    hasher.finalize(&mut hash);
    hash
}

pub fn selector(signature: &str) -> [u8; 4] {
    //! Compute a 4-byte function selector from a canonical signature
    //! like `balanceOf(address)`.
    let hash = keccak(signature.as_bytes());
    [hash[0], hash[1], hash[2], hash[3]]
}

pub fn decode_hex(hex: &str) -> Result<Vec<u8>, FromHexError> {
    //! Decode a hex string, with or without `0x` prefix.
    hex.strip_prefix("0x").unwrap_or(hex).from_hex()
}

/// Serde adapters for `0x`-prefixed hex payloads used by JSON-RPC.
pub mod unhex {
    use bytes::Bytes;
    use rustc_hex::ToHex;
    use serde::{de::Error as _, Deserialize, Deserializer, Serializer};
    use serde_with::{DeserializeAs, SerializeAs};

    /// Byte string as `0x`-prefixed hex.
    pub struct Hex;

    impl SerializeAs<Bytes> for Hex {
        fn serialize_as<S: Serializer>(source: &Bytes, serializer: S) -> Result<S::Ok, S::Error> {
            serializer.serialize_str(&format!("0x{}", source.to_hex::<String>()))
        }
    }

    impl<'de> DeserializeAs<'de, Bytes> for Hex {
        fn deserialize_as<D: Deserializer<'de>>(deserializer: D) -> Result<Bytes, D::Error> {
            let text = String::deserialize(deserializer)?;
            super::decode_hex(&text)
                .map(Bytes::from)
                .map_err(D::Error::custom)
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_keccak_empty() {
        assert_eq!(
            keccak([]),
            decode_hex("c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470")
                .unwrap()[..]
        );
    }

    #[test]
    fn test_selector() {
        assert_eq!(selector("transfer(address,uint256)"), [0xa9, 0x05, 0x9c, 0xbb]);
        assert_eq!(selector("balanceOf(address)"), [0x70, 0xa0, 0x82, 0x31]);
    }

    #[test]
    fn test_decode_hex_prefix() {
        assert_eq!(decode_hex("0x0102").unwrap(), vec![1, 2]);
        assert_eq!(decode_hex("0102").unwrap(), vec![1, 2]);
        assert!(decode_hex("0x0g").is_err());
    }
}
