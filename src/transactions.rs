//! Ethereum transactions: JSON-RPC requests and locally signed legacy
//! (EIP-155) transactions.

use crate::address::{Address, PrivateKey};
use crate::error::{Error, Result};
use crate::utils::{keccak, unhex};
use bytes::{BufMut, Bytes, BytesMut};
use ethereum_types::{H256, U256};
use open_fastrlp::{Encodable, Header};
use secp256k1::{Message, Secp256k1};
use serde::{Deserialize, Serialize};

/// Transaction as submitted with `eth_sendTransaction`.
///
/// Unset optional fields are left for the node (or a signing provider)
/// to fill.
#[serde_with::serde_as]
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRequest {
    /// Sender
    pub from: Address,
    /// Recipient, `None` for contract creation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<Address>,
    /// Gas limit
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gas: Option<U256>,
    /// Gas price in wei
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gas_price: Option<U256>,
    /// Value in wei
    pub value: U256,
    /// Calldata
    #[serde_as(as = "unhex::Hex")]
    pub data: Bytes,
    /// Sender nonce
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nonce: Option<U256>,
}

/// Pre-EIP-2718 transaction with EIP-155 replay protection.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LegacyTransaction {
    /// Sender nonce
    pub nonce: U256,
    /// Gas price in wei
    pub gas_price: U256,
    /// Gas limit
    pub gas: U256,
    /// Recipient, `None` for contract creation
    pub to: Option<Address>,
    /// Value in wei
    pub value: U256,
    /// Calldata
    pub data: Bytes,
}

/// Signed transaction ready for `eth_sendRawTransaction`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignedTransaction {
    /// RLP encoded signed transaction
    pub raw: Bytes,
    /// Transaction hash (keccak of `raw`)
    pub hash: H256,
}

impl LegacyTransaction {
    pub fn from_request(request: &TransactionRequest, nonce: U256, gas_price: U256) -> Self {
        //! Build from a filled request; `nonce` and `gas_price` are used when
        //! the request leaves them unset.
        Self {
            nonce: request.nonce.unwrap_or(nonce),
            gas_price: request.gas_price.unwrap_or(gas_price),
            gas: request.gas.unwrap_or_default(),
            to: request.to,
            value: request.value,
            data: request.data.clone(),
        }
    }

    fn encode_fields(&self, out: &mut dyn BufMut) {
        self.nonce.encode(out);
        self.gas_price.encode(out);
        self.gas.encode(out);
        match self.to {
            Some(to) => to.inner().encode(out),
            None => Bytes::new().encode(out),
        }
        self.value.encode(out);
        self.data.encode(out);
    }

    fn encode_list(&self, tail: impl Fn(&mut dyn BufMut)) -> Bytes {
        let mut payload = BytesMut::new();
        self.encode_fields(&mut payload);
        tail(&mut payload);
        let mut out = BytesMut::new();
        Header {
            list: true,
            payload_length: payload.len(),
        }
        .encode(&mut out);
        out.put_slice(&payload);
        out.freeze()
    }

    pub fn signing_payload(&self, chain_id: u64) -> Bytes {
        //! RLP payload hashed for signing: fields followed by
        //! `chain_id, 0, 0`.
        self.encode_list(|out| {
            chain_id.encode(out);
            0u8.encode(out);
            0u8.encode(out);
        })
    }

    pub fn signing_hash(&self, chain_id: u64) -> [u8; 32] {
        //! Hash to sign.
        keccak(self.signing_payload(chain_id))
    }

    pub fn sign(&self, key: &PrivateKey, chain_id: u64) -> Result<SignedTransaction> {
        //! Sign with a private key for the given chain.
        let secp = Secp256k1::signing_only();
        let message = Message::from_slice(&self.signing_hash(chain_id))
            .map_err(|e| Error::Signing(e.to_string()))?;
        let (recovery_id, compact) = secp
            .sign_ecdsa_recoverable(&message, key)
            .serialize_compact();
        let v = chain_id
            .checked_mul(2)
            .and_then(|v| v.checked_add(35 + recovery_id.to_i32() as u64))
            .ok_or_else(|| Error::Signing(format!("chain id {chain_id} is too large")))?;
        let r = U256::from_big_endian(&compact[..32]);
        let s = U256::from_big_endian(&compact[32..]);
        let raw = self.encode_list(|out| {
            v.encode(out);
            r.encode(out);
            s.encode(out);
        });
        let hash = H256(keccak(&raw));
        Ok(SignedTransaction { raw, hash })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::utils::decode_hex;

    fn eip155_example() -> LegacyTransaction {
        // Example from the EIP-155 text.
        LegacyTransaction {
            nonce: U256::from(9),
            gas_price: U256::from(20_000_000_000u64),
            gas: U256::from(21_000),
            to: Some("0x3535353535353535353535353535353535353535".parse().unwrap()),
            value: U256::exp10(18),
            data: Bytes::new(),
        }
    }

    #[test]
    fn test_signing_payload() {
        let tx = eip155_example();
        assert_eq!(
            tx.signing_payload(1).to_vec(),
            decode_hex("ec098504a817c800825208943535353535353535353535353535353535353535880de0b6b3a764000080018080").unwrap()
        );
        assert_eq!(
            tx.signing_hash(1).to_vec(),
            decode_hex("daf5a779ae972f972197303d7b574746c7ef83eadac0f2791ad23db92e4c8e53").unwrap()
        );
    }

    #[test]
    fn test_sign() {
        let key = PrivateKey::from_slice(&[0x46; 32]).unwrap();
        let signed = eip155_example().sign(&key, 1).unwrap();
        assert_eq!(
            signed.raw.to_vec(),
            decode_hex("f86c098504a817c800825208943535353535353535353535353535353535353535880de0b6b3a76400008025a028ef61340bd939bc2195fe537567866003e1a15d3c71ff63e1590620aa636276a067cbe9d8997f761aecb703304b3800ccf555c9f3dc64214b297fb1966a3b6d83").unwrap()
        );
        assert_eq!(signed.hash, H256(keccak(&signed.raw)));
    }

    #[test]
    fn test_contract_creation_encodes_empty_recipient() {
        let tx = LegacyTransaction {
            to: None,
            data: Bytes::from_static(&[0x60, 0x80]),
            ..Default::default()
        };
        let payload = tx.signing_payload(1);
        // nonce, gas price, gas are all zero; recipient is an empty string.
        assert_eq!(&payload[1..5], &[0x80, 0x80, 0x80, 0x80]);
    }

    #[test]
    fn test_request_serialization() {
        let request = TransactionRequest {
            from: Address::from([0x11; 20]),
            to: Some(Address::from([0x22; 20])),
            gas: Some(U256::from(21_000)),
            gas_price: None,
            value: U256::zero(),
            data: Bytes::from_static(&[0xab, 0xcd]),
            nonce: None,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "from": "0x1111111111111111111111111111111111111111",
                "to": "0x2222222222222222222222222222222222222222",
                "gas": "0x5208",
                "value": "0x0",
                "data": "0xabcd",
            })
        );
    }
}
