use bytes::Bytes;
use ethereum_types::H160;
use open_fastrlp::{Decodable, Header};
use polymath_wrappers::transactions::{LegacyTransaction, TransactionRequest};
use polymath_wrappers::{keccak, Address, AddressConvertible, PrivateKey, H256, U256};
use secp256k1::ecdsa::{RecoverableSignature, RecoveryId};
use secp256k1::{Message, Secp256k1};

fn private_key() -> PrivateKey {
    PrivateKey::from_slice(&[0x46; 32]).unwrap()
}

fn transfer() -> LegacyTransaction {
    LegacyTransaction {
        nonce: U256::from(3),
        gas_price: U256::from(1_000_000_000u64),
        gas: U256::from(60_000),
        to: Some(Address::from([0x35; 20])),
        value: U256::zero(),
        data: Bytes::from_static(&[0xa9, 0x05, 0x9c, 0xbb, 0x00, 0x01]),
    }
}

struct Decoded {
    transaction: LegacyTransaction,
    v: u64,
    r: U256,
    s: U256,
}

fn decode(raw: &[u8]) -> Decoded {
    let mut buf = raw;
    let header = Header::decode(&mut buf).unwrap();
    assert!(header.list);
    assert_eq!(header.payload_length, buf.len());
    let transaction = LegacyTransaction {
        nonce: U256::decode(&mut buf).unwrap(),
        gas_price: U256::decode(&mut buf).unwrap(),
        gas: U256::decode(&mut buf).unwrap(),
        to: Some(H160::decode(&mut buf).unwrap().into()),
        value: U256::decode(&mut buf).unwrap(),
        data: Bytes::decode(&mut buf).unwrap(),
    };
    let decoded = Decoded {
        transaction,
        v: u64::decode(&mut buf).unwrap(),
        r: U256::decode(&mut buf).unwrap(),
        s: U256::decode(&mut buf).unwrap(),
    };
    assert!(buf.is_empty());
    decoded
}

#[test]
fn test_signed_fields_survive_encoding() {
    let signed = transfer().sign(&private_key(), 1).unwrap();
    let decoded = decode(&signed.raw);
    assert_eq!(decoded.transaction, transfer());
    assert_eq!(signed.hash, H256(keccak(&signed.raw)));
}

#[test]
fn test_eip155_v_and_signer_recovery() {
    for chain_id in [1u64, 3, 42, 1337] {
        let tx = transfer();
        let signed = tx.sign(&private_key(), chain_id).unwrap();
        let decoded = decode(&signed.raw);
        let recid = decoded.v - 35 - 2 * chain_id;
        assert!(recid <= 1, "v = {} on chain {chain_id}", decoded.v);

        let mut compact = [0u8; 64];
        decoded.r.to_big_endian(&mut compact[..32]);
        decoded.s.to_big_endian(&mut compact[32..]);
        let signature = RecoverableSignature::from_compact(
            &compact,
            RecoveryId::from_i32(recid as i32).unwrap(),
        )
        .unwrap();
        let message = Message::from_slice(&tx.signing_hash(chain_id)).unwrap();
        let signer = Secp256k1::new().recover_ecdsa(&message, &signature).unwrap();
        assert_eq!(signer.address(), private_key().address());
    }
}

#[test]
fn test_chain_id_changes_signature() {
    let mainnet = transfer().sign(&private_key(), 1).unwrap();
    let testnet = transfer().sign(&private_key(), 3).unwrap();
    assert_ne!(mainnet.hash, testnet.hash);
}

#[test]
fn test_from_request_prefers_request_values() {
    let request = TransactionRequest {
        from: Address::from([0x11; 20]),
        to: Some(Address::from([0x22; 20])),
        gas: Some(U256::from(50_000)),
        gas_price: None,
        value: U256::from(7),
        data: Bytes::from_static(&[1, 2, 3]),
        nonce: Some(U256::from(4)),
    };
    let tx = LegacyTransaction::from_request(&request, U256::from(99), U256::from(10));
    assert_eq!(tx.nonce, U256::from(4));
    assert_eq!(tx.gas_price, U256::from(10));
    assert_eq!(tx.gas, U256::from(50_000));
    assert_eq!(tx.value, U256::from(7));
    assert_eq!(tx.to, request.to);
}
