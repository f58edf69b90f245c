//! Wrappers reached through the factory, checked against the exact calldata
//! they submit.

use ethabi::Token;
use polymath_wrappers::contracts::security_token_registry::FeeType;
use polymath_wrappers::mock::{calldata, MockProvider};
use polymath_wrappers::modules::{Module, ModuleType};
use polymath_wrappers::transaction_builder::{TxDefaults, TxParams};
use polymath_wrappers::{Address, ContractFactory, Error, U256};
use rust_decimal_macros::dec;
use std::sync::Arc;

const REGISTRY: Address = Address::new([0x01; 20]);
const STR: Address = Address::new([0x02; 20]);
const POLY: Address = Address::new([0x03; 20]);
const TOKEN: Address = Address::new([0x04; 20]);
const COUNT_TM: Address = Address::new([0x05; 20]);
const ISSUER: Address = Address::new([0x0a; 20]);
const INVESTOR: Address = Address::new([0x0b; 20]);

fn wei(amount: u64) -> Token {
    Token::Uint(U256::exp10(18) * amount)
}

fn deployment() -> (Arc<MockProvider>, ContractFactory) {
    let mock = Arc::new(MockProvider::new().with_accounts(vec![ISSUER]));
    for (key, address) in [("SecurityTokenRegistry", STR), ("PolyToken", POLY)] {
        mock.mock_call_with_args(
            REGISTRY,
            "getAddress(string)",
            &[Token::String(key.to_string())],
            &[address.into()],
        );
    }
    mock.mock_call(STR, "isPaused()", &[Token::Bool(false)]);
    mock.mock_call(STR, "getAddressValue(bytes32)", &[POLY.into()]);
    mock.mock_call(POLY, "decimals()", &[Token::Uint(18.into())]);
    mock.mock_call(POLY, "balanceOf(address)", &[wei(1_000)]);
    mock.mock_call_with_args(
        STR,
        "getSecurityTokenAddress(string)",
        &[Token::String("ACME".to_string())],
        &[TOKEN.into()],
    );
    mock.mock_call(TOKEN, "decimals()", &[Token::Uint(18.into())]);
    mock.mock_call(TOKEN, "owner()", &[ISSUER.into()]);
    mock.mock_call(TOKEN, "transfersFrozen()", &[Token::Bool(false)]);
    mock.mock_call(TOKEN, "granularity()", &[Token::Uint(1.into())]);

    let factory =
        ContractFactory::new(mock.clone(), TxDefaults::default()).with_registry(REGISTRY);
    (mock, factory)
}

#[tokio::test]
async fn test_register_ticker_pays_fee_in_poly() {
    let (mock, factory) = deployment();
    mock.mock_call(
        STR,
        "getTickerDetails(string)",
        &[
            Address::ZERO.into(),
            Token::Uint(0.into()),
            Token::Uint(0.into()),
            Token::String(String::new()),
            Token::Bool(false),
        ],
    );
    mock.mock_call_with_args(
        STR,
        "getFees(bytes32)",
        &[Token::FixedBytes(FeeType::TickerRegistration.key().to_vec())],
        &[wei(250), wei(500)],
    );
    mock.mock_call(POLY, "allowance(address,address)", &[wei(400)]);

    let registry = factory.security_token_registry().await.unwrap();
    assert!(matches!(
        registry
            .register_ticker(ISSUER, "acme", "Acme Corp", TxParams::new())
            .await,
        Err(Error::Precondition(message)) if message.contains("allowance")
    ));
    assert!(mock.sent_transactions().is_empty());

    mock.mock_call(POLY, "allowance(address,address)", &[wei(500)]);
    registry
        .register_ticker(ISSUER, "acme", "Acme Corp", TxParams::new())
        .await
        .unwrap();
    let sent = mock.sent_transactions();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].from, ISSUER);
    assert_eq!(sent[0].to, Some(STR));
    assert_eq!(
        sent[0].data,
        calldata(
            "registerTicker(address,string,string)",
            &[
                ISSUER.into(),
                Token::String("ACME".to_string()),
                Token::String("Acme Corp".to_string()),
            ]
        )
    );
    // Gas estimate scaled by the default safety factor.
    assert_eq!(sent[0].gas, Some(U256::from(120_000)));
}

#[tokio::test]
async fn test_token_transfer_by_ticker() {
    let (mock, factory) = deployment();
    mock.mock_call(TOKEN, "balanceOf(address)", &[wei(10)]);

    let token = factory.security_token_by_ticker("acme").await.unwrap();
    assert!(matches!(
        token.transfer(INVESTOR, dec!(11), TxParams::new()).await,
        Err(Error::Precondition(_))
    ));

    token
        .transfer(INVESTOR, dec!(2.5), TxParams::new())
        .await
        .unwrap()
        .confirmed()
        .await
        .unwrap();
    assert_eq!(
        mock.sent_transactions()[0].data,
        calldata(
            "transfer(address,uint256)",
            &[INVESTOR.into(), Token::Uint(U256::exp10(17) * 25)]
        )
    );

    mock.mock_call(TOKEN, "transfersFrozen()", &[Token::Bool(true)]);
    assert!(token
        .transfer(INVESTOR, dec!(1), TxParams::new())
        .await
        .is_err());
    assert_eq!(mock.sent_transactions().len(), 1);
}

#[tokio::test]
async fn test_module_lookup_and_owner_guard() {
    let (mock, factory) = deployment();
    mock.mock_call(
        TOKEN,
        "getModulesByType(uint8)",
        &[Token::Array(vec![COUNT_TM.into()])],
    );
    mock.mock_call(COUNT_TM, "securityToken()", &[TOKEN.into()]);
    mock.mock_call(COUNT_TM, "maxHolderCount()", &[Token::Uint(100.into())]);
    mock.mock_call(COUNT_TM, "paused()", &[Token::Bool(false)]);

    let token = factory.security_token_by_ticker("ACME").await.unwrap();
    let modules = token
        .get_modules_by_type(ModuleType::Transfer)
        .await
        .unwrap();
    let manager = factory.count_transfer_manager(modules[0]);
    assert_eq!(manager.security_token().await.unwrap().address(), TOKEN);
    assert_eq!(manager.max_holder_count().await.unwrap(), 100);

    manager.change_holder_count(250, TxParams::new()).await.unwrap();
    assert_eq!(
        mock.sent_transactions()[0].data,
        calldata("changeHolderCount(uint256)", &[Token::Uint(250.into())])
    );

    assert!(matches!(
        manager.pause(TxParams::new().from(INVESTOR)).await,
        Err(Error::Precondition(_))
    ));
    manager.pause(TxParams::new()).await.unwrap();
    assert_eq!(
        mock.sent_transactions()[1].data,
        calldata("pause()", &[])
    );
}

#[tokio::test]
async fn test_reverted_call_is_propagated() {
    let (mock, factory) = deployment();
    mock.mock_revert(STR, "getTickerDetails(string)", "Ticker registry is locked");
    let registry = factory.security_token_registry().await.unwrap();
    let error = registry.get_ticker_details("ACME").await.unwrap_err();
    assert_eq!(
        error.to_string(),
        "execution reverted: Ticker registry is locked"
    );
    assert_eq!(
        mock.calls().last().unwrap().data,
        calldata(
            "getTickerDetails(string)",
            &[Token::String("ACME".to_string())]
        )
    );
}
