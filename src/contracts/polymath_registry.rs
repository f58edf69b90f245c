//! `PolymathRegistry`: directory of the core contracts of a deployment.

use crate::abi;
use crate::address::Address;
use crate::assertions::{ensure, is_owner, non_zero_address};
use crate::contract::{tokens, Contract};
use crate::error::Result;
use crate::network::Provider;
use crate::transaction_builder::{PendingTransaction, TxDefaults, TxParams};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Well-known registry entries.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum RegistryKey {
    /// POLY ERC20 token
    PolyToken,
    /// Module registry
    ModuleRegistry,
    /// Feature switches
    FeatureRegistry,
    /// Ticker and token registry
    SecurityTokenRegistry,
    /// ETH/USD price oracle
    EthUsdOracle,
    /// POLY/USD price oracle
    PolyUsdOracle,
    /// Factory of new security tokens
    StFactory,
}

impl RegistryKey {
    pub const fn as_str(&self) -> &'static str {
        //! Name under which the contract is registered.
        match self {
            Self::PolyToken => "PolyToken",
            Self::ModuleRegistry => "ModuleRegistry",
            Self::FeatureRegistry => "FeatureRegistry",
            Self::SecurityTokenRegistry => "SecurityTokenRegistry",
            Self::EthUsdOracle => "EthUsdOracle",
            Self::PolyUsdOracle => "PolyUsdOracle",
            Self::StFactory => "STFactory",
        }
    }
}

impl AsRef<str> for RegistryKey {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for RegistryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Wrapper of the `PolymathRegistry` contract.
#[derive(Clone, Debug)]
pub struct PolymathRegistry {
    contract: Contract,
}

impl PolymathRegistry {
    pub fn new(address: Address, provider: Arc<dyn Provider>, defaults: Arc<TxDefaults>) -> Self {
        //! Wrapper of the registry deployed at `address`.
        Self {
            contract: Contract::new(address, &abi::POLYMATH_REGISTRY, provider, defaults),
        }
    }

    pub const fn contract(&self) -> &Contract {
        //! Underlying contract handle.
        &self.contract
    }

    pub const fn address(&self) -> Address {
        //! Registry address.
        self.contract.address()
    }

    pub async fn get_address(&self, key: impl AsRef<str>) -> Result<Address> {
        //! Address registered under `key`.
        //!
        //! Unknown keys resolve to the zero address on-chain; this is
        //! reported as a precondition failure.
        let key = key.as_ref();
        ensure(!key.is_empty(), "Registry key must not be empty")?;
        let address: Address = self
            .contract
            .call("getAddress", &[tokens::string(key)])
            .await?
            .single()?;
        ensure(!address.is_zero(), format!("Invalid address key {key:?}"))?;
        debug!(key, %address, "Resolved registry entry");
        Ok(address)
    }

    pub async fn owner(&self) -> Result<Address> {
        //! Account allowed to change entries.
        self.contract.call("owner", &[]).await?.single()
    }

    pub async fn change_address(
        &self,
        key: impl AsRef<str>,
        address: Address,
        params: TxParams,
    ) -> Result<PendingTransaction> {
        //! Point `key` to a new contract. Owner only.
        let key = key.as_ref();
        ensure(!key.is_empty(), "Registry key must not be empty")?;
        non_zero_address(address, "New address")?;
        is_owner(self.owner().await?, self.contract.sender(&params).await?)?;
        self.contract
            .send(
                "changeAddress",
                &[tokens::string(key), address.into()],
                params,
            )
            .await
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::error::Error;
    use crate::mock::{calldata, MockProvider};
    use ethabi::Token;

    fn setup() -> (Arc<MockProvider>, PolymathRegistry) {
        let mock = Arc::new(MockProvider::new());
        let owner = Address::from([0x0a; 20]);
        let registry = PolymathRegistry::new(
            Address::from([0x01; 20]),
            mock.clone(),
            Arc::new(TxDefaults {
                from: Some(owner),
                ..Default::default()
            }),
        );
        mock.mock_call(registry.address(), "owner()", &[owner.into()]);
        (mock, registry)
    }

    #[tokio::test]
    async fn test_get_address() {
        let (mock, registry) = setup();
        let poly = Address::from([0x99; 20]);
        mock.mock_call_with_args(
            registry.address(),
            "getAddress(string)",
            &[Token::String("PolyToken".to_string())],
            &[poly.into()],
        );
        mock.mock_call(registry.address(), "getAddress(string)", &[Address::ZERO.into()]);

        assert_eq!(registry.get_address(RegistryKey::PolyToken).await.unwrap(), poly);
        assert!(matches!(
            registry.get_address("Missing").await,
            Err(Error::Precondition(message)) if message.contains("Invalid address key")
        ));
        assert!(matches!(
            registry.get_address("").await,
            Err(Error::Precondition(_))
        ));
    }

    #[tokio::test]
    async fn test_change_address() {
        let (mock, registry) = setup();
        let new = Address::from([0x42; 20]);
        registry
            .change_address(RegistryKey::EthUsdOracle, new, TxParams::new())
            .await
            .unwrap();
        assert_eq!(
            mock.sent_transactions()[0].data,
            calldata(
                "changeAddress(string,address)",
                &[Token::String("EthUsdOracle".to_string()), new.into()]
            )
        );

        let stranger = TxParams::new().from(Address::from([0x0b; 20]));
        assert!(matches!(
            registry.change_address("PolyToken", new, stranger).await,
            Err(Error::Precondition(_))
        ));
        assert!(registry
            .change_address("PolyToken", Address::ZERO, TxParams::new())
            .await
            .is_err());
        assert_eq!(mock.sent_transactions().len(), 1);
    }
}
