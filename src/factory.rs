//! Builds wrappers that share one provider and one set of defaults.

use crate::abi;
use crate::address::Address;
use crate::contract::Contract;
use crate::contracts::erc20::Erc20;
use crate::contracts::polymath_registry::{PolymathRegistry, RegistryKey};
use crate::contracts::security_token::SecurityToken;
use crate::contracts::security_token_registry::SecurityTokenRegistry;
use crate::error::{Error, Result};
use crate::modules::capped_sto::CappedSto;
use crate::modules::count_transfer_manager::CountTransferManager;
use crate::modules::general_transfer_manager::GeneralTransferManager;
use crate::modules::manual_approval_transfer_manager::ManualApprovalTransferManager;
use crate::modules::module_factory::ModuleFactory;
use crate::modules::percentage_transfer_manager::PercentageTransferManager;
use crate::modules::usd_tiered_sto::UsdTieredSto;
use crate::modules::weighted_vote_checkpoint::WeightedVoteCheckpoint;
use crate::network::Provider;
use crate::transaction_builder::TxDefaults;
use ethabi::Contract as Abi;
use std::sync::Arc;
use tracing::debug;

/// Entry point of the library: hands out wrappers of contracts reached
/// through the same provider.
///
/// Core contracts are found through the `PolymathRegistry` when its
/// address is known.
#[derive(Clone, Debug)]
pub struct ContractFactory {
    provider: Arc<dyn Provider>,
    defaults: Arc<TxDefaults>,
    registry: Option<Address>,
}

impl ContractFactory {
    pub fn new(provider: Arc<dyn Provider>, defaults: TxDefaults) -> Self {
        //! Factory without a registry. Only wrappers by address are available
        //! until [`ContractFactory::with_registry`] is applied.
        Self {
            provider,
            defaults: Arc::new(defaults),
            registry: None,
        }
    }

    #[must_use]
    pub const fn with_registry(mut self, registry: Address) -> Self {
        //! Address of the `PolymathRegistry` of the deployment.
        self.registry = Some(registry);
        self
    }

    #[cfg(feature = "http")]
    pub fn from_config(
        config: &crate::config::ClientConfig,
    ) -> std::result::Result<Self, crate::config::ConfigError> {
        //! Factory talking JSON-RPC to the configured node.
        Ok(Self::new(config.provider()?, config.tx_defaults.clone())
            .with_registry(config.registry_address))
    }

    pub const fn provider(&self) -> &Arc<dyn Provider> {
        //! Provider shared by every wrapper.
        &self.provider
    }

    pub fn defaults(&self) -> &TxDefaults {
        //! Transaction defaults shared by every wrapper.
        &self.defaults
    }

    pub fn contract(&self, address: Address, abi: &'static Abi) -> Contract {
        //! Raw handle for contracts without a dedicated wrapper.
        Contract::new(address, abi, self.provider.clone(), self.defaults.clone())
    }

    pub fn polymath_registry(&self) -> Result<PolymathRegistry> {
        //! Registry of the deployment. Fails when no registry is configured.
        let address = self
            .registry
            .ok_or_else(|| Error::Precondition("Registry address is not configured".to_string()))?;
        Ok(PolymathRegistry::new(
            address,
            self.provider.clone(),
            self.defaults.clone(),
        ))
    }

    async fn resolve(&self, key: RegistryKey) -> Result<Address> {
        self.polymath_registry()?.get_address(key).await
    }

    pub async fn poly_token(&self) -> Result<Erc20> {
        //! POLY token as registered in the registry.
        Ok(self.erc20(self.resolve(RegistryKey::PolyToken).await?))
    }

    pub async fn security_token_registry(&self) -> Result<SecurityTokenRegistry> {
        //! Ticker and token registry as registered in the registry.
        let address = self.resolve(RegistryKey::SecurityTokenRegistry).await?;
        Ok(SecurityTokenRegistry::new(
            address,
            self.provider.clone(),
            self.defaults.clone(),
        ))
    }

    pub async fn security_token_by_ticker(&self, ticker: &str) -> Result<SecurityToken> {
        //! Token deployed for `ticker`, failing when there is none.
        let address = self
            .security_token_registry()
            .await?
            .get_security_token_address(ticker)
            .await?;
        if address.is_zero() {
            return Err(Error::Precondition(format!(
                "No security token deployed for ticker {ticker:?}"
            )));
        }
        debug!(ticker, %address, "Resolved security token");
        Ok(self.security_token(address))
    }

    pub fn erc20(&self, address: Address) -> Erc20 {
        //! Any detailed ERC20 token.
        Erc20::new(address, self.provider.clone(), self.defaults.clone())
    }

    pub fn security_token(&self, address: Address) -> SecurityToken {
        //! Security token at `address`.
        SecurityToken::new(address, self.provider.clone(), self.defaults.clone())
    }

    pub fn module_factory(&self, address: Address) -> ModuleFactory {
        //! Module factory at `address`.
        ModuleFactory::new(address, self.provider.clone(), self.defaults.clone())
    }

    pub async fn general_transfer_manager(
        &self,
        address: Address,
    ) -> Result<GeneralTransferManager> {
        //! Wrapper matching the release of the deployed module, read from
        //! the version string of its factory.
        let factory: Address = self
            .contract(address, &abi::MODULE)
            .call("factory", &[])
            .await?
            .single()?;
        let version = self.module_factory(factory).version().await?;
        debug!(%address, %version, "Detected general transfer manager release");
        Ok(GeneralTransferManager::new(
            address,
            version,
            self.provider.clone(),
            self.defaults.clone(),
        ))
    }

    pub fn count_transfer_manager(&self, address: Address) -> CountTransferManager {
        //! Count transfer manager at `address`.
        CountTransferManager::new(address, self.provider.clone(), self.defaults.clone())
    }

    pub fn percentage_transfer_manager(&self, address: Address) -> PercentageTransferManager {
        //! Percentage transfer manager at `address`.
        PercentageTransferManager::new(address, self.provider.clone(), self.defaults.clone())
    }

    pub fn manual_approval_transfer_manager(
        &self,
        address: Address,
    ) -> ManualApprovalTransferManager {
        //! Manual approval transfer manager at `address`.
        ManualApprovalTransferManager::new(address, self.provider.clone(), self.defaults.clone())
    }

    pub fn capped_sto(&self, address: Address) -> CappedSto {
        //! Capped offering at `address`.
        CappedSto::new(address, self.provider.clone(), self.defaults.clone())
    }

    pub fn usd_tiered_sto(&self, address: Address) -> UsdTieredSto {
        //! USD tiered offering at `address`.
        UsdTieredSto::new(address, self.provider.clone(), self.defaults.clone())
    }

    pub fn weighted_vote_checkpoint(&self, address: Address) -> WeightedVoteCheckpoint {
        //! Weighted vote checkpoint at `address`.
        WeightedVoteCheckpoint::new(address, self.provider.clone(), self.defaults.clone())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::mock::MockProvider;
    use crate::version::ContractVersion;
    use ethabi::Token;

    const REGISTRY: Address = Address::new([0x01; 20]);
    const STR: Address = Address::new([0x02; 20]);

    fn factory(mock: &Arc<MockProvider>) -> ContractFactory {
        ContractFactory::new(mock.clone(), TxDefaults::default()).with_registry(REGISTRY)
    }

    #[tokio::test]
    async fn test_missing_registry() {
        let mock = Arc::new(MockProvider::new());
        let factory = ContractFactory::new(mock, TxDefaults::default());
        assert!(matches!(
            factory.poly_token().await,
            Err(Error::Precondition(_))
        ));
    }

    #[tokio::test]
    async fn test_token_by_ticker() {
        let mock = Arc::new(MockProvider::new());
        let token = Address::from([0x03; 20]);
        mock.mock_call_with_args(
            REGISTRY,
            "getAddress(string)",
            &[Token::String("SecurityTokenRegistry".to_string())],
            &[STR.into()],
        );
        mock.mock_call_with_args(
            STR,
            "getSecurityTokenAddress(string)",
            &[Token::String("ACME".to_string())],
            &[token.into()],
        );
        mock.mock_call(STR, "getSecurityTokenAddress(string)", &[Address::ZERO.into()]);

        let factory = factory(&mock);
        assert_eq!(
            factory.security_token_by_ticker("acme").await.unwrap().address(),
            token
        );
        assert!(matches!(
            factory.security_token_by_ticker("NONE").await,
            Err(Error::Precondition(message)) if message.contains("NONE")
        ));
    }

    #[tokio::test]
    async fn test_detects_transfer_manager_release() {
        let mock = Arc::new(MockProvider::new());
        let gtm = Address::from([0x04; 20]);
        let module_factory = Address::from([0x05; 20]);
        mock.mock_call(gtm, "factory()", &[module_factory.into()]);
        mock.mock_call(module_factory, "version()", &[Token::String("2.1.0".to_string())]);

        let factory = factory(&mock);
        let manager = factory.general_transfer_manager(gtm).await.unwrap();
        assert_eq!(manager.version(), ContractVersion::V2_0);

        mock.mock_call(module_factory, "version()", &[Token::String("3.1.0".to_string())]);
        let manager = factory.general_transfer_manager(gtm).await.unwrap();
        assert_eq!(manager.version(), ContractVersion::V3_1);
    }
}
