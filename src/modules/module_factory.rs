//! `ModuleFactory`: metadata and setup cost of deployable modules.

use crate::abi;
use crate::address::Address;
use crate::contract::Contract;
use crate::conversions::{bytes32_to_string, from_wei};
use crate::error::{Error, Result};
use crate::modules::{module_types, ModuleType};
use crate::network::Provider;
use crate::transaction_builder::TxDefaults;
use crate::version::ContractVersion;
use rust_decimal::Decimal;
use std::sync::Arc;

/// Everything a factory tells about its modules.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FactoryDetails {
    /// Module name as stored on-chain
    pub name: String,
    /// Human readable title
    pub title: String,
    /// Module description
    pub description: String,
    /// Release of the deployed modules
    pub version: ContractVersion,
    /// POLY paid to deploy a module
    pub setup_cost: Decimal,
    /// Module kinds this factory deploys
    pub types: Vec<ModuleType>,
    /// Search tags
    pub tags: Vec<String>,
}

/// Wrapper of a module factory contract.
#[derive(Clone, Debug)]
pub struct ModuleFactory {
    contract: Contract,
}

impl ModuleFactory {
    pub fn new(address: Address, provider: Arc<dyn Provider>, defaults: Arc<TxDefaults>) -> Self {
        //! Wrapper of the factory deployed at `address`.
        Self::from_contract(Contract::new(
            address,
            &abi::MODULE_FACTORY,
            provider,
            defaults,
        ))
    }

    pub(crate) const fn from_contract(contract: Contract) -> Self {
        Self { contract }
    }

    pub const fn contract(&self) -> &Contract {
        //! Underlying contract handle.
        &self.contract
    }

    pub const fn address(&self) -> Address {
        //! Factory address.
        self.contract.address()
    }

    pub async fn name(&self) -> Result<String> {
        //! On-chain module name.
        let name: [u8; 32] = self.contract.call("name", &[]).await?.single()?;
        Ok(bytes32_to_string(&name))
    }

    pub async fn title(&self) -> Result<String> {
        //! Human readable title.
        self.contract.call("title", &[]).await?.single()
    }

    pub async fn description(&self) -> Result<String> {
        //! Module description.
        self.contract.call("description", &[]).await?.single()
    }

    pub async fn version(&self) -> Result<ContractVersion> {
        //! Release of the modules this factory deploys.
        let raw: String = self.contract.call("version", &[]).await?.single()?;
        raw.parse().map_err(|e| Error::UnexpectedOutput {
            function: "version".to_string(),
            reason: format!("{e}"),
        })
    }

    pub async fn setup_cost(&self) -> Result<Decimal> {
        //! POLY charged per deployed module.
        let cost = self.contract.call("setupCostInPoly", &[]).await?.single()?;
        Ok(from_wei(cost)?)
    }

    pub async fn get_types(&self) -> Result<Vec<ModuleType>> {
        //! Module kinds this factory deploys.
        module_types("getTypes", self.contract.call("getTypes", &[]).await?.single()?)
    }

    pub async fn get_tags(&self) -> Result<Vec<String>> {
        //! Search tags.
        let tags: Vec<[u8; 32]> = self.contract.call("getTags", &[]).await?.single()?;
        Ok(tags.iter().map(|tag| bytes32_to_string(tag)).collect())
    }

    pub async fn owner(&self) -> Result<Address> {
        //! Factory owner.
        self.contract.call("owner", &[]).await?.single()
    }

    pub async fn details(&self) -> Result<FactoryDetails> {
        //! All metadata in one record.
        Ok(FactoryDetails {
            name: self.name().await?,
            title: self.title().await?,
            description: self.description().await?,
            version: self.version().await?,
            setup_cost: self.setup_cost().await?,
            types: self.get_types().await?,
            tags: self.get_tags().await?,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::conversions::string_to_bytes32;
    use crate::mock::MockProvider;
    use ethabi::Token;
    use ethereum_types::U256;
    use rust_decimal_macros::dec;

    fn bytes32(text: &str) -> Token {
        Token::FixedBytes(string_to_bytes32(text).unwrap().to_vec())
    }

    #[tokio::test]
    async fn test_details() {
        let mock = Arc::new(MockProvider::new());
        let factory = ModuleFactory::new(
            Address::from([0x0f; 20]),
            mock.clone(),
            Arc::default(),
        );
        let at = factory.address();
        mock.mock_call(at, "name()", &[bytes32("CountTransferManager")]);
        mock.mock_call(at, "title()", &[Token::String("Count".to_string())]);
        mock.mock_call(at, "description()", &[Token::String("Limits holders".to_string())]);
        mock.mock_call(at, "version()", &[Token::String("3.0.0".to_string())]);
        mock.mock_call(at, "setupCostInPoly()", &[Token::Uint(U256::exp10(18) * 25)]);
        mock.mock_call(at, "getTypes()", &[Token::Array(vec![Token::Uint(2.into())])]);
        mock.mock_call(
            at,
            "getTags()",
            &[Token::Array(vec![bytes32("Count"), bytes32("Transfer Restriction")])],
        );

        assert_eq!(
            factory.details().await.unwrap(),
            FactoryDetails {
                name: "CountTransferManager".to_string(),
                title: "Count".to_string(),
                description: "Limits holders".to_string(),
                version: ContractVersion::V3_0,
                setup_cost: dec!(25),
                types: vec![ModuleType::Transfer],
                tags: vec!["Count".to_string(), "Transfer Restriction".to_string()],
            }
        );
    }

    #[tokio::test]
    async fn test_unknown_version() {
        let mock = Arc::new(MockProvider::new());
        let factory = ModuleFactory::new(Address::from([0x0f; 20]), mock.clone(), Arc::default());
        mock.mock_call(
            factory.address(),
            "version()",
            &[Token::String("1.0.0".to_string())],
        );
        assert!(matches!(
            factory.version().await,
            Err(Error::UnexpectedOutput { function, .. }) if function == "version"
        ));
    }
}
