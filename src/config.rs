//! Client configuration read from TOML.
//!
//! ```toml
//! rpc_url = "http://localhost:8545"
//! registry_address = "0x5b215a7d39ee305ad28da29bf2f0425c6c2a00b3"
//!
//! [tx_defaults]
//! gas_safety_factor = 1.5
//! confirmation_timeout_secs = 300
//!
//! [wallet]
//! mnemonic = "ignore empty bird silly journey junior ripple have guard waste between tenant"
//! index = 0
//! ```

use crate::address::Address;
use crate::hdnode::HDNodeError;
use crate::signer::LocalWallet;
use crate::transaction_builder::TxDefaults;
use serde::Deserialize;
use std::fmt;
use std::path::Path;
use url::Url;

/// Configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File could not be read.
    #[error("cannot read configuration: {0}")]
    Io(#[from] std::io::Error),
    /// Invalid TOML or unknown keys.
    #[error("invalid configuration: {0}")]
    Toml(#[from] toml::de::Error),
    /// Wallet section does not describe a usable key.
    #[error("invalid wallet: {0}")]
    Wallet(#[from] HDNodeError),
    /// Values are well-formed but unusable together.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Local signing key derived from a mnemonic.
#[derive(Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WalletConfig {
    /// BIP-39 phrase
    pub mnemonic: String,
    /// Optional BIP-39 password
    #[serde(default)]
    pub password: String,
    /// Account index on the default Ethereum path
    #[serde(default)]
    pub index: u32,
}

impl fmt::Debug for WalletConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WalletConfig")
            .field("index", &self.index)
            .finish_non_exhaustive()
    }
}

impl WalletConfig {
    pub fn wallet(&self) -> Result<LocalWallet, ConfigError> {
        //! Derive the signing wallet.
        Ok(LocalWallet::from_mnemonic(
            &self.mnemonic,
            &self.password,
            self.index,
        )?)
    }
}

/// Everything needed to talk to a deployment.
#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClientConfig {
    /// JSON-RPC endpoint
    pub rpc_url: Url,
    /// Address of the `PolymathRegistry` contract
    pub registry_address: Address,
    /// Transaction defaults
    #[serde(default)]
    pub tx_defaults: TxDefaults,
    /// Enables local signing when present
    #[serde(default)]
    pub wallet: Option<WalletConfig>,
}

impl ClientConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        //! Parse and validate a TOML document.
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        //! Read and parse a TOML file.
        Self::from_toml_str(&std::fs::read_to_string(path)?)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.registry_address.is_zero() {
            return Err(ConfigError::Invalid(
                "registry_address must not be the zero address".to_string(),
            ));
        }
        if self.tx_defaults.gas_safety_factor < rust_decimal::Decimal::ONE {
            return Err(ConfigError::Invalid(
                "gas_safety_factor must be at least 1".to_string(),
            ));
        }
        if self.tx_defaults.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "poll_interval_ms must be positive".to_string(),
            ));
        }
        Ok(())
    }

    #[cfg(feature = "http")]
    pub fn provider(&self) -> Result<std::sync::Arc<dyn crate::network::Provider>, ConfigError> {
        //! JSON-RPC provider for `rpc_url`, signing locally when a wallet is
        //! configured.
        let http = crate::network::HttpProvider::new(self.rpc_url.clone());
        Ok(match &self.wallet {
            Some(wallet) => std::sync::Arc::new(crate::signer::SigningProvider::new(
                http,
                wallet.wallet()?,
            )),
            None => std::sync::Arc::new(http),
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use rust_decimal_macros::dec;

    const REGISTRY: &str = "0x5b215a7d39ee305ad28da29bf2f0425c6c2a00b3";

    #[test]
    fn test_minimal() {
        let config = ClientConfig::from_toml_str(&format!(
            "rpc_url = \"http://localhost:8545\"\nregistry_address = \"{REGISTRY}\"\n"
        ))
        .unwrap();
        assert_eq!(config.rpc_url.as_str(), "http://localhost:8545/");
        assert_eq!(config.registry_address, REGISTRY.parse().unwrap());
        assert_eq!(config.tx_defaults, TxDefaults::default());
        assert!(config.wallet.is_none());
    }

    #[test]
    fn test_full() {
        let config = ClientConfig::from_toml_str(&format!(
            r#"
            rpc_url = "https://node.example.com/rpc"
            registry_address = "{REGISTRY}"

            [tx_defaults]
            from = "0x1111111111111111111111111111111111111111"
            gas_price = "0x4a817c800"
            gas_safety_factor = "1.5"
            confirmation_timeout_secs = 30
            poll_interval_ms = 250

            [wallet]
            mnemonic = "ignore empty bird silly journey junior ripple have guard waste between tenant"
            password = "secret"
            index = 2
            "#
        ))
        .unwrap();
        let defaults = &config.tx_defaults;
        assert_eq!(defaults.from, Some(Address::from([0x11; 20])));
        assert_eq!(defaults.gas_price, Some(20_000_000_000u64.into()));
        assert_eq!(defaults.gas_safety_factor, dec!(1.5));
        assert_eq!(defaults.confirmation_timeout().as_secs(), 30);
        assert_eq!(defaults.poll_interval().as_millis(), 250);

        let wallet = config.wallet.as_ref().unwrap();
        assert_eq!(wallet.index, 2);
        assert!(!format!("{wallet:?}").contains("ignore"));
        assert!(wallet.wallet().is_ok());
    }

    #[test]
    fn test_rejects_bad_values() {
        let zero = ClientConfig::from_toml_str(
            "rpc_url = \"http://localhost:8545\"\nregistry_address = \"0x0000000000000000000000000000000000000000\"\n",
        );
        assert!(matches!(zero, Err(ConfigError::Invalid(_))));

        let factor = ClientConfig::from_toml_str(&format!(
            "rpc_url = \"http://localhost:8545\"\nregistry_address = \"{REGISTRY}\"\n[tx_defaults]\ngas_safety_factor = \"0.9\"\n"
        ));
        assert!(matches!(factor, Err(ConfigError::Invalid(_))));

        let unknown = ClientConfig::from_toml_str(&format!(
            "rpc_url = \"http://localhost:8545\"\nregistry_address = \"{REGISTRY}\"\ncolour = 1\n"
        ));
        assert!(matches!(unknown, Err(ConfigError::Toml(_))));
    }

    #[test]
    fn test_bad_mnemonic() {
        let config = ClientConfig::from_toml_str(&format!(
            "rpc_url = \"http://localhost:8545\"\nregistry_address = \"{REGISTRY}\"\n[wallet]\nmnemonic = \"not a phrase\"\n"
        ))
        .unwrap();
        assert!(matches!(
            config.wallet.unwrap().wallet(),
            Err(ConfigError::Wallet(_))
        ));
    }
}
