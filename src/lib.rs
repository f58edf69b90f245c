#![doc(html_root_url = "https://docs.rs/polymath-wrappers/0.1.0")]
#![warn(rust_2018_idioms, missing_docs)]
#![deny(dead_code, unused_imports, unused_mut)]

//! Typed async client for the Polymath security token contracts.
//!
//! Every contract gets a wrapper with one method per contract function.
//! Amounts are [`rust_decimal::Decimal`] in whole tokens, dates are
//! [`chrono::DateTime<Utc>`](chrono::DateTime). State-changing methods
//! check the same conditions the contract would and fail with
//! [`Error::Precondition`] before anything is sent.
//!
//! ## Usage
//!
//! Wrappers are handed out by a [`ContractFactory`], which resolves core
//! contracts through the `PolymathRegistry`.
//!
//! ```rust,no_run
//! use polymath_wrappers::config::ClientConfig;
//! use polymath_wrappers::transaction_builder::TxParams;
//! use polymath_wrappers::ContractFactory;
//! use rust_decimal::Decimal;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ClientConfig::from_file("polymath.toml")?;
//! let factory = ContractFactory::from_config(&config)?;
//!
//! let token = factory.security_token_by_ticker("ACME").await?;
//! println!("{} holds {}", token.address(), token.total_supply().await?);
//!
//! let investor = "0x7567d83b7b8d80addcb281a71d54fc7b3364ffed".parse()?;
//! let pending = token
//!     .transfer(investor, Decimal::new(15, 1), TxParams::new())
//!     .await?;
//! let receipt = pending.confirmed().await?;
//! println!("mined in block {:?}", receipt.block_number);
//! # Ok(())
//! # }
//! ```
//!
//! Tests run against [`mock::MockProvider`], which answers calls with
//! canned outputs and records everything sent.
//!
//! ### MSRV
//!
//! Currently it requires rust `1.81.0` or higher to build.
//!
//! ## License
//!
//! Licensed under the Lesser GNU General Public License v3.

pub mod abi;
mod address;
pub use address::{Address, AddressConvertible, PrivateKey, PublicKey};
pub mod assertions;
pub mod config;
pub mod contract;
pub mod contracts;
pub mod conversions;
mod error;
pub use error::{Error, ProviderError, Result};
mod factory;
pub use factory::ContractFactory;
pub mod hdnode;
pub mod mock;
pub mod modules;
pub mod network;
pub mod signer;
pub mod transaction_builder;
pub mod transactions;
mod utils;
pub use utils::{keccak, selector};
pub mod version;
pub use version::ContractVersion;

pub use ethereum_types::{H256, U256};
