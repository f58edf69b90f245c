//! Modules attached to security tokens.
//!
//! Every module contract shares a small surface (owning token, factory,
//! permissions and pausing) exposed through the [`Module`] trait. The
//! wrappers of the individual modules add their own functions on top.

pub mod capped_sto;
pub mod count_transfer_manager;
pub mod general_transfer_manager;
pub mod manual_approval_transfer_manager;
pub mod module_factory;
pub mod percentage_transfer_manager;
pub mod usd_tiered_sto;
pub mod weighted_vote_checkpoint;

use crate::abi;
use crate::address::Address;
use crate::assertions::{ensure, is_owner};
use crate::contract::Contract;
use crate::contracts::erc20::Erc20;
use crate::contracts::security_token::SecurityToken;
use crate::conversions::bytes32_to_string;
use crate::error::{Error, Result};
use crate::transaction_builder::{PendingTransaction, TxParams};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use module_factory::ModuleFactory;

/// Kind of a module, as stored by the token.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
#[repr(u8)]
pub enum ModuleType {
    /// Delegated permissions
    Permission = 1,
    /// Transfer restrictions
    Transfer = 2,
    /// Security token offerings
    Sto = 3,
    /// Dividends and voting checkpoints
    Dividends = 4,
    /// Token burning
    Burn = 5,
    /// On-chain data storage
    Data = 6,
    /// Vesting and other wallets
    Wallet = 7,
}

impl TryFrom<u8> for ModuleType {
    type Error = u8;

    fn try_from(value: u8) -> std::result::Result<Self, Self::Error> {
        Ok(match value {
            1 => Self::Permission,
            2 => Self::Transfer,
            3 => Self::Sto,
            4 => Self::Dividends,
            5 => Self::Burn,
            6 => Self::Data,
            7 => Self::Wallet,
            other => return Err(other),
        })
    }
}

pub(crate) fn module_types(function: &str, raw: Vec<u8>) -> Result<Vec<ModuleType>> {
    raw.into_iter()
        .map(|value| {
            ModuleType::try_from(value).map_err(|_| Error::UnexpectedOutput {
                function: function.to_string(),
                reason: format!("unknown module type {value}"),
            })
        })
        .collect()
}

/// Currency accepted by an offering.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
#[repr(u8)]
pub enum FundRaiseType {
    /// Ether
    Eth = 0,
    /// POLY token
    Poly = 1,
    /// USD stable coins
    StableCoin = 2,
}

impl FundRaiseType {
    /// All currencies in on-chain order.
    pub const ALL: [Self; 3] = [Self::Eth, Self::Poly, Self::StableCoin];
}

/// Investor flag of 3.x general transfer managers.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
#[repr(u8)]
pub enum InvestorFlag {
    /// Investor is accredited
    IsAccredited = 0,
    /// Investor may not buy from offerings
    CanNotBuyFromSto = 1,
    /// Investor is subject to volume restrictions
    IsVolRestricted = 2,
}

/// Functions shared by every module.
#[async_trait]
pub trait Module: Send + Sync {
    /// Underlying contract handle.
    fn contract(&self) -> &Contract;

    /// Token this module is attached to.
    async fn security_token(&self) -> Result<SecurityToken> {
        let address = self.contract().call("securityToken", &[]).await?.single()?;
        Ok(SecurityToken::from_contract(
            self.contract().at(address, &abi::SECURITY_TOKEN),
        ))
    }

    /// Factory that deployed this module.
    async fn factory(&self) -> Result<ModuleFactory> {
        let address = self.contract().call("factory", &[]).await?.single()?;
        Ok(ModuleFactory::from_contract(
            self.contract().at(address, &abi::MODULE_FACTORY),
        ))
    }

    /// POLY token used by this module.
    async fn poly_token(&self) -> Result<Erc20> {
        let address = self.contract().call("polyToken", &[]).await?.single()?;
        Ok(Erc20::from_contract(self.contract().at(address, &abi::ERC20)))
    }

    /// Names of the permissions this module checks.
    async fn get_permissions(&self) -> Result<Vec<String>> {
        let raw: Vec<[u8; 32]> = self
            .contract()
            .call("getPermissions", &[])
            .await?
            .single()?;
        Ok(raw.iter().map(|name| bytes32_to_string(name)).collect())
    }

    /// Whether the module is paused.
    async fn paused(&self) -> Result<bool> {
        self.contract().call("paused", &[]).await?.single()
    }

    /// Pause the module. Token owner only.
    async fn pause(&self, params: TxParams) -> Result<PendingTransaction> {
        ensure(!self.paused().await?, "Module is already paused")?;
        token_owner(self, &params).await?;
        self.contract().send("pause", &[], params).await
    }

    /// Resume a paused module. Token owner only.
    async fn unpause(&self, params: TxParams) -> Result<PendingTransaction> {
        ensure(self.paused().await?, "Module is not paused")?;
        token_owner(self, &params).await?;
        self.contract().send("unpause", &[], params).await
    }
}

pub(crate) async fn token_owner<M: Module + ?Sized>(
    module: &M,
    params: &TxParams,
) -> Result<Address> {
    //! Sender of `params`, required to own the module's token.
    let sender = module.contract().sender(params).await?;
    is_owner(module.security_token().await?.owner().await?, sender)?;
    Ok(sender)
}

pub(crate) fn ensure_open(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<()> {
    let now = Utc::now();
    ensure(now >= start, "Offering has not started yet")?;
    ensure(now < end, "Offering is closed")
}

pub(crate) fn ensure_not_started(start: DateTime<Utc>) -> Result<()> {
    ensure(Utc::now() < start, "Offering has already started")
}

pub(crate) fn ensure_beneficiary(
    beneficiary: Address,
    sender: Address,
    beneficial_investments: bool,
) -> Result<()> {
    //! Buying for someone else needs beneficial investments enabled.
    crate::assertions::non_zero_address(beneficiary, "Beneficiary")?;
    ensure(
        beneficial_investments || beneficiary == sender,
        "Beneficiary must be the sender unless beneficial investments are allowed",
    )
}

#[cfg(test)]
pub(crate) mod testing {
    //! Shared fixtures for module wrapper tests.

    use crate::address::Address;
    use crate::mock::MockProvider;
    use crate::transaction_builder::TxDefaults;
    use ethabi::Token;
    use std::sync::Arc;

    pub const MODULE: Address = Address::new([0x0c; 20]);
    pub const TOKEN: Address = Address::new([0x01; 20]);
    pub const POLY: Address = Address::new([0x09; 20]);
    pub const FACTORY: Address = Address::new([0x0f; 20]);
    pub const OWNER: Address = Address::new([0x0a; 20]);

    pub fn defaults() -> Arc<TxDefaults> {
        Arc::new(TxDefaults {
            from: Some(OWNER),
            ..Default::default()
        })
    }

    pub fn mock() -> Arc<MockProvider> {
        //! Module attached to a token owned by [`OWNER`], not paused.
        let mock = Arc::new(MockProvider::new());
        mock.mock_call(MODULE, "securityToken()", &[TOKEN.into()]);
        mock.mock_call(MODULE, "factory()", &[FACTORY.into()]);
        mock.mock_call(MODULE, "polyToken()", &[POLY.into()]);
        mock.mock_call(MODULE, "paused()", &[Token::Bool(false)]);
        mock.mock_call(TOKEN, "owner()", &[OWNER.into()]);
        mock.mock_call(TOKEN, "decimals()", &[Token::Uint(18.into())]);
        mock.mock_call(TOKEN, "currentCheckpointId()", &[Token::Uint(3.into())]);
        mock.mock_call(POLY, "decimals()", &[Token::Uint(18.into())]);
        mock
    }
}
