//! Detailed ERC20 tokens: POLY, stable coins and the ERC20 surface of
//! security tokens.
//!
//! Amounts are [`Decimal`]s in whole tokens, scaled by `decimals()` of the
//! token on every call.

use crate::abi;
use crate::address::Address;
use crate::assertions::{
    non_zero_address, positive_amount, sufficient_allowance, sufficient_balance,
};
use crate::contract::{tokens, Contract};
use crate::conversions::{from_base_units, to_base_units};
use crate::error::Result;
use crate::network::Provider;
use crate::transaction_builder::{PendingTransaction, TxDefaults, TxParams};
use ethereum_types::U256;
use rust_decimal::Decimal;
use std::sync::Arc;

/// Wrapper of an ERC20 token contract.
#[derive(Clone, Debug)]
pub struct Erc20 {
    contract: Contract,
}

impl Erc20 {
    pub fn new(address: Address, provider: Arc<dyn Provider>, defaults: Arc<TxDefaults>) -> Self {
        //! Wrapper of the token deployed at `address`.
        Self::from_contract(Contract::new(address, &abi::ERC20, provider, defaults))
    }

    pub(crate) const fn from_contract(contract: Contract) -> Self {
        //! `contract` must expose the ERC20 functions.
        Self { contract }
    }

    pub const fn contract(&self) -> &Contract {
        //! Underlying contract handle.
        &self.contract
    }

    pub const fn address(&self) -> Address {
        //! Token address.
        self.contract.address()
    }

    pub async fn name(&self) -> Result<String> {
        //! Token name.
        self.contract.call("name", &[]).await?.single()
    }

    pub async fn symbol(&self) -> Result<String> {
        //! Token symbol.
        self.contract.call("symbol", &[]).await?.single()
    }

    pub async fn decimals(&self) -> Result<u8> {
        //! Number of decimals of base units.
        self.contract.call("decimals", &[]).await?.single()
    }

    pub async fn to_units(&self, amount: Decimal) -> Result<U256> {
        //! Scale `amount` into base units of this token.
        Ok(to_base_units(amount, self.decimals().await?)?)
    }

    pub async fn from_units(&self, value: U256) -> Result<Decimal> {
        //! Unscale base units of this token.
        Ok(from_base_units(value, self.decimals().await?)?)
    }

    pub async fn total_supply(&self) -> Result<Decimal> {
        //! Total supply in whole tokens.
        let supply = self.contract.call("totalSupply", &[]).await?.single()?;
        self.from_units(supply).await
    }

    pub async fn balance_of(&self, owner: Address) -> Result<Decimal> {
        //! Balance of `owner` in whole tokens.
        let balance = self
            .contract
            .call("balanceOf", &[owner.into()])
            .await?
            .single()?;
        self.from_units(balance).await
    }

    pub async fn allowance(&self, owner: Address, spender: Address) -> Result<Decimal> {
        //! Amount `spender` may move from `owner`.
        let allowance = self
            .contract
            .call("allowance", &[owner.into(), spender.into()])
            .await?
            .single()?;
        self.from_units(allowance).await
    }

    pub async fn approve(
        &self,
        spender: Address,
        amount: Decimal,
        params: TxParams,
    ) -> Result<PendingTransaction> {
        //! Allow `spender` to move up to `amount` from the sender.
        non_zero_address(spender, "Spender")?;
        let value = self.to_units(amount).await?;
        self.contract
            .send("approve", &[spender.into(), tokens::uint(value)], params)
            .await
    }

    pub async fn transfer(
        &self,
        to: Address,
        amount: Decimal,
        params: TxParams,
    ) -> Result<PendingTransaction> {
        //! Send `amount` to `to`. The sender must hold enough.
        non_zero_address(to, "Recipient")?;
        let value = self.to_units(amount).await?;
        let sender = self.contract.sender(&params).await?;
        sufficient_balance(self.balance_of(sender).await?, amount)?;
        self.contract
            .send("transfer", &[to.into(), tokens::uint(value)], params)
            .await
    }

    pub async fn transfer_from(
        &self,
        from: Address,
        to: Address,
        amount: Decimal,
        params: TxParams,
    ) -> Result<PendingTransaction> {
        //! Move tokens of `from` using the sender's allowance.
        non_zero_address(to, "Recipient")?;
        let value = self.to_units(amount).await?;
        let sender = self.contract.sender(&params).await?;
        sufficient_balance(self.balance_of(from).await?, amount)?;
        sufficient_allowance(self.allowance(from, sender).await?, amount)?;
        self.contract
            .send(
                "transferFrom",
                &[from.into(), to.into(), tokens::uint(value)],
                params,
            )
            .await
    }

    pub async fn increase_approval(
        &self,
        spender: Address,
        amount: Decimal,
        params: TxParams,
    ) -> Result<PendingTransaction> {
        //! Raise the allowance of `spender` by `amount`.
        non_zero_address(spender, "Spender")?;
        positive_amount(amount, "Approval increase")?;
        let value = self.to_units(amount).await?;
        self.contract
            .send(
                "increaseApproval",
                &[spender.into(), tokens::uint(value)],
                params,
            )
            .await
    }

    pub async fn decrease_approval(
        &self,
        spender: Address,
        amount: Decimal,
        params: TxParams,
    ) -> Result<PendingTransaction> {
        //! Fails when `amount` exceeds the current allowance.
        non_zero_address(spender, "Spender")?;
        positive_amount(amount, "Approval decrease")?;
        let value = self.to_units(amount).await?;
        let sender = self.contract.sender(&params).await?;
        sufficient_allowance(self.allowance(sender, spender).await?, amount)?;
        self.contract
            .send(
                "decreaseApproval",
                &[spender.into(), tokens::uint(value)],
                params,
            )
            .await
    }
}
