//! `PercentageTransferManager`: caps the share of supply a holder may own.

use crate::abi;
use crate::address::Address;
use crate::assertions::{ensure, equal_lengths, non_zero_address, percentage_in_range};
use crate::contract::{tokens, Contract};
use crate::conversions::{percentage_to_u256, u256_to_percentage};
use crate::error::Result;
use crate::modules::Module;
use crate::network::Provider;
use crate::transaction_builder::{PendingTransaction, TxDefaults, TxParams};
use ethabi::Token;
use rust_decimal::Decimal;
use std::sync::Arc;

/// Wrapper of a `PercentageTransferManager` module.
#[derive(Clone, Debug)]
pub struct PercentageTransferManager {
    contract: Contract,
}

impl Module for PercentageTransferManager {
    fn contract(&self) -> &Contract {
        &self.contract
    }
}

impl PercentageTransferManager {
    pub fn new(address: Address, provider: Arc<dyn Provider>, defaults: Arc<TxDefaults>) -> Self {
        //! Wrapper of the module deployed at `address`.
        Self {
            contract: Contract::new(
                address,
                &abi::PERCENTAGE_TRANSFER_MANAGER,
                provider,
                defaults,
            ),
        }
    }

    pub const fn address(&self) -> Address {
        //! Module address.
        self.contract.address()
    }

    pub async fn max_holder_percentage(&self) -> Result<Decimal> {
        //! Percentage of the supply, `12.5` for 12.5%.
        let raw = self
            .contract
            .call("maxHolderPercentage", &[])
            .await?
            .single()?;
        Ok(u256_to_percentage(raw)?)
    }

    pub async fn allow_primary_issuance(&self) -> Result<bool> {
        //! Whether issuance may exceed the cap.
        self.contract
            .call("allowPrimaryIssuance", &[])
            .await?
            .single()
    }

    pub async fn whitelist(&self, investor: Address) -> Result<bool> {
        //! Whitelisted investors are exempt from the cap.
        self.contract
            .call("whitelist", &[investor.into()])
            .await?
            .single()
    }

    pub async fn change_holder_percentage(
        &self,
        percentage: Decimal,
        params: TxParams,
    ) -> Result<PendingTransaction> {
        //! Set the cap, a percentage in `(0, 100]`.
        percentage_in_range(percentage, "Holder percentage")?;
        self.contract
            .send(
                "changeHolderPercentage",
                &[tokens::uint(percentage_to_u256(percentage)?)],
                params,
            )
            .await
    }

    pub async fn set_allow_primary_issuance(
        &self,
        allow: bool,
        params: TxParams,
    ) -> Result<PendingTransaction> {
        //! Toggle the issuance exemption. Fails when unchanged.
        ensure(
            allow != self.allow_primary_issuance().await?,
            format!("Primary issuance is already {}", if allow { "allowed" } else { "disallowed" }),
        )?;
        self.contract
            .send("setAllowPrimaryIssuance", &[Token::Bool(allow)], params)
            .await
    }

    pub async fn modify_whitelist(
        &self,
        investor: Address,
        valid: bool,
        params: TxParams,
    ) -> Result<PendingTransaction> {
        //! Exempt `investor` from the cap, or revoke the exemption.
        non_zero_address(investor, "Investor")?;
        self.contract
            .send("modifyWhitelist", &[investor.into(), Token::Bool(valid)], params)
            .await
    }

    pub async fn modify_whitelist_multi(
        &self,
        investors: &[Address],
        valids: &[bool],
        params: TxParams,
    ) -> Result<PendingTransaction> {
        //! Batch form of [`PercentageTransferManager::modify_whitelist`].
        equal_lengths(&[investors.len(), valids.len()], "modifyWhitelistMulti")?;
        for investor in investors {
            non_zero_address(*investor, "Investor")?;
        }
        self.contract
            .send(
                "modifyWhitelistMulti",
                &[tokens::addresses(investors), tokens::bools(valids)],
                params,
            )
            .await
    }
}
