//! `USDTieredSTO`: tiered offering priced in USD, accepting ETH, POLY and
//! USD stable coins.
//!
//! All prices, limits and raised amounts are USD with 18 decimals; token
//! amounts are whole tokens.

use crate::abi;
use crate::address::Address;
use crate::assertions::{
    date_in_future, date_range, ensure, equal_lengths, non_zero_address, positive_amount,
    sufficient_allowance, sufficient_balance,
};
use crate::contract::{log_param, tokens, Contract};
use crate::contracts::erc20::Erc20;
use crate::conversions::{date_to_u256, from_wei, to_wei, u256_to_date, u256_to_u64};
use crate::error::Result;
use crate::modules::{
    ensure_beneficiary, ensure_not_started, token_owner, FundRaiseType, Module,
};
use crate::network::{BlockReference, Provider};
use crate::transaction_builder::{PendingTransaction, TxDefaults, TxParams};
use chrono::{DateTime, Utc};
use ethabi::Token;
use ethereum_types::U256;
use itertools::izip;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::debug;

/// One price tier.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Tier {
    /// USD per token
    pub rate: Decimal,
    /// USD per token when paying with POLY
    pub rate_discount_poly: Decimal,
    /// Tokens on sale in this tier
    pub token_total: Decimal,
    /// Part of `token_total` sold at the POLY discount
    pub tokens_discount_poly: Decimal,
    /// Tokens minted in this tier
    pub minted_total: Decimal,
    /// Part of `minted_total` sold at the POLY discount
    pub minted_discount_poly: Decimal,
}

/// Accreditation of an investor with an optional limit override.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct AccreditedData {
    /// Investor address
    pub investor: Address,
    /// Whether the investor is accredited
    pub accredited: bool,
    /// USD limit replacing the default non-accredited limit, zero if unset
    pub non_accredited_limit_override: Decimal,
}

/// Aggregate state of a tiered offering.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct UsdTieredStoDetails {
    /// Offering opens
    pub start_time: DateTime<Utc>,
    /// Offering closes
    pub end_time: DateTime<Utc>,
    /// Index of the tier on sale
    pub current_tier: u64,
    /// Tokens on sale per tier
    pub cap_per_tier: Vec<Decimal>,
    /// USD per token per tier
    pub rate_per_tier: Vec<Decimal>,
    /// Total raised, in USD
    pub funds_raised_usd: Decimal,
    /// Number of distinct investors
    pub investor_count: u64,
    /// Tokens sold over all tiers
    pub tokens_sold: Decimal,
    /// Accepted currencies, indexed by [`FundRaiseType`]
    pub fund_raise_types: Vec<bool>,
}

/// `TokenPurchase` event.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TokenPurchaseEvent {
    /// Account that paid
    pub purchaser: Address,
    /// Account that received the tokens
    pub beneficiary: Address,
    /// Tokens bought
    pub tokens: Decimal,
    /// Value paid, in USD
    pub usd_amount: Decimal,
    /// USD per token in the tier
    pub tier_price: Decimal,
    /// Tier the tokens came from
    pub tier: u64,
}

/// Wrapper of a `USDTieredSTO` module.
#[derive(Clone, Debug)]
pub struct UsdTieredSto {
    contract: Contract,
}

impl Module for UsdTieredSto {
    fn contract(&self) -> &Contract {
        &self.contract
    }
}

fn wei_vec(values: Vec<U256>) -> Result<Vec<Decimal>> {
    Ok(values
        .into_iter()
        .map(from_wei)
        .collect::<std::result::Result<_, _>>()?)
}

fn wei_token(values: &[Decimal]) -> Result<Token> {
    Ok(tokens::uints(
        values
            .iter()
            .map(|value| to_wei(*value))
            .collect::<std::result::Result<Vec<_>, _>>()?,
    ))
}

impl UsdTieredSto {
    pub fn new(address: Address, provider: Arc<dyn Provider>, defaults: Arc<TxDefaults>) -> Self {
        //! Wrapper of the offering deployed at `address`.
        Self {
            contract: Contract::new(address, &abi::USD_TIERED_STO, provider, defaults),
        }
    }

    pub const fn address(&self) -> Address {
        //! Offering address.
        self.contract.address()
    }

    async fn amount(&self, function: &str, args: &[Token]) -> Result<Decimal> {
        let value = self.contract.call(function, args).await?.single()?;
        Ok(from_wei(value)?)
    }

    async fn counter(&self, function: &str) -> Result<u64> {
        let value = self.contract.call(function, &[]).await?.single()?;
        Ok(u256_to_u64(value)?)
    }

    async fn flag(&self, function: &str, args: &[Token]) -> Result<bool> {
        self.contract.call(function, args).await?.single()
    }

    pub async fn start_time(&self) -> Result<DateTime<Utc>> {
        //! Offering opens.
        let time = self.contract.call("startTime", &[]).await?.single()?;
        Ok(u256_to_date(time)?)
    }

    pub async fn end_time(&self) -> Result<DateTime<Utc>> {
        //! Offering closes.
        let time = self.contract.call("endTime", &[]).await?.single()?;
        Ok(u256_to_date(time)?)
    }

    pub async fn current_tier(&self) -> Result<u64> {
        //! Index of the tier on sale.
        self.counter("currentTier").await
    }

    pub async fn is_finalized(&self) -> Result<bool> {
        //! Whether the owner closed the offering.
        self.flag("isFinalized", &[]).await
    }

    pub async fn is_open(&self) -> Result<bool> {
        //! Started, not ended, not finalized and not sold out.
        self.flag("isOpen", &[]).await
    }

    pub async fn cap_reached(&self) -> Result<bool> {
        //! Whether every tier is sold out.
        self.flag("capReached", &[]).await
    }

    pub async fn get_number_of_tiers(&self) -> Result<u64> {
        //! Number of price tiers.
        self.counter("getNumberOfTiers").await
    }

    async fn ensure_tier(&self, tier: u64) -> Result<()> {
        let count = self.get_number_of_tiers().await?;
        ensure(
            tier < count,
            format!("Tier {tier} does not exist, the offering has {count} tiers"),
        )
    }

    pub async fn tiers(&self, tier: u64) -> Result<Tier> {
        //! Configuration and sales of one tier.
        self.ensure_tier(tier).await?;
        let mut outputs = self.contract.call("tiers", &[tokens::uint(tier)]).await?;
        Ok(Tier {
            rate: from_wei(outputs.take()?)?,
            rate_discount_poly: from_wei(outputs.take()?)?,
            token_total: from_wei(outputs.take()?)?,
            tokens_discount_poly: from_wei(outputs.take()?)?,
            minted_total: from_wei(outputs.take()?)?,
            minted_discount_poly: from_wei(outputs.take()?)?,
        })
    }

    pub async fn get_tokens_sold(&self) -> Result<Decimal> {
        //! Tokens sold over all tiers.
        self.amount("getTokensSold", &[]).await
    }

    pub async fn get_tokens_minted(&self) -> Result<Decimal> {
        //! Tokens minted over all tiers.
        self.amount("getTokensMinted", &[]).await
    }

    pub async fn get_tokens_sold_for(&self, fund_raise_type: FundRaiseType) -> Result<Decimal> {
        //! Tokens bought with one currency.
        self.amount("getTokensSoldFor", &[tokens::uint(fund_raise_type as u8)])
            .await
    }

    pub async fn get_tokens_minted_by_tier(&self, tier: u64) -> Result<Vec<Decimal>> {
        //! Minted tokens of a tier, indexed by [`FundRaiseType`].
        self.ensure_tier(tier).await?;
        wei_vec(
            self.contract
                .call("getTokensMintedByTier", &[tokens::uint(tier)])
                .await?
                .single()?,
        )
    }

    pub async fn get_tokens_sold_by_tier(&self, tier: u64) -> Result<Decimal> {
        //! Tokens sold in one tier.
        self.ensure_tier(tier).await?;
        self.amount("getTokensSoldByTier", &[tokens::uint(tier)])
            .await
    }

    pub async fn get_rate(&self, fund_raise_type: FundRaiseType) -> Result<Decimal> {
        //! USD price of one unit of the currency, from the oracles.
        self.amount("getRate", &[tokens::uint(fund_raise_type as u8)])
            .await
    }

    pub async fn convert_to_usd(
        &self,
        fund_raise_type: FundRaiseType,
        amount: Decimal,
    ) -> Result<Decimal> {
        //! Value of `amount` of the currency in USD.
        self.amount(
            "convertToUSD",
            &[tokens::uint(fund_raise_type as u8), tokens::uint(to_wei(amount)?)],
        )
        .await
    }

    pub async fn convert_from_usd(
        &self,
        fund_raise_type: FundRaiseType,
        amount: Decimal,
    ) -> Result<Decimal> {
        //! Amount of the currency worth `amount` USD.
        self.amount(
            "convertFromUSD",
            &[tokens::uint(fund_raise_type as u8), tokens::uint(to_wei(amount)?)],
        )
        .await
    }

    pub async fn investor_invested_usd(&self, investor: Address) -> Result<Decimal> {
        //! Total invested by `investor`, in USD.
        self.amount("investorInvestedUSD", &[investor.into()]).await
    }

    pub async fn investor_invested(
        &self,
        investor: Address,
        fund_raise_type: FundRaiseType,
    ) -> Result<Decimal> {
        //! Invested by `investor` in one currency.
        self.amount(
            "investorInvested",
            &[investor.into(), tokens::uint(fund_raise_type as u8)],
        )
        .await
    }

    pub async fn funds_raised(&self, fund_raise_type: FundRaiseType) -> Result<Decimal> {
        //! Raised in one currency.
        self.amount("fundsRaised", &[tokens::uint(fund_raise_type as u8)])
            .await
    }

    pub async fn funds_raised_usd(&self) -> Result<Decimal> {
        //! Total raised, in USD.
        self.amount("fundsRaisedUSD", &[]).await
    }

    pub async fn minimum_investment_usd(&self) -> Result<Decimal> {
        //! Smallest accepted purchase, in USD.
        self.amount("minimumInvestmentUSD", &[]).await
    }

    pub async fn non_accredited_limit_usd(&self) -> Result<Decimal> {
        //! Default investment cap of non-accredited investors, in USD.
        self.amount("nonAccreditedLimitUSD", &[]).await
    }

    pub async fn get_accredited_data(&self) -> Result<Vec<AccreditedData>> {
        //! Accreditation records of every known investor.
        let mut outputs = self.contract.call("getAccreditedData", &[]).await?;
        let investors: Vec<Address> = outputs.take()?;
        let accredited: Vec<bool> = outputs.take()?;
        let overrides = wei_vec(outputs.take()?)?;
        Ok(izip!(investors, accredited, overrides)
            .map(|(investor, accredited, limit)| AccreditedData {
                investor,
                accredited,
                non_accredited_limit_override: limit,
            })
            .collect())
    }

    pub async fn wallet(&self) -> Result<Address> {
        //! Wallet receiving raised funds.
        self.contract.call("wallet", &[]).await?.single()
    }

    pub async fn treasury_wallet(&self) -> Result<Address> {
        //! Wallet receiving unsold tokens, zero for the token default.
        self.contract.call("treasuryWallet", &[]).await?.single()
    }

    pub async fn get_usd_tokens(&self) -> Result<Vec<Address>> {
        //! Accepted stable coins.
        self.contract.call("getUsdTokens", &[]).await?.single()
    }

    pub async fn fund_raise_types(&self, fund_raise_type: FundRaiseType) -> Result<bool> {
        //! Whether the offering accepts this currency.
        self.flag("fundRaiseTypes", &[tokens::uint(fund_raise_type as u8)])
            .await
    }

    pub async fn allow_beneficial_investments(&self) -> Result<bool> {
        //! Whether buyers may purchase for someone else.
        self.flag("allowBeneficialInvestments", &[]).await
    }

    pub async fn get_sto_details(&self) -> Result<UsdTieredStoDetails> {
        //! Aggregate state in one call.
        let mut outputs = self.contract.call("getSTODetails", &[]).await?;
        Ok(UsdTieredStoDetails {
            start_time: u256_to_date(outputs.take()?)?,
            end_time: u256_to_date(outputs.take()?)?,
            current_tier: u256_to_u64(outputs.take()?)?,
            cap_per_tier: wei_vec(outputs.take()?)?,
            rate_per_tier: wei_vec(outputs.take()?)?,
            funds_raised_usd: from_wei(outputs.take()?)?,
            investor_count: u256_to_u64(outputs.take()?)?,
            tokens_sold: from_wei(outputs.take()?)?,
            fund_raise_types: outputs.take()?,
        })
    }

    async fn ensure_can_buy(
        &self,
        fund_raise_type: FundRaiseType,
        beneficiary: Address,
        amount: Decimal,
        params: &TxParams,
    ) -> Result<Address> {
        positive_amount(amount, "Investment")?;
        ensure(!self.paused().await?, "Offering is paused")?;
        ensure(self.is_open().await?, "Offering is not open")?;
        ensure(
            self.fund_raise_types(fund_raise_type).await?,
            format!("Offering does not accept {fund_raise_type:?}"),
        )?;
        let sender = self.contract.sender(params).await?;
        ensure_beneficiary(
            beneficiary,
            sender,
            self.allow_beneficial_investments().await?,
        )?;
        let invested = self.convert_to_usd(fund_raise_type, amount).await?
            + self.investor_invested_usd(beneficiary).await?;
        let minimum = self.minimum_investment_usd().await?;
        ensure(
            invested >= minimum,
            format!("Investment of {invested} USD is below the minimum of {minimum} USD"),
        )?;
        Ok(sender)
    }

    async fn ensure_funds(&self, token: &Erc20, sender: Address, amount: Decimal) -> Result<()> {
        sufficient_balance(token.balance_of(sender).await?, amount)?;
        sufficient_allowance(token.allowance(sender, self.address()).await?, amount)
    }

    pub async fn buy_with_eth(
        &self,
        beneficiary: Address,
        value: Decimal,
        params: TxParams,
    ) -> Result<PendingTransaction> {
        //! Buy with `value` ETH for `beneficiary`.
        //! Checks the offering is open, accepts ETH and the purchase meets the minimum.
        self.ensure_can_buy(FundRaiseType::Eth, beneficiary, value, &params)
            .await?;
        let params = params.value(to_wei(value)?);
        self.contract
            .send("buyWithETH", &[beneficiary.into()], params)
            .await
    }

    pub async fn buy_with_eth_rate_limited(
        &self,
        beneficiary: Address,
        value: Decimal,
        min_tokens: Decimal,
        params: TxParams,
    ) -> Result<PendingTransaction> {
        //! Reverts on-chain unless at least `min_tokens` are bought.
        self.ensure_can_buy(FundRaiseType::Eth, beneficiary, value, &params)
            .await?;
        let params = params.value(to_wei(value)?);
        self.contract
            .send(
                "buyWithETHRateLimited",
                &[beneficiary.into(), tokens::uint(to_wei(min_tokens)?)],
                params,
            )
            .await
    }

    async fn prepare_poly(
        &self,
        beneficiary: Address,
        amount: Decimal,
        params: &TxParams,
    ) -> Result<()> {
        let sender = self
            .ensure_can_buy(FundRaiseType::Poly, beneficiary, amount, params)
            .await?;
        self.ensure_funds(&self.poly_token().await?, sender, amount)
            .await
    }

    pub async fn buy_with_poly(
        &self,
        beneficiary: Address,
        amount: Decimal,
        params: TxParams,
    ) -> Result<PendingTransaction> {
        //! Buy with `amount` POLY for `beneficiary`.
        //! The sender must hold and have approved enough POLY.
        self.prepare_poly(beneficiary, amount, &params).await?;
        self.contract
            .send(
                "buyWithPOLY",
                &[beneficiary.into(), tokens::uint(to_wei(amount)?)],
                params,
            )
            .await
    }

    pub async fn buy_with_poly_rate_limited(
        &self,
        beneficiary: Address,
        amount: Decimal,
        min_tokens: Decimal,
        params: TxParams,
    ) -> Result<PendingTransaction> {
        //! Like [`UsdTieredSto::buy_with_poly`], reverting on-chain unless at
        //! least `min_tokens` are bought.
        self.prepare_poly(beneficiary, amount, &params).await?;
        self.contract
            .send(
                "buyWithPOLYRateLimited",
                &[
                    beneficiary.into(),
                    tokens::uint(to_wei(amount)?),
                    tokens::uint(to_wei(min_tokens)?),
                ],
                params,
            )
            .await
    }

    async fn prepare_usd(
        &self,
        beneficiary: Address,
        amount: Decimal,
        usd_token: Address,
        params: &TxParams,
    ) -> Result<U256> {
        ensure(
            self.get_usd_tokens().await?.contains(&usd_token),
            format!("{usd_token} is not an accepted stable coin"),
        )?;
        let sender = self
            .ensure_can_buy(FundRaiseType::StableCoin, beneficiary, amount, params)
            .await?;
        let coin = Erc20::from_contract(self.contract.at(usd_token, &abi::ERC20));
        self.ensure_funds(&coin, sender, amount).await?;
        coin.to_units(amount).await
    }

    pub async fn buy_with_usd(
        &self,
        beneficiary: Address,
        amount: Decimal,
        usd_token: Address,
        params: TxParams,
    ) -> Result<PendingTransaction> {
        //! Buy with `amount` of the stable coin `usd_token` for `beneficiary`.
        let value = self
            .prepare_usd(beneficiary, amount, usd_token, &params)
            .await?;
        self.contract
            .send(
                "buyWithUSD",
                &[beneficiary.into(), tokens::uint(value), usd_token.into()],
                params,
            )
            .await
    }

    pub async fn buy_with_usd_rate_limited(
        &self,
        beneficiary: Address,
        amount: Decimal,
        min_tokens: Decimal,
        usd_token: Address,
        params: TxParams,
    ) -> Result<PendingTransaction> {
        //! Like [`UsdTieredSto::buy_with_usd`] with a lower bound on tokens bought.
        let value = self
            .prepare_usd(beneficiary, amount, usd_token, &params)
            .await?;
        self.contract
            .send(
                "buyWithUSDRateLimited",
                &[
                    beneficiary.into(),
                    tokens::uint(value),
                    tokens::uint(to_wei(min_tokens)?),
                    usd_token.into(),
                ],
                params,
            )
            .await
    }

    pub async fn finalize(&self, params: TxParams) -> Result<PendingTransaction> {
        //! Close the offering and send unsold tokens to the treasury.
        token_owner(self, &params).await?;
        ensure(!self.is_finalized().await?, "Offering is already finalized")?;
        self.contract.send("finalize", &[], params).await
    }

    pub async fn change_non_accredited_limit(
        &self,
        investors: &[Address],
        limits: &[Decimal],
        params: TxParams,
    ) -> Result<PendingTransaction> {
        //! Override the USD cap per non-accredited investor.
        equal_lengths(&[investors.len(), limits.len()], "changeNonAccreditedLimit")?;
        ensure(!investors.is_empty(), "No investors given")?;
        for investor in investors {
            non_zero_address(*investor, "Investor")?;
        }
        self.contract
            .send(
                "changeNonAccreditedLimit",
                &[tokens::addresses(investors), wei_token(limits)?],
                params,
            )
            .await
    }

    async fn ensure_modifiable(&self, params: &TxParams) -> Result<()> {
        token_owner(self, params).await?;
        ensure_not_started(self.start_time().await?)
    }

    pub async fn modify_times(
        &self,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        params: TxParams,
    ) -> Result<PendingTransaction> {
        //! Move the offering window. Only before the offering starts.
        date_in_future(start_time, "Start time")?;
        date_range(start_time, end_time)?;
        self.ensure_modifiable(&params).await?;
        self.contract
            .send(
                "modifyTimes",
                &[
                    tokens::uint(date_to_u256(start_time)?),
                    tokens::uint(date_to_u256(end_time)?),
                ],
                params,
            )
            .await
    }

    pub async fn modify_tiers(
        &self,
        rates: &[Decimal],
        discount_rates: &[Decimal],
        tokens_total: &[Decimal],
        tokens_discount: &[Decimal],
        params: TxParams,
    ) -> Result<PendingTransaction> {
        //! Replace all tiers. Discounted figures apply to POLY purchases.
        equal_lengths(
            &[
                rates.len(),
                discount_rates.len(),
                tokens_total.len(),
                tokens_discount.len(),
            ],
            "modifyTiers",
        )?;
        ensure(!rates.is_empty(), "At least one tier is required")?;
        for (rate, discount_rate, total, discount) in
            izip!(rates, discount_rates, tokens_total, tokens_discount)
        {
            positive_amount(*rate, "Tier rate")?;
            positive_amount(*total, "Tier token total")?;
            ensure(
                discount <= total,
                "Discounted tokens must not exceed the tier total",
            )?;
            ensure(
                discount_rate <= rate,
                "Discounted rate must not exceed the tier rate",
            )?;
        }
        self.ensure_modifiable(&params).await?;
        self.contract
            .send(
                "modifyTiers",
                &[
                    wei_token(rates)?,
                    wei_token(discount_rates)?,
                    wei_token(tokens_total)?,
                    wei_token(tokens_discount)?,
                ],
                params,
            )
            .await
    }

    pub async fn modify_limits(
        &self,
        non_accredited_limit_usd: Decimal,
        minimum_investment_usd: Decimal,
        params: TxParams,
    ) -> Result<PendingTransaction> {
        //! Set the non-accredited cap and minimum purchase, in USD.
        //! Only before the offering starts.
        self.ensure_modifiable(&params).await?;
        self.contract
            .send(
                "modifyLimits",
                &[
                    tokens::uint(to_wei(non_accredited_limit_usd)?),
                    tokens::uint(to_wei(minimum_investment_usd)?),
                ],
                params,
            )
            .await
    }

    pub async fn modify_funding(
        &self,
        fund_raise_types: &[FundRaiseType],
        params: TxParams,
    ) -> Result<PendingTransaction> {
        //! Replace the accepted currencies. Only before the offering starts.
        ensure(!fund_raise_types.is_empty(), "At least one currency is required")?;
        self.ensure_modifiable(&params).await?;
        self.contract
            .send(
                "modifyFunding",
                &[tokens::uints(
                    fund_raise_types.iter().map(|kind| U256::from(*kind as u8)),
                )],
                params,
            )
            .await
    }

    pub async fn modify_addresses(
        &self,
        wallet: Address,
        treasury_wallet: Address,
        usd_tokens: &[Address],
        params: TxParams,
    ) -> Result<PendingTransaction> {
        //! Zero `treasury_wallet` falls back to the token's treasury.
        non_zero_address(wallet, "Wallet")?;
        for token in usd_tokens {
            non_zero_address(*token, "Stable coin")?;
        }
        self.ensure_modifiable(&params).await?;
        self.contract
            .send(
                "modifyAddresses",
                &[
                    wallet.into(),
                    treasury_wallet.into(),
                    tokens::addresses(usd_tokens),
                ],
                params,
            )
            .await
    }

    pub async fn change_allow_beneficial_investments(
        &self,
        allow: bool,
        params: TxParams,
    ) -> Result<PendingTransaction> {
        //! Owner only. Fails when unchanged.
        token_owner(self, &params).await?;
        ensure(
            allow != self.allow_beneficial_investments().await?,
            format!(
                "Beneficial investments are already {}",
                if allow { "allowed" } else { "disallowed" }
            ),
        )?;
        self.contract
            .send("changeAllowBeneficialInvestments", &[Token::Bool(allow)], params)
            .await
    }

    pub async fn token_purchase_logs(
        &self,
        from_block: BlockReference,
        to_block: BlockReference,
    ) -> Result<Vec<TokenPurchaseEvent>> {
        //! `TokenPurchase` events in the block range.
        let logs = self
            .contract
            .logs("TokenPurchase", from_block, to_block)
            .await?;
        debug!(count = logs.len(), "Fetched purchases");
        logs.iter()
            .map(|log| -> Result<TokenPurchaseEvent> {
                Ok(TokenPurchaseEvent {
                    purchaser: log_param(log, "_purchaser")?,
                    beneficiary: log_param(log, "_beneficiary")?,
                    tokens: from_wei(log_param(log, "_tokens")?)?,
                    usd_amount: from_wei(log_param(log, "_usdAmount")?)?,
                    tier_price: from_wei(log_param(log, "_tierPrice")?)?,
                    tier: log_param(log, "_tier")?,
                })
            })
            .collect()
    }
}
