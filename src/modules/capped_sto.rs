//! `CappedSTO`: fixed-rate offering with a hard cap, raising ETH or POLY.

use crate::abi;
use crate::address::Address;
use crate::assertions::{ensure, positive_amount, sufficient_allowance, sufficient_balance};
use crate::contract::{tokens, Contract};
use crate::conversions::{from_wei, to_wei, u256_to_date, u256_to_u64};
use crate::error::Result;
use crate::modules::{ensure_beneficiary, ensure_open, token_owner, FundRaiseType, Module};
use crate::network::Provider;
use crate::transaction_builder::{PendingTransaction, TxDefaults, TxParams};
use chrono::{DateTime, Utc};
use ethabi::Token;
use rust_decimal::Decimal;
use std::sync::Arc;

/// Aggregate state of a capped offering. Token amounts are in whole
/// tokens, funds in ETH or POLY.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CappedStoDetails {
    /// Offering opens
    pub start_time: DateTime<Utc>,
    /// Offering closes
    pub end_time: DateTime<Utc>,
    /// Maximum number of tokens sold
    pub cap: Decimal,
    /// Tokens per unit of the raised currency
    pub rate: Decimal,
    /// Raised in the offering currency
    pub funds_raised: Decimal,
    /// Number of distinct investors
    pub investor_count: u64,
    /// Tokens sold so far
    pub tokens_sold: Decimal,
    /// Whether the offering raises POLY instead of ETH
    pub is_raised_in_poly: bool,
}

/// Wrapper of a `CappedSTO` module.
#[derive(Clone, Debug)]
pub struct CappedSto {
    contract: Contract,
}

impl Module for CappedSto {
    fn contract(&self) -> &Contract {
        &self.contract
    }
}

impl CappedSto {
    pub fn new(address: Address, provider: Arc<dyn Provider>, defaults: Arc<TxDefaults>) -> Self {
        //! Wrapper of the offering deployed at `address`.
        Self {
            contract: Contract::new(address, &abi::CAPPED_STO, provider, defaults),
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

    pub async fn cap(&self) -> Result<Decimal> {
        //! Maximum number of tokens sold.
        self.amount("cap", &[]).await
    }

    pub async fn rate(&self) -> Result<Decimal> {
        //! Tokens per unit of the raised currency.
        self.amount("rate", &[]).await
    }

    pub async fn funds_raised(&self, fund_raise_type: FundRaiseType) -> Result<Decimal> {
        //! Raised in one currency.
        self.amount("fundsRaised", &[tokens::uint(fund_raise_type as u8)])
            .await
    }

    pub async fn investor_count(&self) -> Result<u64> {
        //! Number of distinct investors.
        let count = self.contract.call("investorCount", &[]).await?.single()?;
        Ok(u256_to_u64(count)?)
    }

    pub async fn total_tokens_sold(&self) -> Result<Decimal> {
        //! Tokens sold so far.
        self.amount("totalTokensSold", &[]).await
    }

    pub async fn get_tokens_sold(&self) -> Result<Decimal> {
        //! Tokens sold, as reported by the generic offering interface.
        self.amount("getTokensSold", &[]).await
    }

    pub async fn get_raised(&self, fund_raise_type: FundRaiseType) -> Result<Decimal> {
        //! Raised in one currency, as reported by the generic offering interface.
        self.amount("getRaised", &[tokens::uint(fund_raise_type as u8)])
            .await
    }

    pub async fn cap_reached(&self) -> Result<bool> {
        //! Whether the cap is sold out.
        self.contract.call("capReached", &[]).await?.single()
    }

    pub async fn wallet(&self) -> Result<Address> {
        //! Wallet receiving raised funds.
        self.contract.call("wallet", &[]).await?.single()
    }

    pub async fn fund_raise_types(&self, fund_raise_type: FundRaiseType) -> Result<bool> {
        //! Whether the offering accepts this currency.
        self.contract
            .call("fundRaiseTypes", &[tokens::uint(fund_raise_type as u8)])
            .await?
            .single()
    }

    pub async fn allow_beneficial_investments(&self) -> Result<bool> {
        //! Whether buyers may purchase for someone else.
        self.contract
            .call("allowBeneficialInvestments", &[])
            .await?
            .single()
    }

    pub async fn get_sto_details(&self) -> Result<CappedStoDetails> {
        //! Aggregate state in one call.
        let mut outputs = self.contract.call("getSTODetails", &[]).await?;
        Ok(CappedStoDetails {
            start_time: u256_to_date(outputs.take()?)?,
            end_time: u256_to_date(outputs.take()?)?,
            cap: from_wei(outputs.take()?)?,
            rate: from_wei(outputs.take()?)?,
            funds_raised: from_wei(outputs.take()?)?,
            investor_count: u256_to_u64(outputs.take()?)?,
            tokens_sold: from_wei(outputs.take()?)?,
            is_raised_in_poly: outputs.take()?,
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
        ensure_open(self.start_time().await?, self.end_time().await?)?;
        ensure(!self.cap_reached().await?, "Cap is reached")?;
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
        Ok(sender)
    }

    pub async fn buy_tokens(
        &self,
        beneficiary: Address,
        value: Decimal,
        params: TxParams,
    ) -> Result<PendingTransaction> {
        //! Invest `value` ETH on behalf of `beneficiary`.
        self.ensure_can_buy(FundRaiseType::Eth, beneficiary, value, &params)
            .await?;
        let params = params.value(to_wei(value)?);
        self.contract
            .send("buyTokens", &[beneficiary.into()], params)
            .await
    }

    pub async fn buy_tokens_with_poly(
        &self,
        amount: Decimal,
        params: TxParams,
    ) -> Result<PendingTransaction> {
        //! Invest `amount` POLY previously approved to the offering.
        let sender = self.contract.sender(&params).await?;
        self.ensure_can_buy(FundRaiseType::Poly, sender, amount, &params)
            .await?;
        let poly = self.poly_token().await?;
        sufficient_balance(poly.balance_of(sender).await?, amount)?;
        sufficient_allowance(poly.allowance(sender, self.address()).await?, amount)?;
        self.contract
            .send("buyTokensWithPoly", &[tokens::uint(to_wei(amount)?)], params)
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
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::conversions::date_to_u256;
    use crate::error::Error;
    use crate::mock::{calldata, MockProvider};
    use crate::modules::testing::*;
    use chrono::Duration;
    use ethereum_types::U256;
    use rust_decimal_macros::dec;

    fn open_offering(mock: &MockProvider) {
        let now = Utc::now();
        let start = date_to_u256(now - Duration::days(1)).unwrap();
        let end = date_to_u256(now + Duration::days(1)).unwrap();
        mock.mock_call(MODULE, "startTime()", &[Token::Uint(start)]);
        mock.mock_call(MODULE, "endTime()", &[Token::Uint(end)]);
        mock.mock_call(MODULE, "capReached()", &[Token::Bool(false)]);
        mock.mock_call(MODULE, "allowBeneficialInvestments()", &[Token::Bool(false)]);
        mock.mock_call(MODULE, "fundRaiseTypes(uint8)", &[Token::Bool(true)]);
        mock.mock_call(POLY, "balanceOf(address)", &[Token::Uint(U256::exp10(20))]);
        mock.mock_call(POLY, "allowance(address,address)", &[Token::Uint(U256::exp10(19))]);
    }

    #[tokio::test]
    async fn test_details() {
        let mock = mock();
        let sto = CappedSto::new(MODULE, mock.clone(), defaults());
        mock.mock_call(
            MODULE,
            "getSTODetails()",
            &[
                Token::Uint(1_000.into()),
                Token::Uint(2_000.into()),
                Token::Uint(U256::exp10(18) * 1_000_000),
                Token::Uint(U256::exp10(18) * 1_000),
                Token::Uint(U256::exp10(17) * 15),
                Token::Uint(3.into()),
                Token::Uint(U256::exp10(18) * 1_500),
                Token::Bool(false),
            ],
        );
        let details = sto.get_sto_details().await.unwrap();
        assert_eq!(details.cap, dec!(1000000));
        assert_eq!(details.rate, dec!(1000));
        assert_eq!(details.funds_raised, dec!(1.5));
        assert_eq!(details.investor_count, 3);
        assert!(!details.is_raised_in_poly);
    }

    #[tokio::test]
    async fn test_buy_with_eth() {
        let mock = mock();
        let sto = CappedSto::new(MODULE, mock.clone(), defaults());
        open_offering(&mock);
        sto.buy_tokens(OWNER, dec!(0.5), TxParams::new())
            .await
            .unwrap();
        let sent = mock.sent_transactions();
        assert_eq!(sent[0].value, U256::exp10(17) * 5);
        assert_eq!(
            sent[0].data,
            calldata("buyTokens(address)", &[OWNER.into()])
        );

        assert!(matches!(
            sto.buy_tokens(Address::from([0x33; 20]), dec!(1), TxParams::new()).await,
            Err(Error::Precondition(message)) if message.contains("Beneficiary")
        ));
        assert!(sto
            .buy_tokens(OWNER, dec!(0), TxParams::new())
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_closed_or_capped() {
        let mock = mock();
        let sto = CappedSto::new(MODULE, mock.clone(), defaults());
        open_offering(&mock);
        mock.mock_call(MODULE, "capReached()", &[Token::Bool(true)]);
        assert!(sto.buy_tokens(OWNER, dec!(1), TxParams::new()).await.is_err());

        open_offering(&mock);
        let past = date_to_u256(Utc::now() - Duration::hours(1)).unwrap();
        mock.mock_call(MODULE, "endTime()", &[Token::Uint(past)]);
        assert!(matches!(
            sto.buy_tokens(OWNER, dec!(1), TxParams::new()).await,
            Err(Error::Precondition(message)) if message.contains("closed")
        ));

        open_offering(&mock);
        mock.mock_call(MODULE, "paused()", &[Token::Bool(true)]);
        assert!(sto.buy_tokens(OWNER, dec!(1), TxParams::new()).await.is_err());
        assert!(mock.sent_transactions().is_empty());
    }

    #[tokio::test]
    async fn test_buy_with_poly() {
        let mock = mock();
        let sto = CappedSto::new(MODULE, mock.clone(), defaults());
        open_offering(&mock);
        assert!(matches!(
            sto.buy_tokens_with_poly(dec!(11), TxParams::new()).await,
            Err(Error::Precondition(message)) if message.contains("allowance")
        ));
        sto.buy_tokens_with_poly(dec!(10), TxParams::new())
            .await
            .unwrap();
        assert_eq!(
            mock.sent_transactions()[0].data,
            calldata("buyTokensWithPoly(uint256)", &[Token::Uint(U256::exp10(19))])
        );
    }

    #[tokio::test]
    async fn test_views_by_currency() {
        let mock = mock();
        let sto = CappedSto::new(MODULE, mock.clone(), defaults());
        mock.mock_call_with_args(
            MODULE,
            "fundsRaised(uint8)",
            &[Token::Uint(1.into())],
            &[Token::Uint(U256::exp10(18) * 40)],
        );
        mock.mock_call_with_args(
            MODULE,
            "getRaised(uint8)",
            &[Token::Uint(0.into())],
            &[Token::Uint(U256::exp10(17) * 25)],
        );
        mock.mock_call(MODULE, "rate()", &[Token::Uint(U256::exp10(18) * 1_000)]);

        assert_eq!(sto.funds_raised(FundRaiseType::Poly).await.unwrap(), dec!(40));
        assert_eq!(
            mock.calls().last().unwrap().data,
            calldata("fundsRaised(uint8)", &[Token::Uint(1.into())])
        );
        assert_eq!(sto.get_raised(FundRaiseType::Eth).await.unwrap(), dec!(2.5));
        assert_eq!(
            mock.calls().last().unwrap().data,
            calldata("getRaised(uint8)", &[Token::Uint(0.into())])
        );
        assert_eq!(sto.rate().await.unwrap(), dec!(1000));
        assert_eq!(mock.calls().last().unwrap().data, calldata("rate()", &[]));

        mock.mock_call_with_args(
            MODULE,
            "fundRaiseTypes(uint8)",
            &[Token::Uint(1.into())],
            &[Token::Bool(true)],
        );
        assert!(sto.fund_raise_types(FundRaiseType::Poly).await.unwrap());
        assert_eq!(
            mock.calls().last().unwrap().data,
            calldata("fundRaiseTypes(uint8)", &[Token::Uint(1.into())])
        );
    }
}
