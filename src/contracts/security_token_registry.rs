//! `SecurityTokenRegistry`: ticker reservation and security token launch.

use crate::abi;
use crate::address::Address;
use crate::assertions::{
    ensure, is_owner, non_zero_address, sufficient_allowance, sufficient_balance,
};
use crate::contract::{log_param, tokens, Contract};
use crate::contracts::erc20::Erc20;
use crate::conversions::{
    bytes32_to_string, duration_to_u256, from_wei, to_wei, u256_to_date, u256_to_duration,
};
use crate::error::{Error, Result};
use crate::network::{BlockReference, Provider};
use crate::transaction_builder::{PendingTransaction, TxDefaults, TxParams};
use crate::utils::keccak;
use crate::version::ContractVersion;
use chrono::{DateTime, Duration, Utc};
use ethabi::Token;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::debug;

/// Longest ticker accepted by the registry.
pub const MAX_TICKER_LENGTH: usize = 10;

/// Registry fee kinds.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum FeeType {
    /// Paid when reserving a ticker
    TickerRegistration,
    /// Paid when deploying a security token
    SecurityTokenLaunch,
}

impl FeeType {
    pub fn key(&self) -> [u8; 32] {
        //! Storage key passed to `getFees`.
        keccak(match self {
            Self::TickerRegistration => "tickerRegFee",
            Self::SecurityTokenLaunch => "stLaunchFee",
        })
    }
}

/// A fee quoted in USD and converted to POLY at the current oracle rate.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Fees {
    /// Fee in USD
    pub usd: Decimal,
    /// Same fee in POLY
    pub poly: Decimal,
}

/// Registration state of a ticker.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TickerDetails {
    /// Current owner, zero when the ticker was never registered
    pub owner: Address,
    /// When the ticker was reserved
    pub registration_date: DateTime<Utc>,
    /// When the reservation lapses unless a token is deployed
    pub expiry_date: DateTime<Utc>,
    /// Token name given at registration
    pub token_name: String,
    /// Whether a security token was deployed for the ticker
    pub deployed: bool,
}

impl TickerDetails {
    pub fn is_registered(&self) -> bool {
        //! Whether anyone holds the ticker.
        !self.owner.is_zero()
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        //! Whether the reservation lapsed before `now`.
        self.expiry_date < now
    }

    pub fn is_available(&self, now: DateTime<Utc>) -> bool {
        //! Never registered, or reservation lapsed without a deployment.
        !self.is_registered() || (self.is_expired(now) && !self.deployed)
    }
}

/// Registry record of a deployed token.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SecurityTokenData {
    /// Token ticker
    pub ticker: String,
    /// Token owner
    pub owner: Address,
    /// Off-chain details reference
    pub details: String,
    /// Deployment date
    pub deployed_at: DateTime<Utc>,
}

/// `RegisterTicker` event.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RegisterTickerEvent {
    /// Ticker owner
    pub owner: Address,
    /// Reserved ticker
    pub ticker: String,
    /// Reservation date
    pub registration_date: DateTime<Utc>,
    /// Reservation expiry
    pub expiry_date: DateTime<Utc>,
    /// Registered by the registry owner
    pub from_admin: bool,
    /// Paid fee in POLY
    pub fee_poly: Decimal,
    /// Paid fee in USD
    pub fee_usd: Decimal,
}

/// `NewSecurityToken` event.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct NewSecurityTokenEvent {
    /// Token ticker
    pub ticker: String,
    /// Token name
    pub name: String,
    /// Deployed token
    pub security_token: Address,
    /// Token owner
    pub owner: Address,
    /// Deployment date
    pub added_at: DateTime<Utc>,
    /// Account that deployed the token
    pub registrant: Address,
    /// Deployed by the registry owner
    pub from_admin: bool,
    /// Paid fee in USD
    pub fee_usd: Decimal,
    /// Paid fee in POLY
    pub fee_poly: Decimal,
}

pub fn normalize_ticker(ticker: &str) -> Result<String> {
    //! Validate a ticker and convert it to the upper case the registry
    //! stores.
    let length = ticker.chars().count();
    ensure(
        (1..=MAX_TICKER_LENGTH).contains(&length),
        format!("Ticker length must be between 1 and {MAX_TICKER_LENGTH} characters"),
    )?;
    Ok(ticker.to_uppercase())
}

/// Wrapper of the `SecurityTokenRegistry` contract.
#[derive(Clone, Debug)]
pub struct SecurityTokenRegistry {
    contract: Contract,
}

impl SecurityTokenRegistry {
    pub fn new(address: Address, provider: Arc<dyn Provider>, defaults: Arc<TxDefaults>) -> Self {
        //! Wrapper of the registry deployed at `address`.
        Self {
            contract: Contract::new(address, &abi::SECURITY_TOKEN_REGISTRY, provider, defaults),
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

    pub async fn get_ticker_details(&self, ticker: &str) -> Result<TickerDetails> {
        //! Registration state of `ticker`, case insensitive.
        let ticker = normalize_ticker(ticker)?;
        let mut outputs = self
            .contract
            .call("getTickerDetails", &[tokens::string(&ticker)])
            .await?;
        Ok(TickerDetails {
            owner: outputs.take()?,
            registration_date: u256_to_date(outputs.take()?)?,
            expiry_date: u256_to_date(outputs.take()?)?,
            token_name: outputs.take()?,
            deployed: outputs.take()?,
        })
    }

    pub async fn get_security_token_address(&self, ticker: &str) -> Result<Address> {
        //! Zero when no token was deployed for `ticker`.
        let ticker = normalize_ticker(ticker)?;
        self.contract
            .call("getSecurityTokenAddress", &[tokens::string(&ticker)])
            .await?
            .single()
    }

    pub async fn get_security_token_data(&self, token: Address) -> Result<SecurityTokenData> {
        //! Launch record of a deployed token.
        let mut outputs = self
            .contract
            .call("getSecurityTokenData", &[token.into()])
            .await?;
        Ok(SecurityTokenData {
            ticker: outputs.take()?,
            owner: outputs.take()?,
            details: outputs.take()?,
            deployed_at: u256_to_date(outputs.take()?)?,
        })
    }

    pub async fn get_tickers_by_owner(&self, owner: Address) -> Result<Vec<String>> {
        //! Tickers reserved by `owner`.
        let tickers: Vec<[u8; 32]> = self
            .contract
            .call("getTickersByOwner", &[owner.into()])
            .await?
            .single()?;
        Ok(tickers.iter().map(|t| bytes32_to_string(t)).collect())
    }

    pub async fn get_tokens_by_owner(&self, owner: Address) -> Result<Vec<Address>> {
        //! Tokens deployed by `owner`.
        self.contract
            .call("getTokensByOwner", &[owner.into()])
            .await?
            .single()
    }

    pub async fn is_security_token(&self, token: Address) -> Result<bool> {
        //! Whether `token` was deployed by this registry.
        self.contract
            .call("isSecurityToken", &[token.into()])
            .await?
            .single()
    }

    pub async fn get_expiry_limit(&self) -> Result<Duration> {
        //! How long a ticker stays reserved without a token.
        let limit = self.contract.call("getExpiryLimit", &[]).await?.single()?;
        Ok(u256_to_duration(limit)?)
    }

    pub async fn get_ticker_registration_fee(&self) -> Result<Decimal> {
        //! Ticker fee in USD.
        let fee = self
            .contract
            .call("getTickerRegistrationFee", &[])
            .await?
            .single()?;
        Ok(from_wei(fee)?)
    }

    pub async fn get_security_token_launch_fee(&self) -> Result<Decimal> {
        //! Launch fee in USD.
        let fee = self
            .contract
            .call("getSecurityTokenLaunchFee", &[])
            .await?
            .single()?;
        Ok(from_wei(fee)?)
    }

    pub async fn get_fees(&self, fee_type: FeeType) -> Result<Fees> {
        //! Current fee of `fee_type` in USD and POLY.
        let mut outputs = self
            .contract
            .call("getFees", &[tokens::bytes32(fee_type.key())])
            .await?;
        Ok(Fees {
            usd: from_wei(outputs.take()?)?,
            poly: from_wei(outputs.take()?)?,
        })
    }

    pub async fn is_paused(&self) -> Result<bool> {
        //! Whether registration and launches are paused.
        self.contract.call("isPaused", &[]).await?.single()
    }

    pub async fn owner(&self) -> Result<Address> {
        //! Registry owner.
        self.contract.call("owner", &[]).await?.single()
    }

    pub async fn poly_token(&self) -> Result<Address> {
        //! POLY token used to pay fees.
        self.contract
            .call("getAddressValue", &[tokens::bytes32(keccak("polyToken"))])
            .await?
            .single()
    }

    pub async fn get_latest_protocol_version(&self) -> Result<ContractVersion> {
        //! Release new tokens are deployed with.
        let parts: Vec<u8> = self
            .contract
            .call("getLatestProtocolVersion", &[])
            .await?
            .single()?;
        version_from_parts("getLatestProtocolVersion", &parts)
    }

    async fn ensure_not_paused(&self) -> Result<()> {
        ensure(!self.is_paused().await?, "Registry is paused")
    }

    async fn ensure_owner(&self, params: &TxParams) -> Result<()> {
        is_owner(self.owner().await?, self.contract.sender(params).await?)
    }

    async fn ensure_fee_covered(&self, fee_type: FeeType, sender: Address) -> Result<()> {
        let fee = self.get_fees(fee_type).await?.poly;
        if fee.is_zero() {
            return Ok(());
        }
        let poly = Erc20::from_contract(self.contract.at(self.poly_token().await?, &abi::ERC20));
        sufficient_balance(poly.balance_of(sender).await?, fee)?;
        sufficient_allowance(poly.allowance(sender, self.address()).await?, fee)
    }

    pub async fn register_ticker(
        &self,
        owner: Address,
        ticker: &str,
        token_name: &str,
        params: TxParams,
    ) -> Result<PendingTransaction> {
        //! Reserve `ticker` for `owner`, paying the registration fee in POLY
        //! from the sender.
        self.ensure_not_paused().await?;
        non_zero_address(owner, "Ticker owner")?;
        let details = self.get_ticker_details(ticker).await?;
        ensure(
            details.is_available(Utc::now()),
            format!("Ticker {} is not available", ticker.to_uppercase()),
        )?;
        let sender = self.contract.sender(&params).await?;
        self.ensure_fee_covered(FeeType::TickerRegistration, sender)
            .await?;
        let ticker = normalize_ticker(ticker)?;
        debug!(%ticker, %owner, "Registering ticker");
        self.contract
            .send(
                "registerTicker",
                &[owner.into(), tokens::string(&ticker), tokens::string(token_name)],
                params,
            )
            .await
    }

    pub async fn generate_new_security_token(
        &self,
        name: &str,
        ticker: &str,
        details: &str,
        divisible: bool,
        params: TxParams,
    ) -> Result<PendingTransaction> {
        //! Deploy a token for a ticker reserved by the sender.
        self.ensure_not_paused().await?;
        ensure(!name.is_empty(), "Token name must not be empty")?;
        let ticker_details = self.get_ticker_details(ticker).await?;
        let sender = self.contract.sender(&params).await?;
        ensure(ticker_details.is_registered(), "Ticker is not registered")?;
        ensure(
            ticker_details.owner == sender,
            "Ticker is not owned by the sender",
        )?;
        ensure(!ticker_details.deployed, "Security token is already deployed")?;
        ensure(
            !ticker_details.is_expired(Utc::now()),
            "Ticker reservation has expired",
        )?;
        self.ensure_fee_covered(FeeType::SecurityTokenLaunch, sender)
            .await?;
        let ticker = normalize_ticker(ticker)?;
        self.contract
            .send(
                "generateNewSecurityToken",
                &[
                    tokens::string(name),
                    tokens::string(&ticker),
                    tokens::string(details),
                    Token::Bool(divisible),
                ],
                params,
            )
            .await
    }

    pub async fn transfer_ticker_ownership(
        &self,
        new_owner: Address,
        ticker: &str,
        params: TxParams,
    ) -> Result<PendingTransaction> {
        //! Hand a reserved ticker to `new_owner`. Ticker owner only.
        non_zero_address(new_owner, "New owner")?;
        let details = self.get_ticker_details(ticker).await?;
        ensure(
            details.owner == self.contract.sender(&params).await?,
            "Ticker is not owned by the sender",
        )?;
        let ticker = normalize_ticker(ticker)?;
        self.contract
            .send(
                "transferTickerOwnership",
                &[new_owner.into(), tokens::string(&ticker)],
                params,
            )
            .await
    }

    pub async fn change_expiry_limit(
        &self,
        limit: Duration,
        params: TxParams,
    ) -> Result<PendingTransaction> {
        //! Owner only; at least one day.
        ensure(limit >= Duration::days(1), "Expiry limit must be at least one day")?;
        self.ensure_owner(&params).await?;
        self.contract
            .send(
                "changeExpiryLimit",
                &[tokens::uint(duration_to_u256(limit)?)],
                params,
            )
            .await
    }

    pub async fn change_ticker_registration_fee(
        &self,
        fee_usd: Decimal,
        params: TxParams,
    ) -> Result<PendingTransaction> {
        //! Set the ticker fee in USD. Owner only, and the fee must change.
        self.ensure_owner(&params).await?;
        ensure(
            self.get_ticker_registration_fee().await? != fee_usd,
            "Fee is unchanged",
        )?;
        self.contract
            .send(
                "changeTickerRegistrationFee",
                &[tokens::uint(to_wei(fee_usd)?)],
                params,
            )
            .await
    }

    pub async fn change_security_launch_fee(
        &self,
        fee_usd: Decimal,
        params: TxParams,
    ) -> Result<PendingTransaction> {
        //! Set the launch fee in USD. Owner only, and the fee must change.
        self.ensure_owner(&params).await?;
        ensure(
            self.get_security_token_launch_fee().await? != fee_usd,
            "Fee is unchanged",
        )?;
        self.contract
            .send(
                "changeSecurityLaunchFee",
                &[tokens::uint(to_wei(fee_usd)?)],
                params,
            )
            .await
    }

    pub async fn remove_ticker(
        &self,
        ticker: &str,
        params: TxParams,
    ) -> Result<PendingTransaction> {
        //! Drop a registered ticker. Owner only.
        self.ensure_owner(&params).await?;
        ensure(
            self.get_ticker_details(ticker).await?.is_registered(),
            "Ticker is not registered",
        )?;
        let ticker = normalize_ticker(ticker)?;
        self.contract
            .send("removeTicker", &[tokens::string(&ticker)], params)
            .await
    }

    pub async fn pause(&self, params: TxParams) -> Result<PendingTransaction> {
        //! Pause registration and launches.
        self.ensure_owner(&params).await?;
        self.ensure_not_paused().await?;
        self.contract.send("pause", &[], params).await
    }

    pub async fn unpause(&self, params: TxParams) -> Result<PendingTransaction> {
        //! Resume registration and launches.
        self.ensure_owner(&params).await?;
        ensure(self.is_paused().await?, "Registry is not paused")?;
        self.contract.send("unpause", &[], params).await
    }

    pub async fn register_ticker_logs(
        &self,
        from_block: BlockReference,
        to_block: BlockReference,
    ) -> Result<Vec<RegisterTickerEvent>> {
        //! `RegisterTicker` events in the block range.
        self.contract
            .logs("RegisterTicker", from_block, to_block)
            .await?
            .iter()
            .map(|log| -> Result<RegisterTickerEvent> {
                Ok(RegisterTickerEvent {
                    owner: log_param(log, "_owner")?,
                    ticker: log_param(log, "_ticker")?,
                    registration_date: u256_to_date(log_param(log, "_registrationDate")?)?,
                    expiry_date: u256_to_date(log_param(log, "_expiryDate")?)?,
                    from_admin: log_param(log, "_fromAdmin")?,
                    fee_poly: from_wei(log_param(log, "_registrationFeePoly")?)?,
                    fee_usd: from_wei(log_param(log, "_registrationFeeUsd")?)?,
                })
            })
            .collect()
    }

    pub async fn new_security_token_logs(
        &self,
        from_block: BlockReference,
        to_block: BlockReference,
    ) -> Result<Vec<NewSecurityTokenEvent>> {
        //! `NewSecurityToken` events in the block range.
        self.contract
            .logs("NewSecurityToken", from_block, to_block)
            .await?
            .iter()
            .map(|log| -> Result<NewSecurityTokenEvent> {
                Ok(NewSecurityTokenEvent {
                    ticker: log_param(log, "_ticker")?,
                    name: log_param(log, "_name")?,
                    security_token: log_param(log, "_securityTokenAddress")?,
                    owner: log_param(log, "_owner")?,
                    added_at: u256_to_date(log_param(log, "_addedAt")?)?,
                    registrant: log_param(log, "_registrant")?,
                    from_admin: log_param(log, "_fromAdmin")?,
                    fee_usd: from_wei(log_param(log, "_usdFee")?)?,
                    fee_poly: from_wei(log_param(log, "_polyFee")?)?,
                })
            })
            .collect()
    }
}

pub(crate) fn version_from_parts(function: &str, parts: &[u8]) -> Result<ContractVersion> {
    //! Version tag of a `uint8[3]` version output.
    let unexpected = |reason: String| Error::UnexpectedOutput {
        function: function.to_string(),
        reason,
    };
    match parts {
        [major, minor, ..] => ContractVersion::from_parts(*major, *minor)
            .ok_or_else(|| unexpected(format!("unsupported version {parts:?}"))),
        _ => Err(unexpected(format!("malformed version {parts:?}"))),
    }
}
