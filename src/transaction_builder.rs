//! Preparing transactions for submission and waiting for their receipts.

use crate::address::Address;
use crate::error::{Error, Result};
use crate::network::{CallRequest, Provider, TransactionReceipt};
use crate::transactions::TransactionRequest;
use bytes::Bytes;
use ethereum_types::{H256, U256};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Per-call overrides. Unset fields fall back to [`TxDefaults`] and then to
/// values fetched from the node.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct TxParams {
    /// Sender
    pub from: Option<Address>,
    /// Gas limit
    pub gas: Option<U256>,
    /// Gas price in wei
    pub gas_price: Option<U256>,
    /// Attached value in wei
    pub value: Option<U256>,
    /// Sender nonce
    pub nonce: Option<U256>,
}

impl TxParams {
    pub fn new() -> Self {
        //! No overrides.
        Self::default()
    }
    #[must_use]
    pub const fn from(mut self, from: Address) -> Self {
        //! Send from `from`.
        self.from = Some(from);
        self
    }
    #[must_use]
    pub const fn gas(mut self, gas: U256) -> Self {
        //! Set gas limit, skipping estimation.
        self.gas = Some(gas);
        self
    }
    #[must_use]
    pub const fn gas_price(mut self, gas_price: U256) -> Self {
        //! Set gas price.
        self.gas_price = Some(gas_price);
        self
    }
    #[must_use]
    pub const fn value(mut self, value: U256) -> Self {
        //! Attach ether, in wei.
        self.value = Some(value);
        self
    }
    #[must_use]
    pub const fn nonce(mut self, nonce: U256) -> Self {
        //! Set nonce explicitly.
        self.nonce = Some(nonce);
        self
    }
}

/// Client-wide transaction defaults, usually read from the `[tx_defaults]`
/// configuration section.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct TxDefaults {
    /// Default sender
    pub from: Option<Address>,
    /// Default gas price in wei
    pub gas_price: Option<U256>,
    /// Multiplier applied to gas estimates
    pub gas_safety_factor: Decimal,
    /// How long to wait for a receipt
    pub confirmation_timeout_secs: u64,
    /// Delay between receipt polls
    pub poll_interval_ms: u64,
}

impl Default for TxDefaults {
    fn default() -> Self {
        Self {
            from: None,
            gas_price: None,
            gas_safety_factor: Decimal::new(12, 1),
            confirmation_timeout_secs: 120,
            poll_interval_ms: 1000,
        }
    }
}

impl TxDefaults {
    pub const fn confirmation_timeout(&self) -> Duration {
        //! How long to wait for a receipt.
        Duration::from_secs(self.confirmation_timeout_secs)
    }

    pub const fn poll_interval(&self) -> Duration {
        //! Delay between receipt polls.
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn apply_safety_factor(&self, estimate: U256) -> U256 {
        //! Scale a gas estimate, rounding up. Factors below one are ignored.
        let factor = self.gas_safety_factor.normalize();
        if factor <= Decimal::ONE {
            return estimate;
        }
        let denominator = U256::exp10(factor.scale() as usize);
        let numerator = U256::from(factor.mantissa().unsigned_abs());
        let scaled = estimate.saturating_mul(numerator);
        let (quotient, remainder) = scaled.div_mod(denominator);
        if remainder.is_zero() {
            quotient
        } else {
            quotient.saturating_add(U256::one())
        }
    }
}

/// Builder producing a fully populated [`TransactionRequest`].
///
/// Sender, gas and gas price are resolved in order: explicit parameters,
/// client defaults, node.
#[derive(Clone, Debug)]
pub struct TransactionBuilder<'a> {
    provider: &'a dyn Provider,
    defaults: &'a TxDefaults,
    to: Option<Address>,
    data: Bytes,
    params: TxParams,
}

impl<'a> TransactionBuilder<'a> {
    pub fn new(provider: &'a dyn Provider, defaults: &'a TxDefaults) -> Self {
        //! Create a new builder.
        Self {
            provider,
            defaults,
            to: None,
            data: Bytes::new(),
            params: TxParams::default(),
        }
    }
    #[must_use]
    pub const fn to(mut self, to: Address) -> Self {
        //! Set recipient. Without it, the transaction deploys a contract.
        self.to = Some(to);
        self
    }
    #[must_use]
    pub fn data(mut self, data: Bytes) -> Self {
        //! Set calldata.
        self.data = data;
        self
    }
    #[must_use]
    pub fn params(mut self, params: TxParams) -> Self {
        //! Apply per-call overrides.
        self.params = params;
        self
    }

    pub async fn sender(&self) -> Result<Address> {
        //! Resolve the sender, asking the node for its accounts last.
        if let Some(from) = self.params.from.or(self.defaults.from) {
            return Ok(from);
        }
        self.provider
            .accounts()
            .await?
            .first()
            .copied()
            .ok_or(Error::NoSender)
    }

    pub async fn build(&self) -> Result<TransactionRequest> {
        //! Prepare a request. This may perform network requests to fill
        //! the sender, gas and gas price.
        let mut request = TransactionRequest {
            from: self.sender().await?,
            to: self.to,
            gas: self.params.gas,
            gas_price: self.params.gas_price.or(self.defaults.gas_price),
            value: self.params.value.unwrap_or_default(),
            data: self.data.clone(),
            nonce: self.params.nonce,
        };
        if request.gas.is_none() {
            let estimate = self
                .provider
                .estimate_gas(&CallRequest::from(&request))
                .await?;
            request.gas = Some(self.defaults.apply_safety_factor(estimate));
        }
        if request.gas_price.is_none() {
            request.gas_price = Some(self.provider.gas_price().await?);
        }
        debug!(from = %request.from, gas = ?request.gas, "Prepared transaction");
        Ok(request)
    }
}

/// A submitted transaction.
#[derive(Clone, Debug)]
pub struct PendingTransaction {
    hash: H256,
    provider: Arc<dyn Provider>,
    timeout: Duration,
    poll_interval: Duration,
}

impl PendingTransaction {
    pub fn new(hash: H256, provider: Arc<dyn Provider>, defaults: &TxDefaults) -> Self {
        //! Track `hash` with timings from `defaults`.
        Self {
            hash,
            provider,
            timeout: defaults.confirmation_timeout(),
            poll_interval: defaults.poll_interval(),
        }
    }

    pub const fn hash(&self) -> H256 {
        //! Transaction hash.
        self.hash
    }

    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        //! Override the confirmation timeout.
        self.timeout = timeout;
        self
    }

    pub async fn receipt(&self) -> Result<Option<TransactionReceipt>> {
        //! Current receipt, `None` while not mined.
        Ok(self.provider.transaction_receipt(self.hash).await?)
    }

    pub async fn confirmed(&self) -> Result<TransactionReceipt> {
        //! Poll until the transaction is mined.
        //!
        //! Fails with [`Error::TransactionReverted`] for a failed receipt and
        //! with [`Error::Timeout`] when no receipt shows up in time.
        let deadline = tokio::time::Instant::now() + self.timeout;
        loop {
            if let Some(receipt) = self.receipt().await? {
                if !receipt.succeeded() {
                    warn!(hash = ?self.hash, "Transaction reverted");
                    return Err(Error::TransactionReverted(self.hash));
                }
                info!(hash = ?self.hash, block = ?receipt.block_number, "Transaction confirmed");
                return Ok(receipt);
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(Error::Timeout(self.hash));
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::mock::MockProvider;
    use ethereum_types::U64;
    use rust_decimal_macros::dec;

    #[test]
    fn test_safety_factor() {
        let mut defaults = TxDefaults::default();
        assert_eq!(defaults.apply_safety_factor(100_000.into()), 120_000.into());
        assert_eq!(defaults.apply_safety_factor(21_001.into()), 25_202.into());
        defaults.gas_safety_factor = dec!(0.5);
        assert_eq!(defaults.apply_safety_factor(100.into()), 100.into());
        defaults.gas_safety_factor = dec!(2);
        assert_eq!(defaults.apply_safety_factor(100.into()), 200.into());
    }

    #[tokio::test]
    async fn test_no_sender() {
        let mock = MockProvider::new();
        let defaults = TxDefaults::default();
        let builder = TransactionBuilder::new(&mock, &defaults);
        assert!(matches!(builder.build().await, Err(Error::NoSender)));
    }

    #[tokio::test]
    async fn test_pending_reverted() {
        let mock = Arc::new(MockProvider::new());
        let hash = H256::repeat_byte(7);
        mock.mock_receipt(TransactionReceipt {
            transaction_hash: hash,
            block_hash: None,
            block_number: Some(U64::from(5)),
            from: Address::ZERO,
            to: None,
            gas_used: None,
            contract_address: None,
            logs: vec![],
            status: Some(U64::zero()),
        });
        let pending = PendingTransaction::new(hash, mock, &TxDefaults::default());
        assert!(matches!(
            pending.confirmed().await,
            Err(Error::TransactionReverted(h)) if h == hash
        ));
    }

    #[tokio::test]
    async fn test_pending_timeout() {
        let defaults = TxDefaults {
            confirmation_timeout_secs: 0,
            poll_interval_ms: 1,
            ..Default::default()
        };
        let pending =
            PendingTransaction::new(H256::repeat_byte(1), Arc::new(MockProvider::new()), &defaults);
        assert!(matches!(pending.confirmed().await, Err(Error::Timeout(_))));
    }
}
