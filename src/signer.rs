//! Local signing of transactions.

use crate::address::{Address, AddressConvertible, PrivateKey};
use crate::error::{Error, ProviderError, Result};
use crate::hdnode::{HDNode, HDNodeError, Language, Mnemonic};
use crate::network::{
    BlockInfo, BlockReference, CallRequest, Log, LogFilter, Provider, ProviderResult,
    TransactionReceipt,
};
use crate::transactions::{LegacyTransaction, SignedTransaction, TransactionRequest};
use async_trait::async_trait;
use bytes::Bytes;
use ethereum_types::{H256, U256};
use std::fmt;
use tracing::debug;

/// A single account backed by a private key held in memory.
#[derive(Clone)]
pub struct LocalWallet {
    key: PrivateKey,
    address: Address,
}

impl fmt::Debug for LocalWallet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalWallet")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

impl LocalWallet {
    pub fn from_private_key(key: PrivateKey) -> Self {
        //! Wallet of a raw private key.
        Self {
            address: key.address(),
            key,
        }
    }

    pub fn from_hdnode(node: &HDNode) -> std::result::Result<Self, HDNodeError> {
        //! Wallet of an HD node with a private key.
        Ok(Self::from_private_key(*node.private_key()?.private_key()))
    }

    pub fn from_mnemonic(
        phrase: &str,
        password: &str,
        index: u32,
    ) -> std::result::Result<Self, HDNodeError> {
        //! Wallet of the `index`-th account on the default Ethereum path.
        let mnemonic = Mnemonic::from_phrase(phrase, Language::English)
            .map_err(|e| HDNodeError::Derivation(e.to_string()))?;
        let node = HDNode::build()
            .mnemonic_with_password(mnemonic, password)
            .build()?
            .derive(index)?;
        Self::from_hdnode(&node)
    }

    pub const fn address(&self) -> Address {
        //! Account address.
        self.address
    }

    pub fn sign(
        &self,
        transaction: &LegacyTransaction,
        chain_id: u64,
    ) -> Result<SignedTransaction> {
        //! Sign a transaction for the given chain.
        transaction.sign(&self.key, chain_id)
    }
}

/// Provider wrapper that signs transactions locally and submits them raw.
///
/// All reads are delegated to the inner provider.
#[derive(Debug)]
pub struct SigningProvider<P> {
    inner: P,
    wallet: LocalWallet,
}

impl<P: Provider> SigningProvider<P> {
    pub const fn new(inner: P, wallet: LocalWallet) -> Self {
        //! Sign with `wallet`, talk to the node through `inner`.
        Self { inner, wallet }
    }

    pub const fn wallet(&self) -> &LocalWallet {
        //! Signing wallet.
        &self.wallet
    }

    pub const fn inner(&self) -> &P {
        //! Wrapped provider.
        &self.inner
    }
}

#[async_trait]
impl<P: Provider> Provider for SigningProvider<P> {
    async fn call(&self, request: &CallRequest, block: &BlockReference) -> ProviderResult<Bytes> {
        self.inner.call(request, block).await
    }

    async fn estimate_gas(&self, request: &CallRequest) -> ProviderResult<U256> {
        self.inner.estimate_gas(request).await
    }

    async fn gas_price(&self) -> ProviderResult<U256> {
        self.inner.gas_price().await
    }

    async fn accounts(&self) -> ProviderResult<Vec<Address>> {
        Ok(vec![self.wallet.address()])
    }

    async fn chain_id(&self) -> ProviderResult<u64> {
        self.inner.chain_id().await
    }

    async fn transaction_count(
        &self,
        address: Address,
        block: &BlockReference,
    ) -> ProviderResult<U256> {
        self.inner.transaction_count(address, block).await
    }

    async fn send_transaction(&self, request: &TransactionRequest) -> ProviderResult<H256> {
        if request.from != self.wallet.address() {
            return Err(ProviderError::UnknownAccount(request.from));
        }
        let nonce = match request.nonce {
            Some(nonce) => nonce,
            None => {
                self.inner
                    .transaction_count(request.from, &BlockReference::Pending)
                    .await?
            }
        };
        let gas_price = match request.gas_price {
            Some(price) => price,
            None => self.inner.gas_price().await?,
        };
        let mut transaction = LegacyTransaction::from_request(request, nonce, gas_price);
        if request.gas.is_none() {
            transaction.gas = self.inner.estimate_gas(&request.into()).await?;
        }
        let chain_id = self.inner.chain_id().await?;
        let signed = self
            .wallet
            .sign(&transaction, chain_id)
            .map_err(|e| match e {
                Error::Signing(reason) => ProviderError::Signing(reason),
                other => ProviderError::Signing(other.to_string()),
            })?;
        debug!(
            hash = ?signed.hash,
            nonce = %transaction.nonce,
            "Submitting locally signed transaction"
        );
        self.inner.send_raw_transaction(&signed.raw).await
    }

    async fn send_raw_transaction(&self, raw: &Bytes) -> ProviderResult<H256> {
        self.inner.send_raw_transaction(raw).await
    }

    async fn transaction_receipt(&self, hash: H256) -> ProviderResult<Option<TransactionReceipt>> {
        self.inner.transaction_receipt(hash).await
    }

    async fn block(&self, block: &BlockReference) -> ProviderResult<Option<BlockInfo>> {
        self.inner.block(block).await
    }

    async fn logs(&self, filter: &LogFilter) -> ProviderResult<Vec<Log>> {
        self.inner.logs(filter).await
    }
}
