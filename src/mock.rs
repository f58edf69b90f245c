//! In-memory [`Provider`] for tests.
//!
//! Call outputs are registered per contract, keyed either by the exact
//! calldata or by the 4-byte selector. Everything sent through the provider
//! is recorded for later inspection.

use crate::address::Address;
use crate::error::ProviderError;
use crate::network::{
    BlockInfo, BlockReference, CallRequest, Log, LogFilter, Provider, ProviderResult,
    TransactionReceipt,
};
use crate::transactions::TransactionRequest;
use crate::utils::{keccak, selector};
use async_trait::async_trait;
use bytes::Bytes;
use ethabi::Token;
use ethereum_types::{H256, U256, U64};
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Clone, Debug)]
enum Response {
    Output(Bytes),
    Revert(String),
}

#[derive(Debug, Default)]
struct State {
    exact: HashMap<(Address, Bytes), Response>,
    by_selector: HashMap<(Address, [u8; 4]), Response>,
    calls: Vec<CallRequest>,
    sent: Vec<TransactionRequest>,
    raw: Vec<Bytes>,
    receipts: HashMap<H256, TransactionReceipt>,
    logs: Vec<Log>,
    blocks: Vec<BlockInfo>,
}

/// Scriptable provider that never touches the network.
#[derive(Debug)]
pub struct MockProvider {
    state: Mutex<State>,
    accounts: Vec<Address>,
    chain_id: u64,
    gas_price: U256,
    gas_estimate: U256,
    transaction_count: U256,
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MockProvider {
    pub fn new() -> Self {
        //! Empty mock: chain 1, 1 gwei gas price, 100k gas estimate, no accounts.
        Self {
            state: Mutex::default(),
            accounts: vec![],
            chain_id: 1,
            gas_price: U256::from(1_000_000_000u64),
            gas_estimate: U256::from(100_000),
            transaction_count: U256::zero(),
        }
    }

    #[must_use]
    pub fn with_accounts(mut self, accounts: Vec<Address>) -> Self {
        //! Accounts reported by `eth_accounts`.
        self.accounts = accounts;
        self
    }
    #[must_use]
    pub const fn with_chain_id(mut self, chain_id: u64) -> Self {
        //! Chain id reported by `eth_chainId`.
        self.chain_id = chain_id;
        self
    }
    #[must_use]
    pub const fn with_gas_price(mut self, gas_price: U256) -> Self {
        //! Gas price reported by `eth_gasPrice`.
        self.gas_price = gas_price;
        self
    }
    #[must_use]
    pub const fn with_gas_estimate(mut self, gas: U256) -> Self {
        //! Result of every `eth_estimateGas`.
        self.gas_estimate = gas;
        self
    }
    #[must_use]
    pub const fn with_transaction_count(mut self, count: U256) -> Self {
        //! Result of every `eth_getTransactionCount`.
        self.transaction_count = count;
        self
    }

    fn state(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn mock_call(&self, contract: Address, signature: &str, output: &[Token]) {
        //! Answer every call of `signature` (like `balanceOf(address)`) on
        //! `contract`, whatever the arguments.
        self.state().by_selector.insert(
            (contract, selector(signature)),
            Response::Output(ethabi::encode(output).into()),
        );
    }

    pub fn mock_call_with_args(
        &self,
        contract: Address,
        signature: &str,
        args: &[Token],
        output: &[Token],
    ) {
        //! Answer calls of `signature` with exactly these arguments.
        //! Takes precedence over [`MockProvider::mock_call`].
        self.state().exact.insert(
            (contract, calldata(signature, args)),
            Response::Output(ethabi::encode(output).into()),
        );
    }

    pub fn mock_revert(&self, contract: Address, signature: &str, reason: &str) {
        //! Make every call of `signature` revert with `reason`.
        self.state().by_selector.insert(
            (contract, selector(signature)),
            Response::Revert(reason.to_string()),
        );
    }

    pub fn mock_receipt(&self, receipt: TransactionReceipt) {
        //! Receipt returned for its transaction hash.
        self.state()
            .receipts
            .insert(receipt.transaction_hash, receipt);
    }

    pub fn mock_logs(&self, logs: Vec<Log>) {
        //! Logs returned by `eth_getLogs`, filtered by address and topics.
        self.state().logs.extend(logs);
    }

    pub fn mock_block(&self, block: BlockInfo) {
        //! Block returned for its number or hash, and as the latest block.
        self.state().blocks.push(block);
    }

    pub fn calls(&self) -> Vec<CallRequest> {
        //! All `eth_call` requests in order.
        self.state().calls.clone()
    }

    pub fn sent_transactions(&self) -> Vec<TransactionRequest> {
        //! All `eth_sendTransaction` requests in order.
        self.state().sent.clone()
    }

    pub fn raw_transactions(&self) -> Vec<Bytes> {
        //! All `eth_sendRawTransaction` payloads in order.
        self.state().raw.clone()
    }

    fn success_receipt(request: &TransactionRequest, hash: H256) -> TransactionReceipt {
        TransactionReceipt {
            transaction_hash: hash,
            block_hash: Some(H256::repeat_byte(0xbb)),
            block_number: Some(U64::one()),
            from: request.from,
            to: request.to,
            gas_used: request.gas,
            contract_address: None,
            logs: vec![],
            status: Some(U64::one()),
        }
    }
}

pub fn calldata(signature: &str, args: &[Token]) -> Bytes {
    //! Calldata of a call: selector followed by encoded arguments.
    let mut data = selector(signature).to_vec();
    data.extend(ethabi::encode(args));
    data.into()
}

#[async_trait]
impl Provider for MockProvider {
    async fn call(&self, request: &CallRequest, _block: &BlockReference) -> ProviderResult<Bytes> {
        let mut state = self.state();
        state.calls.push(request.clone());
        let exact = state.exact.get(&(request.to, request.data.clone())).cloned();
        let response = exact.or_else(|| {
            let key: [u8; 4] = request.data.get(..4)?.try_into().ok()?;
            state.by_selector.get(&(request.to, key)).cloned()
        });
        match response {
            Some(Response::Output(output)) => Ok(output),
            Some(Response::Revert(reason)) => Err(ProviderError::Reverted { reason }),
            None => Err(ProviderError::Rpc {
                code: -32000,
                message: format!(
                    "no mock response for 0x{} on {}",
                    rustc_hex::ToHex::to_hex::<String>(request.data.get(..4).unwrap_or(&[])),
                    request.to
                ),
            }),
        }
    }

    async fn estimate_gas(&self, _request: &CallRequest) -> ProviderResult<U256> {
        Ok(self.gas_estimate)
    }

    async fn gas_price(&self) -> ProviderResult<U256> {
        Ok(self.gas_price)
    }

    async fn accounts(&self) -> ProviderResult<Vec<Address>> {
        Ok(self.accounts.clone())
    }

    async fn chain_id(&self) -> ProviderResult<u64> {
        Ok(self.chain_id)
    }

    async fn transaction_count(
        &self,
        _address: Address,
        _block: &BlockReference,
    ) -> ProviderResult<U256> {
        Ok(self.transaction_count)
    }

    async fn send_transaction(&self, request: &TransactionRequest) -> ProviderResult<H256> {
        let mut state = self.state();
        state.sent.push(request.clone());
        let hash = H256::from_low_u64_be(state.sent.len() as u64);
        state
            .receipts
            .entry(hash)
            .or_insert_with(|| Self::success_receipt(request, hash));
        Ok(hash)
    }

    async fn send_raw_transaction(&self, raw: &Bytes) -> ProviderResult<H256> {
        self.state().raw.push(raw.clone());
        Ok(H256(keccak(raw)))
    }

    async fn transaction_receipt(&self, hash: H256) -> ProviderResult<Option<TransactionReceipt>> {
        Ok(self.state().receipts.get(&hash).cloned())
    }

    async fn block(&self, block: &BlockReference) -> ProviderResult<Option<BlockInfo>> {
        let state = self.state();
        let found = match block {
            BlockReference::Latest | BlockReference::Pending => state.blocks.last(),
            BlockReference::Earliest => state.blocks.first(),
            BlockReference::Number(number) => state
                .blocks
                .iter()
                .find(|b| b.number == Some(U64::from(*number))),
            BlockReference::Hash(hash) => state.blocks.iter().find(|b| b.hash == Some(*hash)),
        };
        Ok(found.cloned())
    }

    async fn logs(&self, filter: &LogFilter) -> ProviderResult<Vec<Log>> {
        Ok(self
            .state()
            .logs
            .iter()
            .filter(|log| log.address == filter.address)
            .filter(|log| {
                filter
                    .topics
                    .iter()
                    .enumerate()
                    .all(|(i, topic)| topic.map_or(true, |t| log.topics.get(i) == Some(&t)))
            })
            .cloned()
            .collect())
    }
}
