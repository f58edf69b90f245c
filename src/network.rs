//! Module for interacting with node JSON-RPC APIs.

use crate::address::Address;
use crate::error::ProviderError;
use crate::transactions::TransactionRequest;
use crate::utils::unhex;
use async_trait::async_trait;
use bytes::Bytes;
use ethabi::ParamType;
use ethereum_types::{H256, U256, U64};
use serde::{Deserialize, Serialize, Serializer};

/// Generic result of all provider calls.
pub type ProviderResult<T> = std::result::Result<T, ProviderError>;

/// Selector of the standard `Error(string)` revert payload.
const REVERT_SELECTOR: [u8; 4] = [0x08, 0xc3, 0x79, 0xa0];

/// Block reference: a way to identify the block on the chain.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub enum BlockReference {
    /// Most recent mined block.
    #[default]
    Latest,
    /// Pending state, including not yet mined transactions.
    Pending,
    /// Genesis block.
    Earliest,
    /// Block ordinal number
    Number(u64),
    /// Block hash
    Hash(H256),
}

impl Serialize for BlockReference {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Latest => serializer.serialize_str("latest"),
            Self::Pending => serializer.serialize_str("pending"),
            Self::Earliest => serializer.serialize_str("earliest"),
            Self::Number(num) => serializer.serialize_str(&format!("0x{num:x}")),
            Self::Hash(hash) => {
                // EIP-1898 block specifier.
                use serde::ser::SerializeMap;
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("blockHash", hash)?;
                map.end()
            }
        }
    }
}

/// Read-only call (`eth_call` / `eth_estimateGas`) request.
#[serde_with::serde_as]
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallRequest {
    /// Caller address
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<Address>,
    /// Contract address
    pub to: Address,
    /// Maximal amount of gas
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gas: Option<U256>,
    /// Gas price
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gas_price: Option<U256>,
    /// Attached value in wei
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<U256>,
    /// Calldata
    #[serde_as(as = "unhex::Hex")]
    pub data: Bytes,
}

impl From<&TransactionRequest> for CallRequest {
    fn from(request: &TransactionRequest) -> Self {
        Self {
            from: Some(request.from),
            to: request.to.unwrap_or_default(),
            gas: request.gas,
            gas_price: request.gas_price,
            value: (!request.value.is_zero()).then_some(request.value),
            data: request.data.clone(),
        }
    }
}

/// Emitted contract event
#[serde_with::serde_as]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Log {
    /// The address of contract which produces the event
    pub address: Address,
    /// Event topics
    pub topics: Vec<H256>,
    /// Event data
    #[serde_as(as = "unhex::Hex")]
    pub data: Bytes,
    /// Block where the event was emitted
    #[serde(default)]
    pub block_number: Option<U64>,
    /// Transaction emitting the event
    #[serde(default)]
    pub transaction_hash: Option<H256>,
    /// Position of the log in the block
    #[serde(default)]
    pub log_index: Option<U256>,
}

/// Transaction receipt
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionReceipt {
    /// Transaction hash
    pub transaction_hash: H256,
    /// Including block hash
    #[serde(default)]
    pub block_hash: Option<H256>,
    /// Including block number
    #[serde(default)]
    pub block_number: Option<U64>,
    /// Sender
    pub from: Address,
    /// Recipient, `None` for contract creation
    #[serde(default)]
    pub to: Option<Address>,
    /// Gas consumed by this transaction
    #[serde(default)]
    pub gas_used: Option<U256>,
    /// Deployed contract address
    #[serde(default)]
    pub contract_address: Option<Address>,
    /// Emitted events
    #[serde(default)]
    pub logs: Vec<Log>,
    /// `1` on success, `0` on revert
    #[serde(default)]
    pub status: Option<U64>,
}

impl TransactionReceipt {
    pub fn succeeded(&self) -> bool {
        //! Pre-byzantium receipts carry no status and count as successful.
        self.status.map_or(true, |status| !status.is_zero())
    }
}

/// A blockchain block header.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockInfo {
    /// Block number (height), `None` while pending
    pub number: Option<U64>,
    /// Block hash, `None` while pending
    pub hash: Option<H256>,
    /// Parent block hash
    pub parent_hash: H256,
    /// Block unix timestamp
    pub timestamp: U256,
    /// Block gas limit
    pub gas_limit: U256,
    /// Accumulative gas usage of transactions
    pub gas_used: U256,
    /// Hashes of included transactions
    #[serde(default)]
    pub transactions: Vec<H256>,
}

/// `eth_getLogs` filter
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogFilter {
    /// First block to scan
    pub from_block: BlockReference,
    /// Last block to scan
    pub to_block: BlockReference,
    /// Emitting contract
    pub address: Address,
    /// Topic filters, `None` matches anything
    pub topics: Vec<Option<H256>>,
}

/// Access to a node: read calls, transaction submission and chain data.
///
/// Every method is a single independent round trip.
#[async_trait]
pub trait Provider: Send + Sync + std::fmt::Debug {
    /// Execute a read-only call and return raw output.
    async fn call(&self, request: &CallRequest, block: &BlockReference) -> ProviderResult<Bytes>;
    /// Estimate gas required by a call.
    async fn estimate_gas(&self, request: &CallRequest) -> ProviderResult<U256>;
    /// Current gas price.
    async fn gas_price(&self) -> ProviderResult<U256>;
    /// Accounts managed by the node (or the local signer).
    async fn accounts(&self) -> ProviderResult<Vec<Address>>;
    /// Chain identifier.
    async fn chain_id(&self) -> ProviderResult<u64>;
    /// Number of transactions sent from an address.
    async fn transaction_count(
        &self,
        address: Address,
        block: &BlockReference,
    ) -> ProviderResult<U256>;
    /// Submit a transaction signed by the node.
    async fn send_transaction(&self, request: &TransactionRequest) -> ProviderResult<H256>;
    /// Submit a signed transaction.
    async fn send_raw_transaction(&self, raw: &Bytes) -> ProviderResult<H256>;
    /// Receipt of a mined transaction, `None` while pending or unknown.
    async fn transaction_receipt(&self, hash: H256) -> ProviderResult<Option<TransactionReceipt>>;
    /// Block header, `None` for unknown blocks.
    async fn block(&self, block: &BlockReference) -> ProviderResult<Option<BlockInfo>>;
    /// Logs matching a filter.
    async fn logs(&self, filter: &LogFilter) -> ProviderResult<Vec<Log>>;
}

pub fn decode_revert_reason(data: &[u8]) -> Option<String> {
    //! Extract the reason of an `Error(string)` revert payload.
    let payload = data.strip_prefix(&REVERT_SELECTOR)?;
    match ethabi::decode(&[ParamType::String], payload).ok()?.pop()? {
        ethabi::Token::String(reason) => Some(reason),
        _ => None,
    }
}

/// Error object of a JSON-RPC response.
#[cfg(feature = "http")]
#[derive(Clone, Debug, Deserialize)]
struct RpcError {
    code: i64,
    #[serde(default)]
    message: String,
    #[serde(default)]
    data: Option<serde_json::Value>,
}

#[cfg(feature = "http")]
impl From<RpcError> for ProviderError {
    fn from(error: RpcError) -> Self {
        let reason = error
            .data
            .as_ref()
            .and_then(serde_json::Value::as_str)
            .and_then(|data| crate::utils::decode_hex(data).ok())
            .and_then(|data| decode_revert_reason(&data));
        match reason {
            Some(reason) => Self::Reverted { reason },
            None => Self::Rpc {
                code: error.code,
                message: error.message,
            },
        }
    }
}

#[cfg(feature = "http")]
pub use http::HttpProvider;

#[cfg(feature = "http")]
mod http {
    use super::*;
    use crate::utils::decode_hex;
    use reqwest::{Client, Url};
    use serde::de::DeserializeOwned;
    use std::sync::atomic::{AtomicU64, Ordering};
    use tracing::debug;

    const NO_PARAMS: [u8; 0] = [];

    #[derive(Serialize)]
    struct RpcRequest<'a, P> {
        jsonrpc: &'static str,
        id: u64,
        method: &'a str,
        params: P,
    }

    #[derive(Deserialize)]
    struct RpcResponse {
        #[serde(default)]
        result: serde_json::Value,
        #[serde(default)]
        error: Option<RpcError>,
    }

    /// A simple JSON-RPC client for an Ethereum node.
    #[derive(Debug)]
    pub struct HttpProvider {
        /// Node endpoint
        pub url: Url,
        client: Client,
        next_id: AtomicU64,
    }

    impl HttpProvider {
        /// Endpoint of a local development node
        pub const LOCAL_URL: &'static str = "http://localhost:8545/";

        pub fn new(url: Url) -> Self {
            //! Client for the node at `url`.
            Self {
                url,
                client: Client::new(),
                next_id: AtomicU64::new(1),
            }
        }

        pub fn local() -> Self {
            //! Client for a development node on the default port.
            Self::new(Url::parse(Self::LOCAL_URL).expect("Constant URL is valid"))
        }

        async fn request<P, R>(&self, method: &str, params: P) -> ProviderResult<R>
        where
            P: Serialize + Send,
            R: DeserializeOwned,
        {
            let id = self.next_id.fetch_add(1, Ordering::Relaxed);
            debug!(method, id, "JSON-RPC request");
            let response = self
                .client
                .post(self.url.clone())
                .json(&RpcRequest {
                    jsonrpc: "2.0",
                    id,
                    method,
                    params,
                })
                .send()
                .await?;
            // Some nodes answer JSON-RPC errors with a non-2xx status.
            let status = response.error_for_status_ref().err();
            let body = response.bytes().await?;
            let response = match (serde_json::from_slice::<RpcResponse>(&body), status) {
                (Ok(response), None) => response,
                (Ok(response), Some(_)) if response.error.is_some() => response,
                (_, Some(status)) => return Err(status.into()),
                (Err(e), None) => return Err(e.into()),
            };
            if let Some(error) = response.error {
                debug!(method, id, code = error.code, "JSON-RPC error");
                return Err(error.into());
            }
            Ok(serde_json::from_value(response.result)?)
        }

        async fn request_bytes<P: Serialize + Send>(
            &self,
            method: &str,
            params: P,
        ) -> ProviderResult<Bytes> {
            let text: String = self.request(method, params).await?;
            decode_hex(&text)
                .map(Bytes::from)
                .map_err(|e| ProviderError::UnexpectedResponse(e.to_string()))
        }
    }

    #[async_trait]
    impl Provider for HttpProvider {
        async fn call(
            &self,
            request: &CallRequest,
            block: &BlockReference,
        ) -> ProviderResult<Bytes> {
            self.request_bytes("eth_call", (request, block)).await
        }

        async fn estimate_gas(&self, request: &CallRequest) -> ProviderResult<U256> {
            self.request("eth_estimateGas", (request,)).await
        }

        async fn gas_price(&self) -> ProviderResult<U256> {
            self.request("eth_gasPrice", NO_PARAMS).await
        }

        async fn accounts(&self) -> ProviderResult<Vec<Address>> {
            self.request("eth_accounts", NO_PARAMS).await
        }

        async fn chain_id(&self) -> ProviderResult<u64> {
            let id: U64 = self.request("eth_chainId", NO_PARAMS).await?;
            Ok(id.as_u64())
        }

        async fn transaction_count(
            &self,
            address: Address,
            block: &BlockReference,
        ) -> ProviderResult<U256> {
            self.request("eth_getTransactionCount", (address, block))
                .await
        }

        async fn send_transaction(&self, request: &TransactionRequest) -> ProviderResult<H256> {
            self.request("eth_sendTransaction", (request,)).await
        }

        async fn send_raw_transaction(&self, raw: &Bytes) -> ProviderResult<H256> {
            let encoded = format!("0x{}", rustc_hex::ToHex::to_hex::<String>(&raw[..]));
            self.request("eth_sendRawTransaction", (encoded,)).await
        }

        async fn transaction_receipt(
            &self,
            hash: H256,
        ) -> ProviderResult<Option<TransactionReceipt>> {
            self.request("eth_getTransactionReceipt", (hash,)).await
        }

        async fn block(&self, block: &BlockReference) -> ProviderResult<Option<BlockInfo>> {
            match block {
                BlockReference::Hash(hash) => {
                    self.request("eth_getBlockByHash", (hash, false)).await
                }
                other => self.request("eth_getBlockByNumber", (other, false)).await,
            }
        }

        async fn logs(&self, filter: &LogFilter) -> ProviderResult<Vec<Log>> {
            self.request("eth_getLogs", (filter,)).await
        }
    }
}
