//! Error types shared by all wrappers.

use crate::conversions::ConversionError;
use crate::version::ContractVersion;
use ethereum_types::H256;

/// Failures of the node transport.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ProviderError {
    /// HTTP layer failed.
    #[cfg(feature = "http")]
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    /// Malformed JSON payload.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    /// JSON-RPC error object returned by the node.
    #[error("RPC error {code}: {message}")]
    Rpc {
        /// JSON-RPC error code
        code: i64,
        /// Node-provided message
        message: String,
    },
    /// Call reverted with a decodable reason.
    #[error("execution reverted: {reason}")]
    Reverted {
        /// Revert reason from `Error(string)` payload.
        reason: String,
    },
    /// Response did not have the expected shape.
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),
    /// Local signing of a transaction failed.
    #[error("signing failed: {0}")]
    Signing(String),
    /// Transaction sender is not managed by the local signer.
    #[error("account {0} is not managed by this signer")]
    UnknownAccount(crate::address::Address),
}

/// Any failure of a wrapper operation.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// Transport or remote node error, propagated verbatim.
    #[error(transparent)]
    Provider(#[from] ProviderError),
    /// Parameters or outputs did not match the contract ABI.
    #[error("ABI error: {0}")]
    Abi(#[from] ethabi::Error),
    /// Unit or format conversion failed.
    #[error(transparent)]
    Conversion(#[from] ConversionError),
    /// Client-side check mirroring an on-chain guard failed; nothing was sent.
    #[error("precondition failed: {0}")]
    Precondition(String),
    /// A call returned fewer values or other types than declared.
    #[error("unexpected output of {function}: {reason}")]
    UnexpectedOutput {
        /// Contract function name
        function: String,
        /// What was wrong
        reason: String,
    },
    /// The operation does not exist in the ABI of this contract version.
    #[error("{function} is not available on {version} contracts")]
    UnsupportedVersion {
        /// Requested operation
        function: &'static str,
        /// Version of the deployed contract
        version: ContractVersion,
    },
    /// No sender configured and the node exposes no accounts.
    #[error("no sender account available")]
    NoSender,
    /// Local transaction signing failed.
    #[error("signing failed: {0}")]
    Signing(String),
    /// Mined transaction has a failed status.
    #[error("transaction {0:#x} reverted")]
    TransactionReverted(H256),
    /// No receipt appeared before the confirmation timeout.
    #[error("timed out waiting for transaction {0:#x}")]
    Timeout(H256),
}

/// Result of all wrapper operations.
pub type Result<T> = std::result::Result<T, Error>;
