//! Deployed contract handle: calls, transactions and events through an ABI.

use crate::address::Address;
use crate::error::{Error, Result};
use crate::network::{BlockReference, CallRequest, LogFilter, Provider};
use crate::transaction_builder::{PendingTransaction, TransactionBuilder, TxDefaults, TxParams};
use bytes::Bytes;
use ethabi::{Contract as Abi, Function, RawLog, Token};
use ethereum_types::{H256, U256};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

/// Conversion of a decoded ABI token into a Rust value.
pub trait FromToken: Sized {
    /// `None` when the token has another type or does not fit.
    fn from_token(token: Token) -> Option<Self>;
}

impl FromToken for Token {
    fn from_token(token: Token) -> Option<Self> {
        Some(token)
    }
}

impl FromToken for Address {
    fn from_token(token: Token) -> Option<Self> {
        token.into_address().map(Self::from)
    }
}

impl FromToken for U256 {
    fn from_token(token: Token) -> Option<Self> {
        token.into_uint()
    }
}

impl FromToken for u8 {
    fn from_token(token: Token) -> Option<Self> {
        let value = token.into_uint()?;
        (value <= U256::from(u8::MAX)).then(|| value.low_u32() as u8)
    }
}

impl FromToken for u64 {
    fn from_token(token: Token) -> Option<Self> {
        let value = token.into_uint()?;
        (value.bits() <= 64).then(|| value.low_u64())
    }
}

impl FromToken for bool {
    fn from_token(token: Token) -> Option<Self> {
        token.into_bool()
    }
}

impl FromToken for String {
    fn from_token(token: Token) -> Option<Self> {
        token.into_string()
    }
}

impl FromToken for [u8; 32] {
    fn from_token(token: Token) -> Option<Self> {
        token.into_fixed_bytes()?.try_into().ok()
    }
}

impl FromToken for H256 {
    fn from_token(token: Token) -> Option<Self> {
        <[u8; 32]>::from_token(token).map(Self)
    }
}

impl FromToken for Bytes {
    fn from_token(token: Token) -> Option<Self> {
        token.into_bytes().map(Self::from)
    }
}

impl<T: FromToken> FromToken for Vec<T> {
    fn from_token(token: Token) -> Option<Self> {
        let items = match token {
            Token::Array(items) | Token::FixedArray(items) | Token::Tuple(items) => items,
            _ => return None,
        };
        items.into_iter().map(T::from_token).collect()
    }
}

/// Decoded outputs of a call, consumed in declaration order.
#[derive(Clone, Debug)]
pub struct Outputs {
    function: String,
    tokens: std::vec::IntoIter<Token>,
}

impl Outputs {
    pub fn new(function: impl Into<String>, tokens: Vec<Token>) -> Self {
        //! Outputs of `function`, used in error messages.
        Self {
            function: function.into(),
            tokens: tokens.into_iter(),
        }
    }

    fn unexpected(&self, reason: impl Into<String>) -> Error {
        Error::UnexpectedOutput {
            function: self.function.clone(),
            reason: reason.into(),
        }
    }

    pub fn take<T: FromToken>(&mut self) -> Result<T> {
        //! Next output value.
        let token = self
            .tokens
            .next()
            .ok_or_else(|| self.unexpected("too few values"))?;
        let description = format!("{token:?}");
        T::from_token(token).ok_or_else(|| {
            self.unexpected(format!(
                "cannot read {description} as {}",
                std::any::type_name::<T>()
            ))
        })
    }

    pub fn single<T: FromToken>(mut self) -> Result<T> {
        //! The only output value.
        let value = self.take()?;
        if self.tokens.len() > 0 {
            return Err(self.unexpected("too many values"));
        }
        Ok(value)
    }

    pub fn remaining(&self) -> usize {
        //! Number of values not consumed yet.
        self.tokens.len()
    }
}

/// Typed access to a named parameter of a decoded event.
pub fn log_param<T: FromToken>(log: &ethabi::Log, name: &str) -> Result<T> {
    let unexpected = |reason: String| Error::UnexpectedOutput {
        function: name.to_string(),
        reason,
    };
    let param = log
        .params
        .iter()
        .find(|param| param.name == name)
        .ok_or_else(|| unexpected("missing event parameter".to_string()))?;
    T::from_token(param.value.clone())
        .ok_or_else(|| unexpected(format!("cannot read {:?}", param.value)))
}

/// Shorthands for building call arguments.
pub mod tokens {
    use crate::address::Address;
    use ethabi::Token;
    use ethereum_types::U256;

    pub fn uint(value: impl Into<U256>) -> Token {
        //! Unsigned integer of any width.
        Token::Uint(value.into())
    }

    pub fn string(value: &str) -> Token {
        //! Dynamic string.
        Token::String(value.to_string())
    }

    pub fn bytes32(value: [u8; 32]) -> Token {
        //! Fixed 32 byte value.
        Token::FixedBytes(value.to_vec())
    }

    pub fn addresses(values: &[Address]) -> Token {
        //! `address[]`.
        Token::Array(values.iter().copied().map(Token::from).collect())
    }

    pub fn uints(values: impl IntoIterator<Item = U256>) -> Token {
        //! `uint256[]`.
        Token::Array(values.into_iter().map(Token::Uint).collect())
    }

    pub fn bools(values: &[bool]) -> Token {
        //! `bool[]`.
        Token::Array(values.iter().copied().map(Token::Bool).collect())
    }
}

/// A deployed contract: address, ABI and the provider used to reach it.
///
/// Cheap to clone: the ABI is static and the provider is shared.
#[derive(Clone)]
pub struct Contract {
    address: Address,
    abi: &'static Abi,
    provider: Arc<dyn Provider>,
    defaults: Arc<TxDefaults>,
}

impl fmt::Debug for Contract {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Contract")
            .field("address", &self.address)
            .field("provider", &self.provider)
            .finish_non_exhaustive()
    }
}

impl Contract {
    pub fn new(
        address: Address,
        abi: &'static Abi,
        provider: Arc<dyn Provider>,
        defaults: Arc<TxDefaults>,
    ) -> Self {
        //! Contract at `address` speaking `abi`.
        Self {
            address,
            abi,
            provider,
            defaults,
        }
    }

    pub fn at(&self, address: Address, abi: &'static Abi) -> Self {
        //! Another contract reached through the same provider and defaults.
        Self::new(address, abi, self.provider.clone(), self.defaults.clone())
    }

    pub const fn address(&self) -> Address {
        //! Deployed address.
        self.address
    }

    pub const fn abi(&self) -> &'static Abi {
        //! ABI used to encode calls and decode outputs.
        self.abi
    }

    pub const fn provider(&self) -> &Arc<dyn Provider> {
        //! Node the contract is reached through.
        &self.provider
    }

    pub fn defaults(&self) -> &TxDefaults {
        //! Defaults applied to transactions.
        &self.defaults
    }

    pub fn function(&self, name: &str) -> Result<&'static Function> {
        //! ABI entry of a function.
        Ok(self.abi.function(name)?)
    }

    pub fn encode(&self, function: &str, args: &[Token]) -> Result<Bytes> {
        //! Calldata of a call with the given arguments.
        Ok(self.function(function)?.encode_input(args)?.into())
    }

    pub async fn call(&self, function: &str, args: &[Token]) -> Result<Outputs> {
        //! Call a view function against the latest block.
        self.call_at(function, args, &BlockReference::Latest).await
    }

    pub async fn call_at(
        &self,
        function: &str,
        args: &[Token],
        block: &BlockReference,
    ) -> Result<Outputs> {
        //! Call a view function against a given block.
        let abi_function = self.function(function)?;
        let request = CallRequest {
            from: self.defaults.from,
            to: self.address,
            data: abi_function.encode_input(args)?.into(),
            ..Default::default()
        };
        debug!(contract = %self.address, function, "eth_call");
        let output = self.provider.call(&request, block).await?;
        if output.is_empty() && !abi_function.outputs.is_empty() {
            return Err(Error::UnexpectedOutput {
                function: function.to_string(),
                reason: "empty return data, is the contract deployed?".to_string(),
            });
        }
        let tokens = abi_function.decode_output(&output)?;
        Ok(Outputs::new(function, tokens))
    }

    pub async fn sender(&self, params: &TxParams) -> Result<Address> {
        //! Account that would send a transaction with `params`.
        TransactionBuilder::new(self.provider.as_ref(), &self.defaults)
            .params(params.clone())
            .sender()
            .await
    }

    pub async fn send(
        &self,
        function: &str,
        args: &[Token],
        params: TxParams,
    ) -> Result<PendingTransaction> {
        //! Submit a transaction calling `function`.
        let request = TransactionBuilder::new(self.provider.as_ref(), &self.defaults)
            .to(self.address)
            .data(self.encode(function, args)?)
            .params(params)
            .build()
            .await?;
        let hash = self.provider.send_transaction(&request).await?;
        info!(contract = %self.address, function, hash = ?hash, "Transaction submitted");
        Ok(PendingTransaction::new(
            hash,
            self.provider.clone(),
            &self.defaults,
        ))
    }

    pub async fn logs(
        &self,
        event: &str,
        from_block: BlockReference,
        to_block: BlockReference,
    ) -> Result<Vec<ethabi::Log>> {
        //! Decoded events emitted by this contract in a block range.
        let abi_event = self.abi.event(event)?;
        let filter = LogFilter {
            from_block,
            to_block,
            address: self.address,
            topics: vec![Some(abi_event.signature())],
        };
        debug!(contract = %self.address, event, "eth_getLogs");
        self.provider
            .logs(&filter)
            .await?
            .into_iter()
            .map(|log| {
                abi_event
                    .parse_log(RawLog {
                        topics: log.topics,
                        data: log.data.to_vec(),
                    })
                    .map_err(Error::from)
            })
            .collect()
    }
}
