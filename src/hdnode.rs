//! Hierarchically deterministic wallets for Ethereum accounts
//!
//! `Reference <https://github.com/bitcoin/bips/blob/master/bip-0032.mediawiki>`

use crate::address::{Address, AddressConvertible, PrivateKey, PublicKey};
use bip32::{ChildNumber, DerivationPath, ExtendedPrivateKey, ExtendedPublicKey};
pub use bip39::{Language, Mnemonic};

/// Default HD derivation path for Ethereum accounts
pub const ETH_EXTERNAL_PATH: &str = "m/44'/60'/0'/0";

/// HD wallet errors
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
pub enum HDNodeError {
    /// Neither seed nor mnemonic was given to the builder.
    #[error("either a seed or a mnemonic is required")]
    Incomplete,
    /// Private key requested from a public-only node.
    #[error("node holds no private key")]
    NoPrivateKey,
    /// Key derivation failed.
    #[error("derivation failed: {0}")]
    Derivation(String),
}

impl From<bip32::Error> for HDNodeError {
    fn from(value: bip32::Error) -> Self {
        Self::Derivation(value.to_string())
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
enum NodeKey {
    Private(ExtendedPrivateKey<PrivateKey>),
    Public(ExtendedPublicKey<PublicKey>),
}

/// HD Node wrapper
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct HDNode(NodeKey);

impl HDNode {
    pub fn build<'a>() -> HDNodeBuilder<'a> {
        //! Start building a node.
        HDNodeBuilder::default()
    }

    pub fn from_extended_public_key(key: ExtendedPublicKey<PublicKey>) -> Self {
        //! Watch-only node. It cannot derive hardened children or sign.
        Self(NodeKey::Public(key))
    }

    pub fn derive(&self, index: u32) -> Result<Self, HDNodeError> {
        //! Derive a child given an index.
        let child = match &self.0 {
            NodeKey::Private(key) => NodeKey::Private(key.derive_child(ChildNumber(index))?),
            NodeKey::Public(key) => NodeKey::Public(key.derive_child(ChildNumber(index))?),
        };
        Ok(Self(child))
    }

    pub fn public_key(&self) -> ExtendedPublicKey<PublicKey> {
        //! Get underlying public key.
        match &self.0 {
            NodeKey::Private(key) => key.public_key(),
            NodeKey::Public(key) => key.clone(),
        }
    }

    pub fn private_key(&self) -> Result<ExtendedPrivateKey<PrivateKey>, HDNodeError> {
        //! Get underlying private key.
        match &self.0 {
            NodeKey::Private(key) => Ok(key.clone()),
            NodeKey::Public(_) => Err(HDNodeError::NoPrivateKey),
        }
    }

    pub fn address(&self) -> Address {
        //! Account address of this node.
        self.public_key().public_key().address()
    }
}

/// Builder for [`HDNode`].
#[derive(Clone, Debug, Default)]
pub struct HDNodeBuilder<'a> {
    path: Option<DerivationPath>,
    seed: Option<[u8; 64]>,
    mnemonic: Option<Mnemonic>,
    password: Option<&'a str>,
}

impl<'a> HDNodeBuilder<'a> {
    #[must_use]
    pub fn path(mut self, path: DerivationPath) -> Self {
        //! Set a derivation path. Defaults to [`ETH_EXTERNAL_PATH`].
        self.path = Some(path);
        self
    }
    #[must_use]
    pub fn seed(mut self, seed: [u8; 64]) -> Self {
        //! Derive from a raw seed.
        self.seed = Some(seed);
        self
    }
    #[must_use]
    pub fn mnemonic(mut self, mnemonic: Mnemonic) -> Self {
        //! Derive from a mnemonic phrase.
        self.mnemonic = Some(mnemonic);
        self
    }
    #[must_use]
    pub fn mnemonic_with_password(mut self, mnemonic: Mnemonic, password: &'a str) -> Self {
        //! Derive from a mnemonic phrase protected by a password.
        self.mnemonic = Some(mnemonic);
        self.password = Some(password);
        self
    }

    pub fn build(self) -> Result<HDNode, HDNodeError> {
        //! Derive the node.
        let path = match self.path {
            Some(path) => path,
            None => ETH_EXTERNAL_PATH.parse()?,
        };
        let seed: Vec<u8> = match (self.seed, self.mnemonic) {
            (Some(seed), _) => seed.to_vec(),
            (None, Some(mnemonic)) => {
                bip39::Seed::new(&mnemonic, self.password.unwrap_or("")).as_bytes().to_vec()
            }
            (None, None) => return Err(HDNodeError::Incomplete),
        };
        let key = ExtendedPrivateKey::derive_from_path(seed, &path)?;
        Ok(HDNode(NodeKey::Private(key)))
    }
}
