//! `CountTransferManager`: caps the number of token holders.

use crate::abi;
use crate::address::Address;
use crate::assertions::ensure;
use crate::contract::{tokens, Contract};
use crate::conversions::u256_to_u64;
use crate::error::Result;
use crate::modules::Module;
use crate::network::Provider;
use crate::transaction_builder::{PendingTransaction, TxDefaults, TxParams};
use std::sync::Arc;

/// Wrapper of a `CountTransferManager` module.
#[derive(Clone, Debug)]
pub struct CountTransferManager {
    contract: Contract,
}

impl Module for CountTransferManager {
    fn contract(&self) -> &Contract {
        &self.contract
    }
}

impl CountTransferManager {
    pub fn new(address: Address, provider: Arc<dyn Provider>, defaults: Arc<TxDefaults>) -> Self {
        //! Wrapper of the module deployed at `address`.
        Self {
            contract: Contract::new(address, &abi::COUNT_TRANSFER_MANAGER, provider, defaults),
        }
    }

    pub const fn address(&self) -> Address {
        //! Module address.
        self.contract.address()
    }

    pub async fn max_holder_count(&self) -> Result<u64> {
        //! Maximal number of token holders.
        let count = self.contract.call("maxHolderCount", &[]).await?.single()?;
        Ok(u256_to_u64(count)?)
    }

    pub async fn change_holder_count(
        &self,
        max_holder_count: u64,
        params: TxParams,
    ) -> Result<PendingTransaction> {
        //! Set a new non-zero holder cap. Fails when unchanged.
        ensure(max_holder_count > 0, "Holder count must be greater than zero")?;
        ensure(
            max_holder_count != self.max_holder_count().await?,
            format!("Holder count is already {max_holder_count}"),
        )?;
        self.contract
            .send("changeHolderCount", &[tokens::uint(max_holder_count)], params)
            .await
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::mock::calldata;
    use crate::modules::testing::*;
    use ethabi::Token;

    #[tokio::test]
    async fn test_change_holder_count() {
        let mock = mock();
        let module = CountTransferManager::new(MODULE, mock.clone(), defaults());
        mock.mock_call(MODULE, "maxHolderCount()", &[Token::Uint(100.into())]);
        assert_eq!(module.max_holder_count().await.unwrap(), 100);

        assert!(module.change_holder_count(0, TxParams::new()).await.is_err());
        assert!(module.change_holder_count(100, TxParams::new()).await.is_err());
        module.change_holder_count(150, TxParams::new()).await.unwrap();
        let sent = mock.sent_transactions();
        assert_eq!(sent.len(), 1);
        assert_eq!(
            sent[0].data,
            calldata("changeHolderCount(uint256)", &[Token::Uint(150.into())])
        );
    }
}
