//! `SecurityToken`: permissioned ERC20 with modules, checkpoints and
//! controller transfers.

use crate::abi;
use crate::address::Address;
use crate::assertions::{
    ensure, equal_lengths, is_owner, non_zero_address, positive_amount, sufficient_balance,
};
use crate::contract::{log_param, tokens, Contract};
use crate::contracts::erc20::Erc20;
use crate::contracts::security_token_registry::version_from_parts;
use crate::conversions::{
    bytes32_to_string, from_base_units, string_to_bytes32, to_base_units, to_wei, u256_to_date,
    u256_to_u64,
};
use crate::error::Result;
use crate::modules::module_factory::ModuleFactory;
use crate::modules::{module_types, ModuleType};
use crate::network::{BlockReference, Provider};
use crate::transaction_builder::{PendingTransaction, TxDefaults, TxParams};
use crate::version::ContractVersion;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use ethabi::Token;
use ethereum_types::U256;
use rust_decimal::Decimal;
use std::sync::Arc;

/// A module attached to a token.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ModuleData {
    /// Module name from its factory
    pub name: String,
    /// Module contract, zero for unknown modules
    pub address: Address,
    /// Factory that deployed the module
    pub factory: Address,
    /// Archived modules are attached but inactive
    pub archived: bool,
    /// Module kinds
    pub types: Vec<ModuleType>,
    /// Label given when the module was added
    pub label: String,
}

/// `Transfer` event of a token.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TransferEvent {
    /// Sender, zero for issuance
    pub from: Address,
    /// Recipient, zero for redemption
    pub to: Address,
    /// Amount in whole tokens
    pub value: Decimal,
}

/// Wrapper of a `SecurityToken` contract.
#[derive(Clone, Debug)]
pub struct SecurityToken {
    contract: Contract,
}

impl SecurityToken {
    pub fn new(address: Address, provider: Arc<dyn Provider>, defaults: Arc<TxDefaults>) -> Self {
        //! Wrapper of the token deployed at `address`.
        Self::from_contract(Contract::new(
            address,
            &abi::SECURITY_TOKEN,
            provider,
            defaults,
        ))
    }

    pub(crate) const fn from_contract(contract: Contract) -> Self {
        Self { contract }
    }

    pub const fn contract(&self) -> &Contract {
        //! Underlying contract handle.
        &self.contract
    }

    pub const fn address(&self) -> Address {
        //! Token address.
        self.contract.address()
    }

    fn erc20(&self) -> Erc20 {
        Erc20::from_contract(self.contract.clone())
    }

    pub async fn name(&self) -> Result<String> {
        //! Token name.
        self.erc20().name().await
    }

    pub async fn symbol(&self) -> Result<String> {
        //! Token symbol, the ticker it was launched under.
        self.erc20().symbol().await
    }

    pub async fn decimals(&self) -> Result<u8> {
        //! Number of decimals of token amounts.
        self.erc20().decimals().await
    }

    pub async fn total_supply(&self) -> Result<Decimal> {
        //! Total supply in whole tokens.
        self.erc20().total_supply().await
    }

    pub async fn balance_of(&self, owner: Address) -> Result<Decimal> {
        //! Balance of `owner` in whole tokens.
        self.erc20().balance_of(owner).await
    }

    pub async fn allowance(&self, owner: Address, spender: Address) -> Result<Decimal> {
        //! Amount `spender` may transfer from `owner`.
        self.erc20().allowance(owner, spender).await
    }

    pub async fn granularity(&self) -> Result<Decimal> {
        //! Smallest transferable amount.
        let granularity = self.contract.call("granularity", &[]).await?.single()?;
        self.erc20().from_units(granularity).await
    }

    pub async fn token_details(&self) -> Result<String> {
        //! Off-chain details link or hash set by the issuer.
        self.contract.call("tokenDetails", &[]).await?.single()
    }

    pub async fn get_version(&self) -> Result<ContractVersion> {
        //! Protocol release of the token.
        let parts: Vec<u8> = self.contract.call("getVersion", &[]).await?.single()?;
        version_from_parts("getVersion", &parts)
    }

    pub async fn owner(&self) -> Result<Address> {
        //! Issuer account.
        self.contract.call("owner", &[]).await?.single()
    }

    pub async fn controller(&self) -> Result<Address> {
        //! Account allowed to force transfers, zero if none.
        self.contract.call("controller", &[]).await?.single()
    }

    pub async fn transfers_frozen(&self) -> Result<bool> {
        //! Whether all transfers are frozen.
        self.contract.call("transfersFrozen", &[]).await?.single()
    }

    pub async fn is_issuable(&self) -> Result<bool> {
        //! Whether new tokens can still be minted.
        self.contract.call("isIssuable", &[]).await?.single()
    }

    pub async fn is_controllable(&self) -> Result<bool> {
        //! Whether a controller may be set.
        self.contract.call("isControllable", &[]).await?.single()
    }

    pub async fn current_checkpoint_id(&self) -> Result<u64> {
        //! Latest checkpoint id, zero before the first checkpoint.
        let id = self
            .contract
            .call("currentCheckpointId", &[])
            .await?
            .single()?;
        Ok(u256_to_u64(id)?)
    }

    async fn ensure_checkpoint_exists(&self, checkpoint_id: u64) -> Result<()> {
        ensure(
            checkpoint_id <= self.current_checkpoint_id().await?,
            format!("Checkpoint {checkpoint_id} does not exist yet"),
        )
    }

    pub async fn balance_of_at(&self, investor: Address, checkpoint_id: u64) -> Result<Decimal> {
        //! Balance of `investor` at a checkpoint.
        //! Fails with a precondition error for checkpoints not created yet.
        self.ensure_checkpoint_exists(checkpoint_id).await?;
        let balance = self
            .contract
            .call(
                "balanceOfAt",
                &[investor.into(), tokens::uint(checkpoint_id)],
            )
            .await?
            .single()?;
        self.erc20().from_units(balance).await
    }

    pub async fn total_supply_at(&self, checkpoint_id: u64) -> Result<Decimal> {
        //! Total supply at a checkpoint.
        self.ensure_checkpoint_exists(checkpoint_id).await?;
        let supply = self
            .contract
            .call("totalSupplyAt", &[tokens::uint(checkpoint_id)])
            .await?
            .single()?;
        self.erc20().from_units(supply).await
    }

    pub async fn get_checkpoint_times(&self) -> Result<Vec<DateTime<Utc>>> {
        //! Creation time of every checkpoint, in id order.
        let times: Vec<U256> = self
            .contract
            .call("getCheckpointTimes", &[])
            .await?
            .single()?;
        Ok(times
            .into_iter()
            .map(u256_to_date)
            .collect::<std::result::Result<_, _>>()?)
    }

    pub async fn get_investors(&self) -> Result<Vec<Address>> {
        //! Every account that ever held the token.
        self.contract.call("getInvestors", &[]).await?.single()
    }

    pub async fn get_investor_count(&self) -> Result<u64> {
        //! Number of current holders.
        let count = self.contract.call("getInvestorCount", &[]).await?.single()?;
        Ok(u256_to_u64(count)?)
    }

    pub async fn get_modules_by_type(&self, module_type: ModuleType) -> Result<Vec<Address>> {
        //! Attached modules of one kind.
        self.contract
            .call("getModulesByType", &[tokens::uint(module_type as u8)])
            .await?
            .single()
    }

    pub async fn get_modules_by_name(&self, name: &str) -> Result<Vec<Address>> {
        //! Attached modules with this on-chain name.
        self.contract
            .call(
                "getModulesByName",
                &[tokens::bytes32(string_to_bytes32(name)?)],
            )
            .await?
            .single()
    }

    pub async fn get_module(&self, module: Address) -> Result<ModuleData> {
        //! Registration record of an attached module.
        //! Unknown modules come back with a zero address.
        let mut outputs = self.contract.call("getModule", &[module.into()]).await?;
        let name: [u8; 32] = outputs.take()?;
        let address = outputs.take()?;
        let factory = outputs.take()?;
        let archived = outputs.take()?;
        let types = module_types("getModule", outputs.take()?)?;
        let label: [u8; 32] = outputs.take()?;
        Ok(ModuleData {
            name: bytes32_to_string(&name),
            address,
            factory,
            archived,
            types,
            label: bytes32_to_string(&label),
        })
    }

    pub async fn get_treasury_wallet(&self) -> Result<Address> {
        //! Wallet receiving offering funds by default.
        self.contract.call("getTreasuryWallet", &[]).await?.single()
    }

    async fn ensure_owner(&self, params: &TxParams) -> Result<Address> {
        let sender = self.contract.sender(params).await?;
        is_owner(self.owner().await?, sender)?;
        Ok(sender)
    }

    async fn ensure_granular(&self, amount: Decimal) -> Result<()> {
        let granularity = self.granularity().await?;
        ensure(
            granularity.is_zero() || (amount % granularity).is_zero(),
            format!("Amount {amount} is not a multiple of granularity {granularity}"),
        )
    }

    async fn ensure_transferable(&self, amount: Decimal) -> Result<()> {
        ensure(!self.transfers_frozen().await?, "Transfers are frozen")?;
        self.ensure_granular(amount).await
    }

    async fn existing_module(&self, module: Address) -> Result<ModuleData> {
        let data = self.get_module(module).await?;
        ensure(
            !data.address.is_zero(),
            format!("Module {module} is not attached to this token"),
        )?;
        Ok(data)
    }

    pub async fn transfer(
        &self,
        to: Address,
        amount: Decimal,
        params: TxParams,
    ) -> Result<PendingTransaction> {
        //! Transfer `amount` to `to`.
        //! Requires unfrozen transfers, a granular amount and enough balance.
        self.ensure_transferable(amount).await?;
        self.erc20().transfer(to, amount, params).await
    }

    pub async fn transfer_from(
        &self,
        from: Address,
        to: Address,
        amount: Decimal,
        params: TxParams,
    ) -> Result<PendingTransaction> {
        //! Transfer `amount` from `from` using the sender's allowance.
        self.ensure_transferable(amount).await?;
        self.erc20().transfer_from(from, to, amount, params).await
    }

    pub async fn approve(
        &self,
        spender: Address,
        amount: Decimal,
        params: TxParams,
    ) -> Result<PendingTransaction> {
        //! Let `spender` transfer up to `amount`.
        self.erc20().approve(spender, amount, params).await
    }

    async fn ensure_issuance(&self, params: &TxParams) -> Result<()> {
        self.ensure_owner(params).await?;
        ensure(self.is_issuable().await?, "Issuance is finished")
    }

    pub async fn issue(
        &self,
        investor: Address,
        amount: Decimal,
        data: Bytes,
        params: TxParams,
    ) -> Result<PendingTransaction> {
        //! Mint `amount` to `investor`. Owner only, while issuable.
        self.ensure_issuance(&params).await?;
        non_zero_address(investor, "Investor")?;
        positive_amount(amount, "Issued amount")?;
        self.ensure_granular(amount).await?;
        let value = self.erc20().to_units(amount).await?;
        self.contract
            .send(
                "issue",
                &[investor.into(), tokens::uint(value), Token::Bytes(data.to_vec())],
                params,
            )
            .await
    }

    pub async fn issue_multi(
        &self,
        investors: &[Address],
        amounts: &[Decimal],
        params: TxParams,
    ) -> Result<PendingTransaction> {
        //! Mint to several investors at once. Owner only, while issuable.
        self.ensure_issuance(&params).await?;
        equal_lengths(&[investors.len(), amounts.len()], "issueMulti")?;
        ensure(!investors.is_empty(), "Nothing to issue")?;
        let decimals = self.decimals().await?;
        let granularity = self.granularity().await?;
        let mut values = Vec::with_capacity(amounts.len());
        for (investor, amount) in investors.iter().zip(amounts) {
            non_zero_address(*investor, "Investor")?;
            positive_amount(*amount, "Issued amount")?;
            ensure(
                granularity.is_zero() || (*amount % granularity).is_zero(),
                format!("Amount {amount} is not a multiple of granularity {granularity}"),
            )?;
            values.push(to_base_units(*amount, decimals)?);
        }
        self.contract
            .send(
                "issueMulti",
                &[tokens::addresses(investors), tokens::uints(values)],
                params,
            )
            .await
    }

    pub async fn redeem(
        &self,
        amount: Decimal,
        data: Bytes,
        params: TxParams,
    ) -> Result<PendingTransaction> {
        //! Burn tokens of the sender.
        positive_amount(amount, "Redeemed amount")?;
        self.ensure_granular(amount).await?;
        let sender = self.contract.sender(&params).await?;
        sufficient_balance(self.balance_of(sender).await?, amount)?;
        let value = self.erc20().to_units(amount).await?;
        self.contract
            .send(
                "redeem",
                &[tokens::uint(value), Token::Bytes(data.to_vec())],
                params,
            )
            .await
    }

    pub async fn add_module(
        &self,
        factory: Address,
        data: Bytes,
        max_cost: Decimal,
        budget: Decimal,
        archived: bool,
        params: TxParams,
    ) -> Result<PendingTransaction> {
        //! Deploy a module through `factory`. `max_cost` and `budget` are
        //! in POLY; the setup cost must not exceed `max_cost`.
        self.ensure_owner(&params).await?;
        non_zero_address(factory, "Module factory")?;
        let setup_cost = ModuleFactory::from_contract(
            self.contract.at(factory, &abi::MODULE_FACTORY),
        )
        .setup_cost()
        .await?;
        ensure(
            setup_cost <= max_cost,
            format!("Setup cost {setup_cost} POLY exceeds maximal cost {max_cost} POLY"),
        )?;
        self.contract
            .send(
                "addModule",
                &[
                    factory.into(),
                    Token::Bytes(data.to_vec()),
                    tokens::uint(to_wei(max_cost)?),
                    tokens::uint(to_wei(budget)?),
                    Token::Bool(archived),
                ],
                params,
            )
            .await
    }

    pub async fn archive_module(
        &self,
        module: Address,
        params: TxParams,
    ) -> Result<PendingTransaction> {
        //! Disable an attached module without removing it.
        self.ensure_owner(&params).await?;
        ensure(
            !self.existing_module(module).await?.archived,
            "Module is already archived",
        )?;
        self.contract
            .send("archiveModule", &[module.into()], params)
            .await
    }

    pub async fn unarchive_module(
        &self,
        module: Address,
        params: TxParams,
    ) -> Result<PendingTransaction> {
        //! Re-enable an archived module.
        self.ensure_owner(&params).await?;
        ensure(
            self.existing_module(module).await?.archived,
            "Module is not archived",
        )?;
        self.contract
            .send("unarchiveModule", &[module.into()], params)
            .await
    }

    pub async fn remove_module(
        &self,
        module: Address,
        params: TxParams,
    ) -> Result<PendingTransaction> {
        //! Only archived modules can be removed.
        self.ensure_owner(&params).await?;
        ensure(
            self.existing_module(module).await?.archived,
            "Module must be archived before removal",
        )?;
        self.contract
            .send("removeModule", &[module.into()], params)
            .await
    }

    pub async fn change_module_budget(
        &self,
        module: Address,
        change: Decimal,
        increase: bool,
        params: TxParams,
    ) -> Result<PendingTransaction> {
        //! Raise or lower the POLY budget of a module.
        self.ensure_owner(&params).await?;
        positive_amount(change, "Budget change")?;
        self.existing_module(module).await?;
        self.contract
            .send(
                "changeModuleBudget",
                &[
                    module.into(),
                    tokens::uint(to_wei(change)?),
                    Token::Bool(increase),
                ],
                params,
            )
            .await
    }

    pub async fn freeze_transfers(&self, params: TxParams) -> Result<PendingTransaction> {
        //! Stop all transfers. Owner only.
        self.ensure_owner(&params).await?;
        ensure(!self.transfers_frozen().await?, "Transfers are already frozen")?;
        self.contract.send("freezeTransfers", &[], params).await
    }

    pub async fn unfreeze_transfers(&self, params: TxParams) -> Result<PendingTransaction> {
        //! Resume transfers. Owner only.
        self.ensure_owner(&params).await?;
        ensure(self.transfers_frozen().await?, "Transfers are not frozen")?;
        self.contract.send("unfreezeTransfers", &[], params).await
    }

    pub async fn create_checkpoint(&self, params: TxParams) -> Result<PendingTransaction> {
        //! Snapshot balances under a new checkpoint id.
        self.ensure_owner(&params).await?;
        self.contract.send("createCheckpoint", &[], params).await
    }

    pub async fn change_granularity(
        &self,
        granularity: Decimal,
        params: TxParams,
    ) -> Result<PendingTransaction> {
        //! Set the smallest transferable amount.
        self.ensure_owner(&params).await?;
        positive_amount(granularity, "Granularity")?;
        let value = self.erc20().to_units(granularity).await?;
        self.contract
            .send("changeGranularity", &[tokens::uint(value)], params)
            .await
    }

    pub async fn change_name(&self, name: &str, params: TxParams) -> Result<PendingTransaction> {
        //! Rename the token.
        self.ensure_owner(&params).await?;
        ensure(!name.is_empty(), "Token name must not be empty")?;
        self.contract
            .send("changeName", &[tokens::string(name)], params)
            .await
    }

    pub async fn update_token_details(
        &self,
        details: &str,
        params: TxParams,
    ) -> Result<PendingTransaction> {
        //! Replace the off-chain details string.
        self.ensure_owner(&params).await?;
        self.contract
            .send("updateTokenDetails", &[tokens::string(details)], params)
            .await
    }

    pub async fn set_controller(
        &self,
        controller: Address,
        params: TxParams,
    ) -> Result<PendingTransaction> {
        //! Zero `controller` removes the controller.
        self.ensure_owner(&params).await?;
        ensure(self.is_controllable().await?, "Token is not controllable")?;
        self.contract
            .send("setController", &[controller.into()], params)
            .await
    }

    pub async fn controller_transfer(
        &self,
        from: Address,
        to: Address,
        amount: Decimal,
        data: Bytes,
        operator_data: Bytes,
        params: TxParams,
    ) -> Result<PendingTransaction> {
        //! Forced transfer by the controller.
        ensure(self.is_controllable().await?, "Token is not controllable")?;
        let sender = self.contract.sender(&params).await?;
        ensure(
            self.controller().await? == sender,
            "Sender is not the controller",
        )?;
        non_zero_address(to, "Recipient")?;
        positive_amount(amount, "Amount")?;
        sufficient_balance(self.balance_of(from).await?, amount)?;
        let value = self.erc20().to_units(amount).await?;
        self.contract
            .send(
                "controllerTransfer",
                &[
                    from.into(),
                    to.into(),
                    tokens::uint(value),
                    Token::Bytes(data.to_vec()),
                    Token::Bytes(operator_data.to_vec()),
                ],
                params,
            )
            .await
    }

    pub async fn transfer_ownership(
        &self,
        new_owner: Address,
        params: TxParams,
    ) -> Result<PendingTransaction> {
        //! Hand the token over to `new_owner`.
        self.ensure_owner(&params).await?;
        non_zero_address(new_owner, "New owner")?;
        self.contract
            .send("transferOwnership", &[new_owner.into()], params)
            .await
    }

    pub async fn change_treasury_wallet(
        &self,
        wallet: Address,
        params: TxParams,
    ) -> Result<PendingTransaction> {
        //! Set the default wallet for offering funds.
        self.ensure_owner(&params).await?;
        non_zero_address(wallet, "Treasury wallet")?;
        self.contract
            .send("changeTreasuryWallet", &[wallet.into()], params)
            .await
    }

    pub async fn transfer_logs(
        &self,
        from_block: BlockReference,
        to_block: BlockReference,
    ) -> Result<Vec<TransferEvent>> {
        //! `Transfer` events in the block range.
        let decimals = self.decimals().await?;
        self.contract
            .logs("Transfer", from_block, to_block)
            .await?
            .iter()
            .map(|log| -> Result<TransferEvent> {
                Ok(TransferEvent {
                    from: log_param(log, "from")?,
                    to: log_param(log, "to")?,
                    value: from_base_units(log_param(log, "value")?, decimals)?,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::error::Error;
    use crate::mock::{calldata, MockProvider};
    use rust_decimal_macros::dec;

    struct Setup {
        mock: Arc<MockProvider>,
        token: SecurityToken,
        owner: Address,
    }

    fn setup() -> Setup {
        let mock = Arc::new(MockProvider::new());
        let owner = Address::from([0x0a; 20]);
        let token = SecurityToken::new(
            Address::from([0x01; 20]),
            mock.clone(),
            Arc::new(TxDefaults {
                from: Some(owner),
                ..Default::default()
            }),
        );
        let at = token.address();
        mock.mock_call(at, "owner()", &[owner.into()]);
        mock.mock_call(at, "decimals()", &[Token::Uint(18.into())]);
        mock.mock_call(at, "granularity()", &[Token::Uint(1.into())]);
        mock.mock_call(at, "transfersFrozen()", &[Token::Bool(false)]);
        mock.mock_call(at, "isIssuable()", &[Token::Bool(true)]);
        mock.mock_call(at, "isControllable()", &[Token::Bool(true)]);
        mock.mock_call(at, "currentCheckpointId()", &[Token::Uint(2.into())]);
        mock.mock_call(
            at,
            "balanceOf(address)",
            &[Token::Uint(U256::exp10(20))],
        );
        Setup { mock, token, owner }
    }

    fn module_output(address: Address, archived: bool, types: &[u8]) -> Vec<Token> {
        vec![
            Token::FixedBytes(string_to_bytes32("GeneralTransferManager").unwrap().to_vec()),
            address.into(),
            Address::from([0x0f; 20]).into(),
            Token::Bool(archived),
            Token::Array(types.iter().map(|t| Token::Uint((*t).into())).collect()),
            Token::FixedBytes(vec![0; 32]),
        ]
    }

    #[tokio::test]
    async fn test_get_module() {
        let s = setup();
        let module = Address::from([0x0c; 20]);
        s.mock.mock_call(
            s.token.address(),
            "getModule(address)",
            &module_output(module, false, &[2]),
        );
        let data = s.token.get_module(module).await.unwrap();
        assert_eq!(data.name, "GeneralTransferManager");
        assert_eq!(data.types, vec![ModuleType::Transfer]);
        assert_eq!(data.label, "");

        s.mock.mock_call(
            s.token.address(),
            "getModule(address)",
            &module_output(module, false, &[9]),
        );
        assert!(matches!(
            s.token.get_module(module).await,
            Err(Error::UnexpectedOutput { .. })
        ));
    }

    #[tokio::test]
    async fn test_transfer_guards() {
        let s = setup();
        let to = Address::from([0x0b; 20]);
        s.mock
            .mock_call(s.token.address(), "granularity()", &[Token::Uint(U256::exp10(18))]);
        assert!(matches!(
            s.token.transfer(to, dec!(1.5), TxParams::new()).await,
            Err(Error::Precondition(message)) if message.contains("granularity")
        ));
        s.token.transfer(to, dec!(2), TxParams::new()).await.unwrap();

        s.mock
            .mock_call(s.token.address(), "transfersFrozen()", &[Token::Bool(true)]);
        assert!(matches!(
            s.token.transfer(to, dec!(2), TxParams::new()).await,
            Err(Error::Precondition(message)) if message.contains("frozen")
        ));
        assert_eq!(s.mock.sent_transactions().len(), 1);
    }

    #[tokio::test]
    async fn test_issue() {
        let s = setup();
        let investor = Address::from([0x0b; 20]);
        s.token
            .issue(investor, dec!(10), Bytes::new(), TxParams::new())
            .await
            .unwrap();
        assert_eq!(
            s.mock.sent_transactions()[0].data,
            calldata(
                "issue(address,uint256,bytes)",
                &[investor.into(), Token::Uint(U256::exp10(19)), Token::Bytes(vec![])]
            )
        );

        let stranger = TxParams::new().from(Address::from([0x0e; 20]));
        assert!(s
            .token
            .issue(investor, dec!(10), Bytes::new(), stranger)
            .await
            .is_err());
        assert!(s
            .token
            .issue(Address::ZERO, dec!(10), Bytes::new(), TxParams::new())
            .await
            .is_err());

        s.mock
            .mock_call(s.token.address(), "isIssuable()", &[Token::Bool(false)]);
        assert!(matches!(
            s.token.issue(investor, dec!(10), Bytes::new(), TxParams::new()).await,
            Err(Error::Precondition(message)) if message.contains("Issuance")
        ));
        assert_eq!(s.mock.sent_transactions().len(), 1);
    }

    #[tokio::test]
    async fn test_issue_multi() {
        let s = setup();
        let investors = [Address::from([0x0b; 20]), Address::from([0x0c; 20])];
        assert!(s
            .token
            .issue_multi(&investors, &[dec!(1)], TxParams::new())
            .await
            .is_err());
        s.token
            .issue_multi(&investors, &[dec!(1), dec!(2)], TxParams::new())
            .await
            .unwrap();
        assert_eq!(
            s.mock.sent_transactions()[0].data,
            calldata(
                "issueMulti(address[],uint256[])",
                &[
                    Token::Array(vec![investors[0].into(), investors[1].into()]),
                    Token::Array(vec![
                        Token::Uint(U256::exp10(18)),
                        Token::Uint(U256::exp10(18) * 2)
                    ]),
                ]
            )
        );
    }

    #[tokio::test]
    async fn test_module_state_checks() {
        let s = setup();
        let module = Address::from([0x0c; 20]);
        let at = s.token.address();

        s.mock
            .mock_call(at, "getModule(address)", &module_output(module, false, &[2]));
        assert!(s.token.unarchive_module(module, TxParams::new()).await.is_err());
        assert!(s.token.remove_module(module, TxParams::new()).await.is_err());
        s.token.archive_module(module, TxParams::new()).await.unwrap();

        s.mock
            .mock_call(at, "getModule(address)", &module_output(module, true, &[2]));
        assert!(s.token.archive_module(module, TxParams::new()).await.is_err());
        s.token.remove_module(module, TxParams::new()).await.unwrap();

        s.mock
            .mock_call(at, "getModule(address)", &module_output(Address::ZERO, false, &[]));
        assert!(matches!(
            s.token
                .change_module_budget(module, dec!(1), true, TxParams::new())
                .await,
            Err(Error::Precondition(message)) if message.contains("not attached")
        ));
        assert_eq!(s.mock.sent_transactions().len(), 2);
    }

    #[tokio::test]
    async fn test_add_module_checks_cost() {
        let s = setup();
        let factory = Address::from([0x0f; 20]);
        s.mock.mock_call(
            factory,
            "setupCostInPoly()",
            &[Token::Uint(U256::exp10(18) * 500)],
        );
        assert!(s
            .token
            .add_module(factory, Bytes::new(), dec!(499), dec!(0), false, TxParams::new())
            .await
            .is_err());
        s.token
            .add_module(factory, Bytes::new(), dec!(500), dec!(0), false, TxParams::new())
            .await
            .unwrap();
        assert_eq!(s.mock.sent_transactions().len(), 1);
    }

    #[tokio::test]
    async fn test_checkpoints() {
        let s = setup();
        s.mock.mock_call(
            s.token.address(),
            "totalSupplyAt(uint256)",
            &[Token::Uint(U256::exp10(21))],
        );
        assert_eq!(s.token.total_supply_at(2).await.unwrap(), dec!(1000));
        assert!(matches!(
            s.token.total_supply_at(3).await,
            Err(Error::Precondition(_))
        ));
    }

    #[tokio::test]
    async fn test_controller_transfer() {
        let s = setup();
        let from = Address::from([0x0b; 20]);
        let to = Address::from([0x0c; 20]);
        s.mock
            .mock_call(s.token.address(), "controller()", &[s.owner.into()]);
        s.token
            .controller_transfer(from, to, dec!(5), Bytes::new(), Bytes::new(), TxParams::new())
            .await
            .unwrap();

        s.mock.mock_call(
            s.token.address(),
            "controller()",
            &[Address::from([0x0d; 20]).into()],
        );
        assert!(s
            .token
            .controller_transfer(from, to, dec!(5), Bytes::new(), Bytes::new(), TxParams::new())
            .await
            .is_err());
        assert_eq!(s.mock.sent_transactions().len(), 1);
    }

    #[tokio::test]
    async fn test_freeze() {
        let s = setup();
        assert!(s.token.unfreeze_transfers(TxParams::new()).await.is_err());
        s.token.freeze_transfers(TxParams::new()).await.unwrap();
        assert_eq!(
            s.mock.sent_transactions()[0].data,
            calldata("freezeTransfers()", &[])
        );
    }

    #[tokio::test]
    async fn test_views_by_scalar() {
        let s = setup();
        let at = s.token.address();
        let investor = Address::from([0x05; 20]);
        let sto = Address::from([0x0c; 20]);
        s.mock.mock_call_with_args(
            at,
            "getModulesByType(uint8)",
            &[Token::Uint(3.into())],
            &[Token::Array(vec![sto.into()])],
        );
        assert_eq!(
            s.token.get_modules_by_type(ModuleType::Sto).await.unwrap(),
            vec![sto]
        );
        assert_eq!(
            s.mock.calls().last().unwrap().data,
            calldata("getModulesByType(uint8)", &[Token::Uint(3.into())])
        );

        let args = [investor.into(), Token::Uint(2.into())];
        s.mock.mock_call_with_args(
            at,
            "balanceOfAt(address,uint256)",
            &args,
            &[Token::Uint(U256::exp10(18) * 7)],
        );
        assert_eq!(s.token.balance_of_at(investor, 2).await.unwrap(), dec!(7));
        let expected = calldata("balanceOfAt(address,uint256)", &args);
        assert!(s.mock.calls().iter().any(|call| call.data == expected));

        s.mock.mock_call_with_args(
            at,
            "totalSupplyAt(uint256)",
            &[Token::Uint(1.into())],
            &[Token::Uint(U256::exp10(18) * 40)],
        );
        assert_eq!(s.token.total_supply_at(1).await.unwrap(), dec!(40));
        let expected = calldata("totalSupplyAt(uint256)", &[Token::Uint(1.into())]);
        assert!(s.mock.calls().iter().any(|call| call.data == expected));

        assert!(matches!(
            s.token.balance_of_at(investor, 3).await,
            Err(Error::Precondition(message)) if message.contains("Checkpoint 3")
        ));
    }
}
