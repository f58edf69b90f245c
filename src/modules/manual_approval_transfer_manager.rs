//! `ManualApprovalTransferManager`: one-off transfer allowances between
//! two holders, granted by the issuer.

use crate::abi;
use crate::address::Address;
use crate::assertions::{date_in_future, ensure, equal_lengths, non_zero_address, positive_amount};
use crate::contract::{tokens, Contract, Outputs};
use crate::conversions::{
    bytes32_to_string, date_to_u256, from_base_units, string_to_bytes32, to_base_units,
    u256_to_date, u256_to_u64,
};
use crate::error::{Error, Result};
use crate::modules::Module;
use crate::network::Provider;
use crate::transaction_builder::{PendingTransaction, TxDefaults, TxParams};
use chrono::{DateTime, Utc};
use ethabi::Token;
use ethereum_types::U256;
use itertools::izip;
use rust_decimal::Decimal;
use std::sync::Arc;

/// Allowance of `to` to receive tokens from `from`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ManualApproval {
    /// Sender
    pub from: Address,
    /// Receiver
    pub to: Address,
    /// Remaining amount, in whole tokens
    pub allowance: Decimal,
    /// Approval ends
    pub expiry_time: DateTime<Utc>,
    /// Free text stored as `bytes32`
    pub description: String,
}

impl ManualApproval {
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        //! Whether the approval is still usable at `now`.
        self.expiry_time > now
    }
}

/// Wrapper of a `ManualApprovalTransferManager` module.
#[derive(Clone, Debug)]
pub struct ManualApprovalTransferManager {
    contract: Contract,
}

impl Module for ManualApprovalTransferManager {
    fn contract(&self) -> &Contract {
        &self.contract
    }
}

impl ManualApprovalTransferManager {
    pub fn new(address: Address, provider: Arc<dyn Provider>, defaults: Arc<TxDefaults>) -> Self {
        //! Wrapper of the module deployed at `address`.
        Self {
            contract: Contract::new(
                address,
                &abi::MANUAL_APPROVAL_TRANSFER_MANAGER,
                provider,
                defaults,
            ),
        }
    }

    pub const fn address(&self) -> Address {
        //! Module address.
        self.contract.address()
    }

    async fn decimals(&self) -> Result<u8> {
        self.security_token().await?.decimals().await
    }

    pub async fn get_approval_details(
        &self,
        from: Address,
        to: Address,
    ) -> Result<Option<ManualApproval>> {
        //! `None` when no approval between the pair exists.
        let mut outputs = self
            .contract
            .call("getApprovalDetails", &[from.into(), to.into()])
            .await?;
        let expiry: U256 = outputs.take()?;
        let allowance = outputs.take()?;
        let description: [u8; 32] = outputs.take()?;
        if expiry.is_zero() {
            return Ok(None);
        }
        Ok(Some(ManualApproval {
            from,
            to,
            allowance: from_base_units(allowance, self.decimals().await?)?,
            expiry_time: u256_to_date(expiry)?,
            description: bytes32_to_string(&description),
        }))
    }

    async fn approvals(&self, mut outputs: Outputs) -> Result<Vec<ManualApproval>> {
        let decimals = self.decimals().await?;
        let from: Vec<Address> = outputs.take()?;
        let to: Vec<Address> = outputs.take()?;
        let allowance: Vec<U256> = outputs.take()?;
        let expiry: Vec<U256> = outputs.take()?;
        let description: Vec<[u8; 32]> = outputs.take()?;
        izip!(from, to, allowance, expiry, description)
            .map(|(from, to, allowance, expiry, description)| -> Result<ManualApproval> {
                Ok(ManualApproval {
                    from,
                    to,
                    allowance: from_base_units(allowance, decimals)?,
                    expiry_time: u256_to_date(expiry)?,
                    description: bytes32_to_string(&description),
                })
            })
            .collect()
    }

    pub async fn get_all_approvals(&self) -> Result<Vec<ManualApproval>> {
        //! Every stored approval, expired ones included.
        let outputs = self.contract.call("getAllApprovals", &[]).await?;
        self.approvals(outputs).await
    }

    pub async fn get_active_approvals_to_user(&self, user: Address) -> Result<Vec<ManualApproval>> {
        //! Unexpired approvals where `user` is either side.
        let outputs = self
            .contract
            .call("getActiveApprovalsToUser", &[user.into()])
            .await?;
        self.approvals(outputs).await
    }

    pub async fn get_total_approvals_length(&self) -> Result<u64> {
        //! Number of stored approvals.
        let length = self
            .contract
            .call("getTotalApprovalsLength", &[])
            .await?
            .single()?;
        Ok(u256_to_u64(length)?)
    }

    async fn existing(&self, from: Address, to: Address) -> Result<ManualApproval> {
        self.get_approval_details(from, to)
            .await?
            .ok_or_else(|| Error::Precondition(format!("No approval from {from} to {to}")))
    }

    async fn ensure_no_active(&self, from: Address, to: Address) -> Result<()> {
        let active = self
            .get_approval_details(from, to)
            .await?
            .is_some_and(|approval| approval.is_active(Utc::now()));
        ensure(
            !active,
            format!("An active approval from {from} to {to} already exists"),
        )
    }

    pub async fn add_manual_approval(
        &self,
        from: Address,
        to: Address,
        allowance: Decimal,
        expiry_time: DateTime<Utc>,
        description: &str,
        params: TxParams,
    ) -> Result<PendingTransaction> {
        //! Approve `allowance` tokens from `from` to `to` until `expiry_time`.
        //! Fails while an active approval between the pair exists.
        non_zero_address(to, "Recipient")?;
        date_in_future(expiry_time, "Expiry time")?;
        positive_amount(allowance, "Allowance")?;
        let description = string_to_bytes32(description)?;
        self.ensure_no_active(from, to).await?;
        let allowance = to_base_units(allowance, self.decimals().await?)?;
        self.contract
            .send(
                "addManualApproval",
                &[
                    from.into(),
                    to.into(),
                    tokens::uint(allowance),
                    tokens::uint(date_to_u256(expiry_time)?),
                    tokens::bytes32(description),
                ],
                params,
            )
            .await
    }

    pub async fn add_manual_approval_multi(
        &self,
        approvals: &[ManualApproval],
        params: TxParams,
    ) -> Result<PendingTransaction> {
        //! Batch form of
        //! [`ManualApprovalTransferManager::add_manual_approval`].
        ensure(!approvals.is_empty(), "No approvals to add")?;
        let decimals = self.decimals().await?;
        let (mut allowances, mut expiries, mut descriptions) = (vec![], vec![], vec![]);
        for approval in approvals {
            non_zero_address(approval.to, "Recipient")?;
            date_in_future(approval.expiry_time, "Expiry time")?;
            positive_amount(approval.allowance, "Allowance")?;
            self.ensure_no_active(approval.from, approval.to).await?;
            allowances.push(to_base_units(approval.allowance, decimals)?);
            expiries.push(date_to_u256(approval.expiry_time)?);
            descriptions.push(tokens::bytes32(string_to_bytes32(&approval.description)?));
        }
        let from: Vec<Address> = approvals.iter().map(|a| a.from).collect();
        let to: Vec<Address> = approvals.iter().map(|a| a.to).collect();
        self.contract
            .send(
                "addManualApprovalMulti",
                &[
                    tokens::addresses(&from),
                    tokens::addresses(&to),
                    tokens::uints(allowances),
                    tokens::uints(expiries),
                    Token::Array(descriptions),
                ],
                params,
            )
            .await
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn modify_manual_approval(
        &self,
        from: Address,
        to: Address,
        expiry_time: DateTime<Utc>,
        change: Decimal,
        description: &str,
        increase: bool,
        params: TxParams,
    ) -> Result<PendingTransaction> {
        //! Move the expiry and raise or lower the allowance by `change`.
        non_zero_address(to, "Recipient")?;
        date_in_future(expiry_time, "Expiry time")?;
        let current = self.existing(from, to).await?;
        ensure(
            increase || change <= current.allowance,
            format!(
                "Cannot decrease allowance {} by {change}",
                current.allowance
            ),
        )?;
        let description = string_to_bytes32(description)?;
        let change = to_base_units(change, self.decimals().await?)?;
        self.contract
            .send(
                "modifyManualApproval",
                &[
                    from.into(),
                    to.into(),
                    tokens::uint(date_to_u256(expiry_time)?),
                    tokens::uint(change),
                    tokens::bytes32(description),
                    Token::Bool(increase),
                ],
                params,
            )
            .await
    }

    pub async fn revoke_manual_approval(
        &self,
        from: Address,
        to: Address,
        params: TxParams,
    ) -> Result<PendingTransaction> {
        //! Delete an existing approval.
        self.existing(from, to).await?;
        self.contract
            .send("revokeManualApproval", &[from.into(), to.into()], params)
            .await
    }

    pub async fn revoke_manual_approval_multi(
        &self,
        from: &[Address],
        to: &[Address],
        params: TxParams,
    ) -> Result<PendingTransaction> {
        //! Delete several existing approvals, pairing `from[i]` with `to[i]`.
        equal_lengths(&[from.len(), to.len()], "revokeManualApprovalMulti")?;
        for (from, to) in from.iter().zip(to) {
            self.existing(*from, *to).await?;
        }
        self.contract
            .send(
                "revokeManualApprovalMulti",
                &[tokens::addresses(from), tokens::addresses(to)],
                params,
            )
            .await
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::mock::calldata;
    use crate::modules::testing::*;
    use chrono::Duration;
    use rust_decimal_macros::dec;

    const FROM: Address = Address::new([0x21; 20]);
    const TO: Address = Address::new([0x22; 20]);

    fn mock_approval(mock: &crate::mock::MockProvider, expiry: DateTime<Utc>) {
        mock.mock_call(
            MODULE,
            "getApprovalDetails(address,address)",
            &[
                Token::Uint(date_to_u256(expiry).unwrap()),
                Token::Uint(U256::exp10(18) * 5),
                Token::FixedBytes(string_to_bytes32("lockup").unwrap().to_vec()),
            ],
        );
    }

    #[tokio::test]
    async fn test_details() {
        let mock = mock();
        let module = ManualApprovalTransferManager::new(MODULE, mock.clone(), defaults());
        mock_approval(&mock, DateTime::from_timestamp(0, 0).unwrap());
        assert_eq!(module.get_approval_details(FROM, TO).await.unwrap(), None);

        let expiry = DateTime::from_timestamp(2_000_000_000, 0).unwrap();
        mock_approval(&mock, expiry);
        assert_eq!(
            module.get_approval_details(FROM, TO).await.unwrap(),
            Some(ManualApproval {
                from: FROM,
                to: TO,
                allowance: dec!(5),
                expiry_time: expiry,
                description: "lockup".to_string(),
            })
        );
    }

    #[tokio::test]
    async fn test_add() {
        let mock = mock();
        let module = ManualApprovalTransferManager::new(MODULE, mock.clone(), defaults());
        let expiry = Utc::now() + Duration::days(1);
        mock_approval(&mock, expiry);
        assert!(matches!(
            module
                .add_manual_approval(FROM, TO, dec!(1), expiry, "", TxParams::new())
                .await,
            Err(Error::Precondition(message)) if message.contains("already exists")
        ));

        // An expired approval may be replaced.
        mock_approval(&mock, Utc::now() - Duration::days(1));
        module
            .add_manual_approval(FROM, TO, dec!(1), expiry, "otc", TxParams::new())
            .await
            .unwrap();
        assert_eq!(
            mock.sent_transactions()[0].data,
            calldata(
                "addManualApproval(address,address,uint256,uint256,bytes32)",
                &[
                    FROM.into(),
                    TO.into(),
                    Token::Uint(U256::exp10(18)),
                    Token::Uint(date_to_u256(expiry).unwrap()),
                    Token::FixedBytes(string_to_bytes32("otc").unwrap().to_vec()),
                ]
            )
        );

        let past = Utc::now() - Duration::hours(1);
        assert!(module
            .add_manual_approval(FROM, TO, dec!(1), past, "", TxParams::new())
            .await
            .is_err());
        assert!(module
            .add_manual_approval(FROM, TO, dec!(0), expiry, "", TxParams::new())
            .await
            .is_err());
        assert_eq!(mock.sent_transactions().len(), 1);
    }

    #[tokio::test]
    async fn test_modify_and_revoke_need_existing() {
        let mock = mock();
        let module = ManualApprovalTransferManager::new(MODULE, mock.clone(), defaults());
        let expiry = Utc::now() + Duration::days(1);
        mock_approval(&mock, DateTime::from_timestamp(0, 0).unwrap());
        assert!(module
            .revoke_manual_approval(FROM, TO, TxParams::new())
            .await
            .is_err());
        assert!(module
            .modify_manual_approval(FROM, TO, expiry, dec!(1), "", true, TxParams::new())
            .await
            .is_err());

        mock_approval(&mock, expiry);
        assert!(module
            .modify_manual_approval(FROM, TO, expiry, dec!(6), "", false, TxParams::new())
            .await
            .is_err());
        module
            .modify_manual_approval(FROM, TO, expiry, dec!(5), "", false, TxParams::new())
            .await
            .unwrap();
        module
            .revoke_manual_approval_multi(&[FROM], &[TO], TxParams::new())
            .await
            .unwrap();
        assert_eq!(mock.sent_transactions().len(), 2);
    }
}
