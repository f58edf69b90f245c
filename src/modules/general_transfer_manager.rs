//! `GeneralTransferManager`: who may send and receive a token, and when.
//!
//! The 2.x release keeps a whitelist with optional signed updates, while
//! 3.x replaced it with KYC data and a bitmap of investor flags. One
//! wrapper serves both, tagged with the [`ContractVersion`] of the
//! deployed module; operations of the other shape fail with
//! [`Error::UnsupportedVersion`] without touching the node.

use crate::abi;
use crate::address::Address;
use crate::assertions::{ensure, equal_lengths, non_zero_address};
use crate::contract::{tokens, Contract};
use crate::conversions::{date_to_u256, u256_to_date};
use crate::error::{Error, Result};
use crate::modules::{InvestorFlag, Module};
use crate::network::Provider;
use crate::transaction_builder::{PendingTransaction, TxDefaults, TxParams};
use crate::version::ContractVersion;
use chrono::{DateTime, Utc};
use ethabi::Token;
use ethereum_types::U256;
use itertools::izip;
use std::sync::Arc;

/// Whitelist entry of a 2.x manager.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct WhitelistEntry {
    /// Investor may send tokens after this date
    pub from_time: DateTime<Utc>,
    /// Investor may receive tokens after this date
    pub to_time: DateTime<Utc>,
    /// KYC expiry
    pub expiry_time: DateTime<Utc>,
    /// Investor may buy in offerings
    pub can_buy_from_sto: bool,
    /// Whether the investor was ever whitelisted
    pub added: bool,
}

/// KYC record of a 3.x manager.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct KycData {
    /// Investor address
    pub investor: Address,
    /// Investor may send tokens after this date
    pub can_send_after: DateTime<Utc>,
    /// Investor may receive tokens after this date
    pub can_receive_after: DateTime<Utc>,
    /// KYC expiry
    pub expiry_time: DateTime<Utc>,
}

/// Defaults applied to zero KYC times.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TransferDefaults {
    /// Replaces a zero `can_send_after`
    pub can_send_after: DateTime<Utc>,
    /// Replaces a zero `can_receive_after`
    pub can_receive_after: DateTime<Utc>,
}

/// Decoded investor flag bitmap.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct InvestorFlags {
    /// Accredited investor
    pub is_accredited: bool,
    /// Barred from buying in offerings
    pub can_not_buy_from_sto: bool,
    /// Subject to volume restrictions
    pub is_vol_restricted: bool,
}

impl InvestorFlags {
    fn from_bits(bits: U256) -> Self {
        Self {
            is_accredited: bits.bit(InvestorFlag::IsAccredited as usize),
            can_not_buy_from_sto: bits.bit(InvestorFlag::CanNotBuyFromSto as usize),
            is_vol_restricted: bits.bit(InvestorFlag::IsVolRestricted as usize),
        }
    }

    pub const fn get(&self, flag: InvestorFlag) -> bool {
        //! Value of one flag.
        match flag {
            InvestorFlag::IsAccredited => self.is_accredited,
            InvestorFlag::CanNotBuyFromSto => self.can_not_buy_from_sto,
            InvestorFlag::IsVolRestricted => self.is_vol_restricted,
        }
    }
}

/// Wrapper of a `GeneralTransferManager` module of either release.
#[derive(Clone, Debug)]
pub struct GeneralTransferManager {
    contract: Contract,
    version: ContractVersion,
}

impl Module for GeneralTransferManager {
    fn contract(&self) -> &Contract {
        &self.contract
    }
}

fn dates(values: &[DateTime<Utc>]) -> Result<Token> {
    Ok(tokens::uints(
        values
            .iter()
            .map(|date| date_to_u256(*date))
            .collect::<std::result::Result<Vec<_>, _>>()?,
    ))
}

fn to_dates(values: Vec<U256>) -> Result<Vec<DateTime<Utc>>> {
    Ok(values
        .into_iter()
        .map(u256_to_date)
        .collect::<std::result::Result<_, _>>()?)
}

impl GeneralTransferManager {
    pub fn new(
        address: Address,
        version: ContractVersion,
        provider: Arc<dyn Provider>,
        defaults: Arc<TxDefaults>,
    ) -> Self {
        //! `version` selects the ABI shape. The factory detects it in
        //! [`crate::ContractFactory::general_transfer_manager`].
        let abi = if version.is_v3() {
            &abi::GENERAL_TRANSFER_MANAGER_V3
        } else {
            &abi::GENERAL_TRANSFER_MANAGER_V2
        };
        Self {
            contract: Contract::new(address, abi, provider, defaults),
            version,
        }
    }

    pub const fn address(&self) -> Address {
        //! Module address.
        self.contract.address()
    }

    pub const fn version(&self) -> ContractVersion {
        //! Release the wrapper speaks.
        self.version
    }

    fn require_v2(&self, function: &'static str) -> Result<()> {
        if self.version.is_v3() {
            return Err(Error::UnsupportedVersion {
                function,
                version: self.version,
            });
        }
        Ok(())
    }

    fn require_v3(&self, function: &'static str) -> Result<()> {
        if !self.version.is_v3() {
            return Err(Error::UnsupportedVersion {
                function,
                version: self.version,
            });
        }
        Ok(())
    }

    pub async fn issuance_address(&self) -> Result<Address> {
        //! Account tokens are issued from.
        self.contract.call("issuanceAddress", &[]).await?.single()
    }

    pub async fn get_investors(&self) -> Result<Vec<Address>> {
        //! All investors ever added.
        let function = if self.version.is_v3() {
            "getAllInvestors"
        } else {
            "getInvestors"
        };
        self.contract.call(function, &[]).await?.single()
    }

    pub async fn change_issuance_address(
        &self,
        issuance_address: Address,
        params: TxParams,
    ) -> Result<PendingTransaction> {
        //! Set the account tokens are issued from.
        self.contract
            .send("changeIssuanceAddress", &[issuance_address.into()], params)
            .await
    }

    pub async fn signing_address(&self) -> Result<Address> {
        //! Account signing off-chain whitelist updates. 2.x only.
        self.require_v2("signing_address")?;
        self.contract.call("signingAddress", &[]).await?.single()
    }

    async fn flag(&self, name: &'static str, function: &str) -> Result<bool> {
        self.require_v2(name)?;
        self.contract.call(function, &[]).await?.single()
    }

    pub async fn allow_all_transfers(&self) -> Result<bool> {
        //! Whether every transfer passes. 2.x only.
        self.flag("allow_all_transfers", "allowAllTransfers").await
    }

    pub async fn allow_all_whitelist_transfers(&self) -> Result<bool> {
        //! Whether whitelisted investors skip the time locks. 2.x only.
        self.flag("allow_all_whitelist_transfers", "allowAllWhitelistTransfers")
            .await
    }

    pub async fn allow_all_whitelist_issuances(&self) -> Result<bool> {
        //! Whether issuance ignores the time locks. 2.x only.
        self.flag("allow_all_whitelist_issuances", "allowAllWhitelistIssuances")
            .await
    }

    pub async fn allow_all_burn_transfers(&self) -> Result<bool> {
        //! Whether burns to the zero address pass. 2.x only.
        self.flag("allow_all_burn_transfers", "allowAllBurnTransfers")
            .await
    }

    pub async fn whitelist(&self, investor: Address) -> Result<WhitelistEntry> {
        //! Whitelist entry of `investor`. 2.x only.
        self.require_v2("whitelist")?;
        let mut outputs = self.contract.call("whitelist", &[investor.into()]).await?;
        Ok(WhitelistEntry {
            from_time: u256_to_date(outputs.take()?)?,
            to_time: u256_to_date(outputs.take()?)?,
            expiry_time: u256_to_date(outputs.take()?)?,
            can_buy_from_sto: outputs.take::<u8>()? != 0,
            added: outputs.take::<u8>()? != 0,
        })
    }

    pub async fn change_signing_address(
        &self,
        signing_address: Address,
        params: TxParams,
    ) -> Result<PendingTransaction> {
        //! 2.x only.
        self.require_v2("change_signing_address")?;
        self.contract
            .send("changeSigningAddress", &[signing_address.into()], params)
            .await
    }

    async fn toggle(
        &self,
        name: &'static str,
        view: &str,
        function: &str,
        value: bool,
        params: TxParams,
    ) -> Result<PendingTransaction> {
        let current = self.flag(name, view).await?;
        ensure(current != value, format!("{view} is already {value}"))?;
        self.contract
            .send(function, &[Token::Bool(value)], params)
            .await
    }

    pub async fn change_allow_all_transfers(
        &self,
        allow: bool,
        params: TxParams,
    ) -> Result<PendingTransaction> {
        //! 2.x only. Fails when unchanged.
        self.toggle(
            "change_allow_all_transfers",
            "allowAllTransfers",
            "changeAllowAllTransfers",
            allow,
            params,
        )
        .await
    }

    pub async fn change_allow_all_whitelist_transfers(
        &self,
        allow: bool,
        params: TxParams,
    ) -> Result<PendingTransaction> {
        //! 2.x only. Fails when unchanged.
        self.toggle(
            "change_allow_all_whitelist_transfers",
            "allowAllWhitelistTransfers",
            "changeAllowAllWhitelistTransfers",
            allow,
            params,
        )
        .await
    }

    pub async fn change_allow_all_whitelist_issuances(
        &self,
        allow: bool,
        params: TxParams,
    ) -> Result<PendingTransaction> {
        //! 2.x only. Fails when unchanged.
        self.toggle(
            "change_allow_all_whitelist_issuances",
            "allowAllWhitelistIssuances",
            "changeAllowAllWhitelistIssuances",
            allow,
            params,
        )
        .await
    }

    pub async fn change_allow_all_burn_transfers(
        &self,
        allow: bool,
        params: TxParams,
    ) -> Result<PendingTransaction> {
        //! 2.x only. Fails when unchanged.
        self.toggle(
            "change_allow_all_burn_transfers",
            "allowAllBurnTransfers",
            "changeAllowAllBurnTransfers",
            allow,
            params,
        )
        .await
    }

    pub async fn modify_whitelist(
        &self,
        investor: Address,
        from_time: DateTime<Utc>,
        to_time: DateTime<Utc>,
        expiry_time: DateTime<Utc>,
        can_buy_from_sto: bool,
        params: TxParams,
    ) -> Result<PendingTransaction> {
        //! Add or update the whitelist entry of `investor`. 2.x only.
        self.require_v2("modify_whitelist")?;
        non_zero_address(investor, "Investor")?;
        self.contract
            .send(
                "modifyWhitelist",
                &[
                    investor.into(),
                    tokens::uint(date_to_u256(from_time)?),
                    tokens::uint(date_to_u256(to_time)?),
                    tokens::uint(date_to_u256(expiry_time)?),
                    Token::Bool(can_buy_from_sto),
                ],
                params,
            )
            .await
    }

    pub async fn modify_whitelist_multi(
        &self,
        investors: &[Address],
        from_times: &[DateTime<Utc>],
        to_times: &[DateTime<Utc>],
        expiry_times: &[DateTime<Utc>],
        can_buy_from_sto: &[bool],
        params: TxParams,
    ) -> Result<PendingTransaction> {
        //! Batch form of [`GeneralTransferManager::modify_whitelist`].
        self.require_v2("modify_whitelist_multi")?;
        equal_lengths(
            &[
                investors.len(),
                from_times.len(),
                to_times.len(),
                expiry_times.len(),
                can_buy_from_sto.len(),
            ],
            "modifyWhitelistMulti",
        )?;
        for investor in investors {
            non_zero_address(*investor, "Investor")?;
        }
        self.contract
            .send(
                "modifyWhitelistMulti",
                &[
                    tokens::addresses(investors),
                    dates(from_times)?,
                    dates(to_times)?,
                    dates(expiry_times)?,
                    tokens::bools(can_buy_from_sto),
                ],
                params,
            )
            .await
    }

    pub async fn defaults(&self) -> Result<TransferDefaults> {
        //! Times applied where KYC data holds zero. 3.x only.
        self.require_v3("defaults")?;
        let mut outputs = self.contract.call("defaults", &[]).await?;
        Ok(TransferDefaults {
            can_send_after: u256_to_date(outputs.take()?)?,
            can_receive_after: u256_to_date(outputs.take()?)?,
        })
    }

    pub async fn get_kyc_data(&self, investors: &[Address]) -> Result<Vec<KycData>> {
        //! KYC records of `investors`, in the same order. 3.x only.
        self.require_v3("get_kyc_data")?;
        let mut outputs = self
            .contract
            .call("getKYCData", &[tokens::addresses(investors)])
            .await?;
        let can_send_after = to_dates(outputs.take()?)?;
        let can_receive_after = to_dates(outputs.take()?)?;
        let expiry_time = to_dates(outputs.take()?)?;
        Ok(collect_kyc(
            investors.to_vec(),
            can_send_after,
            can_receive_after,
            expiry_time,
        ))
    }

    pub async fn get_all_kyc_data(&self) -> Result<Vec<KycData>> {
        //! KYC records of every known investor. 3.x only.
        self.require_v3("get_all_kyc_data")?;
        let mut outputs = self.contract.call("getAllKYCData", &[]).await?;
        let investors = outputs.take()?;
        let can_send_after = to_dates(outputs.take()?)?;
        let can_receive_after = to_dates(outputs.take()?)?;
        let expiry_time = to_dates(outputs.take()?)?;
        Ok(collect_kyc(
            investors,
            can_send_after,
            can_receive_after,
            expiry_time,
        ))
    }

    pub async fn get_investor_flags(&self, investor: Address) -> Result<InvestorFlags> {
        //! Flags of `investor`. 3.x only.
        self.require_v3("get_investor_flags")?;
        let bits = self
            .contract
            .call("getInvestorFlags", &[investor.into()])
            .await?
            .single()?;
        Ok(InvestorFlags::from_bits(bits))
    }

    pub async fn change_defaults(
        &self,
        can_send_after: DateTime<Utc>,
        can_receive_after: DateTime<Utc>,
        params: TxParams,
    ) -> Result<PendingTransaction> {
        //! 3.x only.
        self.require_v3("change_defaults")?;
        self.contract
            .send(
                "changeDefaults",
                &[
                    tokens::uint(date_to_u256(can_send_after)?),
                    tokens::uint(date_to_u256(can_receive_after)?),
                ],
                params,
            )
            .await
    }

    pub async fn modify_kyc_data(
        &self,
        investor: Address,
        can_send_after: DateTime<Utc>,
        can_receive_after: DateTime<Utc>,
        expiry_time: DateTime<Utc>,
        params: TxParams,
    ) -> Result<PendingTransaction> {
        //! Add or update the KYC record of `investor`. 3.x only.
        self.require_v3("modify_kyc_data")?;
        non_zero_address(investor, "Investor")?;
        self.contract
            .send(
                "modifyKYCData",
                &[
                    investor.into(),
                    tokens::uint(date_to_u256(can_send_after)?),
                    tokens::uint(date_to_u256(can_receive_after)?),
                    tokens::uint(date_to_u256(expiry_time)?),
                ],
                params,
            )
            .await
    }

    pub async fn modify_kyc_data_multi(
        &self,
        records: &[KycData],
        params: TxParams,
    ) -> Result<PendingTransaction> {
        //! Batch form of [`GeneralTransferManager::modify_kyc_data`].
        self.require_v3("modify_kyc_data_multi")?;
        ensure(!records.is_empty(), "No KYC data to modify")?;
        let mut investors = Vec::with_capacity(records.len());
        for record in records {
            non_zero_address(record.investor, "Investor")?;
            investors.push(record.investor);
        }
        let column = |pick: fn(&KycData) -> DateTime<Utc>| {
            dates(&records.iter().map(pick).collect::<Vec<_>>())
        };
        self.contract
            .send(
                "modifyKYCDataMulti",
                &[
                    tokens::addresses(&investors),
                    column(|r| r.can_send_after)?,
                    column(|r| r.can_receive_after)?,
                    column(|r| r.expiry_time)?,
                ],
                params,
            )
            .await
    }

    pub async fn modify_investor_flag(
        &self,
        investor: Address,
        flag: InvestorFlag,
        value: bool,
        params: TxParams,
    ) -> Result<PendingTransaction> {
        //! Fails when the flag already has `value`.
        self.require_v3("modify_investor_flag")?;
        non_zero_address(investor, "Investor")?;
        ensure(
            self.get_investor_flags(investor).await?.get(flag) != value,
            format!("{flag:?} of {investor} is already {value}"),
        )?;
        self.contract
            .send(
                "modifyInvestorFlag",
                &[investor.into(), tokens::uint(flag as u8), Token::Bool(value)],
                params,
            )
            .await
    }

    pub async fn modify_investor_flag_multi(
        &self,
        investors: &[Address],
        flags: &[InvestorFlag],
        values: &[bool],
        params: TxParams,
    ) -> Result<PendingTransaction> {
        //! Batch form of [`GeneralTransferManager::modify_investor_flag`].
        self.require_v3("modify_investor_flag_multi")?;
        equal_lengths(
            &[investors.len(), flags.len(), values.len()],
            "modifyInvestorFlagMulti",
        )?;
        for investor in investors {
            non_zero_address(*investor, "Investor")?;
        }
        self.contract
            .send(
                "modifyInvestorFlagMulti",
                &[
                    tokens::addresses(investors),
                    tokens::uints(flags.iter().map(|flag| U256::from(*flag as u8))),
                    tokens::bools(values),
                ],
                params,
            )
            .await
    }
}

fn collect_kyc(
    investors: Vec<Address>,
    can_send_after: Vec<DateTime<Utc>>,
    can_receive_after: Vec<DateTime<Utc>>,
    expiry_time: Vec<DateTime<Utc>>,
) -> Vec<KycData> {
    izip!(investors, can_send_after, can_receive_after, expiry_time)
        .map(
            |(investor, can_send_after, can_receive_after, expiry_time)| KycData {
                investor,
                can_send_after,
                can_receive_after,
                expiry_time,
            },
        )
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::mock::calldata;
    use crate::modules::testing::*;

    fn date(timestamp: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(timestamp, 0).unwrap()
    }

    #[tokio::test]
    async fn test_v2_whitelist() {
        let mock = mock();
        let gtm =
            GeneralTransferManager::new(MODULE, ContractVersion::V2_0, mock.clone(), defaults());
        mock.mock_call(
            MODULE,
            "whitelist(address)",
            &[
                Token::Uint(100.into()),
                Token::Uint(200.into()),
                Token::Uint(300.into()),
                Token::Uint(1.into()),
                Token::Uint(1.into()),
            ],
        );
        let investor = Address::from([0x21; 20]);
        let entry = gtm.whitelist(investor).await.unwrap();
        assert_eq!(entry.from_time, date(100));
        assert_eq!(entry.expiry_time, date(300));
        assert!(entry.can_buy_from_sto && entry.added);

        gtm.modify_whitelist(investor, date(1), date(2), date(3), true, TxParams::new())
            .await
            .unwrap();
        assert_eq!(
            mock.sent_transactions()[0].data,
            calldata(
                "modifyWhitelist(address,uint256,uint256,uint256,bool)",
                &[
                    investor.into(),
                    Token::Uint(1.into()),
                    Token::Uint(2.into()),
                    Token::Uint(3.into()),
                    Token::Bool(true),
                ]
            )
        );
    }

    #[tokio::test]
    async fn test_v2_toggle_must_change() {
        let mock = mock();
        let gtm =
            GeneralTransferManager::new(MODULE, ContractVersion::V2_0, mock.clone(), defaults());
        mock.mock_call(MODULE, "allowAllTransfers()", &[Token::Bool(false)]);
        assert!(matches!(
            gtm.change_allow_all_transfers(false, TxParams::new()).await,
            Err(Error::Precondition(_))
        ));
        gtm.change_allow_all_transfers(true, TxParams::new())
            .await
            .unwrap();
        assert_eq!(
            mock.sent_transactions()[0].data,
            calldata("changeAllowAllTransfers(bool)", &[Token::Bool(true)])
        );
    }

    #[tokio::test]
    async fn test_version_mismatch() {
        let mock = mock();
        let v3 =
            GeneralTransferManager::new(MODULE, ContractVersion::V3_0, mock.clone(), defaults());
        assert!(matches!(
            v3.whitelist(Address::from([1; 20])).await,
            Err(Error::UnsupportedVersion { function: "whitelist", version: ContractVersion::V3_0 })
        ));
        let v2 =
            GeneralTransferManager::new(MODULE, ContractVersion::V2_0, mock.clone(), defaults());
        assert!(matches!(
            v2.get_investor_flags(Address::from([1; 20])).await,
            Err(Error::UnsupportedVersion { .. })
        ));
        assert!(mock.calls().is_empty());
    }

    #[tokio::test]
    async fn test_v3_kyc() {
        let mock = mock();
        let gtm =
            GeneralTransferManager::new(MODULE, ContractVersion::V3_1, mock.clone(), defaults());
        let investors = vec![Address::from([0x21; 20]), Address::from([0x22; 20])];
        let times =
            |a: u64, b: u64| Token::Array(vec![Token::Uint(a.into()), Token::Uint(b.into())]);
        mock.mock_call(
            MODULE,
            "getAllKYCData()",
            &[
                Token::Array(investors.iter().map(|a| (*a).into()).collect()),
                times(10, 11),
                times(20, 21),
                times(30, 31),
            ],
        );
        let records = gtm.get_all_kyc_data().await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(
            records[1],
            KycData {
                investor: investors[1],
                can_send_after: date(11),
                can_receive_after: date(21),
                expiry_time: date(31),
            }
        );

        gtm.modify_kyc_data_multi(&records, TxParams::new())
            .await
            .unwrap();
        assert_eq!(
            mock.sent_transactions()[0].data,
            calldata(
                "modifyKYCDataMulti(address[],uint256[],uint256[],uint256[])",
                &[
                    Token::Array(investors.iter().map(|a| (*a).into()).collect()),
                    times(10, 11),
                    times(20, 21),
                    times(30, 31),
                ]
            )
        );
    }

    #[tokio::test]
    async fn test_v3_flags() {
        let mock = mock();
        let gtm =
            GeneralTransferManager::new(MODULE, ContractVersion::V3_0, mock.clone(), defaults());
        let investor = Address::from([0x21; 20]);
        mock.mock_call(MODULE, "getInvestorFlags(address)", &[Token::Uint(5.into())]);
        let flags = gtm.get_investor_flags(investor).await.unwrap();
        assert_eq!(
            flags,
            InvestorFlags {
                is_accredited: true,
                can_not_buy_from_sto: false,
                is_vol_restricted: true,
            }
        );

        assert!(gtm
            .modify_investor_flag(investor, InvestorFlag::IsAccredited, true, TxParams::new())
            .await
            .is_err());
        gtm.modify_investor_flag(investor, InvestorFlag::CanNotBuyFromSto, true, TxParams::new())
            .await
            .unwrap();
        assert_eq!(
            mock.sent_transactions()[0].data,
            calldata(
                "modifyInvestorFlag(address,uint8,bool)",
                &[investor.into(), Token::Uint(1.into()), Token::Bool(true)]
            )
        );
        assert!(gtm
            .modify_investor_flag_multi(&[investor], &[], &[true], TxParams::new())
            .await
            .is_err());
    }
}
