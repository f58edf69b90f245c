//! Contract ABIs bundled with the crate.
//!
//! Each ABI is parsed once, on first use.

use ethabi::Contract as Abi;
use std::sync::LazyLock;

macro_rules! bundled_abi {
    ($($(#[$meta:meta])* $name:ident => $file:literal),+ $(,)?) => {
        $(
            $(#[$meta])*
            pub static $name: LazyLock<Abi> = LazyLock::new(|| {
                Abi::load(include_str!(concat!("../abi/", $file)).as_bytes())
                    .expect(concat!("Bundled ABI ", $file, " is valid"))
            });
        )+

        /// All bundled ABIs with their file names.
        pub fn all() -> Vec<(&'static str, &'static Abi)> {
            vec![$(($file, &*$name)),+]
        }
    };
}

bundled_abi! {
    /// Name to address directory of the deployment.
    POLYMATH_REGISTRY => "PolymathRegistry.json",
    /// Detailed ERC20 with approval increments (POLY, stable coins).
    ERC20 => "ERC20.json",
    /// Ticker reservation and token deployment.
    SECURITY_TOKEN_REGISTRY => "SecurityTokenRegistry.json",
    /// 3.x security token.
    SECURITY_TOKEN => "SecurityToken.json",
    /// Module factory metadata.
    MODULE_FACTORY => "ModuleFactory.json",
    /// Functions shared by every module.
    MODULE => "Module.json",
    /// Whitelist based 2.x transfer manager.
    GENERAL_TRANSFER_MANAGER_V2 => "GeneralTransferManagerV2.json",
    /// KYC data and investor flags of 3.x.
    GENERAL_TRANSFER_MANAGER_V3 => "GeneralTransferManagerV3.json",
    /// Holder count cap.
    COUNT_TRANSFER_MANAGER => "CountTransferManager.json",
    /// Holder percentage cap.
    PERCENTAGE_TRANSFER_MANAGER => "PercentageTransferManager.json",
    /// Explicit per-pair transfer approvals.
    MANUAL_APPROVAL_TRANSFER_MANAGER => "ManualApprovalTransferManager.json",
    /// Fixed-rate offering in ETH or POLY.
    CAPPED_STO => "CappedSTO.json",
    /// Tiered offering priced in USD.
    USD_TIERED_STO => "USDTieredSTO.json",
    /// Token-weighted ballots.
    WEIGHTED_VOTE_CHECKPOINT => "WeightedVoteCheckpoint.json",
}
