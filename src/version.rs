//! Version tags of deployed contracts.
//!
//! Several contracts changed their ABI between protocol releases. A wrapper
//! whose ABI shape depends on the release carries one of these tags and
//! refuses operations missing from that shape.

use std::fmt;
use std::str::FromStr;

/// Protocol release a deployed contract belongs to.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
#[allow(non_camel_case_types)]
pub enum ContractVersion {
    /// 2.x contracts (whitelist-based transfer manager).
    V2_0,
    /// 3.0.x contracts (KYC data and investor flags).
    V3_0,
    /// 3.1.x contracts, ABI compatible with 3.0.
    V3_1,
}

/// Unknown or malformed version string.
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
#[error("unsupported contract version {0:?}")]
pub struct UnknownVersion(pub String);

impl ContractVersion {
    pub const fn from_parts(major: u8, minor: u8) -> Option<Self> {
        //! Map a `major.minor` pair. Patch releases never change the ABI,
        //! and every 2.x minor release shares the 2.0 shapes.
        match (major, minor) {
            (2, _) => Some(Self::V2_0),
            (3, 0) => Some(Self::V3_0),
            (3, 1) => Some(Self::V3_1),
            _ => None,
        }
    }

    pub const fn is_v3(&self) -> bool {
        //! Whether this release uses the 3.x ABI shapes.
        matches!(self, Self::V3_0 | Self::V3_1)
    }
}

impl FromStr for ContractVersion {
    type Err = UnknownVersion;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<u8> = s
            .trim()
            .trim_start_matches('v')
            .split('.')
            .map(str::parse)
            .collect::<Result<_, _>>()
            .map_err(|_| UnknownVersion(s.to_string()))?;
        match parts.as_slice() {
            [major, minor] | [major, minor, _] => {
                Self::from_parts(*major, *minor).ok_or_else(|| UnknownVersion(s.to_string()))
            }
            _ => Err(UnknownVersion(s.to_string())),
        }
    }
}

impl fmt::Display for ContractVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::V2_0 => "2.0.0",
            Self::V3_0 => "3.0.0",
            Self::V3_1 => "3.1.0",
        })
    }
}
