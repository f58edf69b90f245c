//! Value conversions between host types and on-chain integer encodings.
//!
//! Token amounts are fixed point integers scaled by the token decimals,
//! dates are unix seconds, percentages are scaled so that `10^16` is one
//! percent, and short strings are packed into `bytes32`.

use chrono::{DateTime, Duration, Utc};
use ethereum_types::U256;
use rust_decimal::Decimal;

/// Decimals of ETH, POLY and USD-denominated values.
pub const WEI_DECIMALS: u8 = 18;
/// Decimals of on-chain percentages (100% is `10^18`).
pub const PERCENTAGE_DECIMALS: u8 = 16;

/// Conversion failures.
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
pub enum ConversionError {
    /// Negative values have no unsigned representation.
    #[error("negative value {0} cannot be encoded")]
    Negative(Decimal),
    /// More fractional digits than the target precision.
    #[error("{value} has more than {decimals} decimal places")]
    TooPrecise {
        /// Offending value
        value: Decimal,
        /// Allowed decimal places
        decimals: u8,
    },
    /// Value does not fit the target type.
    #[error("value {0} is out of range")]
    OutOfRange(String),
    /// String does not fit 32 bytes.
    #[error("{0:?} is longer than 32 bytes")]
    StringTooLong(String),
}

pub fn to_base_units(amount: Decimal, decimals: u8) -> Result<U256, ConversionError> {
    //! Scale a human amount into on-chain base units.
    //!
    //! Rejects negative amounts and amounts with more fractional digits
    //! than `decimals`, so that no precision is silently lost.
    if amount.is_sign_negative() && !amount.is_zero() {
        return Err(ConversionError::Negative(amount));
    }
    let normalized = amount.normalize();
    let scale = normalized.scale();
    if scale > u32::from(decimals) {
        return Err(ConversionError::TooPrecise { value: amount, decimals });
    }
    let mantissa = U256::from(normalized.mantissa().unsigned_abs());
    let factor = U256::exp10((u32::from(decimals) - scale) as usize);
    mantissa
        .checked_mul(factor)
        .ok_or_else(|| ConversionError::OutOfRange(amount.to_string()))
}

pub fn from_base_units(value: U256, decimals: u8) -> Result<Decimal, ConversionError> {
    //! Turn on-chain base units into a human amount.
    if value.bits() > 128 {
        return Err(ConversionError::OutOfRange(value.to_string()));
    }
    let raw = i128::try_from(value.as_u128())
        .map_err(|_| ConversionError::OutOfRange(value.to_string()))?;
    // Decimal supports at most 28 fractional digits.
    let (raw, scale) = if decimals > 28 {
        let excess = U256::exp10(usize::from(decimals - 28));
        if !(value % excess).is_zero() {
            return Err(ConversionError::OutOfRange(value.to_string()));
        }
        ((value / excess).as_u128() as i128, 28)
    } else {
        (raw, u32::from(decimals))
    };
    Decimal::try_from_i128_with_scale(raw, scale)
        .map(|d| d.normalize())
        .map_err(|_| ConversionError::OutOfRange(value.to_string()))
}

pub fn to_wei(amount: Decimal) -> Result<U256, ConversionError> {
    //! Scale an 18-decimal amount (ETH, POLY, USD).
    to_base_units(amount, WEI_DECIMALS)
}

pub fn from_wei(value: U256) -> Result<Decimal, ConversionError> {
    //! Unscale an 18-decimal amount (ETH, POLY, USD).
    from_base_units(value, WEI_DECIMALS)
}

pub fn percentage_to_u256(percentage: Decimal) -> Result<U256, ConversionError> {
    //! Encode a percentage (`12.5` for 12.5%).
    to_base_units(percentage, PERCENTAGE_DECIMALS)
}

pub fn u256_to_percentage(value: U256) -> Result<Decimal, ConversionError> {
    //! Decode an on-chain percentage.
    from_base_units(value, PERCENTAGE_DECIMALS)
}

pub fn date_to_u256(date: DateTime<Utc>) -> Result<U256, ConversionError> {
    //! Encode a date as unix seconds.
    u64::try_from(date.timestamp())
        .map(U256::from)
        .map_err(|_| ConversionError::OutOfRange(date.to_rfc3339()))
}

pub fn u256_to_date(value: U256) -> Result<DateTime<Utc>, ConversionError> {
    //! Decode unix seconds into a date.
    if value > U256::from(i64::MAX as u64) {
        return Err(ConversionError::OutOfRange(value.to_string()));
    }
    DateTime::from_timestamp(value.as_u64() as i64, 0)
        .ok_or_else(|| ConversionError::OutOfRange(value.to_string()))
}

pub fn duration_to_u256(duration: Duration) -> Result<U256, ConversionError> {
    //! Encode a duration as whole seconds.
    u64::try_from(duration.num_seconds())
        .map(U256::from)
        .map_err(|_| ConversionError::OutOfRange(duration.to_string()))
}

pub fn u256_to_duration(value: U256) -> Result<Duration, ConversionError> {
    //! Decode whole seconds into a duration.
    if value > U256::from(i64::MAX as u64) {
        return Err(ConversionError::OutOfRange(value.to_string()));
    }
    Duration::try_seconds(value.as_u64() as i64)
        .ok_or_else(|| ConversionError::OutOfRange(value.to_string()))
}

pub fn u256_to_u64(value: U256) -> Result<u64, ConversionError> {
    //! Narrow a counter or identifier.
    if value > U256::from(u64::MAX) {
        return Err(ConversionError::OutOfRange(value.to_string()));
    }
    Ok(value.as_u64())
}

pub fn string_to_bytes32(text: &str) -> Result<[u8; 32], ConversionError> {
    //! Pack a string into `bytes32`, right-padded with zeros.
    let bytes = text.as_bytes();
    if bytes.len() > 32 {
        return Err(ConversionError::StringTooLong(text.to_string()));
    }
    let mut out = [0u8; 32];
    out[..bytes.len()].copy_from_slice(bytes);
    Ok(out)
}

pub fn bytes32_to_string(bytes: &[u8]) -> String {
    //! Unpack a zero-padded `bytes32` string.
    let end = bytes.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

#[cfg(test)]
mod test {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_to_base_units() {
        assert_eq!(to_base_units(dec!(1.5), 6).unwrap(), U256::from(1_500_000));
        assert_eq!(to_base_units(dec!(0), 18).unwrap(), U256::zero());
        assert_eq!(
            to_base_units(dec!(1), 18).unwrap(),
            U256::from(1_000_000_000_000_000_000u64)
        );
        // Trailing zeros beyond the precision are harmless.
        assert_eq!(to_base_units(dec!(2.500), 1).unwrap(), U256::from(25));
    }

    #[test]
    fn test_to_base_units_rejects_lossy_input() {
        assert_eq!(
            to_base_units(dec!(1.25), 1).unwrap_err(),
            ConversionError::TooPrecise {
                value: dec!(1.25),
                decimals: 1
            }
        );
        assert_eq!(
            to_base_units(dec!(-1), 18).unwrap_err(),
            ConversionError::Negative(dec!(-1))
        );
    }

    #[test]
    fn test_from_base_units() {
        assert_eq!(from_base_units(U256::from(1_500_000), 6).unwrap(), dec!(1.5));
        assert_eq!(from_base_units(U256::from(42), 0).unwrap(), dec!(42));
        assert_eq!(
            from_base_units(U256::exp10(27), 18).unwrap(),
            dec!(1000000000)
        );
        assert!(from_base_units(U256::MAX, 18).is_err());
    }

    #[test]
    fn test_percentages() {
        assert_eq!(percentage_to_u256(dec!(100)).unwrap(), U256::exp10(18));
        assert_eq!(percentage_to_u256(dec!(0.5)).unwrap(), U256::exp10(15) * 5);
        assert_eq!(u256_to_percentage(U256::exp10(16) * 25).unwrap(), dec!(25));
    }

    #[test]
    fn test_dates() {
        let date = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        assert_eq!(date_to_u256(date).unwrap(), U256::from(1_700_000_000u64));
        assert_eq!(u256_to_date(U256::from(1_700_000_000u64)).unwrap(), date);
        assert!(u256_to_date(U256::MAX).is_err());
        let before_epoch = DateTime::from_timestamp(-1, 0).unwrap();
        assert!(date_to_u256(before_epoch).is_err());
    }

    #[test]
    fn test_durations() {
        assert_eq!(
            duration_to_u256(Duration::days(1)).unwrap(),
            U256::from(86_400)
        );
        assert_eq!(u256_to_duration(U256::from(60)).unwrap(), Duration::minutes(1));
    }

    #[test]
    fn test_bytes32() {
        let packed = string_to_bytes32("POLY").unwrap();
        assert_eq!(&packed[..4], b"POLY");
        assert!(packed[4..].iter().all(|&b| b == 0));
        assert_eq!(bytes32_to_string(&packed), "POLY");
        assert_eq!(bytes32_to_string(&[0u8; 32]), "");
        assert!(string_to_bytes32(&"x".repeat(33)).is_err());
        assert_eq!(
            bytes32_to_string(&string_to_bytes32(&"y".repeat(32)).unwrap()),
            "y".repeat(32)
        );
    }
}
