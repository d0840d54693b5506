//! Decimal token amounts to and from base units

use crate::error::{Result, TimelockError};
use alloy_primitives::U256;

/// Decimals of the reward and LP tokens.
pub const TOKEN_DECIMALS: u32 = 18;

/// Parses a decimal string such as `"0.00505"` into `amount * 10^decimals`.
pub fn parse_units(amount: &str, decimals: u32) -> Result<U256> {
    let amount = amount.trim();
    let (whole, fraction) = amount.split_once('.').unwrap_or((amount, ""));

    if whole.is_empty() && fraction.is_empty() {
        return Err(TimelockError::Encoding(format!("'{}' is not an amount", amount)));
    }
    if !whole.chars().chain(fraction.chars()).all(|c| c.is_ascii_digit()) {
        return Err(TimelockError::Encoding(format!("'{}' is not a decimal amount", amount)));
    }
    if fraction.len() > decimals as usize {
        return Err(TimelockError::Encoding(format!(
            "'{}' has more than {} decimal places",
            amount, decimals
        )));
    }

    let digits = format!("{}{:0<width$}", whole, fraction, width = decimals as usize);
    U256::from_str_radix(&digits, 10)
        .map_err(|e| TimelockError::Encoding(format!("'{}' does not fit 256 bits: {:?}", amount, e)))
}

/// Renders base units as a decimal string without trailing zeros.
pub fn format_units(value: U256, decimals: u32) -> String {
    let decimals = decimals as usize;
    let digits = format!("{:0>width$}", value.to_string(), width = decimals + 1);
    let (whole, fraction) = digits.split_at(digits.len() - decimals);
    let fraction = fraction.trim_end_matches('0');
    if fraction.is_empty() {
        whole.to_string()
    } else {
        format!("{}.{}", whole, fraction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_emission_rate() {
        assert_eq!(
            parse_units("0.00505", TOKEN_DECIMALS).unwrap(),
            U256::from(5_050_000_000_000_000u64)
        );
        assert_eq!(parse_units("12", 0).unwrap(), U256::from(12u64));
        assert_eq!(parse_units(".5", 1).unwrap(), U256::from(5u64));
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert!(parse_units("", 18).is_err());
        assert!(parse_units(".", 18).is_err());
        assert!(parse_units("1.2.3", 18).is_err());
        assert!(parse_units("-1", 18).is_err());
        assert!(parse_units("0.123", 2).is_err());
        assert!(parse_units(&"9".repeat(80), 0).is_err());
    }

    #[test]
    fn test_format_units() {
        assert_eq!(format_units(U256::from(5_050_000_000_000_000u64), TOKEN_DECIMALS), "0.00505");
        assert_eq!(format_units(U256::from(3_000u64), 3), "3");
        assert_eq!(format_units(U256::ZERO, 18), "0");
    }
}
