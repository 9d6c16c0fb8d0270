//! Conversion between ledger decimal amounts and integer minor units.

use bigdecimal::num_bigint::BigInt;
use bigdecimal::{BigDecimal, ToPrimitive};
use std::str::FromStr;
use thiserror::Error;

/// Number of decimal places the ledger uses for every asset.
pub const STELLAR_DIVISIBILITY: u32 = 7;

/// Currency code the platform uses for the ledger's native asset.
pub const NATIVE_CURRENCY: &str = "XLM";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AmountError {
    #[error("invalid amount: {0}")]
    Invalid(String),
    #[error("amount out of range: {0}")]
    OutOfRange(String),
}

/// Scales `amount` up by `10^divisibility`, truncating toward zero.
pub fn to_cents(amount: &BigDecimal, divisibility: u32) -> Result<i64, AmountError> {
    let factor = BigDecimal::new(BigInt::from(1), -i64::from(divisibility));
    let scaled = (amount.clone() * factor).with_scale(0);
    scaled
        .to_i64()
        .ok_or_else(|| AmountError::OutOfRange(amount.to_string()))
}

pub fn from_cents(amount: i64, divisibility: u32) -> BigDecimal {
    BigDecimal::new(BigInt::from(amount), i64::from(divisibility))
}

/// Parses a decimal string as returned by the ledger, e.g. `"50.0000000"`.
pub fn parse_amount(value: &str) -> Result<BigDecimal, AmountError> {
    BigDecimal::from_str(value.trim()).map_err(|_| AmountError::Invalid(value.to_string()))
}

/// Renders minor units as the fixed 7-decimal string the ledger expects.
pub fn format_ledger_amount(amount: i64) -> String {
    from_cents(amount, STELLAR_DIVISIBILITY)
        .with_scale(i64::from(STELLAR_DIVISIBILITY))
        .to_string()
}
