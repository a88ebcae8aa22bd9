//! Whole-token to smallest-unit conversion
//!
//! One whole token is `10^DECIMALS` units, so `tokens(10)` is the
//! purchase price written as "10" in listings and configuration.

use crate::{Amount, CoreError, CoreResult};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::str::FromStr;

/// Decimal places between a whole token and the smallest unit
pub const DECIMALS: u32 = 18;

const UNITS_PER_TOKEN: u64 = 1_000_000_000_000_000_000;

/// Convert a whole number of tokens into an [`Amount`]
pub fn tokens(n: u64) -> Amount {
    Amount::from_units(n as u128 * UNITS_PER_TOKEN as u128)
}

impl Amount {
    /// Convert a (possibly fractional) token quantity into units
    pub fn from_tokens(value: Decimal) -> CoreResult<Amount> {
        if value.is_sign_negative() {
            return Err(CoreError::invalid_amount(format!(
                "{} is negative",
                value
            )));
        }

        let scaled = value
            .checked_mul(Decimal::from(UNITS_PER_TOKEN))
            .ok_or(CoreError::Overflow)?;

        if !scaled.fract().is_zero() {
            return Err(CoreError::invalid_amount(format!(
                "{} has more than {} decimal places",
                value, DECIMALS
            )));
        }

        scaled
            .to_u128()
            .map(Amount::from_units)
            .ok_or(CoreError::Overflow)
    }

    /// Parse a token quantity such as `"2.5"`
    pub fn parse_tokens(s: &str) -> CoreResult<Amount> {
        let value = Decimal::from_str(s.trim())
            .map_err(|e| CoreError::invalid_amount(format!("{}: {}", s, e)))?;
        Self::from_tokens(value)
    }

    /// Express the amount in whole tokens
    pub fn to_tokens(&self) -> CoreResult<Decimal> {
        let units = i128::try_from(self.units()).map_err(|_| CoreError::Overflow)?;
        Decimal::try_from_i128_with_scale(units, DECIMALS)
            .map(|d| d.normalize())
            .map_err(|_| CoreError::Overflow)
    }
}
