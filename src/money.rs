//! Money Module
//!
//! Exact base-10 money with two decimal places, held as integer minor units
//! (cents). Every conversion between client text and the internal value
//! MUST go through this module.
//!
//! ## Internal Representation
//! - `Amount` wraps a `u64` number of cents, so it can never be negative
//! - No binary floating point anywhere: parsing works on the digit strings
//! - Display uses `rust_decimal` normalisation to drop insignificant zeros
//!
//! ## Usage
//! ```rust
//! use bulk_transfer::money::{Amount, parse_amount};
//!
//! let amount = parse_amount("20.5").unwrap();
//! assert_eq!(amount, Amount::from_cents(2050));
//! assert_eq!(amount.to_string(), "20.5");
//! ```

use std::fmt;
use std::iter::Sum;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize, Serializer, de};
use thiserror::Error;

/// Number of fractional digits carried by every amount.
pub const MINOR_DIGITS: usize = 2;

const MINOR_PER_MAJOR: u64 = 100;

// ============================================================================
// Error Types
// ============================================================================

/// Amount codec errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MoneyError {
    #[error("invalid amount format: {0}")]
    InvalidFormat(String),

    #[error("amount must contain at most {max} decimals after period, got {provided}")]
    PrecisionExceeded { provided: usize, max: usize },

    #[error("amount too large, would overflow")]
    Overflow,
}

// ============================================================================
// Amount
// ============================================================================

/// Non-negative money amount in minor units (cents).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Amount(u64);

impl Amount {
    pub const ZERO: Amount = Amount(0);

    #[inline]
    pub const fn from_cents(cents: u64) -> Self {
        Self(cents)
    }

    #[inline]
    pub const fn cents(self) -> u64 {
        self.0
    }

    #[inline]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub fn checked_add(self, other: Amount) -> Option<Amount> {
        self.0.checked_add(other.0).map(Amount)
    }

    /// Returns `None` when the result would be negative.
    #[inline]
    pub fn checked_sub(self, other: Amount) -> Option<Amount> {
        self.0.checked_sub(other.0).map(Amount)
    }

    /// Sum a sequence of amounts, `None` on overflow.
    pub fn checked_sum<I>(amounts: I) -> Option<Amount>
    where
        I: IntoIterator<Item = Amount>,
    {
        amounts
            .into_iter()
            .try_fold(Amount::ZERO, |acc, amount| acc.checked_add(amount))
    }

    /// Exact decimal value in major units (e.g. 2050 cents -> 20.50).
    pub fn to_decimal(self) -> Decimal {
        Decimal::from_i128_with_scale(i128::from(self.0), MINOR_DIGITS as u32)
    }
}

/// Panics on overflow, like integer `Sum`. Use [`Amount::checked_sum`] on
/// untrusted input.
impl Sum for Amount {
    fn sum<I: Iterator<Item = Amount>>(iter: I) -> Self {
        iter.fold(Amount::ZERO, |acc, amount| Amount(acc.0 + amount.0))
    }
}

// ============================================================================
// Parse: Client → Internal (String → Amount)
// ============================================================================

/// Convert client string amount to its internal minor-unit representation
///
/// Accepts `"10"`, `"20.5"`, `"20.05"` and `"30."`; a missing or short
/// fractional part is right-padded with zeros.
///
/// # Errors
/// * `InvalidFormat` - empty input, signs, exponents, whitespace, stray characters,
///   missing whole part (`".5"`), or more than one period
/// * `PrecisionExceeded` - more than two fractional digits
/// * `Overflow` - the value does not fit in `u64` cents
pub fn parse_amount(amount_str: &str) -> Result<Amount, MoneyError> {
    if amount_str.is_empty() {
        return Err(MoneyError::InvalidFormat("empty string".into()));
    }

    let (whole, frac) = amount_str.split_once('.').unwrap_or((amount_str, ""));

    if whole.is_empty() {
        return Err(MoneyError::InvalidFormat(
            "missing whole part (e.g., use 0.5 instead of .5)".into(),
        ));
    }
    if !is_digits(whole) || !is_digits(frac) {
        return Err(MoneyError::InvalidFormat(format!(
            "not a decimal number: {amount_str}"
        )));
    }

    // Reject, never truncate
    if frac.len() > MINOR_DIGITS {
        return Err(MoneyError::PrecisionExceeded {
            provided: frac.len(),
            max: MINOR_DIGITS,
        });
    }

    // Only digits remain, so the sole failure mode is overflow
    let whole_num: u64 = whole.parse().map_err(|_| MoneyError::Overflow)?;
    let frac_padded = format!("{frac:0<width$}", width = MINOR_DIGITS);
    let frac_num: u64 = frac_padded.parse().map_err(|_| MoneyError::Overflow)?;

    whole_num
        .checked_mul(MINOR_PER_MAJOR)
        .and_then(|v| v.checked_add(frac_num))
        .map(Amount)
        .ok_or(MoneyError::Overflow)
}

fn is_digits(s: &str) -> bool {
    s.bytes().all(|b| b.is_ascii_digit())
}

// ============================================================================
// Format: Internal → Client (Amount → String)
// ============================================================================

/// Canonical text form: `1000` → `"10"`, `2050` → `"20.5"`, `2002` →
/// `"20.02"`, `0` → `"0"`.
pub fn format_amount(amount: Amount) -> String {
    amount.to_decimal().normalize().to_string()
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_amount(*self))
    }
}

impl FromStr for Amount {
    type Err = MoneyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_amount(s)
    }
}

impl From<Amount> for Decimal {
    fn from(amount: Amount) -> Self {
        amount.to_decimal()
    }
}

// Amounts travel as strings on the wire to avoid float precision issues.
impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format_amount(*self))
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse_amount(&raw).map_err(de::Error::custom)
    }
}
