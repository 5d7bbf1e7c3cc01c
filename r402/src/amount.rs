//! Human-readable currency amount parsing.
//!
//! [`MoneyAmount`] turns display prices such as `"$0.10"` or `"1,000.50"`
//! into exact decimal values and converts them into integer base units of a
//! token. No floating point is involved at any step.
//!
//! ```rust
//! use r402::amount::MoneyAmount;
//!
//! let amount = MoneyAmount::parse("$0.10").unwrap();
//! assert_eq!(amount.to_base_units(6).unwrap(), "100000");
//! ```

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use rust_decimal::Decimal;

const MIN_STR: &str = "0.000000001";
const MAX_STR: &str = "999999999";

static MIN: LazyLock<Decimal> =
    LazyLock::new(|| Decimal::from_str(MIN_STR).expect("valid decimal"));
static MAX: LazyLock<Decimal> =
    LazyLock::new(|| Decimal::from_str(MAX_STR).expect("valid decimal"));
static MONEY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?P<sign>-)?\s*\$?\s*(?P<number>(?:\d{1,3}(?:,\d{3})+|\d+)(?:\.\d+)?)\s*$")
        .expect("valid regex")
});

/// A parsed, non-negative monetary amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoneyAmount(Decimal);

/// Errors that can occur when parsing or converting a monetary amount.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MoneyAmountParseError {
    /// The input string could not be parsed as a number.
    #[error("Invalid number format")]
    InvalidFormat,
    /// The value is outside the allowed range.
    #[error("Amount must be between {MIN_STR} and {MAX_STR}")]
    OutOfRange,
    /// Negative values are not allowed.
    #[error("Negative value is not allowed")]
    Negative,
    /// The input has more decimal places than the token supports.
    #[error("Too big of a precision: {money} vs {token} on token")]
    WrongPrecision {
        /// Decimal places in the input.
        money: u32,
        /// Decimal places supported by the token.
        token: u32,
    },
}

impl MoneyAmount {
    /// Parses a human-readable currency string.
    ///
    /// Accepts an optional leading `$`, surrounding whitespace and `,`
    /// thousands separators in groups of three. Anything else, such as
    /// exponents, currency codes or decimal commas, is rejected.
    ///
    /// # Errors
    ///
    /// Returns [`MoneyAmountParseError`] if the string is not a number, is
    /// negative, or falls outside the supported range.
    pub fn parse(input: &str) -> Result<Self, MoneyAmountParseError> {
        let captures = MONEY
            .captures(input)
            .ok_or(MoneyAmountParseError::InvalidFormat)?;
        let sign = captures.name("sign").map_or("", |m| m.as_str());
        let number = captures
            .name("number")
            .map_or_else(String::new, |m| m.as_str().replace(',', ""));
        let cleaned = format!("{sign}{number}");
        let parsed =
            Decimal::from_str(&cleaned).map_err(|_| MoneyAmountParseError::InvalidFormat)?;

        if parsed.is_sign_negative() {
            return Err(MoneyAmountParseError::Negative);
        }
        if parsed < *MIN || parsed > *MAX {
            return Err(MoneyAmountParseError::OutOfRange);
        }
        Ok(Self(parsed.normalize()))
    }

    /// Number of significant decimal places.
    #[must_use]
    pub const fn scale(&self) -> u32 {
        self.0.scale()
    }

    /// Converts the amount into integer base units of a token with
    /// `decimals` decimal places.
    ///
    /// # Errors
    ///
    /// Returns [`MoneyAmountParseError::WrongPrecision`] if the amount has
    /// more decimal places than the token, and
    /// [`MoneyAmountParseError::OutOfRange`] on overflow.
    pub fn to_base_units(&self, decimals: u32) -> Result<String, MoneyAmountParseError> {
        let scale = self.scale();
        if scale > decimals {
            return Err(MoneyAmountParseError::WrongPrecision {
                money: scale,
                token: decimals,
            });
        }
        let mantissa = self.0.mantissa().unsigned_abs();
        let factor = 10u128
            .checked_pow(decimals - scale)
            .ok_or(MoneyAmountParseError::OutOfRange)?;
        let units = mantissa
            .checked_mul(factor)
            .ok_or(MoneyAmountParseError::OutOfRange)?;
        Ok(units.to_string())
    }
}

impl FromStr for MoneyAmount {
    type Err = MoneyAmountParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for MoneyAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Returns `true` if `amount` is a non-empty string of ASCII digits.
#[must_use]
pub fn is_base_unit_amount(amount: &str) -> bool {
    !amount.is_empty() && amount.bytes().all(|b| b.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_converts_dollar_prices_exactly() {
        let amount = MoneyAmount::parse("$0.10").unwrap();
        assert_eq!(amount.to_base_units(6).unwrap(), "100000");
        assert_eq!(
            MoneyAmount::parse("1,000.5").unwrap().to_base_units(6).unwrap(),
            "1000500000"
        );
        assert_eq!(MoneyAmount::parse("2").unwrap().to_base_units(0).unwrap(), "2");
    }

    #[test]
    fn test_trailing_zeros_do_not_count_as_precision() {
        let amount = MoneyAmount::parse("0.1000000").unwrap();
        assert_eq!(amount.to_base_units(6).unwrap(), "100000");
    }

    #[test]
    fn test_rejects_excess_precision() {
        let amount = MoneyAmount::parse("0.0000001").unwrap();
        assert_eq!(
            amount.to_base_units(6),
            Err(MoneyAmountParseError::WrongPrecision { money: 7, token: 6 })
        );
    }

    #[test]
    fn test_rejects_bad_input() {
        assert_eq!(
            MoneyAmount::parse("abc"),
            Err(MoneyAmountParseError::InvalidFormat)
        );
        assert_eq!(
            MoneyAmount::parse("-1"),
            Err(MoneyAmountParseError::Negative)
        );
        assert_eq!(
            MoneyAmount::parse("0"),
            Err(MoneyAmountParseError::OutOfRange)
        );
    }

    #[test]
    fn test_rejects_numbers_that_would_be_misread() {
        for input in ["$1e5", "1,5", "10 USD", "1.000,50", "USD 10", "$1.2.3"] {
            assert_eq!(
                MoneyAmount::parse(input),
                Err(MoneyAmountParseError::InvalidFormat),
                "{input}"
            );
        }
    }

    #[test]
    fn test_accepts_symbol_whitespace_and_grouping() {
        let amount = MoneyAmount::parse("  $ 12,345.67 ").unwrap();
        assert_eq!(amount.to_base_units(6).unwrap(), "12345670000");
        assert_eq!(
            MoneyAmount::parse("-$1"),
            Err(MoneyAmountParseError::Negative)
        );
    }

    #[test]
    fn test_base_unit_amounts_are_digit_strings() {
        assert!(is_base_unit_amount("100000"));
        assert!(!is_base_unit_amount("0.1"));
        assert!(!is_base_unit_amount(""));
    }
}
