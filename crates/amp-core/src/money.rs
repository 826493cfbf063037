//! # Money — Exact Decimal Amounts
//!
//! Defines `Amount` and `CurrencyCode` for every monetary value in the
//! mandate chain. Arithmetic happens in integer minor units; the wire and
//! canonical form is the exact decimal string. Floats never appear — the
//! canonicalization pipeline rejects them outright.
//!
//! ## Reconciliation Policy
//!
//! Cart totals must reconcile exactly: `sum(line totals) == subtotal` and
//! `subtotal + tax + shipping == total`, compared in minor units with zero
//! tolerance. Mismatches are rejected, never rounded.
//!
//! ## Currency Exponents
//!
//! The fractional precision of an amount is fixed by its ISO-4217 currency:
//! zero-decimal currencies (JPY, KRW, ...), three-decimal currencies
//! (KWD, BHD, ...), and the two-decimal default. `"49.5"` is a valid USD
//! amount but `"49.5"` JPY is a precision error, not something to round.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error in money parsing or arithmetic.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MoneyError {
    /// Currency code is not three ASCII uppercase letters.
    #[error("invalid ISO-4217 currency code: {0:?}")]
    InvalidCurrency(String),

    /// Value string is not a plain decimal number.
    #[error("invalid decimal amount: {0:?}")]
    InvalidDecimal(String),

    /// Negative amounts are not permitted anywhere in a mandate.
    #[error("negative amount not permitted: {0:?}")]
    Negative(String),

    /// More fractional digits than the currency allows.
    #[error("amount {value:?} exceeds {currency} precision of {exponent} decimal places")]
    PrecisionExceeded {
        /// The offending value string.
        value: String,
        /// The currency whose precision was exceeded.
        currency: String,
        /// Allowed fractional digits.
        exponent: u32,
    },

    /// Arithmetic across two different currencies.
    #[error("currency mismatch: {left} vs {right}")]
    CurrencyMismatch {
        /// Left operand currency.
        left: String,
        /// Right operand currency.
        right: String,
    },

    /// Minor-unit arithmetic overflowed.
    #[error("amount arithmetic overflow")]
    Overflow,
}

/// A validated ISO-4217 currency code (three ASCII uppercase letters).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CurrencyCode(String);

impl CurrencyCode {
    /// Validate and construct a currency code. Lowercase input is accepted
    /// and normalized to uppercase.
    pub fn new(code: &str) -> Result<Self, MoneyError> {
        let code = code.trim().to_ascii_uppercase();
        if code.len() != 3 || !code.bytes().all(|b| b.is_ascii_uppercase()) {
            return Err(MoneyError::InvalidCurrency(code));
        }
        Ok(Self(code))
    }

    /// The code as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Fractional digits carried by this currency.
    ///
    /// Zero-decimal and three-decimal currencies per ISO 4217; everything
    /// else defaults to two.
    pub fn exponent(&self) -> u32 {
        match self.0.as_str() {
            "BIF" | "CLP" | "DJF" | "GNF" | "ISK" | "JPY" | "KMF" | "KRW" | "PYG" | "RWF"
            | "UGX" | "VND" | "VUV" | "XAF" | "XOF" | "XPF" => 0,
            "BHD" | "IQD" | "JOD" | "KWD" | "LYD" | "OMR" | "TND" => 3,
            _ => 2,
        }
    }
}

impl TryFrom<String> for CurrencyCode {
    type Error = MoneyError;
    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(&s)
    }
}

impl From<CurrencyCode> for String {
    fn from(c: CurrencyCode) -> Self {
        c.0
    }
}

impl std::fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// An exact, non-negative monetary amount.
///
/// Stored internally as integer minor units; serialized as
/// `{"value": "<decimal string>", "currency": "<code>"}` with the value
/// rendered at exactly the currency's precision, so equal amounts always
/// canonicalize to equal bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "AmountWire", into = "AmountWire")]
pub struct Amount {
    minor: i128,
    currency: CurrencyCode,
}

/// Wire representation of [`Amount`].
#[derive(Debug, Clone, Serialize, Deserialize)]
struct AmountWire {
    value: String,
    currency: CurrencyCode,
}

impl TryFrom<AmountWire> for Amount {
    type Error = MoneyError;
    fn try_from(w: AmountWire) -> Result<Self, Self::Error> {
        Amount::new(&w.value, w.currency)
    }
}

impl From<Amount> for AmountWire {
    fn from(a: Amount) -> Self {
        AmountWire {
            value: a.value(),
            currency: a.currency,
        }
    }
}

impl Amount {
    /// Parse a decimal string at the currency's precision.
    ///
    /// Accepts plain decimals (`"4950"`, `"49.50"`, `"49.5"` for USD).
    /// Rejects signs, exponents, thousands separators, empty parts, excess
    /// fractional digits, and negatives.
    pub fn new(value: &str, currency: CurrencyCode) -> Result<Self, MoneyError> {
        let exponent = currency.exponent();
        let minor = parse_minor_units(value, exponent, currency.as_str())?;
        Ok(Self { minor, currency })
    }

    /// Construct from integer minor units (must be non-negative).
    pub fn from_minor_units(minor: i128, currency: CurrencyCode) -> Result<Self, MoneyError> {
        if minor < 0 {
            return Err(MoneyError::Negative(minor.to_string()));
        }
        Ok(Self { minor, currency })
    }

    /// A zero amount in the given currency.
    pub fn zero(currency: CurrencyCode) -> Self {
        Self { minor: 0, currency }
    }

    /// The amount in integer minor units.
    pub fn minor_units(&self) -> i128 {
        self.minor
    }

    /// The currency of this amount.
    pub fn currency(&self) -> &CurrencyCode {
        &self.currency
    }

    /// Render the canonical decimal string at the currency's precision.
    pub fn value(&self) -> String {
        let exponent = self.currency.exponent();
        if exponent == 0 {
            return self.minor.to_string();
        }
        let scale = 10i128.pow(exponent);
        let int_part = self.minor / scale;
        let frac_part = self.minor % scale;
        format!(
            "{int_part}.{frac_part:0width$}",
            width = exponent as usize
        )
    }

    /// Checked addition; both operands must share a currency.
    pub fn checked_add(&self, other: &Amount) -> Result<Amount, MoneyError> {
        self.require_same_currency(other)?;
        let minor = self.minor.checked_add(other.minor).ok_or(MoneyError::Overflow)?;
        Ok(Amount {
            minor,
            currency: self.currency.clone(),
        })
    }

    /// Checked multiplication by a unit quantity.
    pub fn checked_mul(&self, quantity: u32) -> Result<Amount, MoneyError> {
        let minor = self
            .minor
            .checked_mul(i128::from(quantity))
            .ok_or(MoneyError::Overflow)?;
        Ok(Amount {
            minor,
            currency: self.currency.clone(),
        })
    }

    /// Whether this amount strictly exceeds `other` (same currency required).
    pub fn exceeds(&self, other: &Amount) -> Result<bool, MoneyError> {
        self.require_same_currency(other)?;
        Ok(self.minor > other.minor)
    }

    fn require_same_currency(&self, other: &Amount) -> Result<(), MoneyError> {
        if self.currency != other.currency {
            return Err(MoneyError::CurrencyMismatch {
                left: self.currency.to_string(),
                right: other.currency.to_string(),
            });
        }
        Ok(())
    }
}

impl std::fmt::Display for Amount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.value(), self.currency)
    }
}

/// Parse a plain decimal string into minor units at the given exponent.
fn parse_minor_units(value: &str, exponent: u32, currency: &str) -> Result<i128, MoneyError> {
    let value = value.trim();
    if value.starts_with('-') {
        return Err(MoneyError::Negative(value.to_string()));
    }
    let (int_part, frac_part) = match value.split_once('.') {
        Some((i, f)) => (i, f),
        None => (value, ""),
    };
    if int_part.is_empty()
        || !int_part.bytes().all(|b| b.is_ascii_digit())
        || !frac_part.bytes().all(|b| b.is_ascii_digit())
        || (value.contains('.') && frac_part.is_empty())
    {
        return Err(MoneyError::InvalidDecimal(value.to_string()));
    }
    if frac_part.len() as u32 > exponent {
        // Trailing zeros beyond the exponent are still rejected: the
        // canonical form has exactly `exponent` fractional digits.
        return Err(MoneyError::PrecisionExceeded {
            value: value.to_string(),
            currency: currency.to_string(),
            exponent,
        });
    }
    let int: i128 = int_part
        .parse()
        .map_err(|_| MoneyError::InvalidDecimal(value.to_string()))?;
    let mut frac: i128 = 0;
    if !frac_part.is_empty() {
        frac = frac_part
            .parse()
            .map_err(|_| MoneyError::InvalidDecimal(value.to_string()))?;
        // Scale "5" in "49.5" USD up to 50 minor units.
        frac = frac
            .checked_mul(10i128.pow(exponent - frac_part.len() as u32))
            .ok_or(MoneyError::Overflow)?;
    }
    int.checked_mul(10i128.pow(exponent))
        .and_then(|scaled| scaled.checked_add(frac))
        .ok_or(MoneyError::Overflow)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jpy() -> CurrencyCode {
        CurrencyCode::new("JPY").unwrap()
    }

    fn usd() -> CurrencyCode {
        CurrencyCode::new("USD").unwrap()
    }

    #[test]
    fn currency_validation() {
        assert_eq!(CurrencyCode::new("usd").unwrap().as_str(), "USD");
        assert!(CurrencyCode::new("US").is_err());
        assert!(CurrencyCode::new("USDT").is_err());
        assert!(CurrencyCode::new("U5D").is_err());
    }

    #[test]
    fn exponents() {
        assert_eq!(jpy().exponent(), 0);
        assert_eq!(usd().exponent(), 2);
        assert_eq!(CurrencyCode::new("KWD").unwrap().exponent(), 3);
    }

    #[test]
    fn zero_decimal_currency() {
        let a = Amount::new("4950", jpy()).unwrap();
        assert_eq!(a.minor_units(), 4950);
        assert_eq!(a.value(), "4950");
    }

    #[test]
    fn two_decimal_currency() {
        let a = Amount::new("49.50", usd()).unwrap();
        assert_eq!(a.minor_units(), 4950);
        assert_eq!(a.value(), "49.50");
    }

    #[test]
    fn short_fraction_scales_up() {
        let a = Amount::new("49.5", usd()).unwrap();
        assert_eq!(a.minor_units(), 4950);
        assert_eq!(a.value(), "49.50");
    }

    #[test]
    fn integer_usd_renders_two_places() {
        let a = Amount::new("100", usd()).unwrap();
        assert_eq!(a.value(), "100.00");
    }

    #[test]
    fn fractional_jpy_rejected() {
        assert!(matches!(
            Amount::new("49.5", jpy()),
            Err(MoneyError::PrecisionExceeded { .. })
        ));
    }

    #[test]
    fn excess_precision_rejected_even_trailing_zeros() {
        assert!(matches!(
            Amount::new("49.500", usd()),
            Err(MoneyError::PrecisionExceeded { .. })
        ));
    }

    #[test]
    fn negatives_rejected() {
        assert!(matches!(Amount::new("-1", jpy()), Err(MoneyError::Negative(_))));
        assert!(Amount::from_minor_units(-1, jpy()).is_err());
    }

    #[test]
    fn garbage_rejected() {
        for bad in ["", ".", "1.", ".5", "1,000", "1e3", "+5", "4 950", "NaN"] {
            assert!(Amount::new(bad, jpy()).is_err(), "accepted {bad:?}");
        }
    }

    #[test]
    fn addition_and_multiplication() {
        let unit = Amount::new("2250", jpy()).unwrap();
        let two = unit.checked_mul(2).unwrap();
        assert_eq!(two.minor_units(), 4500);
        let total = two.checked_add(&Amount::new("450", jpy()).unwrap()).unwrap();
        assert_eq!(total.value(), "4950");
    }

    #[test]
    fn cross_currency_arithmetic_rejected() {
        let a = Amount::new("100", jpy()).unwrap();
        let b = Amount::new("1.00", usd()).unwrap();
        assert!(matches!(
            a.checked_add(&b),
            Err(MoneyError::CurrencyMismatch { .. })
        ));
        assert!(a.exceeds(&b).is_err());
    }

    #[test]
    fn exceeds() {
        let limit = Amount::new("5000", jpy()).unwrap();
        let under = Amount::new("4950", jpy()).unwrap();
        let over = Amount::new("6000", jpy()).unwrap();
        assert!(!under.exceeds(&limit).unwrap());
        assert!(over.exceeds(&limit).unwrap());
        assert!(!limit.exceeds(&limit).unwrap());
    }

    #[test]
    fn serde_wire_form() {
        let a = Amount::new("49.5", usd()).unwrap();
        let json = serde_json::to_value(&a).unwrap();
        assert_eq!(json, serde_json::json!({"value": "49.50", "currency": "USD"}));
        let parsed: Amount = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, a);
    }

    #[test]
    fn serde_rejects_bad_amounts() {
        let bad = serde_json::json!({"value": "49.505", "currency": "USD"});
        assert!(serde_json::from_value::<Amount>(bad).is_err());
        let neg = serde_json::json!({"value": "-1", "currency": "USD"});
        assert!(serde_json::from_value::<Amount>(neg).is_err());
    }
}
