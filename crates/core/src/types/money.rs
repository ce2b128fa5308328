//! Monetary amounts with currency information.
//!
//! All order math runs on [`rust_decimal::Decimal`] to avoid float drift.
//! Payment gateways bill in minor units (paise, cents), so [`Money`] carries
//! the conversions both ways.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Errors that can occur when converting a [`Money`] amount.
#[derive(thiserror::Error, Debug, Clone)]
pub enum MoneyError {
    /// The amount does not fit into the gateway's minor-unit integer range.
    #[error("amount {amount} is outside the representable minor-unit range")]
    OutOfRange {
        /// The offending amount.
        amount: Decimal,
    },
}

/// A monetary amount in a specific currency.
///
/// Amounts are kept in the currency's major unit (rupees, dollars) with
/// decimal precision. Use [`Money::to_minor_units`] at the gateway boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money {
    /// Amount in the currency's major unit.
    pub amount: Decimal,
    /// ISO 4217 currency code.
    pub currency: CurrencyCode,
}

impl Money {
    /// Create a new amount.
    #[must_use]
    pub const fn new(amount: Decimal, currency: CurrencyCode) -> Self {
        Self { amount, currency }
    }

    /// Create an amount from minor units (paise for INR, cents for USD).
    #[must_use]
    pub fn from_minor_units(minor: i64, currency: CurrencyCode) -> Self {
        Self {
            amount: Decimal::new(minor, 2),
            currency,
        }
    }

    /// Convert to minor units, rounding half-up to two decimal places first.
    ///
    /// # Errors
    ///
    /// Returns [`MoneyError::OutOfRange`] if the scaled amount does not fit
    /// in an `i64`.
    pub fn to_minor_units(&self) -> Result<i64, MoneyError> {
        self.rounded()
            .amount
            .checked_mul(Decimal::ONE_HUNDRED)
            .and_then(|scaled| scaled.to_i64())
            .ok_or(MoneyError::OutOfRange {
                amount: self.amount,
            })
    }

    /// Round to two decimal places, half-up.
    ///
    /// This is the rounding applied to every customer-visible total.
    #[must_use]
    pub fn rounded(self) -> Self {
        Self {
            amount: self
                .amount
                .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero),
            currency: self.currency,
        }
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{:.2}", self.currency.symbol(), self.rounded().amount)
    }
}

/// ISO 4217 currency codes accepted at checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum CurrencyCode {
    /// Indian rupee, the store's home currency.
    #[default]
    Inr,
    /// US dollar, used by the Stripe checkout path.
    Usd,
}

impl CurrencyCode {
    /// The ISO 4217 code, as the gateways expect it.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::Inr => "INR",
            Self::Usd => "USD",
        }
    }

    /// Display symbol.
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::Inr => "\u{20b9}",
            Self::Usd => "$",
        }
    }
}

impl std::fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

impl std::str::FromStr for CurrencyCode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "INR" => Ok(Self::Inr),
            "USD" => Ok(Self::Usd),
            _ => Err(format!("unsupported currency: {s}")),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_from_minor_units() {
        let money = Money::from_minor_units(129_900, CurrencyCode::Inr);
        assert_eq!(money.amount, Decimal::new(1299, 0));
    }

    #[test]
    fn test_to_minor_units() {
        let money = Money::new(Decimal::new(1299, 0), CurrencyCode::Inr);
        assert_eq!(money.to_minor_units().unwrap(), 129_900);
    }

    #[test]
    fn test_to_minor_units_rounds_half_up() {
        // 10.005 rounds up to 10.01 before scaling
        let money = Money::new(Decimal::new(10_005, 3), CurrencyCode::Inr);
        assert_eq!(money.to_minor_units().unwrap(), 1001);
    }

    #[test]
    fn test_to_minor_units_out_of_range() {
        let money = Money::new(Decimal::MAX, CurrencyCode::Usd);
        assert!(matches!(
            money.to_minor_units(),
            Err(MoneyError::OutOfRange { .. })
        ));
    }

    #[test]
    fn test_rounded_half_up() {
        let money = Money::new(Decimal::new(99_995, 3), CurrencyCode::Inr).rounded();
        assert_eq!(money.amount, Decimal::new(10_000, 2));
    }

    #[test]
    fn test_display() {
        let money = Money::new(Decimal::new(49_950, 2), CurrencyCode::Inr);
        assert_eq!(money.to_string(), "\u{20b9}499.50");
    }

    #[test]
    fn test_currency_code_parse() {
        assert_eq!("inr".parse::<CurrencyCode>().unwrap(), CurrencyCode::Inr);
        assert_eq!("USD".parse::<CurrencyCode>().unwrap(), CurrencyCode::Usd);
        assert!("EUR".parse::<CurrencyCode>().is_err());
    }

    #[test]
    fn test_currency_serde_uppercase() {
        assert_eq!(
            serde_json::to_string(&CurrencyCode::Inr).unwrap(),
            "\"INR\""
        );
    }
}
