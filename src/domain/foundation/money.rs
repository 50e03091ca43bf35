//! Money value object in integer minor units.
//!
//! All amounts in the ledger are stored in minor units (haléře/cents) to
//! avoid floating point drift. No currency conversion happens anywhere in
//! the engine.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::ValidationError;

/// Supported settlement currencies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    Czk,
    Eur,
}

impl Currency {
    /// ISO 4217 code.
    pub fn as_str(&self) -> &'static str {
        match self {
            Currency::Czk => "CZK",
            Currency::Eur => "EUR",
        }
    }

    /// Parses an ISO 4217 code (case-insensitive).
    pub fn parse(s: &str) -> Result<Self, ValidationError> {
        match s.to_ascii_uppercase().as_str() {
            "CZK" => Ok(Currency::Czk),
            "EUR" => Ok(Currency::Eur),
            other => Err(ValidationError::invalid_format(
                "currency",
                format!("unsupported currency code: {}", other),
            )),
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An amount of money in minor units of a single currency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money {
    /// Amount in minor units (e.g. 29900 = 299.00 CZK).
    pub minor: i64,
    pub currency: Currency,
}

impl Money {
    /// Creates a new amount. Negative amounts are rejected; refund deltas
    /// are modeled as operations, not negative rows.
    pub fn new(minor: i64, currency: Currency) -> Result<Self, ValidationError> {
        if minor < 0 {
            return Err(ValidationError::out_of_range("amount", 0, i64::MAX, minor));
        }
        Ok(Self { minor, currency })
    }

    /// Convenience constructor for CZK minor units.
    pub const fn czk(minor: i64) -> Self {
        Self {
            minor,
            currency: Currency::Czk,
        }
    }

    /// Whether the amount is zero.
    pub fn is_zero(&self) -> bool {
        self.minor == 0
    }

    /// Major-unit representation for display (two decimal places).
    pub fn major(&self) -> f64 {
        self.minor as f64 / 100.0
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2} {}", self.major(), self.currency)
    }
}
