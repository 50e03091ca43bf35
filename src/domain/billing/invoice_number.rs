//! Invoice numbers and the derived payment-reference code.
//!
//! Format: `YYYYMM-SSS` — the billing period, a dash, and the 3-digit
//! zero-padded sequence within that period. The reference code used for
//! bank-style reconciliation is the same number with the dash removed
//! (`YYYYMMSSS`, nine digits). Both derivations are pure: the same number
//! always yields the same code, and a formatted number parses back to the
//! exact (period, sequence) pair.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::BillingPeriod;
use crate::domain::foundation::ValidationError;

/// Highest sequence representable in the 3-digit suffix.
pub const MAX_SEQUENCE: u32 = 999;

/// A gap-free, period-scoped invoice number.
///
/// Uniquely determines its (period, sequence) pair and is never reused,
/// not even after administrative counter resets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct InvoiceNumber {
    period: BillingPeriod,
    sequence: u32,
}

impl InvoiceNumber {
    /// Creates an invoice number from its parts.
    ///
    /// Sequences start at 1; 0 is never issued.
    pub fn new(period: BillingPeriod, sequence: u32) -> Result<Self, ValidationError> {
        if sequence == 0 || sequence > MAX_SEQUENCE {
            return Err(ValidationError::out_of_range(
                "sequence",
                1,
                MAX_SEQUENCE as i64,
                sequence as i64,
            ));
        }
        Ok(Self { period, sequence })
    }

    pub fn period(&self) -> BillingPeriod {
        self.period
    }

    pub fn sequence(&self) -> u32 {
        self.sequence
    }

    /// The payment-reference code: the number with the separator removed.
    ///
    /// Always nine ASCII digits.
    pub fn reference_code(&self) -> String {
        format!("{}{:03}", self.period.key(), self.sequence)
    }
}

impl fmt::Display for InvoiceNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{:03}", self.period.key(), self.sequence)
    }
}

impl FromStr for InvoiceNumber {
    type Err = ValidationError;

    /// Parses the canonical `YYYYMM-SSS` form (`^\d{6}-\d{3}$`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (period_part, seq_part) = s.split_once('-').ok_or_else(|| {
            ValidationError::invalid_format("invoice_number", "missing '-' separator")
        })?;
        if seq_part.len() != 3 || !seq_part.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ValidationError::invalid_format(
                "invoice_number",
                "sequence must be exactly three digits",
            ));
        }
        let period: BillingPeriod = period_part.parse()?;
        let sequence: u32 = seq_part
            .parse()
            .map_err(|_| ValidationError::invalid_format("invoice_number", "invalid sequence"))?;
        Self::new(period, sequence)
    }
}

impl TryFrom<String> for InvoiceNumber {
    type Error = ValidationError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<InvoiceNumber> for String {
    fn from(n: InvoiceNumber) -> Self {
        n.to_string()
    }
}
