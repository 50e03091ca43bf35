//! Billing period — the calendar-month scope for invoice sequences.

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::foundation::ValidationError;

/// A calendar month (`YYYYMM`) used to namespace invoice sequences.
///
/// Counters for different periods are fully independent; transactions
/// against one period never block another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BillingPeriod {
    year: u16,
    month: u8,
}

impl BillingPeriod {
    /// Creates a period from year and month.
    pub fn new(year: u16, month: u8) -> Result<Self, ValidationError> {
        if !(1..=12).contains(&month) {
            return Err(ValidationError::out_of_range("month", 1, 12, month as i64));
        }
        if !(2000..=9999).contains(&year) {
            return Err(ValidationError::out_of_range(
                "year",
                2000,
                9999,
                year as i64,
            ));
        }
        Ok(Self { year, month })
    }

    /// The period containing the given instant (UTC calendar).
    pub fn containing(at: DateTime<Utc>) -> Self {
        // Years from chrono are always in the accepted range for dates the
        // engine will ever see.
        Self {
            year: at.year() as u16,
            month: at.month() as u8,
        }
    }

    pub fn year(&self) -> u16 {
        self.year
    }

    pub fn month(&self) -> u8 {
        self.month
    }

    /// Canonical 6-digit `YYYYMM` key, as persisted and as embedded in
    /// invoice numbers.
    pub fn key(&self) -> String {
        format!("{:04}{:02}", self.year, self.month)
    }
}

impl fmt::Display for BillingPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}{:02}", self.year, self.month)
    }
}

impl FromStr for BillingPeriod {
    type Err = ValidationError;

    /// Parses the canonical `YYYYMM` form. Exactly six ASCII digits.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != 6 || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ValidationError::invalid_format(
                "period",
                "expected exactly six digits (YYYYMM)",
            ));
        }
        let year: u16 = s[..4]
            .parse()
            .map_err(|_| ValidationError::invalid_format("period", "invalid year"))?;
        let month: u8 = s[4..]
            .parse()
            .map_err(|_| ValidationError::invalid_format("period", "invalid month"))?;
        Self::new(year, month)
    }
}

impl TryFrom<String> for BillingPeriod {
    type Error = ValidationError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<BillingPeriod> for String {
    fn from(p: BillingPeriod) -> Self {
        p.key()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn key_is_zero_padded() {
        let p = BillingPeriod::new(2025, 3).unwrap();
        assert_eq!(p.key(), "202503");
    }

    #[test]
    fn parse_roundtrip() {
        let p: BillingPeriod = "202511".parse().unwrap();
        assert_eq!(p.year(), 2025);
        assert_eq!(p.month(), 11);
        assert_eq!(p.key(), "202511");
    }

    #[test]
    fn rejects_invalid_months() {
        assert!("202500".parse::<BillingPeriod>().is_err());
        assert!("202513".parse::<BillingPeriod>().is_err());
    }

    #[test]
    fn rejects_malformed_keys() {
        assert!("2025-11".parse::<BillingPeriod>().is_err());
        assert!("20251".parse::<BillingPeriod>().is_err());
        assert!("2025111".parse::<BillingPeriod>().is_err());
        assert!("2o2511".parse::<BillingPeriod>().is_err());
    }

    #[test]
    fn containing_uses_utc_calendar() {
        let at = Utc.with_ymd_and_hms(2025, 11, 30, 23, 59, 59).unwrap();
        assert_eq!(BillingPeriod::containing(at).key(), "202511");
    }

    #[test]
    fn periods_order_chronologically() {
        let a: BillingPeriod = "202512".parse().unwrap();
        let b: BillingPeriod = "202601".parse().unwrap();
        assert!(a < b);
    }
}
