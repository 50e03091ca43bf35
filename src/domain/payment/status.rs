//! Canonical payment status and the provider-state mapping table.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The engine's own payment status vocabulary, decoupled from any single
/// gateway's terminology.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Succeeded,
    Canceled,
    Expired,
    Refunded,
}

impl PaymentStatus {
    /// Terminal statuses never transition further; a webhook event that
    /// matches a terminal status is a duplicate and is acknowledged without
    /// side effects.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, PaymentStatus::Pending)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Succeeded => "succeeded",
            PaymentStatus::Canceled => "canceled",
            PaymentStatus::Expired => "expired",
            PaymentStatus::Refunded => "refunded",
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Settlement state as reported by a gateway, after the adapter has
/// normalized its provider's raw vocabulary.
///
/// Adapters translate their wire-level strings into this enum with a fixed
/// `match`; callers then map it into [`PaymentStatus`] through
/// [`PaymentStatus::from_provider`] — the single lookup table in the engine.
/// Open-ended string comparison against provider state is not allowed
/// anywhere else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderChargeState {
    /// Charge created, payer has not acted yet.
    Created,
    /// Payer picked an instrument but settlement has not finished.
    MethodChosen,
    /// Funds authorized but not captured.
    Authorized,
    Paid,
    Canceled,
    /// The charge window elapsed without payment.
    TimedOut,
    Refunded,
    PartiallyRefunded,
}

impl PaymentStatus {
    /// The fixed provider-state → canonical-status lookup table.
    pub fn from_provider(state: ProviderChargeState) -> Self {
        match state {
            ProviderChargeState::Created
            | ProviderChargeState::MethodChosen
            | ProviderChargeState::Authorized => PaymentStatus::Pending,
            ProviderChargeState::Paid => PaymentStatus::Succeeded,
            ProviderChargeState::Canceled => PaymentStatus::Canceled,
            ProviderChargeState::TimedOut => PaymentStatus::Expired,
            ProviderChargeState::Refunded | ProviderChargeState::PartiallyRefunded => {
                PaymentStatus::Refunded
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_is_the_only_non_terminal_status() {
        assert!(!PaymentStatus::Pending.is_terminal());
        for s in [
            PaymentStatus::Succeeded,
            PaymentStatus::Canceled,
            PaymentStatus::Expired,
            PaymentStatus::Refunded,
        ] {
            assert!(s.is_terminal(), "{} should be terminal", s);
        }
    }

    #[test]
    fn provider_mapping_is_total_and_fixed() {
        use ProviderChargeState::*;
        let table = [
            (Created, PaymentStatus::Pending),
            (MethodChosen, PaymentStatus::Pending),
            (Authorized, PaymentStatus::Pending),
            (Paid, PaymentStatus::Succeeded),
            (Canceled, PaymentStatus::Canceled),
            (TimedOut, PaymentStatus::Expired),
            (Refunded, PaymentStatus::Refunded),
            (PartiallyRefunded, PaymentStatus::Refunded),
        ];
        for (provider, canonical) in table {
            assert_eq!(PaymentStatus::from_provider(provider), canonical);
        }
    }
}
