//! Error types for the billing domain.
//!
//! `ValidationError` covers malformed input at value-object construction.
//! `BillingError` is the engine-wide taxonomy: each variant maps to one
//! failure mode of the ledger, the sequence generator, the gateways, or the
//! webhook layer, and carries its own retry semantics.

use thiserror::Error;

/// Errors that occur during value object construction.
#[derive(Debug, Clone, Error)]
pub enum ValidationError {
    #[error("Field '{field}' cannot be empty")]
    EmptyField { field: String },

    #[error("Field '{field}' must be between {min} and {max}, got {actual}")]
    OutOfRange {
        field: String,
        min: i64,
        max: i64,
        actual: i64,
    },

    #[error("Field '{field}' has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

impl ValidationError {
    /// Creates an empty field validation error.
    pub fn empty_field(field: impl Into<String>) -> Self {
        ValidationError::EmptyField {
            field: field.into(),
        }
    }

    /// Creates an out of range validation error.
    pub fn out_of_range(field: impl Into<String>, min: i64, max: i64, actual: i64) -> Self {
        ValidationError::OutOfRange {
            field: field.into(),
            min,
            max,
            actual,
        }
    }

    /// Creates an invalid format validation error.
    pub fn invalid_format(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ValidationError::InvalidFormat {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Engine-wide error taxonomy.
///
/// Retry semantics per variant:
/// - `SequenceContention`, `GatewayUnavailable` — transient, caller may retry.
/// - `PaymentNotFound` — only surfaced after the webhook layer's bounded
///   lookup retries; terminal at that point.
/// - `GatewayResourceMissing` — terminal for status checks; cancel/refund
///   call sites treat it as already-resolved.
/// - `GatewayRejected` — terminal, the gateway refused the request outright.
/// - Everything else — terminal, no partial ledger mutation occurred.
#[derive(Debug, Clone, Error)]
pub enum BillingError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The invoice counter transaction could not commit within the retry
    /// budget. No invoice number was issued and no invoice was created.
    #[error("invoice sequence contention for period {period} after {attempts} attempts")]
    SequenceContention { period: String, attempts: u32 },

    /// Network-level or 5xx failure talking to a payment gateway.
    #[error("payment gateway unavailable: {0}")]
    GatewayUnavailable(String),

    /// The gateway understood the request and refused it (4xx). Retrying
    /// an identical request will be refused again.
    #[error("gateway rejected request: {0}")]
    GatewayRejected(String),

    /// The gateway reports the referenced charge/recurrence does not exist.
    #[error("gateway resource missing: {0}")]
    GatewayResourceMissing(String),

    /// Webhook payload failed signature verification. No side effect applied.
    #[error("webhook signature invalid: {0}")]
    SignatureInvalid(String),

    /// No Payment row exists for the given charge id, even after the
    /// ingestion layer's bounded lookup backoff.
    #[error("payment not found for charge {charge_id}")]
    PaymentNotFound { charge_id: String },

    #[error("subscription for user {user_id} is not active (status: {status})")]
    SubscriptionNotActive { user_id: String, status: String },

    /// Recurring reconciliation was requested for a plan with no interval.
    #[error("plan {0} has no recurring interval")]
    PlanNotRecurring(String),

    #[error("invalid state transition: {0}")]
    InvalidTransition(String),

    #[error("invoice counter not found for period {0}")]
    CounterNotFound(String),

    #[error("database error: {0}")]
    Database(String),
}

impl BillingError {
    /// Whether the caller may retry the whole operation.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            BillingError::SequenceContention { .. } | BillingError::GatewayUnavailable(_)
        )
    }

    /// Creates a database error from any displayable source.
    pub fn database(source: impl std::fmt::Display) -> Self {
        BillingError::Database(source.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_classification() {
        let contention = BillingError::SequenceContention {
            period: "202511".to_string(),
            attempts: 5,
        };
        assert!(contention.is_retryable());
        assert!(BillingError::GatewayUnavailable("timeout".into()).is_retryable());

        assert!(!BillingError::GatewayRejected("invalid amount".into()).is_retryable());
        assert!(!BillingError::SignatureInvalid("bad hmac".into()).is_retryable());
        assert!(!BillingError::PaymentNotFound {
            charge_id: "3211234567".into()
        }
        .is_retryable());
        assert!(!BillingError::PlanNotRecurring("premium_yearly".into()).is_retryable());
    }

    #[test]
    fn validation_error_converts() {
        let err: BillingError = ValidationError::empty_field("user_id").into();
        assert!(matches!(err, BillingError::Validation(_)));
    }
}
