//! Webhook event model and signature verification.

mod event;
mod signature;

pub use event::{GatewayEvent, WebhookOutcome};
pub use signature::{SignatureHeader, WebhookSignatureVerifier};

#[cfg(test)]
pub use signature::compute_test_signature;

use thiserror::Error;

use crate::domain::foundation::BillingError;

/// Failures while authenticating or decoding a webhook delivery.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum WebhookError {
    #[error("invalid webhook signature")]
    InvalidSignature,

    #[error("webhook event timestamp too old")]
    TimestampOutOfRange,

    #[error("webhook event timestamp in the future")]
    InvalidTimestamp,

    #[error("webhook parse error: {0}")]
    ParseError(String),
}

impl From<WebhookError> for BillingError {
    fn from(err: WebhookError) -> Self {
        BillingError::SignatureInvalid(err.to_string())
    }
}
