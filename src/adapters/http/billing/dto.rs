//! HTTP DTOs (Data Transfer Objects) for billing endpoints.
//!
//! These types define the JSON request/response structure for the billing API.
//! They serve as the boundary between HTTP and the application layer.

use serde::{Deserialize, Serialize};

use crate::application::handlers::payment::SettlementOutcome;
use crate::application::handlers::subscription::CancelSubscriptionResult;
use crate::domain::billing::Invoice;
use crate::domain::payment::{Payment, PaymentStatus, PlanId};
use crate::domain::subscription::{Subscription, SubscriptionStatus};

// ════════════════════════════════════════════════════════════════════════════════
// Request DTOs
// ════════════════════════════════════════════════════════════════════════════════

/// Request to start a checkout on the default gateway.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateCheckoutRequest {
    /// Payer's email, forwarded to the gateway.
    pub email: String,
    /// The plan to purchase.
    pub plan: PlanId,
    /// URL to redirect after successful payment.
    pub success_url: String,
    /// URL to redirect after abandoned payment.
    pub cancel_url: String,
}

/// Request to verify a charge against the gateway.
#[derive(Debug, Clone, Deserialize)]
pub struct VerifyPaymentRequest {
    /// Gateway-assigned charge id.
    pub charge_id: String,
}

/// Request to refund a settled charge.
#[derive(Debug, Clone, Deserialize)]
pub struct RefundPaymentRequest {
    /// Gateway-assigned charge id.
    pub charge_id: String,
    /// Partial refund amount in minor units; full refund when absent.
    #[serde(default)]
    pub amount_minor: Option<i64>,
    /// Currency of the partial amount; defaults to the payment's currency.
    #[serde(default)]
    pub currency: Option<String>,
}

/// Request to force-set an invoice counter.
#[derive(Debug, Clone, Deserialize)]
pub struct SetCounterRequest {
    /// The value the counter is set to; the next issued number is one higher.
    pub last_number: u32,
}

/// Id-only query the redirect processor appends to its notification URL.
#[derive(Debug, Clone, Deserialize)]
pub struct RedirectNotificationQuery {
    /// The charge the notification refers to.
    pub id: String,
    /// Present on recurring-child notifications.
    #[serde(default)]
    pub parent_id: Option<String>,
}

// ════════════════════════════════════════════════════════════════════════════════
// Response DTOs
// ════════════════════════════════════════════════════════════════════════════════

/// A payment as exposed over the API.
#[derive(Debug, Clone, Serialize)]
pub struct PaymentResponse {
    pub charge_id: String,
    pub user_id: String,
    pub plan: PlanId,
    pub status: PaymentStatus,
    pub gateway: String,
    pub amount_minor: i64,
    pub currency: String,
    pub has_recurrence: bool,
    pub parent_charge_id: Option<String>,
    /// ISO 8601.
    pub created_at: String,
    /// ISO 8601, set on first settlement.
    pub paid_at: Option<String>,
}

impl From<&Payment> for PaymentResponse {
    fn from(payment: &Payment) -> Self {
        Self {
            charge_id: payment.charge_id.to_string(),
            user_id: payment.user_id.to_string(),
            plan: payment.plan,
            status: payment.status,
            gateway: payment.gateway.as_str().to_string(),
            amount_minor: payment.amount.minor,
            currency: payment.amount.currency.to_string(),
            has_recurrence: payment.has_recurrence,
            parent_charge_id: payment.parent_charge_id.as_ref().map(|id| id.to_string()),
            created_at: payment.created_at.to_rfc3339(),
            paid_at: payment.paid_at.map(|at| at.to_rfc3339()),
        }
    }
}

/// Response for a started checkout.
#[derive(Debug, Clone, Serialize)]
pub struct CheckoutResponse {
    pub payment: PaymentResponse,
    /// Where to send the payer to complete the charge.
    pub redirect_url: String,
}

/// An issued invoice as exposed over the API.
#[derive(Debug, Clone, Serialize)]
pub struct InvoiceResponse {
    /// Human-readable `YYYYMM-SSS` number.
    pub number: String,
    /// Digits-only variant used as a bank reference.
    pub reference_code: String,
    pub status: String,
    pub total_minor: i64,
    pub currency: String,
    /// ISO 8601.
    pub issue_date: String,
    /// ISO 8601.
    pub due_date: String,
}

impl From<&Invoice> for InvoiceResponse {
    fn from(invoice: &Invoice) -> Self {
        Self {
            number: invoice.number.to_string(),
            reference_code: invoice.reference_code.clone(),
            status: invoice.status.as_str().to_string(),
            total_minor: invoice.total.minor,
            currency: invoice.currency.to_string(),
            issue_date: invoice.issue_date.to_rfc3339(),
            due_date: invoice.due_date.to_rfc3339(),
        }
    }
}

/// Result of settling a charge (via verify or webhook replay).
#[derive(Debug, Clone, Serialize)]
pub struct SettlementResponse {
    pub payment: PaymentResponse,
    /// True when this call was the first to see the charge succeed.
    pub newly_succeeded: bool,
    /// Issued only on first success.
    pub invoice: Option<InvoiceResponse>,
}

impl From<&SettlementOutcome> for SettlementResponse {
    fn from(outcome: &SettlementOutcome) -> Self {
        Self {
            payment: PaymentResponse::from(&outcome.payment),
            newly_succeeded: outcome.newly_succeeded,
            invoice: outcome.invoice.as_ref().map(InvoiceResponse::from),
        }
    }
}

/// Result of a refund request.
#[derive(Debug, Clone, Serialize)]
pub struct RefundResponse {
    /// Absent when the charge was never in the ledger.
    pub payment: Option<PaymentResponse>,
    /// False when the ledger already held the refund and nothing moved.
    pub changed: bool,
}

/// A subscription as exposed over the API.
#[derive(Debug, Clone, Serialize)]
pub struct SubscriptionResponse {
    pub user_id: String,
    pub plan: PlanId,
    pub status: SubscriptionStatus,
    /// ISO 8601.
    pub current_period_start: String,
    /// ISO 8601.
    pub current_period_end: String,
    pub cancel_at_period_end: bool,
    /// ISO 8601, set when a cancellation was requested.
    pub canceled_at: Option<String>,
}

impl From<&Subscription> for SubscriptionResponse {
    fn from(subscription: &Subscription) -> Self {
        Self {
            user_id: subscription.user_id.to_string(),
            plan: subscription.plan,
            status: subscription.status,
            current_period_start: subscription.current_period_start.to_rfc3339(),
            current_period_end: subscription.current_period_end.to_rfc3339(),
            cancel_at_period_end: subscription.cancel_at_period_end,
            canceled_at: subscription.canceled_at.map(|at| at.to_rfc3339()),
        }
    }
}

/// Result of a cancellation request.
#[derive(Debug, Clone, Serialize)]
pub struct CancelResponse {
    pub subscription: SubscriptionResponse,
    /// True when this call found a cancellation already pending.
    pub already_pending: bool,
    /// Whether the gateway confirmed the recurring chain is stopped.
    pub recurrence_stopped: bool,
    /// ISO 8601; when access ends.
    pub effective_at: String,
}

impl From<&CancelSubscriptionResult> for CancelResponse {
    fn from(result: &CancelSubscriptionResult) -> Self {
        Self {
            subscription: SubscriptionResponse::from(&result.subscription),
            already_pending: result.already_pending,
            recurrence_stopped: result.recurrence_stopped,
            effective_at: result.effective_at.to_rfc3339(),
        }
    }
}

/// State of one period's invoice counter.
#[derive(Debug, Clone, Serialize)]
pub struct CounterResponse {
    /// `YYYYMM` period key.
    pub period: String,
    /// Last issued number, or null when no invoice exists for the period.
    pub last_number: Option<u32>,
}

/// Acknowledgement returned to webhook deliveries.
#[derive(Debug, Clone, Serialize)]
pub struct WebhookAckResponse {
    /// "processed", "already_processed" or "ignored".
    pub outcome: &'static str,
}

/// Standard error response body.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    /// Machine-readable error code.
    pub error: String,
    /// Human-readable message.
    pub message: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
        }
    }
}
