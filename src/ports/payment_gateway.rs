//! Payment gateway port.
//!
//! One capability set over every external provider. Callers choose an
//! adapter once, at payment-creation time, through [`GatewayRouter`]; no
//! downstream code inspects which provider is in use.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

use crate::domain::foundation::{BillingError, ChargeId, Money, UserId};
use crate::domain::payment::{GatewayKind, PlanId, ProviderChargeState};

/// Errors from gateway operations.
#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    /// Network failure, timeout, or provider 5xx. Retryable.
    #[error("gateway unavailable: {0}")]
    Unavailable(String),

    /// The provider reports the referenced resource does not exist.
    /// Terminal for status checks; cancel/refund paths treat it as
    /// already-resolved.
    #[error("gateway resource missing: {0}")]
    ResourceMissing(String),

    /// The provider rejected the request (4xx other than not-found).
    #[error("gateway rejected request: {0}")]
    Rejected(String),
}

impl GatewayError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, GatewayError::Unavailable(_))
    }
}

impl From<GatewayError> for BillingError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::Unavailable(msg) => BillingError::GatewayUnavailable(msg),
            GatewayError::ResourceMissing(msg) => BillingError::GatewayResourceMissing(msg),
            GatewayError::Rejected(msg) => BillingError::GatewayRejected(msg),
        }
    }
}

/// Request to initiate a charge.
#[derive(Debug, Clone)]
pub struct CreateChargeRequest {
    pub user_id: UserId,
    pub user_email: String,
    pub plan: PlanId,
    /// Where the payer lands after completing payment.
    pub success_url: String,
    /// Where the payer lands after abandoning payment.
    pub cancel_url: String,
}

/// A charge freshly created at the gateway. Settlement is asynchronous;
/// the state always starts pre-paid (`Created` or equivalent).
#[derive(Debug, Clone)]
pub struct CreatedCharge {
    pub charge_id: ChargeId,
    /// Where to send the payer to complete the charge.
    pub redirect_url: String,
    pub state: ProviderChargeState,
}

/// Capability set every payment provider integration must offer.
///
/// Implementations are stateless per call and must not persist anything;
/// idempotency derives from the gateway's own charge id.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Which provider this adapter fronts.
    fn kind(&self) -> GatewayKind;

    /// Initiates a charge, recurring-capable when the plan recurs.
    ///
    /// Never retried automatically: a timed-out create may still settle
    /// later and arrive through the webhook path.
    async fn create_charge(&self, req: CreateChargeRequest) -> Result<CreatedCharge, GatewayError>;

    /// Polls current settlement state.
    async fn charge_status(&self, charge_id: &ChargeId)
        -> Result<ProviderChargeState, GatewayError>;

    /// Refunds a charge, partially when an amount is given.
    ///
    /// Safe to retry: implementations report already-refunded as success.
    async fn refund_charge(
        &self,
        charge_id: &ChargeId,
        amount: Option<Money>,
    ) -> Result<(), GatewayError>;

    /// Stops future automatic charges on a recurring chain.
    ///
    /// Implementations report an already-inactive recurrence as success.
    async fn cancel_recurrence(&self, parent_charge_id: &ChargeId) -> Result<(), GatewayError>;
}

/// Routes ledger operations to the adapter that owns a charge.
///
/// Built once at process start from configuration; the default kind is the
/// provider new checkouts go to.
#[derive(Clone)]
pub struct GatewayRouter {
    gateways: HashMap<GatewayKind, Arc<dyn PaymentGateway>>,
    default_kind: GatewayKind,
}

impl GatewayRouter {
    pub fn new(gateways: Vec<Arc<dyn PaymentGateway>>, default_kind: GatewayKind) -> Self {
        let gateways = gateways.into_iter().map(|g| (g.kind(), g)).collect();
        Self {
            gateways,
            default_kind,
        }
    }

    /// The gateway new checkouts are created on.
    pub fn default_gateway(&self) -> Result<&Arc<dyn PaymentGateway>, BillingError> {
        self.for_kind(self.default_kind)
    }

    /// The adapter owning charges of the given kind.
    pub fn for_kind(&self, kind: GatewayKind) -> Result<&Arc<dyn PaymentGateway>, BillingError> {
        self.gateways.get(&kind).ok_or_else(|| {
            BillingError::GatewayUnavailable(format!("no adapter registered for {}", kind))
        })
    }
}
