//! HTTP handlers for billing endpoints.
//!
//! These handlers connect Axum routes to application layer command handlers.

use std::str::FromStr;
use std::sync::Arc;

use axum::extract::{Json, Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use chrono::Utc;

use crate::application::handlers::billing::{CounterAdminHandler, IssueInvoiceHandler};
use crate::application::handlers::payment::{
    CreatePaymentCommand, CreatePaymentHandler, IngestWebhookHandler, ReconcileRecurringHandler,
    RefundPaymentCommand, RefundPaymentHandler, SettleChargeHandler, VerifyPaymentCommand,
    VerifyPaymentHandler,
};
use crate::application::handlers::subscription::{
    CancelSubscriptionCommand, CancelSubscriptionHandler, ReactivateSubscriptionCommand,
    ReactivateSubscriptionHandler,
};
use crate::adapters::gateway::CardGateway;
use crate::domain::billing::{BillingPeriod, SupplierInfo};
use crate::domain::foundation::{BillingError, ChargeId, Currency, Money, UserId};
use crate::domain::payment::{GatewayKind, ProviderChargeState};
use crate::domain::webhook::{GatewayEvent, WebhookOutcome};
use crate::ports::{
    GatewayRouter, InvoiceRepository, InvoiceSequence, PaymentRepository, SubscriptionRepository,
};

use super::dto::{
    CancelResponse, CheckoutResponse, CounterResponse, CreateCheckoutRequest, ErrorResponse,
    RedirectNotificationQuery, RefundPaymentRequest, RefundResponse, SetCounterRequest,
    SettlementResponse, SubscriptionResponse, VerifyPaymentRequest, WebhookAckResponse,
};

// ════════════════════════════════════════════════════════════════════════════════
// Application State
// ════════════════════════════════════════════════════════════════════════════════

/// Shared application state containing all dependencies.
///
/// This struct is cloned for each request and contains Arc-wrapped dependencies
/// for efficient sharing across handlers.
#[derive(Clone)]
pub struct BillingAppState {
    pub payments: Arc<dyn PaymentRepository>,
    pub subscriptions: Arc<dyn SubscriptionRepository>,
    pub invoices: Arc<dyn InvoiceRepository>,
    pub sequence: Arc<dyn InvoiceSequence>,
    pub router: GatewayRouter,
    /// Concrete handle for webhook signature verification.
    pub card_gateway: Arc<CardGateway>,
    pub supplier: SupplierInfo,
    pub tax_rate_percent: u8,
    pub due_days: i64,
}

impl BillingAppState {
    /// Create handlers on demand from the shared state.
    fn settlement_handler(&self) -> Arc<SettleChargeHandler> {
        let issuer = Arc::new(IssueInvoiceHandler::new(
            self.sequence.clone(),
            self.invoices.clone(),
            self.supplier.clone(),
            self.tax_rate_percent,
            self.due_days,
        ));
        Arc::new(SettleChargeHandler::new(
            self.payments.clone(),
            self.subscriptions.clone(),
            issuer,
        ))
    }

    pub fn create_payment_handler(&self) -> CreatePaymentHandler {
        CreatePaymentHandler::new(self.router.clone(), self.payments.clone())
    }

    pub fn verify_payment_handler(&self) -> VerifyPaymentHandler {
        VerifyPaymentHandler::new(
            self.payments.clone(),
            self.router.clone(),
            self.settlement_handler(),
        )
    }

    pub fn refund_payment_handler(&self) -> RefundPaymentHandler {
        RefundPaymentHandler::new(
            self.payments.clone(),
            self.invoices.clone(),
            self.router.clone(),
        )
    }

    pub fn ingest_webhook_handler(&self) -> IngestWebhookHandler {
        let settlement = self.settlement_handler();
        let reconciler = Arc::new(ReconcileRecurringHandler::new(
            self.payments.clone(),
            settlement.clone(),
        ));
        IngestWebhookHandler::new(
            self.payments.clone(),
            self.router.clone(),
            settlement,
            reconciler,
        )
    }

    pub fn cancel_subscription_handler(&self) -> CancelSubscriptionHandler {
        CancelSubscriptionHandler::new(
            self.subscriptions.clone(),
            self.payments.clone(),
            self.router.clone(),
        )
    }

    pub fn reactivate_subscription_handler(&self) -> ReactivateSubscriptionHandler {
        ReactivateSubscriptionHandler::new(self.subscriptions.clone())
    }

    pub fn counter_admin_handler(&self) -> CounterAdminHandler {
        CounterAdminHandler::new(self.sequence.clone())
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// User Context (would come from auth middleware in production)
// ════════════════════════════════════════════════════════════════════════════════

/// Authenticated user context extracted from request.
///
/// In production, this would be extracted from JWT/session by auth middleware.
/// For now, uses a header-based extraction for development/testing.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user_id: UserId,
}

/// Rejection type for AuthenticatedUser extraction.
pub struct AuthenticationRequired;

impl IntoResponse for AuthenticationRequired {
    fn into_response(self) -> axum::response::Response {
        let error = ErrorResponse::new("AUTHENTICATION_REQUIRED", "Authentication is required");
        (StatusCode::UNAUTHORIZED, Json(error)).into_response()
    }
}

impl<S> axum::extract::FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = AuthenticationRequired;

    fn from_request_parts<'life0, 'life1, 'async_trait>(
        parts: &'life0 mut axum::http::request::Parts,
        _state: &'life1 S,
    ) -> std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self, Self::Rejection>> + Send + 'async_trait>,
    >
    where
        'life0: 'async_trait,
        'life1: 'async_trait,
        Self: 'async_trait,
    {
        Box::pin(async move {
            let user_id = parts
                .headers
                .get("X-User-Id")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| UserId::new(s).ok())
                .ok_or(AuthenticationRequired)?;

            Ok(AuthenticatedUser { user_id })
        })
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Payment Endpoints
// ════════════════════════════════════════════════════════════════════════════════

/// POST /api/payments - Start a checkout on the default gateway
pub async fn create_checkout(
    State(state): State<BillingAppState>,
    user: AuthenticatedUser,
    Json(request): Json<CreateCheckoutRequest>,
) -> Result<impl IntoResponse, BillingApiError> {
    let handler = state.create_payment_handler();
    let cmd = CreatePaymentCommand {
        user_id: user.user_id,
        user_email: request.email,
        plan: request.plan,
        success_url: request.success_url,
        cancel_url: request.cancel_url,
    };

    let result = handler.handle(cmd).await?;

    let response = CheckoutResponse {
        payment: (&result.payment).into(),
        redirect_url: result.redirect_url,
    };

    Ok((StatusCode::CREATED, Json(response)))
}

/// POST /api/payments/verify - Poll the gateway and settle a charge
///
/// Called when the payer lands on the success URL; converges to the same
/// outcome as webhook delivery regardless of which arrives first.
pub async fn verify_payment(
    State(state): State<BillingAppState>,
    _user: AuthenticatedUser,
    Json(request): Json<VerifyPaymentRequest>,
) -> Result<impl IntoResponse, BillingApiError> {
    let charge_id = ChargeId::new(request.charge_id).map_err(BillingError::from)?;

    let handler = state.verify_payment_handler();
    let outcome = handler.handle(VerifyPaymentCommand { charge_id }).await?;

    Ok(Json(SettlementResponse::from(&outcome)))
}

/// POST /api/payments/refund - Refund a settled charge (admin)
pub async fn refund_payment(
    State(state): State<BillingAppState>,
    _user: AuthenticatedUser,
    Json(request): Json<RefundPaymentRequest>,
) -> Result<impl IntoResponse, BillingApiError> {
    let charge_id = ChargeId::new(request.charge_id).map_err(BillingError::from)?;

    let amount = match request.amount_minor {
        Some(minor) => {
            let currency = match request.currency.as_deref() {
                Some(code) => Currency::parse(code).map_err(BillingError::from)?,
                None => Currency::Czk,
            };
            Some(Money::new(minor, currency).map_err(BillingError::from)?)
        }
        None => None,
    };

    let handler = state.refund_payment_handler();
    let result = handler.handle(RefundPaymentCommand { charge_id, amount }).await?;

    let response = RefundResponse {
        payment: result.payment.as_ref().map(Into::into),
        changed: result.changed,
    };

    Ok(Json(response))
}

// ════════════════════════════════════════════════════════════════════════════════
// Subscription Endpoints
// ════════════════════════════════════════════════════════════════════════════════

/// POST /api/subscription/cancel - Flag cancellation at period end
pub async fn cancel_subscription(
    State(state): State<BillingAppState>,
    user: AuthenticatedUser,
) -> Result<impl IntoResponse, BillingApiError> {
    let handler = state.cancel_subscription_handler();
    let result = handler
        .handle(CancelSubscriptionCommand {
            user_id: user.user_id,
        })
        .await?;

    Ok(Json(CancelResponse::from(&result)))
}

/// POST /api/subscription/reactivate - Clear a pending cancellation
pub async fn reactivate_subscription(
    State(state): State<BillingAppState>,
    user: AuthenticatedUser,
) -> Result<impl IntoResponse, BillingApiError> {
    let handler = state.reactivate_subscription_handler();
    let result = handler
        .handle(ReactivateSubscriptionCommand {
            user_id: user.user_id,
        })
        .await?;

    Ok(Json(SubscriptionResponse::from(&result.subscription)))
}

// ════════════════════════════════════════════════════════════════════════════════
// Counter Administration Endpoints
// ════════════════════════════════════════════════════════════════════════════════

/// GET /api/admin/invoice-counter/:period - Read one period's counter
pub async fn get_counter(
    State(state): State<BillingAppState>,
    _user: AuthenticatedUser,
    Path(period): Path<String>,
) -> Result<impl IntoResponse, BillingApiError> {
    let period = BillingPeriod::from_str(&period).map_err(BillingError::from)?;

    let handler = state.counter_admin_handler();
    let last_number = handler.current(&period).await?;

    Ok(Json(CounterResponse {
        period: period.key(),
        last_number,
    }))
}

/// PUT /api/admin/invoice-counter/:period - Force-set one period's counter
pub async fn set_counter(
    State(state): State<BillingAppState>,
    _user: AuthenticatedUser,
    Path(period): Path<String>,
    Json(request): Json<SetCounterRequest>,
) -> Result<impl IntoResponse, BillingApiError> {
    let period = BillingPeriod::from_str(&period).map_err(BillingError::from)?;

    let handler = state.counter_admin_handler();
    handler.force_set(&period, request.last_number).await?;

    Ok(Json(CounterResponse {
        period: period.key(),
        last_number: Some(request.last_number),
    }))
}

/// DELETE /api/admin/invoice-counter/:period - Drop one period's counter
pub async fn delete_counter(
    State(state): State<BillingAppState>,
    _user: AuthenticatedUser,
    Path(period): Path<String>,
) -> Result<impl IntoResponse, BillingApiError> {
    let period = BillingPeriod::from_str(&period).map_err(BillingError::from)?;

    let handler = state.counter_admin_handler();
    handler.delete(&period).await?;

    Ok(StatusCode::NO_CONTENT)
}

// ════════════════════════════════════════════════════════════════════════════════
// Webhook Endpoints
// ════════════════════════════════════════════════════════════════════════════════

/// POST /webhooks/card - Handle signed card processor webhooks
pub async fn handle_card_webhook(
    State(state): State<BillingAppState>,
    headers: axum::http::HeaderMap,
    body: axum::body::Bytes,
) -> Result<impl IntoResponse, BillingApiError> {
    let signature = headers
        .get("Webhook-Signature")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| {
            BillingError::SignatureInvalid("missing Webhook-Signature header".to_string())
        })?;

    let event = state.card_gateway.parse_webhook(&body, signature)?;

    let handler = state.ingest_webhook_handler();
    let outcome = handler.handle(event).await?;

    Ok(Json(ack(outcome)))
}

/// GET /webhooks/redirect - Handle id-only redirect processor notifications
///
/// The notification carries no settlement state; the ingestion handler
/// re-fetches the charge from the processor, which is also what makes an
/// unauthenticated notification harmless.
pub async fn handle_redirect_notification(
    State(state): State<BillingAppState>,
    Query(query): Query<RedirectNotificationQuery>,
) -> Result<impl IntoResponse, BillingApiError> {
    let charge_id = ChargeId::new(query.id.clone()).map_err(BillingError::from)?;
    let parent_charge_id = query
        .parent_id
        .map(ChargeId::new)
        .transpose()
        .map_err(BillingError::from)?;

    let event = GatewayEvent {
        gateway: GatewayKind::Redirect,
        event_id: format!("notify_{}_{}", query.id, Utc::now().timestamp()),
        charge_id,
        parent_charge_id,
        // Placeholder; ingestion re-fetches the authoritative state.
        state: ProviderChargeState::Created,
    };

    let handler = state.ingest_webhook_handler();
    let outcome = handler.handle(event).await?;

    Ok(Json(ack(outcome)))
}

fn ack(outcome: WebhookOutcome) -> WebhookAckResponse {
    WebhookAckResponse {
        outcome: match outcome {
            WebhookOutcome::Processed => "processed",
            WebhookOutcome::AlreadyProcessed => "already_processed",
            WebhookOutcome::Ignored => "ignored",
        },
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Error Handling
// ════════════════════════════════════════════════════════════════════════════════

/// API error type that converts domain errors to HTTP responses.
pub struct BillingApiError(BillingError);

impl From<BillingError> for BillingApiError {
    fn from(err: BillingError) -> Self {
        Self(err)
    }
}

impl IntoResponse for BillingApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, error_code) = match &self.0 {
            BillingError::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_FAILED"),
            BillingError::SignatureInvalid(_) => {
                (StatusCode::UNAUTHORIZED, "INVALID_WEBHOOK_SIGNATURE")
            }
            BillingError::PaymentNotFound { .. } => (StatusCode::NOT_FOUND, "PAYMENT_NOT_FOUND"),
            BillingError::CounterNotFound(_) => (StatusCode::NOT_FOUND, "COUNTER_NOT_FOUND"),
            BillingError::SubscriptionNotActive { .. } => {
                (StatusCode::CONFLICT, "SUBSCRIPTION_NOT_ACTIVE")
            }
            BillingError::InvalidTransition(_) => {
                (StatusCode::CONFLICT, "INVALID_STATE_TRANSITION")
            }
            BillingError::PlanNotRecurring(_) => (StatusCode::BAD_REQUEST, "PLAN_NOT_RECURRING"),
            BillingError::SequenceContention { .. } => {
                (StatusCode::SERVICE_UNAVAILABLE, "SEQUENCE_CONTENTION")
            }
            BillingError::GatewayUnavailable(_) => (StatusCode::BAD_GATEWAY, "GATEWAY_UNAVAILABLE"),
            BillingError::GatewayRejected(_) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "GATEWAY_REJECTED")
            }
            BillingError::GatewayResourceMissing(_) => {
                (StatusCode::BAD_GATEWAY, "GATEWAY_RESOURCE_MISSING")
            }
            BillingError::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        };

        if status.is_server_error() {
            tracing::error!(error = %self.0, "request failed");
        }

        let body = ErrorResponse::new(error_code, self.0.to_string());
        (status, Json(body)).into_response()
    }
}
