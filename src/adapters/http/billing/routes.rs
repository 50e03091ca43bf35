//! Axum router configuration for billing endpoints.
//!
//! This module defines the route structure for billing-related API endpoints
//! and wires them to their corresponding handlers.

use axum::{
    routing::{get, post},
    Router,
};

use super::handlers::{
    cancel_subscription, create_checkout, delete_counter, get_counter, handle_card_webhook,
    handle_redirect_notification, reactivate_subscription, refund_payment, set_counter,
    verify_payment, BillingAppState,
};

/// Create the payment API router.
///
/// # Routes
///
/// ## User Endpoints (require authentication)
/// - `POST /` - Start a checkout on the default gateway
/// - `POST /verify` - Poll the gateway and settle a charge
///
/// ## Admin Endpoints (require admin role)
/// - `POST /refund` - Refund a settled charge
pub fn payment_routes() -> Router<BillingAppState> {
    Router::new()
        .route("/", post(create_checkout))
        .route("/verify", post(verify_payment))
        .route("/refund", post(refund_payment))
}

/// Create the subscription API router.
///
/// # Routes
/// - `POST /cancel` - Flag cancellation at period end
/// - `POST /reactivate` - Clear a pending cancellation
pub fn subscription_routes() -> Router<BillingAppState> {
    Router::new()
        .route("/cancel", post(cancel_subscription))
        .route("/reactivate", post(reactivate_subscription))
}

/// Create the counter administration router.
///
/// # Routes
/// - `GET /invoice-counter/:period` - Read one period's counter
/// - `PUT /invoice-counter/:period` - Force-set one period's counter
/// - `DELETE /invoice-counter/:period` - Drop one period's counter
pub fn admin_routes() -> Router<BillingAppState> {
    Router::new().route(
        "/invoice-counter/:period",
        get(get_counter).put(set_counter).delete(delete_counter),
    )
}

/// Create the webhook router.
///
/// This is separate from the main API routes because webhook deliveries
/// don't carry user authentication: the card path is verified via
/// signature, the redirect path via state re-fetch.
///
/// # Routes
/// - `POST /card` - Handle signed card processor webhooks
/// - `GET /redirect` - Handle id-only redirect processor notifications
pub fn webhook_routes() -> Router<BillingAppState> {
    Router::new()
        .route("/card", post(handle_card_webhook))
        .route("/redirect", get(handle_redirect_notification))
}

/// Create the complete billing module router.
///
/// Combines payment, subscription, admin and webhook routes into a single
/// router suitable for mounting at the application root.
pub fn billing_router() -> Router<BillingAppState> {
    Router::new()
        .nest("/api/payments", payment_routes())
        .nest("/api/subscription", subscription_routes())
        .nest("/api/admin", admin_routes())
        .nest("/webhooks", webhook_routes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::adapters::gateway::{CardGateway, CardGatewayConfig, MockGateway};
    use crate::adapters::memory::{
        InMemoryInvoiceRepository, InMemoryInvoiceSequence, InMemoryPaymentRepository,
        InMemorySubscriptionRepository,
    };
    use crate::domain::billing::SupplierInfo;
    use crate::domain::payment::GatewayKind;
    use crate::ports::GatewayRouter;

    fn test_supplier() -> SupplierInfo {
        SupplierInfo {
            name: "VowDay s.r.o.".to_string(),
            address: "Svatební 12, 110 00 Praha".to_string(),
            registration_number: "12345678".to_string(),
            vat_number: Some("CZ12345678".to_string()),
            bank_account: Some("123456789/0100".to_string()),
            email: "fakturace@vowday.cz".to_string(),
        }
    }

    fn test_state() -> BillingAppState {
        let card = CardGateway::new(CardGatewayConfig::new(
            "sk_test_abc",
            "whsec_xyz",
            "http://localhost:9090",
        ));
        let router = GatewayRouter::new(
            vec![
                Arc::new(MockGateway::new(GatewayKind::Card)),
                Arc::new(MockGateway::new(GatewayKind::Redirect)),
            ],
            GatewayKind::Card,
        );

        BillingAppState {
            payments: Arc::new(InMemoryPaymentRepository::new()),
            subscriptions: Arc::new(InMemorySubscriptionRepository::new()),
            invoices: Arc::new(InMemoryInvoiceRepository::new()),
            sequence: Arc::new(InMemoryInvoiceSequence::new()),
            router,
            card_gateway: Arc::new(card),
            supplier: test_supplier(),
            tax_rate_percent: 21,
            due_days: 14,
        }
    }

    #[test]
    fn payment_routes_create_router() {
        let router = payment_routes();
        let _: Router<()> = router.with_state(test_state());
    }

    #[test]
    fn webhook_routes_create_router() {
        let router = webhook_routes();
        let _: Router<()> = router.with_state(test_state());
    }

    #[test]
    fn billing_router_creates_combined_router() {
        let router = billing_router();
        let _: Router<()> = router.with_state(test_state());
    }
}
