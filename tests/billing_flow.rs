//! Integration tests for the billing engine.
//!
//! These tests verify the end-to-end flows:
//! 1. Checkout creates a pending ledger entry on the gateway
//! 2. Webhook delivery and success-page verify converge on one settlement
//! 3. First settlement activates the subscription and issues a numbered invoice
//! 4. Recurring children extend the period and invoice again
//! 5. Cancellation stays consistent when the gateway is down
//! 6. Refunds flip the invoice without revoking access
//!
//! Uses in-memory adapters and a scriptable gateway double, so the flows run
//! without external dependencies.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{Duration, Utc};

use vowday_billing::adapters::gateway::MockGateway;
use vowday_billing::adapters::memory::{
    InMemoryInvoiceRepository, InMemoryInvoiceSequence, InMemoryPaymentRepository,
    InMemorySubscriptionRepository,
};
use vowday_billing::application::handlers::billing::IssueInvoiceHandler;
use vowday_billing::application::handlers::payment::{
    CreatePaymentCommand, CreatePaymentHandler, IngestWebhookHandler, ReconcileRecurringHandler,
    RefundPaymentCommand, RefundPaymentHandler, SettleChargeHandler, VerifyPaymentCommand,
    VerifyPaymentHandler,
};
use vowday_billing::application::handlers::subscription::{
    CancelSubscriptionCommand, CancelSubscriptionHandler, ReactivateSubscriptionCommand,
    ReactivateSubscriptionHandler,
};
use vowday_billing::domain::billing::{BillingPeriod, InvoiceStatus, SupplierInfo};
use vowday_billing::domain::foundation::{ChargeId, UserId};
use vowday_billing::domain::payment::{GatewayKind, PaymentStatus, PlanId, ProviderChargeState};
use vowday_billing::domain::subscription::SubscriptionStatus;
use vowday_billing::domain::webhook::{GatewayEvent, WebhookOutcome};
use vowday_billing::ports::{
    GatewayError, GatewayRouter, InvoiceRepository, PaymentGateway, PaymentRepository,
    SubscriptionRepository,
};

// =============================================================================
// Test Infrastructure
// =============================================================================

struct Fixture {
    payments: Arc<InMemoryPaymentRepository>,
    subscriptions: Arc<InMemorySubscriptionRepository>,
    invoices: Arc<InMemoryInvoiceRepository>,
    card: MockGateway,
    redirect: MockGateway,
    create: CreatePaymentHandler,
    verify: Arc<VerifyPaymentHandler>,
    ingest: Arc<IngestWebhookHandler>,
    refund: RefundPaymentHandler,
    cancel: CancelSubscriptionHandler,
    reactivate: ReactivateSubscriptionHandler,
}

fn supplier() -> SupplierInfo {
    SupplierInfo {
        name: "VowDay s.r.o.".to_string(),
        address: "Svatební 12, 110 00 Praha".to_string(),
        registration_number: "12345678".to_string(),
        vat_number: Some("CZ12345678".to_string()),
        bank_account: Some("123456789/0100".to_string()),
        email: "fakturace@vowday.cz".to_string(),
    }
}

fn fixture(default_gateway: GatewayKind) -> Fixture {
    let payments = Arc::new(InMemoryPaymentRepository::new());
    let subscriptions = Arc::new(InMemorySubscriptionRepository::new());
    let invoices = Arc::new(InMemoryInvoiceRepository::new());
    let sequence = Arc::new(InMemoryInvoiceSequence::new());

    let card = MockGateway::new(GatewayKind::Card);
    let redirect = MockGateway::new(GatewayKind::Redirect);
    let router = GatewayRouter::new(
        vec![
            Arc::new(card.clone()) as Arc<dyn PaymentGateway>,
            Arc::new(redirect.clone()) as Arc<dyn PaymentGateway>,
        ],
        default_gateway,
    );

    let issuer = Arc::new(IssueInvoiceHandler::new(
        sequence,
        invoices.clone(),
        supplier(),
        21,
        14,
    ));
    let settlement = Arc::new(SettleChargeHandler::new(
        payments.clone(),
        subscriptions.clone(),
        issuer,
    ));
    let reconciler = Arc::new(ReconcileRecurringHandler::new(
        payments.clone(),
        settlement.clone(),
    ));

    Fixture {
        create: CreatePaymentHandler::new(router.clone(), payments.clone()),
        verify: Arc::new(VerifyPaymentHandler::new(
            payments.clone(),
            router.clone(),
            settlement.clone(),
        )),
        ingest: Arc::new(IngestWebhookHandler::new(
            payments.clone(),
            router.clone(),
            settlement,
            reconciler,
        )),
        refund: RefundPaymentHandler::new(payments.clone(), invoices.clone(), router.clone()),
        cancel: CancelSubscriptionHandler::new(
            subscriptions.clone(),
            payments.clone(),
            router.clone(),
        ),
        reactivate: ReactivateSubscriptionHandler::new(subscriptions.clone()),
        payments,
        subscriptions,
        invoices,
        card,
        redirect,
    }
}

fn user(n: u32) -> UserId {
    UserId::new(format!("user-{}", n)).unwrap()
}

async fn checkout(fx: &Fixture, user_id: &UserId, plan: PlanId) -> ChargeId {
    let result = fx
        .create
        .handle(CreatePaymentCommand {
            user_id: user_id.clone(),
            user_email: format!("{}@example.com", user_id),
            plan,
            success_url: "https://app.vowday.cz/paid".to_string(),
            cancel_url: "https://app.vowday.cz/canceled".to_string(),
        })
        .await
        .unwrap();
    result.payment.charge_id
}

fn card_event(charge_id: &ChargeId, state: ProviderChargeState) -> GatewayEvent {
    GatewayEvent {
        gateway: GatewayKind::Card,
        event_id: format!("evt_{}_{:?}", charge_id, state),
        charge_id: charge_id.clone(),
        parent_charge_id: None,
        state,
    }
}

/// Id-only notification; the ingestion layer re-polls the scripted state.
fn redirect_event(charge_id: &ChargeId, parent: Option<&ChargeId>) -> GatewayEvent {
    GatewayEvent {
        gateway: GatewayKind::Redirect,
        event_id: format!("notify_{}", charge_id),
        charge_id: charge_id.clone(),
        parent_charge_id: parent.cloned(),
        state: ProviderChargeState::Created,
    }
}

// =============================================================================
// Settlement and Invoice Numbering
// =============================================================================

#[tokio::test]
async fn first_settlement_activates_subscription_and_issues_invoice() {
    let fx = fixture(GatewayKind::Card);
    let user_id = user(1);
    let charge_id = checkout(&fx, &user_id, PlanId::PremiumMonthly).await;

    let outcome = fx
        .ingest
        .handle(card_event(&charge_id, ProviderChargeState::Paid))
        .await
        .unwrap();
    assert_eq!(outcome, WebhookOutcome::Processed);

    let payment = fx
        .payments
        .find_by_charge_id(&charge_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(payment.status, PaymentStatus::Succeeded);
    assert!(payment.paid_at.is_some());

    let subscription = fx
        .subscriptions
        .find_by_user(&user_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(subscription.status, SubscriptionStatus::Active);
    assert!(subscription.has_access(Utc::now()));

    // The first invoice of the current period carries sequence 001.
    assert_eq!(fx.invoices.count().await, 1);
    let invoice = fx
        .invoices
        .find_by_payment(&payment.id)
        .await
        .unwrap()
        .unwrap();
    let period = BillingPeriod::containing(Utc::now());
    assert_eq!(invoice.number.to_string(), format!("{}-001", period.key()));
    assert_eq!(invoice.reference_code, format!("{}001", period.key()));
    assert_eq!(invoice.status, InvoiceStatus::Issued);
}

#[tokio::test]
async fn webhook_replay_settles_exactly_once() {
    let fx = fixture(GatewayKind::Card);
    let charge_id = checkout(&fx, &user(1), PlanId::PremiumMonthly).await;
    let event = card_event(&charge_id, ProviderChargeState::Paid);

    assert_eq!(
        fx.ingest.handle(event.clone()).await.unwrap(),
        WebhookOutcome::Processed
    );
    assert_eq!(
        fx.ingest.handle(event).await.unwrap(),
        WebhookOutcome::AlreadyProcessed
    );

    assert_eq!(fx.invoices.count().await, 1);
}

#[tokio::test]
async fn verify_and_webhook_converge_on_one_settlement() {
    let fx = fixture(GatewayKind::Card);
    let charge_id = checkout(&fx, &user(1), PlanId::PremiumMonthly).await;
    fx.card
        .script_charge_state(charge_id.as_str(), ProviderChargeState::Paid);

    // The payer lands on the success page before the webhook arrives.
    let outcome = fx
        .verify
        .handle(VerifyPaymentCommand {
            charge_id: charge_id.clone(),
        })
        .await
        .unwrap();
    assert!(outcome.newly_succeeded);
    assert!(outcome.invoice.is_some());

    let replay = fx
        .ingest
        .handle(card_event(&charge_id, ProviderChargeState::Paid))
        .await
        .unwrap();
    assert_eq!(replay, WebhookOutcome::AlreadyProcessed);
    assert_eq!(fx.invoices.count().await, 1);
}

#[tokio::test]
async fn concurrent_settlements_get_gap_free_sequence() {
    let fx = fixture(GatewayKind::Card);

    let mut charge_ids = Vec::new();
    for n in 0..12 {
        let charge_id = checkout(&fx, &user(n), PlanId::PremiumMonthly).await;
        fx.card
            .script_charge_state(charge_id.as_str(), ProviderChargeState::Paid);
        charge_ids.push(charge_id);
    }

    let mut tasks = Vec::new();
    for charge_id in charge_ids {
        let verify = fx.verify.clone();
        tasks.push(tokio::spawn(async move {
            verify
                .handle(VerifyPaymentCommand { charge_id })
                .await
                .unwrap()
        }));
    }

    let mut sequences = BTreeSet::new();
    for task in tasks {
        let outcome = task.await.unwrap();
        let invoice = outcome.invoice.expect("each settlement issues an invoice");
        sequences.insert(invoice.number.sequence());
    }

    // Every number issued exactly once, no gaps.
    assert_eq!(sequences, (1..=12).collect::<BTreeSet<u32>>());
    assert_eq!(fx.invoices.count().await, 12);
}

#[tokio::test]
async fn failed_charge_never_touches_subscription_or_invoices() {
    let fx = fixture(GatewayKind::Redirect);
    let user_id = user(1);
    let charge_id = checkout(&fx, &user_id, PlanId::PremiumMonthly).await;
    fx.redirect
        .script_charge_state(charge_id.as_str(), ProviderChargeState::Canceled);

    let outcome = fx
        .ingest
        .handle(redirect_event(&charge_id, None))
        .await
        .unwrap();
    assert_eq!(outcome, WebhookOutcome::Processed);

    let payment = fx
        .payments
        .find_by_charge_id(&charge_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(payment.status, PaymentStatus::Canceled);
    assert!(fx
        .subscriptions
        .find_by_user(&user_id)
        .await
        .unwrap()
        .is_none());
    assert_eq!(fx.invoices.count().await, 0);
}

// =============================================================================
// Recurring Charges
// =============================================================================

#[tokio::test]
async fn recurring_child_extends_period_and_invoices_again() {
    let fx = fixture(GatewayKind::Redirect);
    let user_id = user(1);
    let parent_id = checkout(&fx, &user_id, PlanId::PremiumMonthly).await;

    // Initial settlement through the id-only notification path.
    fx.redirect
        .script_charge_state(parent_id.as_str(), ProviderChargeState::Paid);
    fx.ingest
        .handle(redirect_event(&parent_id, None))
        .await
        .unwrap();

    let before = fx
        .subscriptions
        .find_by_user(&user_id)
        .await
        .unwrap()
        .unwrap();

    // Next month the processor charges a child against the parent.
    let child_id = ChargeId::new("rec_child_1").unwrap();
    fx.redirect
        .script_charge_state(child_id.as_str(), ProviderChargeState::Paid);
    let outcome = fx
        .ingest
        .handle(redirect_event(&child_id, Some(&parent_id)))
        .await
        .unwrap();
    assert_eq!(outcome, WebhookOutcome::Processed);

    let child = fx
        .payments
        .find_by_charge_id(&child_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(child.parent_charge_id.as_ref(), Some(&parent_id));
    assert_eq!(child.status, PaymentStatus::Succeeded);

    let after = fx
        .subscriptions
        .find_by_user(&user_id)
        .await
        .unwrap()
        .unwrap();
    assert!(after.current_period_end > before.current_period_end);
    assert_eq!(fx.invoices.count().await, 2);
}

#[tokio::test]
async fn replayed_child_notification_does_not_extend_twice() {
    let fx = fixture(GatewayKind::Redirect);
    let user_id = user(1);
    let parent_id = checkout(&fx, &user_id, PlanId::PremiumMonthly).await;
    fx.redirect
        .script_charge_state(parent_id.as_str(), ProviderChargeState::Paid);
    fx.ingest
        .handle(redirect_event(&parent_id, None))
        .await
        .unwrap();

    let child_id = ChargeId::new("rec_child_1").unwrap();
    fx.redirect
        .script_charge_state(child_id.as_str(), ProviderChargeState::Paid);
    fx.ingest
        .handle(redirect_event(&child_id, Some(&parent_id)))
        .await
        .unwrap();

    let first_end = fx
        .subscriptions
        .find_by_user(&user_id)
        .await
        .unwrap()
        .unwrap()
        .current_period_end;

    let replay = fx
        .ingest
        .handle(redirect_event(&child_id, Some(&parent_id)))
        .await
        .unwrap();
    assert_eq!(replay, WebhookOutcome::AlreadyProcessed);

    let second_end = fx
        .subscriptions
        .find_by_user(&user_id)
        .await
        .unwrap()
        .unwrap()
        .current_period_end;
    assert_eq!(first_end, second_end);
    assert_eq!(fx.invoices.count().await, 2);
}

#[tokio::test]
async fn late_recurring_child_extends_from_the_lapsed_period_end() {
    let fx = fixture(GatewayKind::Redirect);
    let user_id = user(1);
    let parent_id = checkout(&fx, &user_id, PlanId::PremiumMonthly).await;
    fx.redirect
        .script_charge_state(parent_id.as_str(), ProviderChargeState::Paid);
    fx.ingest
        .handle(redirect_event(&parent_id, None))
        .await
        .unwrap();

    // The processor charges late; the paid period already ran out.
    let mut sub = fx
        .subscriptions
        .find_by_user(&user_id)
        .await
        .unwrap()
        .unwrap();
    let lapsed_end = Utc::now() - Duration::days(3);
    sub.current_period_start = lapsed_end - Duration::days(30);
    sub.current_period_end = lapsed_end;
    fx.subscriptions.upsert(&sub).await.unwrap();

    let child_id = ChargeId::new("rec_child_late").unwrap();
    fx.redirect
        .script_charge_state(child_id.as_str(), ProviderChargeState::Paid);
    fx.ingest
        .handle(redirect_event(&child_id, Some(&parent_id)))
        .await
        .unwrap();

    // The new period anchors on the old end, not on the delivery time.
    let extended = fx
        .subscriptions
        .find_by_user(&user_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(extended.current_period_start, lapsed_end);
    assert_eq!(extended.current_period_end, lapsed_end + Duration::days(30));
}

// =============================================================================
// Cancellation and Reactivation
// =============================================================================

/// Settles a monthly plan through the redirect path and returns the parent
/// charge id.
async fn active_recurring_subscription(fx: &Fixture, user_id: &UserId) -> ChargeId {
    let parent_id = checkout(fx, user_id, PlanId::PremiumMonthly).await;
    fx.redirect
        .script_charge_state(parent_id.as_str(), ProviderChargeState::Paid);
    fx.ingest
        .handle(redirect_event(&parent_id, None))
        .await
        .unwrap();
    parent_id
}

#[tokio::test]
async fn cancel_stops_recurrence_and_keeps_access_until_period_end() {
    let fx = fixture(GatewayKind::Redirect);
    let user_id = user(1);
    let parent_id = active_recurring_subscription(&fx, &user_id).await;

    let result = fx
        .cancel
        .handle(CancelSubscriptionCommand {
            user_id: user_id.clone(),
        })
        .await
        .unwrap();

    assert!(!result.already_pending);
    assert!(result.recurrence_stopped);
    assert!(fx.redirect.recurrence_stopped(parent_id.as_str()));

    let subscription = result.subscription;
    assert!(subscription.cancel_at_period_end);
    assert_eq!(subscription.status, SubscriptionStatus::Active);
    assert!(subscription.has_access(Utc::now()));
    assert_eq!(result.effective_at, subscription.current_period_end);
}

#[tokio::test]
async fn cancel_is_flagged_locally_even_when_gateway_is_down() {
    let fx = fixture(GatewayKind::Redirect);
    let user_id = user(1);
    let parent_id = active_recurring_subscription(&fx, &user_id).await;

    fx.redirect
        .queue_error("cancel_recurrence", GatewayError::Unavailable("502".into()));

    let result = fx
        .cancel
        .handle(CancelSubscriptionCommand {
            user_id: user_id.clone(),
        })
        .await
        .unwrap();

    // The local flag always lands; the gateway stop is best effort.
    assert!(result.subscription.cancel_at_period_end);
    assert!(!result.recurrence_stopped);
    assert!(!fx.redirect.recurrence_stopped(parent_id.as_str()));
}

#[tokio::test]
async fn repeated_cancel_skips_the_gateway() {
    let fx = fixture(GatewayKind::Redirect);
    let user_id = user(1);
    active_recurring_subscription(&fx, &user_id).await;

    fx.cancel
        .handle(CancelSubscriptionCommand {
            user_id: user_id.clone(),
        })
        .await
        .unwrap();
    let stop_calls = |fx: &Fixture| {
        fx.redirect
            .calls()
            .iter()
            .filter(|c| c.method == "cancel_recurrence")
            .count()
    };
    assert_eq!(stop_calls(&fx), 1);

    let second = fx
        .cancel
        .handle(CancelSubscriptionCommand {
            user_id: user_id.clone(),
        })
        .await
        .unwrap();
    assert!(second.already_pending);
    assert_eq!(stop_calls(&fx), 1);
}

#[tokio::test]
async fn reactivate_clears_a_pending_cancellation() {
    let fx = fixture(GatewayKind::Redirect);
    let user_id = user(1);
    active_recurring_subscription(&fx, &user_id).await;

    fx.cancel
        .handle(CancelSubscriptionCommand {
            user_id: user_id.clone(),
        })
        .await
        .unwrap();

    let result = fx
        .reactivate
        .handle(ReactivateSubscriptionCommand {
            user_id: user_id.clone(),
        })
        .await
        .unwrap();

    assert!(!result.subscription.cancel_at_period_end);
    assert!(result.subscription.canceled_at.is_none());
    assert_eq!(result.subscription.status, SubscriptionStatus::Active);
}

// =============================================================================
// Refunds
// =============================================================================

#[tokio::test]
async fn refund_flips_invoice_but_never_revokes_access() {
    let fx = fixture(GatewayKind::Card);
    let user_id = user(1);
    let charge_id = checkout(&fx, &user_id, PlanId::PremiumMonthly).await;
    fx.ingest
        .handle(card_event(&charge_id, ProviderChargeState::Paid))
        .await
        .unwrap();

    let result = fx
        .refund
        .handle(RefundPaymentCommand {
            charge_id: charge_id.clone(),
            amount: None,
        })
        .await
        .unwrap();

    assert!(result.changed);
    let refunded = result.payment.unwrap();
    assert_eq!(refunded.status, PaymentStatus::Refunded);
    assert!(fx.card.was_refunded(charge_id.as_str()));

    let invoice = fx
        .invoices
        .find_by_payment(&refunded.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(invoice.status, InvoiceStatus::Refunded);

    // Access runs until the period expires regardless of the refund.
    let subscription = fx
        .subscriptions
        .find_by_user(&user_id)
        .await
        .unwrap()
        .unwrap();
    assert!(subscription.has_access(Utc::now()));
}

#[tokio::test]
async fn repeated_refund_is_a_no_op_without_gateway_calls() {
    let fx = fixture(GatewayKind::Card);
    let charge_id = checkout(&fx, &user(1), PlanId::PremiumMonthly).await;
    fx.ingest
        .handle(card_event(&charge_id, ProviderChargeState::Paid))
        .await
        .unwrap();

    fx.refund
        .handle(RefundPaymentCommand {
            charge_id: charge_id.clone(),
            amount: None,
        })
        .await
        .unwrap();

    let refund_calls = |fx: &Fixture| {
        fx.card
            .calls()
            .iter()
            .filter(|c| c.method == "refund_charge")
            .count()
    };
    assert_eq!(refund_calls(&fx), 1);

    let second = fx
        .refund
        .handle(RefundPaymentCommand {
            charge_id,
            amount: None,
        })
        .await
        .unwrap();
    assert!(!second.changed);
    assert_eq!(refund_calls(&fx), 1);
}

#[tokio::test]
async fn refund_of_unknown_charge_is_accepted_without_ledger_changes() {
    let fx = fixture(GatewayKind::Card);

    let result = fx
        .refund
        .handle(RefundPaymentCommand {
            charge_id: ChargeId::new("ch_never_seen").unwrap(),
            amount: None,
        })
        .await
        .unwrap();

    assert!(!result.changed);
    assert!(result.payment.is_none());
    assert!(fx.card.calls().is_empty());
    assert_eq!(fx.invoices.count().await, 0);
}

#[tokio::test]
async fn refunding_a_pending_charge_is_rejected() {
    let fx = fixture(GatewayKind::Card);
    let charge_id = checkout(&fx, &user(1), PlanId::PremiumMonthly).await;

    let result = fx
        .refund
        .handle(RefundPaymentCommand {
            charge_id,
            amount: None,
        })
        .await;
    assert!(result.is_err());
}
