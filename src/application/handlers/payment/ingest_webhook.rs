//! IngestWebhookHandler - turns verified gateway events into ledger state.
//!
//! Events arrive already authenticated: card deliveries pass signature
//! verification in the adapter, and redirect notifications carry nothing
//! trustworthy, so this handler re-polls the redirect gateway and uses the
//! polled state as the authoritative one.
//!
//! Deliveries are at-least-once and unordered. Idempotency comes from the
//! payment status machine, not from an event log: re-applying a state the
//! ledger already holds is a no-op.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use crate::application::handlers::payment::reconcile_recurring::ReconcileRecurringHandler;
use crate::application::handlers::payment::settle_charge::SettleChargeHandler;
use crate::domain::foundation::BillingError;
use crate::domain::payment::{GatewayKind, Payment, ProviderChargeState};
use crate::domain::webhook::{GatewayEvent, WebhookOutcome};
use crate::ports::{GatewayRouter, PaymentRepository};

/// Attempts to find the payment row a checkout may still be writing.
const LOOKUP_ATTEMPTS: u32 = 3;

/// Pause between lookup attempts.
const LOOKUP_BACKOFF: Duration = Duration::from_millis(200);

pub struct IngestWebhookHandler {
    payments: Arc<dyn PaymentRepository>,
    router: GatewayRouter,
    settlement: Arc<SettleChargeHandler>,
    reconciler: Arc<ReconcileRecurringHandler>,
}

impl IngestWebhookHandler {
    pub fn new(
        payments: Arc<dyn PaymentRepository>,
        router: GatewayRouter,
        settlement: Arc<SettleChargeHandler>,
        reconciler: Arc<ReconcileRecurringHandler>,
    ) -> Self {
        Self {
            payments,
            router,
            settlement,
            reconciler,
        }
    }

    pub async fn handle(&self, event: GatewayEvent) -> Result<WebhookOutcome, BillingError> {
        // 1. Establish the authoritative charge state
        let state = self.authoritative_state(&event).await?;

        // 2. Recurring children go through reconciliation
        if event.is_recurring_child() {
            let outcome = self.reconciler.handle(&event, state).await?;
            return Ok(if outcome.newly_succeeded {
                WebhookOutcome::Processed
            } else {
                WebhookOutcome::AlreadyProcessed
            });
        }

        // 3. Find the checkout's payment row, tolerating the race where
        //    the webhook outruns the checkout's own insert
        let payment = self.find_payment(&event).await?;

        // 4. Settle
        let before = payment.status;
        let outcome = self.settlement.handle(payment, state, Utc::now()).await?;

        Ok(if outcome.payment.status != before {
            tracing::info!(
                event_id = %event.event_id,
                charge_id = %event.charge_id,
                status = %outcome.payment.status,
                "webhook settled payment"
            );
            WebhookOutcome::Processed
        } else if outcome.payment.status.is_terminal() {
            tracing::info!(
                event_id = %event.event_id,
                charge_id = %event.charge_id,
                "duplicate delivery for settled payment"
            );
            WebhookOutcome::AlreadyProcessed
        } else {
            // Pre-settlement states carry no ledger consequence
            WebhookOutcome::Ignored
        })
    }

    /// The state settlement should apply.
    ///
    /// Card events are signed, so the embedded state is trusted. Redirect
    /// notifications are unauthenticated id-only pings; the state is
    /// whatever the authenticated API reports right now, polled with one
    /// retry on transient failure.
    async fn authoritative_state(
        &self,
        event: &GatewayEvent,
    ) -> Result<ProviderChargeState, BillingError> {
        if event.gateway == GatewayKind::Card {
            return Ok(event.state);
        }

        let gateway = self.router.for_kind(event.gateway)?;
        match gateway.charge_status(&event.charge_id).await {
            Ok(state) => Ok(state),
            Err(err) if err.is_retryable() => {
                tracing::warn!(
                    charge_id = %event.charge_id,
                    error = %err,
                    "status poll failed, retrying once"
                );
                Ok(gateway.charge_status(&event.charge_id).await?)
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn find_payment(&self, event: &GatewayEvent) -> Result<Payment, BillingError> {
        for attempt in 1..=LOOKUP_ATTEMPTS {
            if let Some(payment) = self.payments.find_by_charge_id(&event.charge_id).await? {
                return Ok(payment);
            }
            if attempt < LOOKUP_ATTEMPTS {
                tracing::debug!(
                    charge_id = %event.charge_id,
                    attempt,
                    "charge not in ledger yet, waiting for checkout insert"
                );
                tokio::time::sleep(LOOKUP_BACKOFF).await;
            }
        }

        Err(BillingError::PaymentNotFound {
            charge_id: event.charge_id.to_string(),
        })
    }
}
