//! SettleChargeHandler - applies an observed gateway state to the ledger.
//!
//! Single place where a charge state becomes ledger state. Both the
//! verify endpoint and webhook ingestion converge here, so races between
//! them resolve through the payment's status transitions: whichever path
//! applies `succeeded` first activates the subscription and issues the
//! invoice; the other sees a no-op.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::application::handlers::billing::IssueInvoiceHandler;
use crate::domain::billing::Invoice;
use crate::domain::foundation::BillingError;
use crate::domain::payment::{Payment, PaymentStatus, ProviderChargeState};
use crate::domain::subscription::{Subscription, SubscriptionStatus};
use crate::ports::{PaymentRepository, SubscriptionRepository};

/// What settlement did with the observed state.
#[derive(Debug)]
pub struct SettlementOutcome {
    pub payment: Payment,
    /// True when this call was the first to see the charge succeed.
    pub newly_succeeded: bool,
    /// Issued only on first success.
    pub invoice: Option<Invoice>,
}

pub struct SettleChargeHandler {
    payments: Arc<dyn PaymentRepository>,
    subscriptions: Arc<dyn SubscriptionRepository>,
    invoice_issuer: Arc<IssueInvoiceHandler>,
}

impl SettleChargeHandler {
    pub fn new(
        payments: Arc<dyn PaymentRepository>,
        subscriptions: Arc<dyn SubscriptionRepository>,
        invoice_issuer: Arc<IssueInvoiceHandler>,
    ) -> Self {
        Self {
            payments,
            subscriptions,
            invoice_issuer,
        }
    }

    pub async fn handle(
        &self,
        mut payment: Payment,
        state: ProviderChargeState,
        now: DateTime<Utc>,
    ) -> Result<SettlementOutcome, BillingError> {
        // 1. Map the provider state and apply the transition
        let status = PaymentStatus::from_provider(state);
        let before = payment.status;
        let newly_succeeded = payment.apply_status(status, now)?;

        if payment.status == before {
            return Ok(SettlementOutcome {
                payment,
                newly_succeeded: false,
                invoice: None,
            });
        }

        // 2. Commit the status; this is the idempotency point for retried
        //    deliveries of the same settlement
        self.payments.update(&payment).await?;

        if !newly_succeeded {
            return Ok(SettlementOutcome {
                payment,
                newly_succeeded: false,
                invoice: None,
            });
        }

        // 3. First success: grant or extend access
        self.apply_to_subscription(&payment, now).await?;

        // 4. Issue the invoice
        let invoice = self.invoice_issuer.handle(&payment, now).await?;

        Ok(SettlementOutcome {
            payment,
            newly_succeeded: true,
            invoice: Some(invoice),
        })
    }

    /// Activates, renews, or extends the user's subscription for a freshly
    /// succeeded payment.
    async fn apply_to_subscription(
        &self,
        payment: &Payment,
        now: DateTime<Utc>,
    ) -> Result<(), BillingError> {
        let existing = self.subscriptions.find_by_user(&payment.user_id).await?;

        let subscription = match existing {
            Some(mut sub) if payment.is_child() && sub.status == SubscriptionStatus::Active => {
                // Reconciled recurring charge: push the period forward from
                // where it ended. The gateway charges on its own schedule, so
                // a child can settle after the period lapsed; the extension
                // still anchors on the old end, never on the delivery time.
                sub.extend_period(now)?;
                tracing::info!(
                    user_id = %payment.user_id,
                    charge_id = %payment.charge_id,
                    period_end = %sub.current_period_end,
                    "subscription period extended by recurring charge"
                );
                sub
            }
            Some(mut sub) => {
                if payment.is_child() {
                    // A recurring charge for a canceled/expired row; treat
                    // it as a renewal so the user is not charged for nothing.
                    tracing::warn!(
                        user_id = %payment.user_id,
                        charge_id = %payment.charge_id,
                        status = %sub.status,
                        "recurring charge for inactive subscription, renewing"
                    );
                }
                sub.renew_from_payment(payment.plan, now);
                tracing::info!(
                    user_id = %payment.user_id,
                    charge_id = %payment.charge_id,
                    period_end = %sub.current_period_end,
                    "subscription renewed"
                );
                sub
            }
            None => {
                let sub = Subscription::activate(payment.user_id.clone(), payment.plan, now);
                tracing::info!(
                    user_id = %payment.user_id,
                    charge_id = %payment.charge_id,
                    plan = %payment.plan,
                    period_end = %sub.current_period_end,
                    "subscription activated"
                );
                sub
            }
        };

        self.subscriptions.upsert(&subscription).await
    }
}
