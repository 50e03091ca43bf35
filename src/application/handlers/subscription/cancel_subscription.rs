//! CancelSubscriptionHandler - cancels at period end and stops recurrence.
//!
//! The ledger is the source of truth for access. Stopping the gateway-side
//! recurring chain is attempted but never allowed to block the
//! cancellation: a user who asked to cancel is canceled even when the
//! gateway is down, and a stray recurring charge that slips through is
//! absorbed by reconciliation extending the period the user then keeps.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::domain::foundation::{BillingError, UserId};
use crate::domain::payment::Payment;
use crate::domain::subscription::{Subscription, SubscriptionStatus};
use crate::ports::{GatewayRouter, PaymentRepository, SubscriptionRepository};

#[derive(Debug, Clone)]
pub struct CancelSubscriptionCommand {
    pub user_id: UserId,
}

#[derive(Debug, Clone)]
pub struct CancelSubscriptionResult {
    pub subscription: Subscription,
    /// True when this call found a cancellation already pending.
    pub already_pending: bool,
    /// Whether the gateway confirmed the recurring chain is stopped.
    pub recurrence_stopped: bool,
    /// When access ends.
    pub effective_at: DateTime<Utc>,
}

pub struct CancelSubscriptionHandler {
    subscriptions: Arc<dyn SubscriptionRepository>,
    payments: Arc<dyn PaymentRepository>,
    router: GatewayRouter,
}

impl CancelSubscriptionHandler {
    pub fn new(
        subscriptions: Arc<dyn SubscriptionRepository>,
        payments: Arc<dyn PaymentRepository>,
        router: GatewayRouter,
    ) -> Self {
        Self {
            subscriptions,
            payments,
            router,
        }
    }

    pub async fn handle(
        &self,
        cmd: CancelSubscriptionCommand,
    ) -> Result<CancelSubscriptionResult, BillingError> {
        let now = Utc::now();

        // 1. Atomically flag the subscription. Rivals race on the store's
        //    compare-and-set; only the caller whose flip lands goes on to
        //    the gateway.
        let Some(subscription) = self.subscriptions.flag_cancellation(&cmd.user_id, now).await?
        else {
            return self.resolve_unflagged(&cmd.user_id).await;
        };
        let effective_at = subscription.current_period_end;

        // 2. Best-effort stop of the gateway-side recurring chain. The
        //    flag is already persisted; a gateway failure never undoes it.
        let recurrence_stopped = match self.find_recurrence_parent(&cmd.user_id).await? {
            Some(parent) => self.stop_recurrence(parent).await,
            None => {
                tracing::info!(
                    user_id = %cmd.user_id,
                    "no recurring parent payment, nothing to stop at gateway"
                );
                false
            }
        };

        tracing::info!(
            user_id = %cmd.user_id,
            effective_at = %effective_at,
            recurrence_stopped,
            "subscription canceled at period end"
        );

        Ok(CancelSubscriptionResult {
            subscription,
            already_pending: false,
            recurrence_stopped,
            effective_at,
        })
    }

    /// A flip that did not land means the subscription is missing, not
    /// active, or already pending; re-read to tell them apart.
    async fn resolve_unflagged(
        &self,
        user_id: &UserId,
    ) -> Result<CancelSubscriptionResult, BillingError> {
        let subscription = self
            .subscriptions
            .find_by_user(user_id)
            .await?
            .ok_or_else(|| BillingError::SubscriptionNotActive {
                user_id: user_id.to_string(),
                status: "missing".to_string(),
            })?;

        if subscription.status != SubscriptionStatus::Active {
            return Err(BillingError::SubscriptionNotActive {
                user_id: user_id.to_string(),
                status: subscription.status.to_string(),
            });
        }

        tracing::info!(user_id = %user_id, "cancellation already pending");
        let effective_at = subscription.current_period_end;
        Ok(CancelSubscriptionResult {
            subscription,
            already_pending: true,
            recurrence_stopped: false,
            effective_at,
        })
    }

    /// Locates the payment whose recurrence must be voided.
    ///
    /// Older ledgers predate the recurrence flag, so the search falls back
    /// twice: from the flagged parent, to the parent of the latest child,
    /// to the latest initial payment on a recurring plan.
    async fn find_recurrence_parent(
        &self,
        user_id: &UserId,
    ) -> Result<Option<Payment>, BillingError> {
        if let Some(parent) = self.payments.find_recurrence_parent(user_id).await? {
            tracing::debug!(
                user_id = %user_id,
                charge_id = %parent.charge_id,
                strategy = "flagged_parent",
                "recurrence parent located"
            );
            return Ok(Some(parent));
        }

        if let Some(child) = self.payments.find_latest_child(user_id).await? {
            if let Some(parent_charge_id) = &child.parent_charge_id {
                if let Some(parent) = self.payments.find_by_charge_id(parent_charge_id).await? {
                    tracing::debug!(
                        user_id = %user_id,
                        charge_id = %parent.charge_id,
                        strategy = "parent_of_latest_child",
                        "recurrence parent located"
                    );
                    return Ok(Some(parent));
                }
            }
        }

        if let Some(initial) = self.payments.find_latest_initial(user_id).await? {
            if initial.plan.plan().recurring {
                tracing::debug!(
                    user_id = %user_id,
                    charge_id = %initial.charge_id,
                    strategy = "latest_initial",
                    "recurrence parent located"
                );
                return Ok(Some(initial));
            }
        }

        Ok(None)
    }

    /// Voids the recurrence at the gateway. Failures are logged, never
    /// propagated.
    async fn stop_recurrence(&self, mut parent: Payment) -> bool {
        let gateway = match self.router.for_kind(parent.gateway) {
            Ok(gateway) => gateway,
            Err(err) => {
                tracing::error!(
                    charge_id = %parent.charge_id,
                    error = %err,
                    "no adapter for recurrence parent's gateway"
                );
                return false;
            }
        };

        match gateway.cancel_recurrence(&parent.charge_id).await {
            Ok(()) => {
                parent.has_recurrence = false;
                if let Err(err) = self.payments.update(&parent).await {
                    tracing::error!(
                        charge_id = %parent.charge_id,
                        error = %err,
                        "recurrence stopped at gateway but flag update failed"
                    );
                }
                true
            }
            Err(err) => {
                tracing::warn!(
                    charge_id = %parent.charge_id,
                    error = %err,
                    "failed to stop recurrence at gateway, canceling locally anyway"
                );
                false
            }
        }
    }
}
