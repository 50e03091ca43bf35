//! ReactivateSubscriptionHandler - undoes a pending cancellation.
//!
//! Reactivation only clears our own flags; a recurring chain that was
//! already stopped at the gateway stays stopped, and continued access past
//! the paid period requires a fresh checkout.

use std::sync::Arc;

use chrono::Utc;

use crate::domain::foundation::{BillingError, UserId};
use crate::domain::subscription::Subscription;
use crate::ports::SubscriptionRepository;

#[derive(Debug, Clone)]
pub struct ReactivateSubscriptionCommand {
    pub user_id: UserId,
}

#[derive(Debug, Clone)]
pub struct ReactivateSubscriptionResult {
    pub subscription: Subscription,
}

pub struct ReactivateSubscriptionHandler {
    subscriptions: Arc<dyn SubscriptionRepository>,
}

impl ReactivateSubscriptionHandler {
    pub fn new(subscriptions: Arc<dyn SubscriptionRepository>) -> Self {
        Self { subscriptions }
    }

    pub async fn handle(
        &self,
        cmd: ReactivateSubscriptionCommand,
    ) -> Result<ReactivateSubscriptionResult, BillingError> {
        let now = Utc::now();

        let mut subscription = self
            .subscriptions
            .find_by_user(&cmd.user_id)
            .await?
            .ok_or_else(|| BillingError::SubscriptionNotActive {
                user_id: cmd.user_id.to_string(),
                status: "missing".to_string(),
            })?;

        subscription.reactivate(now)?;
        self.subscriptions.upsert(&subscription).await?;

        tracing::info!(
            user_id = %cmd.user_id,
            period_end = %subscription.current_period_end,
            "pending cancellation withdrawn"
        );

        Ok(ReactivateSubscriptionResult { subscription })
    }
}
