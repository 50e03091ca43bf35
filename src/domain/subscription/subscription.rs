//! Subscription aggregate — the authoritative billing state per user.
//!
//! Transitions are driven only by the webhook/verify path (activation,
//! period extension) or explicit administrative actions (cancel,
//! reactivate). `current_period_end` is monotonic: no operation ever moves
//! it backwards.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::foundation::{BillingError, UserId, ValidationError};
use crate::domain::payment::PlanId;

/// Subscription lifecycle status.
///
/// "Canceled pending expiry" is represented as `Active` with
/// `cancel_at_period_end = true`; access continues until the period ends.
/// The sweep that moves lapsed subscriptions to `Expired` runs outside
/// this engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Active,
    Canceled,
    Expired,
}

impl SubscriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::Canceled => "canceled",
            SubscriptionStatus::Expired => "expired",
        }
    }
}

impl fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for SubscriptionStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(SubscriptionStatus::Active),
            "canceled" => Ok(SubscriptionStatus::Canceled),
            "expired" => Ok(SubscriptionStatus::Expired),
            other => Err(ValidationError::invalid_format(
                "status",
                format!("unknown subscription status: {}", other),
            )),
        }
    }
}

/// One subscription per user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subscription {
    pub user_id: UserId,
    pub plan: PlanId,
    pub status: SubscriptionStatus,
    pub current_period_start: DateTime<Utc>,
    pub current_period_end: DateTime<Utc>,
    pub cancel_at_period_end: bool,
    pub canceled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Subscription {
    /// Activates a brand-new subscription from the first successful payment.
    ///
    /// Period runs `[now, now + plan interval]`.
    pub fn activate(user_id: UserId, plan: PlanId, now: DateTime<Utc>) -> Self {
        Self {
            user_id,
            plan,
            status: SubscriptionStatus::Active,
            current_period_start: now,
            current_period_end: now + Duration::days(plan.plan().interval.days()),
            cancel_at_period_end: false,
            canceled_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Re-activates an existing row on a fresh successful payment (e.g. the
    /// user bought again after expiry). Resets the period and clears any
    /// pending cancellation, but never moves `current_period_end` backwards.
    pub fn renew_from_payment(&mut self, plan: PlanId, now: DateTime<Utc>) {
        let new_end = now + Duration::days(plan.plan().interval.days());
        self.plan = plan;
        self.status = SubscriptionStatus::Active;
        self.current_period_start = now;
        self.current_period_end = self.current_period_end.max(new_end);
        self.cancel_at_period_end = false;
        self.canceled_at = None;
        self.updated_at = now;
    }

    /// Whether the subscription currently grants access.
    pub fn has_access(&self, now: DateTime<Utc>) -> bool {
        self.status == SubscriptionStatus::Active && now < self.current_period_end
    }

    /// Requests cancellation at period end.
    ///
    /// Returns `true` when the call changed state, `false` when the
    /// subscription was already pending cancellation (idempotent repeat).
    /// Status and `current_period_end` are untouched; access continues
    /// until the period lapses.
    pub fn cancel_at_end(&mut self, now: DateTime<Utc>) -> Result<bool, BillingError> {
        if self.status != SubscriptionStatus::Active {
            return Err(BillingError::SubscriptionNotActive {
                user_id: self.user_id.to_string(),
                status: self.status.to_string(),
            });
        }
        if self.cancel_at_period_end {
            return Ok(false);
        }
        self.cancel_at_period_end = true;
        self.canceled_at = Some(now);
        self.updated_at = now;
        Ok(true)
    }

    /// Undoes a pending cancellation before the period ends.
    ///
    /// Only clears our own flags. It does not re-establish a gateway-side
    /// recurrence that was already stopped; a stopped chain requires a new
    /// checkout.
    pub fn reactivate(&mut self, now: DateTime<Utc>) -> Result<(), BillingError> {
        if self.status != SubscriptionStatus::Active {
            return Err(BillingError::SubscriptionNotActive {
                user_id: self.user_id.to_string(),
                status: self.status.to_string(),
            });
        }
        if !self.cancel_at_period_end {
            return Err(BillingError::InvalidTransition(format!(
                "subscription for {} has no pending cancellation",
                self.user_id
            )));
        }
        self.cancel_at_period_end = false;
        self.canceled_at = None;
        self.updated_at = now;
        Ok(())
    }

    /// Extends the period after a reconciled recurring charge.
    ///
    /// The new period starts where the previous one ended and runs one plan
    /// interval. Rejected when the plan does not recur or the subscription
    /// is not active. Never shortens the period.
    pub fn extend_period(&mut self, now: DateTime<Utc>) -> Result<(), BillingError> {
        if !self.plan.plan().recurring {
            return Err(BillingError::PlanNotRecurring(self.plan.to_string()));
        }
        if self.status != SubscriptionStatus::Active {
            return Err(BillingError::SubscriptionNotActive {
                user_id: self.user_id.to_string(),
                status: self.status.to_string(),
            });
        }
        let previous_end = self.current_period_end;
        let new_end = previous_end + Duration::days(self.plan.plan().interval.days());
        self.current_period_start = previous_end;
        self.current_period_end = new_end;
        self.updated_at = now;
        Ok(())
    }
}
