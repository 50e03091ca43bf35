//! PostgreSQL implementation of SubscriptionRepository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::domain::foundation::{BillingError, UserId};
use crate::domain::payment::PlanId;
use crate::domain::subscription::{Subscription, SubscriptionStatus};
use crate::ports::SubscriptionRepository;

/// PostgreSQL-backed subscription store. One row per user.
pub struct PostgresSubscriptionRepository {
    pool: PgPool,
}

impl PostgresSubscriptionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct SubscriptionRow {
    user_id: String,
    plan: String,
    status: String,
    current_period_start: DateTime<Utc>,
    current_period_end: DateTime<Utc>,
    cancel_at_period_end: bool,
    canceled_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<SubscriptionRow> for Subscription {
    type Error = BillingError;

    fn try_from(row: SubscriptionRow) -> Result<Self, Self::Error> {
        Ok(Subscription {
            user_id: UserId::new(row.user_id).map_err(BillingError::database)?,
            plan: row.plan.parse::<PlanId>().map_err(BillingError::database)?,
            status: parse_status(&row.status)?,
            current_period_start: row.current_period_start,
            current_period_end: row.current_period_end,
            cancel_at_period_end: row.cancel_at_period_end,
            canceled_at: row.canceled_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn parse_status(s: &str) -> Result<SubscriptionStatus, BillingError> {
    match s {
        "active" => Ok(SubscriptionStatus::Active),
        "canceled" => Ok(SubscriptionStatus::Canceled),
        "expired" => Ok(SubscriptionStatus::Expired),
        other => Err(BillingError::Database(format!(
            "invalid subscription status: {}",
            other
        ))),
    }
}

fn status_to_string(status: SubscriptionStatus) -> &'static str {
    match status {
        SubscriptionStatus::Active => "active",
        SubscriptionStatus::Canceled => "canceled",
        SubscriptionStatus::Expired => "expired",
    }
}

#[async_trait]
impl SubscriptionRepository for PostgresSubscriptionRepository {
    async fn find_by_user(&self, user_id: &UserId) -> Result<Option<Subscription>, BillingError> {
        let row: Option<SubscriptionRow> = sqlx::query_as(
            r#"
            SELECT user_id, plan, status, current_period_start, current_period_end,
                   cancel_at_period_end, canceled_at, created_at, updated_at
            FROM subscriptions
            WHERE user_id = $1
            "#,
        )
        .bind(user_id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(BillingError::database)?;

        row.map(Subscription::try_from).transpose()
    }

    async fn upsert(&self, subscription: &Subscription) -> Result<(), BillingError> {
        sqlx::query(
            r#"
            INSERT INTO subscriptions (
                user_id, plan, status, current_period_start, current_period_end,
                cancel_at_period_end, canceled_at, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (user_id) DO UPDATE SET
                plan = EXCLUDED.plan,
                status = EXCLUDED.status,
                current_period_start = EXCLUDED.current_period_start,
                current_period_end = EXCLUDED.current_period_end,
                cancel_at_period_end = EXCLUDED.cancel_at_period_end,
                canceled_at = EXCLUDED.canceled_at,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(subscription.user_id.as_str())
        .bind(subscription.plan.as_str())
        .bind(status_to_string(subscription.status))
        .bind(subscription.current_period_start)
        .bind(subscription.current_period_end)
        .bind(subscription.cancel_at_period_end)
        .bind(subscription.canceled_at)
        .bind(subscription.created_at)
        .bind(subscription.updated_at)
        .execute(&self.pool)
        .await
        .map_err(BillingError::database)?;

        Ok(())
    }

    async fn flag_cancellation(
        &self,
        user_id: &UserId,
        now: DateTime<Utc>,
    ) -> Result<Option<Subscription>, BillingError> {
        // Conditional update: the WHERE clause makes the flip a
        // compare-and-set, so concurrent cancels land exactly once.
        let row: Option<SubscriptionRow> = sqlx::query_as(
            r#"
            UPDATE subscriptions
            SET cancel_at_period_end = TRUE,
                canceled_at = $2,
                updated_at = $2
            WHERE user_id = $1
              AND status = 'active'
              AND cancel_at_period_end = FALSE
            RETURNING user_id, plan, status, current_period_start, current_period_end,
                      cancel_at_period_end, canceled_at, created_at, updated_at
            "#,
        )
        .bind(user_id.as_str())
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(BillingError::database)?;

        row.map(Subscription::try_from).transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_roundtrip() {
        for status in [
            SubscriptionStatus::Active,
            SubscriptionStatus::Canceled,
            SubscriptionStatus::Expired,
        ] {
            assert_eq!(parse_status(status_to_string(status)).unwrap(), status);
        }
    }

    #[test]
    fn parse_status_rejects_unknown_values() {
        assert!(parse_status("paused").is_err());
    }
}
