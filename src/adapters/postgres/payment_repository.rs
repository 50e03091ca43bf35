//! PostgreSQL implementation of PaymentRepository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::foundation::{BillingError, ChargeId, Currency, Money, PaymentId, UserId};
use crate::domain::payment::{GatewayKind, Payment, PaymentStatus, PlanId};
use crate::ports::{PaymentRepository, SaveResult};

/// PostgreSQL-backed payment ledger.
pub struct PostgresPaymentRepository {
    pool: PgPool,
}

impl PostgresPaymentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Database row representation of a payment.
#[derive(Debug, sqlx::FromRow)]
struct PaymentRow {
    id: Uuid,
    user_id: String,
    user_email: String,
    plan: String,
    amount_minor: i64,
    currency: String,
    gateway: String,
    charge_id: String,
    status: String,
    has_recurrence: bool,
    parent_charge_id: Option<String>,
    created_at: DateTime<Utc>,
    paid_at: Option<DateTime<Utc>>,
}

impl TryFrom<PaymentRow> for Payment {
    type Error = BillingError;

    fn try_from(row: PaymentRow) -> Result<Self, Self::Error> {
        let currency = Currency::parse(&row.currency).map_err(BillingError::database)?;
        let amount = Money::new(row.amount_minor, currency).map_err(BillingError::database)?;
        let parent_charge_id = row
            .parent_charge_id
            .map(ChargeId::new)
            .transpose()
            .map_err(BillingError::database)?;

        Ok(Payment {
            id: PaymentId::from_uuid(row.id),
            user_id: UserId::new(row.user_id).map_err(BillingError::database)?,
            user_email: row.user_email,
            plan: row.plan.parse::<PlanId>().map_err(BillingError::database)?,
            amount,
            gateway: row
                .gateway
                .parse::<GatewayKind>()
                .map_err(BillingError::database)?,
            charge_id: ChargeId::new(row.charge_id).map_err(BillingError::database)?,
            status: parse_status(&row.status)?,
            has_recurrence: row.has_recurrence,
            parent_charge_id,
            created_at: row.created_at,
            paid_at: row.paid_at,
        })
    }
}

fn parse_status(s: &str) -> Result<PaymentStatus, BillingError> {
    match s {
        "pending" => Ok(PaymentStatus::Pending),
        "succeeded" => Ok(PaymentStatus::Succeeded),
        "canceled" => Ok(PaymentStatus::Canceled),
        "expired" => Ok(PaymentStatus::Expired),
        "refunded" => Ok(PaymentStatus::Refunded),
        other => Err(BillingError::Database(format!(
            "invalid payment status: {}",
            other
        ))),
    }
}

fn status_to_string(status: PaymentStatus) -> &'static str {
    match status {
        PaymentStatus::Pending => "pending",
        PaymentStatus::Succeeded => "succeeded",
        PaymentStatus::Canceled => "canceled",
        PaymentStatus::Expired => "expired",
        PaymentStatus::Refunded => "refunded",
    }
}

const SELECT_COLUMNS: &str = r#"
    SELECT id, user_id, user_email, plan, amount_minor, currency, gateway,
           charge_id, status, has_recurrence, parent_charge_id, created_at, paid_at
    FROM payments
"#;

#[async_trait]
impl PaymentRepository for PostgresPaymentRepository {
    async fn insert_if_absent(&self, payment: &Payment) -> Result<SaveResult, BillingError> {
        let result = sqlx::query(
            r#"
            INSERT INTO payments (
                id, user_id, user_email, plan, amount_minor, currency, gateway,
                charge_id, status, has_recurrence, parent_charge_id, created_at, paid_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            ON CONFLICT (charge_id) DO NOTHING
            "#,
        )
        .bind(payment.id.as_uuid())
        .bind(payment.user_id.as_str())
        .bind(&payment.user_email)
        .bind(payment.plan.as_str())
        .bind(payment.amount.minor)
        .bind(payment.amount.currency.as_str())
        .bind(payment.gateway.as_str())
        .bind(payment.charge_id.as_str())
        .bind(status_to_string(payment.status))
        .bind(payment.has_recurrence)
        .bind(payment.parent_charge_id.as_ref().map(|c| c.as_str()))
        .bind(payment.created_at)
        .bind(payment.paid_at)
        .execute(&self.pool)
        .await
        .map_err(BillingError::database)?;

        if result.rows_affected() == 0 {
            Ok(SaveResult::AlreadyExists)
        } else {
            Ok(SaveResult::Inserted)
        }
    }

    async fn find_by_charge_id(
        &self,
        charge_id: &ChargeId,
    ) -> Result<Option<Payment>, BillingError> {
        let row: Option<PaymentRow> =
            sqlx::query_as(&format!("{} WHERE charge_id = $1", SELECT_COLUMNS))
                .bind(charge_id.as_str())
                .fetch_optional(&self.pool)
                .await
                .map_err(BillingError::database)?;

        row.map(Payment::try_from).transpose()
    }

    async fn update(&self, payment: &Payment) -> Result<(), BillingError> {
        let result = sqlx::query(
            r#"
            UPDATE payments SET
                status = $2,
                has_recurrence = $3,
                paid_at = $4
            WHERE charge_id = $1
            "#,
        )
        .bind(payment.charge_id.as_str())
        .bind(status_to_string(payment.status))
        .bind(payment.has_recurrence)
        .bind(payment.paid_at)
        .execute(&self.pool)
        .await
        .map_err(BillingError::database)?;

        if result.rows_affected() == 0 {
            return Err(BillingError::PaymentNotFound {
                charge_id: payment.charge_id.to_string(),
            });
        }

        Ok(())
    }

    async fn find_recurrence_parent(
        &self,
        user_id: &UserId,
    ) -> Result<Option<Payment>, BillingError> {
        let row: Option<PaymentRow> = sqlx::query_as(&format!(
            r#"{}
            WHERE user_id = $1 AND has_recurrence = TRUE AND parent_charge_id IS NULL
            ORDER BY created_at DESC
            LIMIT 1"#,
            SELECT_COLUMNS
        ))
        .bind(user_id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(BillingError::database)?;

        row.map(Payment::try_from).transpose()
    }

    async fn find_latest_child(&self, user_id: &UserId) -> Result<Option<Payment>, BillingError> {
        let row: Option<PaymentRow> = sqlx::query_as(&format!(
            r#"{}
            WHERE user_id = $1 AND parent_charge_id IS NOT NULL
            ORDER BY created_at DESC
            LIMIT 1"#,
            SELECT_COLUMNS
        ))
        .bind(user_id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(BillingError::database)?;

        row.map(Payment::try_from).transpose()
    }

    async fn find_latest_initial(
        &self,
        user_id: &UserId,
    ) -> Result<Option<Payment>, BillingError> {
        let row: Option<PaymentRow> = sqlx::query_as(&format!(
            r#"{}
            WHERE user_id = $1 AND parent_charge_id IS NULL
            ORDER BY created_at DESC
            LIMIT 1"#,
            SELECT_COLUMNS
        ))
        .bind(user_id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(BillingError::database)?;

        row.map(Payment::try_from).transpose()
    }
}
