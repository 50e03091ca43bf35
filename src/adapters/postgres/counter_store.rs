//! PostgreSQL implementation of the invoice sequence.
//!
//! One row per billing period in `invoice_counters`. Allocation runs a
//! serializable read-increment-write transaction; Postgres aborts one side
//! of any conflicting pair with SQLSTATE 40001, which we retry a bounded
//! number of times before surfacing `SequenceContention`. The allocated
//! number is only observable once the surrounding invoice write commits,
//! which keeps the sequence gap-free.

use async_trait::async_trait;
use sqlx::PgPool;

use crate::domain::billing::{BillingPeriod, MAX_SEQUENCE};
use crate::domain::foundation::BillingError;
use crate::ports::InvoiceSequence;

/// SQLSTATE for serialization_failure.
const SERIALIZATION_FAILURE: &str = "40001";

/// Retries before giving up on a contended period.
const MAX_TXN_ATTEMPTS: u32 = 5;

/// PostgreSQL-backed per-period counters.
pub struct PostgresInvoiceSequence {
    pool: PgPool,
}

impl PostgresInvoiceSequence {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Allocates the next number, or `None` when the period is exhausted.
    /// Exhaustion must not burn the counter, so the cap is checked before
    /// anything is written.
    async fn try_next(&self, period: &BillingPeriod) -> Result<Option<u32>, sqlx::Error> {
        let mut txn = self.pool.begin().await?;

        sqlx::query("SET TRANSACTION ISOLATION LEVEL SERIALIZABLE")
            .execute(&mut *txn)
            .await?;

        let current: Option<(i32,)> =
            sqlx::query_as("SELECT last_number FROM invoice_counters WHERE period = $1")
                .bind(period.key())
                .fetch_optional(&mut *txn)
                .await?;

        let next = match current {
            Some((last,)) => last + 1,
            None => 1,
        };

        if next > MAX_SEQUENCE as i32 {
            txn.rollback().await?;
            return Ok(None);
        }

        sqlx::query(
            r#"
            INSERT INTO invoice_counters (period, last_number)
            VALUES ($1, $2)
            ON CONFLICT (period) DO UPDATE SET last_number = $2
            "#,
        )
        .bind(period.key())
        .bind(next)
        .execute(&mut *txn)
        .await?;

        txn.commit().await?;
        Ok(Some(next as u32))
    }
}

fn is_serialization_failure(err: &sqlx::Error) -> bool {
    if let sqlx::Error::Database(db_err) = err {
        return db_err.code().as_deref() == Some(SERIALIZATION_FAILURE);
    }
    false
}

#[async_trait]
impl InvoiceSequence for PostgresInvoiceSequence {
    async fn next_number(&self, period: &BillingPeriod) -> Result<u32, BillingError> {
        for attempt in 1..=MAX_TXN_ATTEMPTS {
            match self.try_next(period).await {
                Ok(Some(next)) => return Ok(next),
                Ok(None) => {
                    return Err(BillingError::Database(format!(
                        "invoice sequence exhausted for period {}",
                        period
                    )))
                }
                Err(err) if is_serialization_failure(&err) => {
                    tracing::debug!(
                        period = %period,
                        attempt,
                        "serialization failure allocating invoice number, retrying"
                    );
                }
                Err(err) => return Err(BillingError::database(err)),
            }
        }

        Err(BillingError::SequenceContention {
            period: period.key(),
            attempts: MAX_TXN_ATTEMPTS,
        })
    }

    async fn current(&self, period: &BillingPeriod) -> Result<Option<u32>, BillingError> {
        let row: Option<(i32,)> =
            sqlx::query_as("SELECT last_number FROM invoice_counters WHERE period = $1")
                .bind(period.key())
                .fetch_optional(&self.pool)
                .await
                .map_err(BillingError::database)?;

        Ok(row.map(|(last,)| last as u32))
    }

    async fn force_set(
        &self,
        period: &BillingPeriod,
        last_number: u32,
    ) -> Result<(), BillingError> {
        sqlx::query(
            r#"
            INSERT INTO invoice_counters (period, last_number)
            VALUES ($1, $2)
            ON CONFLICT (period) DO UPDATE SET last_number = $2
            "#,
        )
        .bind(period.key())
        .bind(last_number as i32)
        .execute(&self.pool)
        .await
        .map_err(BillingError::database)?;

        Ok(())
    }

    async fn delete(&self, period: &BillingPeriod) -> Result<bool, BillingError> {
        let result = sqlx::query("DELETE FROM invoice_counters WHERE period = $1")
            .bind(period.key())
            .execute(&self.pool)
            .await
            .map_err(BillingError::database)?;

        Ok(result.rows_affected() > 0)
    }
}
