//! PostgreSQL implementation of InvoiceRepository.
//!
//! Line items and supplier details are stored as JSONB; they are read and
//! written whole with the invoice and never queried by column.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::billing::{Invoice, InvoiceNumber, InvoiceStatus, LineItem, SupplierInfo};
use crate::domain::foundation::{BillingError, Currency, InvoiceId, Money, PaymentId, UserId};
use crate::ports::InvoiceRepository;

/// PostgreSQL-backed invoice store.
pub struct PostgresInvoiceRepository {
    pool: PgPool,
}

impl PostgresInvoiceRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct InvoiceRow {
    id: Uuid,
    number: String,
    reference_code: String,
    status: String,
    user_id: String,
    customer_email: String,
    supplier: serde_json::Value,
    items: serde_json::Value,
    currency: String,
    subtotal_minor: i64,
    tax_minor: i64,
    total_minor: i64,
    issue_date: DateTime<Utc>,
    due_date: DateTime<Utc>,
    taxable_date: DateTime<Utc>,
    payment_id: Uuid,
}

impl TryFrom<InvoiceRow> for Invoice {
    type Error = BillingError;

    fn try_from(row: InvoiceRow) -> Result<Self, Self::Error> {
        let currency = Currency::parse(&row.currency).map_err(BillingError::database)?;
        let supplier: SupplierInfo =
            serde_json::from_value(row.supplier).map_err(BillingError::database)?;
        let items: Vec<LineItem> =
            serde_json::from_value(row.items).map_err(BillingError::database)?;

        Ok(Invoice {
            id: InvoiceId::from_uuid(row.id),
            number: row
                .number
                .parse::<InvoiceNumber>()
                .map_err(BillingError::database)?,
            reference_code: row.reference_code,
            status: parse_status(&row.status)?,
            user_id: UserId::new(row.user_id).map_err(BillingError::database)?,
            customer_email: row.customer_email,
            supplier,
            items,
            currency,
            subtotal: Money::new(row.subtotal_minor, currency).map_err(BillingError::database)?,
            tax_amount: Money::new(row.tax_minor, currency).map_err(BillingError::database)?,
            total: Money::new(row.total_minor, currency).map_err(BillingError::database)?,
            issue_date: row.issue_date,
            due_date: row.due_date,
            taxable_date: row.taxable_date,
            payment_id: PaymentId::from_uuid(row.payment_id),
        })
    }
}

fn parse_status(s: &str) -> Result<InvoiceStatus, BillingError> {
    match s {
        "issued" => Ok(InvoiceStatus::Issued),
        "paid" => Ok(InvoiceStatus::Paid),
        "refunded" => Ok(InvoiceStatus::Refunded),
        other => Err(BillingError::Database(format!(
            "invalid invoice status: {}",
            other
        ))),
    }
}

fn status_to_string(status: InvoiceStatus) -> &'static str {
    match status {
        InvoiceStatus::Issued => "issued",
        InvoiceStatus::Paid => "paid",
        InvoiceStatus::Refunded => "refunded",
    }
}

#[async_trait]
impl InvoiceRepository for PostgresInvoiceRepository {
    async fn insert(&self, invoice: &Invoice) -> Result<(), BillingError> {
        let supplier = serde_json::to_value(&invoice.supplier).map_err(BillingError::database)?;
        let items = serde_json::to_value(&invoice.items).map_err(BillingError::database)?;

        sqlx::query(
            r#"
            INSERT INTO invoices (
                id, number, reference_code, status, user_id, customer_email,
                supplier, items, currency, subtotal_minor, tax_minor, total_minor,
                issue_date, due_date, taxable_date, payment_id
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            "#,
        )
        .bind(invoice.id.as_uuid())
        .bind(invoice.number.to_string())
        .bind(&invoice.reference_code)
        .bind(status_to_string(invoice.status))
        .bind(invoice.user_id.as_str())
        .bind(&invoice.customer_email)
        .bind(supplier)
        .bind(items)
        .bind(invoice.currency.as_str())
        .bind(invoice.subtotal.minor)
        .bind(invoice.tax_amount.minor)
        .bind(invoice.total.minor)
        .bind(invoice.issue_date)
        .bind(invoice.due_date)
        .bind(invoice.taxable_date)
        .bind(invoice.payment_id.as_uuid())
        .execute(&self.pool)
        .await
        .map_err(BillingError::database)?;

        Ok(())
    }

    async fn find_by_number(
        &self,
        number: &InvoiceNumber,
    ) -> Result<Option<Invoice>, BillingError> {
        let row: Option<InvoiceRow> = sqlx::query_as(
            r#"
            SELECT id, number, reference_code, status, user_id, customer_email,
                   supplier, items, currency, subtotal_minor, tax_minor, total_minor,
                   issue_date, due_date, taxable_date, payment_id
            FROM invoices
            WHERE number = $1
            "#,
        )
        .bind(number.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(BillingError::database)?;

        row.map(Invoice::try_from).transpose()
    }

    async fn find_by_payment(
        &self,
        payment_id: &PaymentId,
    ) -> Result<Option<Invoice>, BillingError> {
        let row: Option<InvoiceRow> = sqlx::query_as(
            r#"
            SELECT id, number, reference_code, status, user_id, customer_email,
                   supplier, items, currency, subtotal_minor, tax_minor, total_minor,
                   issue_date, due_date, taxable_date, payment_id
            FROM invoices
            WHERE payment_id = $1
            "#,
        )
        .bind(payment_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(BillingError::database)?;

        row.map(Invoice::try_from).transpose()
    }

    async fn update(&self, invoice: &Invoice) -> Result<(), BillingError> {
        let result = sqlx::query("UPDATE invoices SET status = $2 WHERE number = $1")
            .bind(invoice.number.to_string())
            .bind(status_to_string(invoice.status))
            .execute(&self.pool)
            .await
            .map_err(BillingError::database)?;

        if result.rows_affected() == 0 {
            return Err(BillingError::Database(format!(
                "invoice {} does not exist",
                invoice.number
            )));
        }

        Ok(())
    }
}
