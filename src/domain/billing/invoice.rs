//! Invoice entity.
//!
//! An invoice is immutable once created, except for its status. It is
//! created only after a payment has a committed invoice number; no invoice
//! may exist without one.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::InvoiceNumber;
use crate::domain::foundation::{
    BillingError, Currency, InvoiceId, Money, PaymentId, UserId, ValidationError,
};

/// Lifecycle status of an invoice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    Issued,
    Paid,
    Refunded,
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Issued => "issued",
            InvoiceStatus::Paid => "paid",
            InvoiceStatus::Refunded => "refunded",
        }
    }
}

/// One billed line on an invoice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub description: String,
    pub unit_price: Money,
    pub quantity: u32,
    /// Flat tax rate in percent (e.g. 21). Tax computation beyond the flat
    /// rate is out of scope.
    pub tax_rate_percent: u8,
}

impl LineItem {
    pub fn new(
        description: impl Into<String>,
        unit_price: Money,
        quantity: u32,
        tax_rate_percent: u8,
    ) -> Result<Self, ValidationError> {
        let description = description.into();
        if description.trim().is_empty() {
            return Err(ValidationError::empty_field("description"));
        }
        if quantity == 0 {
            return Err(ValidationError::out_of_range("quantity", 1, u32::MAX as i64, 0));
        }
        Ok(Self {
            description,
            unit_price,
            quantity,
            tax_rate_percent,
        })
    }

    /// Line subtotal before tax, in minor units.
    pub fn subtotal_minor(&self) -> i64 {
        self.unit_price.minor * self.quantity as i64
    }

    /// Tax amount for this line, in minor units (rounded down).
    pub fn tax_minor(&self) -> i64 {
        self.subtotal_minor() * self.tax_rate_percent as i64 / 100
    }
}

/// Supplier identity printed on every invoice. Loaded from configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupplierInfo {
    pub name: String,
    pub address: String,
    /// Company registration number.
    pub registration_number: String,
    /// VAT number; absent for non-VAT-registered suppliers.
    pub vat_number: Option<String>,
    pub bank_account: Option<String>,
    pub email: String,
}

/// A legally numbered billing document for one payment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invoice {
    pub id: InvoiceId,
    pub number: InvoiceNumber,
    /// Derived from `number` with the separator removed; persisted for
    /// reconciliation queries.
    pub reference_code: String,
    pub status: InvoiceStatus,

    pub user_id: UserId,
    pub customer_email: String,
    pub supplier: SupplierInfo,

    pub items: Vec<LineItem>,
    pub currency: Currency,
    pub subtotal: Money,
    pub tax_amount: Money,
    pub total: Money,

    pub issue_date: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    pub taxable_date: DateTime<Utc>,

    /// The originating payment in the ledger.
    pub payment_id: PaymentId,
}

impl Invoice {
    /// Assembles an invoice from its committed number and line items.
    ///
    /// Totals are computed from the items; all items must share the
    /// invoice currency.
    #[allow(clippy::too_many_arguments)]
    pub fn issue(
        number: InvoiceNumber,
        user_id: UserId,
        customer_email: String,
        supplier: SupplierInfo,
        items: Vec<LineItem>,
        payment_id: PaymentId,
        issued_at: DateTime<Utc>,
        due_days: i64,
    ) -> Result<Self, BillingError> {
        if items.is_empty() {
            return Err(ValidationError::empty_field("items").into());
        }
        let currency = items[0].unit_price.currency;
        if items.iter().any(|i| i.unit_price.currency != currency) {
            return Err(ValidationError::invalid_format(
                "items",
                "all line items must share the invoice currency",
            )
            .into());
        }

        let subtotal_minor: i64 = items.iter().map(LineItem::subtotal_minor).sum();
        let tax_minor: i64 = items.iter().map(LineItem::tax_minor).sum();

        Ok(Self {
            id: InvoiceId::new(),
            reference_code: number.reference_code(),
            number,
            status: InvoiceStatus::Paid,
            user_id,
            customer_email,
            supplier,
            items,
            currency,
            subtotal: Money::new(subtotal_minor, currency)?,
            tax_amount: Money::new(tax_minor, currency)?,
            total: Money::new(subtotal_minor + tax_minor, currency)?,
            issue_date: issued_at,
            due_date: issued_at + Duration::days(due_days),
            taxable_date: issued_at,
            payment_id,
        })
    }

    /// Marks the invoice refunded. Idempotent.
    pub fn mark_refunded(&mut self) {
        self.status = InvoiceStatus::Refunded;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::billing::BillingPeriod;
    use chrono::TimeZone;

    fn supplier() -> SupplierInfo {
        SupplierInfo {
            name: "Vowday s.r.o.".to_string(),
            address: "Krakovská 1, Praha".to_string(),
            registration_number: "12345678".to_string(),
            vat_number: None,
            bank_account: Some("123456789/0100".to_string()),
            email: "billing@vowday.example".to_string(),
        }
    }

    fn number() -> InvoiceNumber {
        let period: BillingPeriod = "202511".parse().unwrap();
        InvoiceNumber::new(period, 3).unwrap()
    }

    #[test]
    fn totals_are_computed_from_items() {
        let items = vec![
            LineItem::new("Premium monthly", Money::czk(29900), 1, 21).unwrap(),
        ];
        let invoice = Invoice::issue(
            number(),
            UserId::new("u1").unwrap(),
            "couple@example.com".to_string(),
            supplier(),
            items,
            PaymentId::new(),
            Utc.with_ymd_and_hms(2025, 11, 5, 12, 0, 0).unwrap(),
            14,
        )
        .unwrap();

        assert_eq!(invoice.subtotal.minor, 29900);
        assert_eq!(invoice.tax_amount.minor, 6279);
        assert_eq!(invoice.total.minor, 36179);
        assert_eq!(invoice.reference_code, "202511003");
    }

    #[test]
    fn due_date_follows_issue_date() {
        let issued = Utc.with_ymd_and_hms(2025, 11, 5, 12, 0, 0).unwrap();
        let invoice = Invoice::issue(
            number(),
            UserId::new("u1").unwrap(),
            "couple@example.com".to_string(),
            supplier(),
            vec![LineItem::new("Premium monthly", Money::czk(29900), 1, 0).unwrap()],
            PaymentId::new(),
            issued,
            14,
        )
        .unwrap();

        assert_eq!(invoice.due_date - invoice.issue_date, Duration::days(14));
        assert_eq!(invoice.taxable_date, issued);
    }

    #[test]
    fn rejects_empty_item_list() {
        let result = Invoice::issue(
            number(),
            UserId::new("u1").unwrap(),
            "couple@example.com".to_string(),
            supplier(),
            vec![],
            PaymentId::new(),
            Utc::now(),
            14,
        );
        assert!(result.is_err());
    }

    #[test]
    fn rejects_mixed_currencies() {
        let items = vec![
            LineItem::new("A", Money::czk(100), 1, 0).unwrap(),
            LineItem::new("B", Money::new(100, Currency::Eur).unwrap(), 1, 0).unwrap(),
        ];
        let result = Invoice::issue(
            number(),
            UserId::new("u1").unwrap(),
            "couple@example.com".to_string(),
            supplier(),
            items,
            PaymentId::new(),
            Utc::now(),
            14,
        );
        assert!(result.is_err());
    }

    #[test]
    fn line_item_rejects_zero_quantity() {
        assert!(LineItem::new("x", Money::czk(100), 0, 21).is_err());
    }
}
