//! IssueInvoiceHandler - issues the invoice for a settled payment.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::domain::billing::{BillingPeriod, Invoice, InvoiceNumber, LineItem, SupplierInfo};
use crate::domain::foundation::BillingError;
use crate::domain::payment::Payment;
use crate::ports::{InvoiceRepository, InvoiceSequence};

/// Handler that allocates the next sequence number and stores the invoice.
///
/// Number allocation and the invoice write are ordered so a stored invoice
/// always carries the number that was allocated for it; a failed write
/// surfaces as an error and the delivery is retried end to end. Contention
/// on the period counter surfaces as `SequenceContention` and aborts
/// issuance without consuming a number.
pub struct IssueInvoiceHandler {
    sequence: Arc<dyn InvoiceSequence>,
    invoices: Arc<dyn InvoiceRepository>,
    supplier: SupplierInfo,
    tax_rate_percent: u8,
    due_days: i64,
}

impl IssueInvoiceHandler {
    pub fn new(
        sequence: Arc<dyn InvoiceSequence>,
        invoices: Arc<dyn InvoiceRepository>,
        supplier: SupplierInfo,
        tax_rate_percent: u8,
        due_days: i64,
    ) -> Self {
        Self {
            sequence,
            invoices,
            supplier,
            tax_rate_percent,
            due_days,
        }
    }

    /// Issues an invoice for a payment that has just settled.
    pub async fn handle(
        &self,
        payment: &Payment,
        now: DateTime<Utc>,
    ) -> Result<Invoice, BillingError> {
        // 1. Allocate the next number in the payment's period
        let period = BillingPeriod::containing(now);
        let sequence = self.sequence.next_number(&period).await?;
        let number = InvoiceNumber::new(period, sequence)?;

        // 2. Build the single line item from the purchased plan
        let plan = payment.plan.plan();
        let item = LineItem::new(plan.name, payment.amount, 1, self.tax_rate_percent)?;

        // 3. Assemble and store
        let invoice = Invoice::issue(
            number,
            payment.user_id.clone(),
            payment.user_email.clone(),
            self.supplier.clone(),
            vec![item],
            payment.id,
            now,
            self.due_days,
        )?;

        self.invoices.insert(&invoice).await?;

        tracing::info!(
            invoice_number = %invoice.number,
            reference_code = %invoice.reference_code,
            charge_id = %payment.charge_id,
            "invoice issued"
        );

        Ok(invoice)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::{InMemoryInvoiceRepository, InMemoryInvoiceSequence};
    use crate::domain::foundation::{ChargeId, UserId};
    use crate::domain::payment::{GatewayKind, PlanId};

    fn supplier() -> SupplierInfo {
        SupplierInfo {
            name: "VowDay s.r.o.".into(),
            address: "Praha 1".into(),
            registration_number: "12345678".into(),
            vat_number: Some("CZ12345678".into()),
            bank_account: Some("123456789/0100".into()),
            email: "billing@vowday.cz".into(),
        }
    }

    fn handler() -> (IssueInvoiceHandler, Arc<InMemoryInvoiceRepository>) {
        let invoices = Arc::new(InMemoryInvoiceRepository::new());
        let handler = IssueInvoiceHandler::new(
            Arc::new(InMemoryInvoiceSequence::new()),
            invoices.clone(),
            supplier(),
            21,
            14,
        );
        (handler, invoices)
    }

    fn payment() -> Payment {
        Payment::initial(
            UserId::new("user-1").unwrap(),
            "bride@example.com".into(),
            PlanId::PremiumMonthly,
            GatewayKind::Redirect,
            ChargeId::new("3211234567").unwrap(),
            Utc::now(),
        )
    }

    #[tokio::test]
    async fn issues_sequential_numbers_within_a_period() {
        let (handler, invoices) = handler();
        let now = Utc::now();

        let first = handler.handle(&payment(), now).await.unwrap();
        let second = handler.handle(&payment(), now).await.unwrap();

        assert_eq!(first.number.sequence() + 1, second.number.sequence());
        assert_eq!(first.number.period(), second.number.period());
        assert_eq!(invoices.count().await, 2);
    }

    #[tokio::test]
    async fn invoice_carries_plan_price_and_supplier() {
        let (handler, _) = handler();
        let p = payment();

        let invoice = handler.handle(&p, Utc::now()).await.unwrap();

        assert_eq!(invoice.items.len(), 1);
        assert_eq!(invoice.items[0].unit_price, p.amount);
        assert_eq!(invoice.supplier.name, "VowDay s.r.o.");
        assert_eq!(invoice.payment_id, p.id);
        assert_eq!(invoice.reference_code, invoice.number.reference_code());
    }
}
