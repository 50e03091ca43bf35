//! CounterAdminHandler - operator access to the invoice counters.
//!
//! Force-setting or deleting a counter can re-issue numbers already used
//! by stored invoices; callers are expected to have checked the invoice
//! table first. Every mutation is logged.

use std::sync::Arc;

use crate::domain::billing::BillingPeriod;
use crate::domain::foundation::BillingError;
use crate::ports::InvoiceSequence;

pub struct CounterAdminHandler {
    sequence: Arc<dyn InvoiceSequence>,
}

impl CounterAdminHandler {
    pub fn new(sequence: Arc<dyn InvoiceSequence>) -> Self {
        Self { sequence }
    }

    /// The last number issued in a period, if the counter exists.
    pub async fn current(&self, period: &BillingPeriod) -> Result<Option<u32>, BillingError> {
        self.sequence.current(period).await
    }

    /// Overwrites a period's counter so the next number is `last_number + 1`.
    pub async fn force_set(
        &self,
        period: &BillingPeriod,
        last_number: u32,
    ) -> Result<(), BillingError> {
        let previous = self.sequence.current(period).await?;
        self.sequence.force_set(period, last_number).await?;

        tracing::warn!(
            period = %period,
            previous = ?previous,
            last_number,
            "invoice counter force-set by operator"
        );
        Ok(())
    }

    /// Removes a period's counter entirely. Returns whether one existed.
    pub async fn delete(&self, period: &BillingPeriod) -> Result<bool, BillingError> {
        let existed = self.sequence.delete(period).await?;

        tracing::warn!(
            period = %period,
            existed,
            "invoice counter deleted by operator"
        );
        Ok(existed)
    }
}
