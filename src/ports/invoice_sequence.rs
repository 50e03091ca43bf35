//! Invoice sequence port — gap-free numbering per billing period.

use async_trait::async_trait;

use crate::domain::billing::BillingPeriod;
use crate::domain::foundation::BillingError;

/// Gap-free, monotonically increasing invoice sequence, scoped per period.
///
/// Contract: under N concurrent `next_number` calls for one period, the
/// returned values are exactly `{k+1, ..., k+N}` in some order, where `k`
/// was the previous last number. The read-increment-write must commit as a
/// single atomic unit; implementations that cannot commit within their
/// retry budget fail with [`BillingError::SequenceContention`] and no
/// number is considered issued.
#[async_trait]
pub trait InvoiceSequence: Send + Sync {
    /// Issues the next number for the period, creating the counter lazily
    /// at 1.
    async fn next_number(&self, period: &BillingPeriod) -> Result<u32, BillingError>;

    /// Current last issued number, or `None` when the counter does not
    /// exist yet.
    async fn current(&self, period: &BillingPeriod) -> Result<Option<u32>, BillingError>;

    /// Administrative override of a period's counter.
    ///
    /// The store does not verify the new value against already-issued
    /// invoice numbers; picking a value that would make the next issued
    /// number collide is an operator error. Call sites log loudly.
    async fn force_set(&self, period: &BillingPeriod, last_number: u32)
        -> Result<(), BillingError>;

    /// Deletes a period's counter. Returns whether a counter existed.
    async fn delete(&self, period: &BillingPeriod) -> Result<bool, BillingError>;
}
