//! Ledger store ports.
//!
//! The ledger exclusively owns payments, subscriptions, and invoices.
//! Repositories expose insert-if-absent semantics where idempotency is
//! required; per-user serialization of subscription mutations is the
//! store's responsibility (row/document-level transactions).

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::billing::{Invoice, InvoiceNumber};
use crate::domain::foundation::{BillingError, ChargeId, PaymentId, UserId};
use crate::domain::payment::Payment;
use crate::domain::subscription::Subscription;

/// Result of an insert-if-absent write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveResult {
    /// The row was written; this caller won any race.
    Inserted,
    /// A row with the same key already existed; no write happened.
    AlreadyExists,
}

/// Persistent record of gateway transactions.
#[async_trait]
pub trait PaymentRepository: Send + Sync {
    /// Inserts a payment unless one with the same charge id exists.
    ///
    /// The charge id is the idempotency key: concurrent webhook deliveries
    /// race here and exactly one wins.
    async fn insert_if_absent(&self, payment: &Payment) -> Result<SaveResult, BillingError>;

    async fn find_by_charge_id(&self, charge_id: &ChargeId)
        -> Result<Option<Payment>, BillingError>;

    /// Persists status changes on an existing payment.
    async fn update(&self, payment: &Payment) -> Result<(), BillingError>;

    /// Most recent payment flagged as a recurrence parent for the user.
    async fn find_recurrence_parent(&self, user_id: &UserId)
        -> Result<Option<Payment>, BillingError>;

    /// Most recent recurring child payment for the user.
    async fn find_latest_child(&self, user_id: &UserId) -> Result<Option<Payment>, BillingError>;

    /// Most recent non-child payment for the user, regardless of flags.
    async fn find_latest_initial(&self, user_id: &UserId)
        -> Result<Option<Payment>, BillingError>;
}

/// Persistent record of per-user subscriptions.
#[async_trait]
pub trait SubscriptionRepository: Send + Sync {
    async fn find_by_user(&self, user_id: &UserId) -> Result<Option<Subscription>, BillingError>;

    /// Creates or replaces the user's subscription row atomically.
    async fn upsert(&self, subscription: &Subscription) -> Result<(), BillingError>;

    /// Atomically flips `cancel_at_period_end` on the user's active
    /// subscription, returning the flagged row.
    ///
    /// Returns `None` when the flip did not land: no subscription, not
    /// active, or a cancellation already pending. Concurrent callers race
    /// here and exactly one receives `Some`.
    async fn flag_cancellation(
        &self,
        user_id: &UserId,
        now: DateTime<Utc>,
    ) -> Result<Option<Subscription>, BillingError>;
}

/// Persistent record of issued invoices.
#[async_trait]
pub trait InvoiceRepository: Send + Sync {
    /// Stores a freshly issued invoice. Numbers are unique; a duplicate
    /// number is a programming error surfaced as `Database`.
    async fn insert(&self, invoice: &Invoice) -> Result<(), BillingError>;

    async fn find_by_number(
        &self,
        number: &InvoiceNumber,
    ) -> Result<Option<Invoice>, BillingError>;

    /// The invoice issued for a payment, if any.
    async fn find_by_payment(
        &self,
        payment_id: &PaymentId,
    ) -> Result<Option<Invoice>, BillingError>;

    async fn update(&self, invoice: &Invoice) -> Result<(), BillingError>;
}
