//! In-Memory Ledger Adapters
//!
//! HashMap-backed implementations of the ledger repositories for
//! development and tests. Write paths take the map's write lock for the
//! whole check-then-insert, so insert-if-absent races resolve to exactly
//! one `Inserted`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::billing::{Invoice, InvoiceNumber};
use crate::domain::foundation::{BillingError, ChargeId, PaymentId, UserId};
use crate::domain::payment::Payment;
use crate::domain::subscription::Subscription;
use crate::ports::{
    InvoiceRepository, PaymentRepository, SaveResult, SubscriptionRepository,
};

/// Payments keyed by charge id.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPaymentRepository {
    payments: Arc<RwLock<HashMap<ChargeId, Payment>>>,
}

impl InMemoryPaymentRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// All payments for a user, newest first.
    async fn user_payments(&self, user_id: &UserId) -> Vec<Payment> {
        let payments = self.payments.read().await;
        let mut found: Vec<Payment> = payments
            .values()
            .filter(|p| &p.user_id == user_id)
            .cloned()
            .collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        found
    }
}

#[async_trait]
impl PaymentRepository for InMemoryPaymentRepository {
    async fn insert_if_absent(&self, payment: &Payment) -> Result<SaveResult, BillingError> {
        let mut payments = self.payments.write().await;
        if payments.contains_key(&payment.charge_id) {
            return Ok(SaveResult::AlreadyExists);
        }
        payments.insert(payment.charge_id.clone(), payment.clone());
        Ok(SaveResult::Inserted)
    }

    async fn find_by_charge_id(
        &self,
        charge_id: &ChargeId,
    ) -> Result<Option<Payment>, BillingError> {
        let payments = self.payments.read().await;
        Ok(payments.get(charge_id).cloned())
    }

    async fn update(&self, payment: &Payment) -> Result<(), BillingError> {
        let mut payments = self.payments.write().await;
        if !payments.contains_key(&payment.charge_id) {
            return Err(BillingError::PaymentNotFound {
                charge_id: payment.charge_id.to_string(),
            });
        }
        payments.insert(payment.charge_id.clone(), payment.clone());
        Ok(())
    }

    async fn find_recurrence_parent(
        &self,
        user_id: &UserId,
    ) -> Result<Option<Payment>, BillingError> {
        Ok(self
            .user_payments(user_id)
            .await
            .into_iter()
            .find(|p| p.has_recurrence && !p.is_child()))
    }

    async fn find_latest_child(&self, user_id: &UserId) -> Result<Option<Payment>, BillingError> {
        Ok(self
            .user_payments(user_id)
            .await
            .into_iter()
            .find(|p| p.is_child()))
    }

    async fn find_latest_initial(
        &self,
        user_id: &UserId,
    ) -> Result<Option<Payment>, BillingError> {
        Ok(self
            .user_payments(user_id)
            .await
            .into_iter()
            .find(|p| !p.is_child()))
    }
}

/// One subscription row per user.
#[derive(Debug, Clone, Default)]
pub struct InMemorySubscriptionRepository {
    subscriptions: Arc<RwLock<HashMap<UserId, Subscription>>>,
}

impl InMemorySubscriptionRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SubscriptionRepository for InMemorySubscriptionRepository {
    async fn find_by_user(&self, user_id: &UserId) -> Result<Option<Subscription>, BillingError> {
        let subscriptions = self.subscriptions.read().await;
        Ok(subscriptions.get(user_id).cloned())
    }

    async fn upsert(&self, subscription: &Subscription) -> Result<(), BillingError> {
        let mut subscriptions = self.subscriptions.write().await;
        subscriptions.insert(subscription.user_id.clone(), subscription.clone());
        Ok(())
    }

    async fn flag_cancellation(
        &self,
        user_id: &UserId,
        now: DateTime<Utc>,
    ) -> Result<Option<Subscription>, BillingError> {
        // The write lock spans check and flip, so rivals serialize here.
        let mut subscriptions = self.subscriptions.write().await;
        let Some(sub) = subscriptions.get_mut(user_id) else {
            return Ok(None);
        };
        match sub.cancel_at_end(now) {
            Ok(true) => Ok(Some(sub.clone())),
            Ok(false) | Err(_) => Ok(None),
        }
    }
}

/// Invoices keyed by number.
#[derive(Debug, Clone, Default)]
pub struct InMemoryInvoiceRepository {
    invoices: Arc<RwLock<HashMap<String, Invoice>>>,
}

impl InMemoryInvoiceRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored invoices (useful for tests).
    pub async fn count(&self) -> usize {
        self.invoices.read().await.len()
    }
}

#[async_trait]
impl InvoiceRepository for InMemoryInvoiceRepository {
    async fn insert(&self, invoice: &Invoice) -> Result<(), BillingError> {
        let mut invoices = self.invoices.write().await;
        let key = invoice.number.to_string();
        if invoices.contains_key(&key) {
            return Err(BillingError::Database(format!(
                "duplicate invoice number {}",
                key
            )));
        }
        invoices.insert(key, invoice.clone());
        Ok(())
    }

    async fn find_by_number(
        &self,
        number: &InvoiceNumber,
    ) -> Result<Option<Invoice>, BillingError> {
        let invoices = self.invoices.read().await;
        Ok(invoices.get(&number.to_string()).cloned())
    }

    async fn find_by_payment(
        &self,
        payment_id: &PaymentId,
    ) -> Result<Option<Invoice>, BillingError> {
        let invoices = self.invoices.read().await;
        Ok(invoices
            .values()
            .find(|i| &i.payment_id == payment_id)
            .cloned())
    }

    async fn update(&self, invoice: &Invoice) -> Result<(), BillingError> {
        let mut invoices = self.invoices.write().await;
        let key = invoice.number.to_string();
        if !invoices.contains_key(&key) {
            return Err(BillingError::Database(format!(
                "invoice {} does not exist",
                key
            )));
        }
        invoices.insert(key, invoice.clone());
        Ok(())
    }
}
