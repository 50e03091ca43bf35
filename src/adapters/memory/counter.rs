//! In-Memory Invoice Sequence Adapter
//!
//! Backs development mode and tests. The increment runs as a
//! compare-and-swap retry loop over an atomic per-period cell, giving the
//! same gap-free guarantee as the database implementation without a
//! database.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::billing::{BillingPeriod, MAX_SEQUENCE};
use crate::domain::foundation::BillingError;
use crate::ports::InvoiceSequence;

/// CAS attempts before reporting contention. A CAS over an `AtomicU32`
/// converges within a few iterations even under heavy parallelism; the
/// bound exists to satisfy the sequence contract.
const MAX_CAS_ATTEMPTS: u32 = 64;

/// In-memory, per-period atomic counters.
#[derive(Debug, Clone, Default)]
pub struct InMemoryInvoiceSequence {
    counters: Arc<RwLock<HashMap<String, Arc<AtomicU32>>>>,
}

impl InMemoryInvoiceSequence {
    pub fn new() -> Self {
        Self::default()
    }

    async fn cell(&self, period: &BillingPeriod) -> Arc<AtomicU32> {
        if let Some(cell) = self.counters.read().await.get(&period.key()) {
            return cell.clone();
        }
        let mut counters = self.counters.write().await;
        counters
            .entry(period.key())
            .or_insert_with(|| Arc::new(AtomicU32::new(0)))
            .clone()
    }
}

#[async_trait]
impl InvoiceSequence for InMemoryInvoiceSequence {
    async fn next_number(&self, period: &BillingPeriod) -> Result<u32, BillingError> {
        let cell = self.cell(period).await;

        for _ in 0..MAX_CAS_ATTEMPTS {
            let current = cell.load(Ordering::SeqCst);
            if current >= MAX_SEQUENCE {
                return Err(BillingError::Database(format!(
                    "invoice sequence exhausted for period {}",
                    period
                )));
            }
            let next = current + 1;
            if cell
                .compare_exchange(current, next, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
            {
                return Ok(next);
            }
        }

        Err(BillingError::SequenceContention {
            period: period.key(),
            attempts: MAX_CAS_ATTEMPTS,
        })
    }

    async fn current(&self, period: &BillingPeriod) -> Result<Option<u32>, BillingError> {
        let counters = self.counters.read().await;
        Ok(counters
            .get(&period.key())
            .map(|cell| cell.load(Ordering::SeqCst)))
    }

    async fn force_set(
        &self,
        period: &BillingPeriod,
        last_number: u32,
    ) -> Result<(), BillingError> {
        self.cell(period).await.store(last_number, Ordering::SeqCst);
        Ok(())
    }

    async fn delete(&self, period: &BillingPeriod) -> Result<bool, BillingError> {
        let mut counters = self.counters.write().await;
        Ok(counters.remove(&period.key()).is_some())
    }
}
