//! ReconcileRecurringHandler - records gateway-initiated recurring charges.
//!
//! The gateway charges recurring chains on its own schedule and notifies
//! us afterwards with a child charge referencing the parent. This handler
//! links the child into the ledger and pushes it through settlement, which
//! extends the subscription period and issues the invoice.

use std::sync::Arc;

use chrono::Utc;

use crate::application::handlers::payment::settle_charge::{
    SettleChargeHandler, SettlementOutcome,
};
use crate::domain::foundation::BillingError;
use crate::domain::payment::{Payment, PaymentStatus, ProviderChargeState};
use crate::domain::webhook::GatewayEvent;
use crate::ports::{PaymentRepository, SaveResult};

pub struct ReconcileRecurringHandler {
    payments: Arc<dyn PaymentRepository>,
    settlement: Arc<SettleChargeHandler>,
}

impl ReconcileRecurringHandler {
    pub fn new(
        payments: Arc<dyn PaymentRepository>,
        settlement: Arc<SettleChargeHandler>,
    ) -> Self {
        Self {
            payments,
            settlement,
        }
    }

    /// Records the child charge named by `event` and settles it with the
    /// given authoritative state.
    ///
    /// The insert races concurrent deliveries of the same notification;
    /// `insert_if_absent` picks one winner and the loser settles the row
    /// the winner wrote, which the status machine turns into a no-op.
    pub async fn handle(
        &self,
        event: &GatewayEvent,
        state: ProviderChargeState,
    ) -> Result<SettlementOutcome, BillingError> {
        let parent_charge_id =
            event
                .parent_charge_id
                .as_ref()
                .ok_or_else(|| BillingError::Validation(
                    crate::domain::foundation::ValidationError::empty_field("parent_charge_id"),
                ))?;

        // 1. The parent must exist; a child for an unknown parent cannot
        //    be attributed to a user
        let parent = self
            .payments
            .find_by_charge_id(parent_charge_id)
            .await?
            .ok_or_else(|| BillingError::PaymentNotFound {
                charge_id: parent_charge_id.to_string(),
            })?;

        // 2. Link the child, pending; settlement applies the real state
        let child = Payment::recurring_child(
            &parent,
            event.charge_id.clone(),
            PaymentStatus::Pending,
            Utc::now(),
        )?;

        let payment = match self.payments.insert_if_absent(&child).await? {
            SaveResult::Inserted => {
                tracing::info!(
                    charge_id = %child.charge_id,
                    parent_charge_id = %parent.charge_id,
                    user_id = %child.user_id,
                    "recurring charge linked to parent"
                );
                child
            }
            SaveResult::AlreadyExists => self
                .payments
                .find_by_charge_id(&event.charge_id)
                .await?
                .ok_or_else(|| BillingError::PaymentNotFound {
                    charge_id: event.charge_id.to_string(),
                })?,
        };

        // 3. Settle
        self.settlement.handle(payment, state, Utc::now()).await
    }
}
