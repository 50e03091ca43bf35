//! VerifyPaymentHandler - polls the gateway after the payer returns.
//!
//! The frontend calls this when the payer lands on the success page. The
//! charge state returned by the gateway is authoritative; whatever it says
//! flows through the shared settlement path, so a verify racing a webhook
//! delivery settles exactly once.

use std::sync::Arc;

use chrono::Utc;

use crate::application::handlers::payment::settle_charge::{
    SettleChargeHandler, SettlementOutcome,
};
use crate::domain::foundation::{BillingError, ChargeId};
use crate::ports::{GatewayRouter, PaymentRepository};

#[derive(Debug, Clone)]
pub struct VerifyPaymentCommand {
    pub charge_id: ChargeId,
}

pub struct VerifyPaymentHandler {
    payments: Arc<dyn PaymentRepository>,
    router: GatewayRouter,
    settlement: Arc<SettleChargeHandler>,
}

impl VerifyPaymentHandler {
    pub fn new(
        payments: Arc<dyn PaymentRepository>,
        router: GatewayRouter,
        settlement: Arc<SettleChargeHandler>,
    ) -> Self {
        Self {
            payments,
            router,
            settlement,
        }
    }

    pub async fn handle(
        &self,
        cmd: VerifyPaymentCommand,
    ) -> Result<SettlementOutcome, BillingError> {
        // 1. The charge must already be in our ledger
        let payment = self
            .payments
            .find_by_charge_id(&cmd.charge_id)
            .await?
            .ok_or_else(|| BillingError::PaymentNotFound {
                charge_id: cmd.charge_id.to_string(),
            })?;

        // 2. Ask the owning gateway for the current state, retrying a
        //    transient failure once
        let gateway = self.router.for_kind(payment.gateway)?;
        let state = match gateway.charge_status(&cmd.charge_id).await {
            Ok(state) => state,
            Err(err) if err.is_retryable() => {
                tracing::warn!(
                    charge_id = %cmd.charge_id,
                    error = %err,
                    "status poll failed, retrying once"
                );
                gateway.charge_status(&cmd.charge_id).await?
            }
            Err(err) => return Err(err.into()),
        };

        // 3. Settle whatever the gateway reports
        self.settlement.handle(payment, state, Utc::now()).await
    }
}
