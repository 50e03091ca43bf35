//! CreatePaymentHandler - starts a checkout on the default gateway.

use std::sync::Arc;

use chrono::Utc;

use crate::domain::foundation::{BillingError, UserId};
use crate::domain::payment::{Payment, PlanId};
use crate::ports::{
    CreateChargeRequest, GatewayRouter, PaymentRepository, SaveResult,
};

/// Command to start a checkout.
#[derive(Debug, Clone)]
pub struct CreatePaymentCommand {
    pub user_id: UserId,
    pub user_email: String,
    pub plan: PlanId,
    pub success_url: String,
    pub cancel_url: String,
}

/// Result of a started checkout.
#[derive(Debug, Clone)]
pub struct CreatePaymentResult {
    pub payment: Payment,
    /// Where to send the payer to complete the charge.
    pub redirect_url: String,
}

/// Handler that creates the gateway charge and records it pending.
///
/// Charge creation is never retried: a timed-out create may still have
/// settled at the provider and will surface through the webhook path.
pub struct CreatePaymentHandler {
    router: GatewayRouter,
    payments: Arc<dyn PaymentRepository>,
}

impl CreatePaymentHandler {
    pub fn new(router: GatewayRouter, payments: Arc<dyn PaymentRepository>) -> Self {
        Self { router, payments }
    }

    pub async fn handle(
        &self,
        cmd: CreatePaymentCommand,
    ) -> Result<CreatePaymentResult, BillingError> {
        let gateway = self.router.default_gateway()?;

        // 1. Create the charge at the gateway
        let created = gateway
            .create_charge(CreateChargeRequest {
                user_id: cmd.user_id.clone(),
                user_email: cmd.user_email.clone(),
                plan: cmd.plan,
                success_url: cmd.success_url,
                cancel_url: cmd.cancel_url,
            })
            .await?;

        // 2. Record it pending in the ledger
        let payment = Payment::initial(
            cmd.user_id,
            cmd.user_email,
            cmd.plan,
            gateway.kind(),
            created.charge_id,
            Utc::now(),
        );

        // The gateway mints charge ids, so a duplicate means the webhook
        // for this charge raced us and already recorded it. Keep theirs.
        if self.payments.insert_if_absent(&payment).await? == SaveResult::AlreadyExists {
            tracing::info!(
                charge_id = %payment.charge_id,
                "charge already recorded by a concurrent delivery"
            );
        }

        tracing::info!(
            charge_id = %payment.charge_id,
            user_id = %payment.user_id,
            plan = %payment.plan,
            gateway = %payment.gateway,
            "checkout created"
        );

        Ok(CreatePaymentResult {
            payment,
            redirect_url: created.redirect_url,
        })
    }
}
