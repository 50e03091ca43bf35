//! RefundPaymentHandler - refunds a settled charge.
//!
//! Paid access is never revoked by a refund; the subscription runs out its
//! period. Only the payment row and its invoice change state.

use std::sync::Arc;

use chrono::Utc;

use crate::domain::foundation::{BillingError, ChargeId, Money};
use crate::domain::payment::{Payment, PaymentStatus};
use crate::ports::{GatewayError, GatewayRouter, InvoiceRepository, PaymentRepository};

#[derive(Debug, Clone)]
pub struct RefundPaymentCommand {
    pub charge_id: ChargeId,
    /// Partial refund amount; full refund when absent.
    pub amount: Option<Money>,
}

#[derive(Debug, Clone)]
pub struct RefundPaymentResult {
    /// The refunded ledger row; `None` when the charge was never in the
    /// ledger and there was nothing to refund.
    pub payment: Option<Payment>,
    /// False when the ledger already held the refund and nothing moved.
    pub changed: bool,
}

pub struct RefundPaymentHandler {
    payments: Arc<dyn PaymentRepository>,
    invoices: Arc<dyn InvoiceRepository>,
    router: GatewayRouter,
}

impl RefundPaymentHandler {
    pub fn new(
        payments: Arc<dyn PaymentRepository>,
        invoices: Arc<dyn InvoiceRepository>,
        router: GatewayRouter,
    ) -> Self {
        Self {
            payments,
            invoices,
            router,
        }
    }

    pub async fn handle(
        &self,
        cmd: RefundPaymentCommand,
    ) -> Result<RefundPaymentResult, BillingError> {
        // 1. A charge the ledger never saw holds no money to give back;
        //    acknowledge without touching anything
        let Some(mut payment) = self.payments.find_by_charge_id(&cmd.charge_id).await? else {
            tracing::info!(
                charge_id = %cmd.charge_id,
                "refund for unknown charge, nothing to do"
            );
            return Ok(RefundPaymentResult {
                payment: None,
                changed: false,
            });
        };

        // 2. Repeat refunds are no-ops
        if payment.status == PaymentStatus::Refunded {
            tracing::info!(charge_id = %payment.charge_id, "payment already refunded");
            return Ok(RefundPaymentResult {
                payment: Some(payment),
                changed: false,
            });
        }

        if payment.status != PaymentStatus::Succeeded {
            return Err(BillingError::InvalidTransition(format!(
                "payment {}: cannot refund from {}",
                payment.charge_id, payment.status
            )));
        }

        // 3. Refund at the gateway. A charge the gateway no longer knows
        //    cannot hold the payer's money, so missing is as good as done.
        let gateway = self.router.for_kind(payment.gateway)?;
        match gateway.refund_charge(&cmd.charge_id, cmd.amount).await {
            Ok(()) => {}
            Err(GatewayError::ResourceMissing(msg)) => {
                tracing::warn!(
                    charge_id = %payment.charge_id,
                    detail = %msg,
                    "charge missing at gateway, recording refund locally"
                );
            }
            Err(err) => return Err(err.into()),
        }

        // 4. Record the refund
        payment.apply_status(PaymentStatus::Refunded, Utc::now())?;
        self.payments.update(&payment).await?;

        // 5. Flip the invoice, when one was issued
        if let Some(mut invoice) = self.invoices.find_by_payment(&payment.id).await? {
            invoice.mark_refunded();
            self.invoices.update(&invoice).await?;
            tracing::info!(
                charge_id = %payment.charge_id,
                invoice_number = %invoice.number,
                "invoice marked refunded"
            );
        }

        tracing::info!(
            charge_id = %payment.charge_id,
            amount = ?cmd.amount,
            "payment refunded"
        );

        Ok(RefundPaymentResult {
            payment: Some(payment),
            changed: true,
        })
    }
}
