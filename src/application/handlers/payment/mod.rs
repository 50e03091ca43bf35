//! Payment lifecycle handlers.

pub mod create_payment;
pub mod ingest_webhook;
pub mod reconcile_recurring;
pub mod refund_payment;
pub mod settle_charge;
pub mod verify_payment;

pub use create_payment::{CreatePaymentCommand, CreatePaymentHandler, CreatePaymentResult};
pub use ingest_webhook::IngestWebhookHandler;
pub use reconcile_recurring::ReconcileRecurringHandler;
pub use refund_payment::{RefundPaymentCommand, RefundPaymentHandler, RefundPaymentResult};
pub use settle_charge::{SettleChargeHandler, SettlementOutcome};
pub use verify_payment::{VerifyPaymentCommand, VerifyPaymentHandler};
