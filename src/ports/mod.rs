//! Ports: capability interfaces between the engine and the outside world.

mod invoice_sequence;
mod ledger;
mod payment_gateway;

pub use invoice_sequence::InvoiceSequence;
pub use ledger::{InvoiceRepository, PaymentRepository, SaveResult, SubscriptionRepository};
pub use payment_gateway::{
    CreateChargeRequest, CreatedCharge, GatewayError, GatewayRouter, PaymentGateway,
};
