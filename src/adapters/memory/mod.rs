//! In-memory adapters for development and tests.

pub mod counter;
pub mod ledger;

pub use counter::InMemoryInvoiceSequence;
pub use ledger::{
    InMemoryInvoiceRepository, InMemoryPaymentRepository, InMemorySubscriptionRepository,
};
