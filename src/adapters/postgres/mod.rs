//! PostgreSQL adapters.
//!
//! sqlx-based implementations of the ledger and sequence ports.

pub mod counter_store;
pub mod invoice_repository;
pub mod payment_repository;
pub mod subscription_repository;

pub use counter_store::PostgresInvoiceSequence;
pub use invoice_repository::PostgresInvoiceRepository;
pub use payment_repository::PostgresPaymentRepository;
pub use subscription_repository::PostgresSubscriptionRepository;
