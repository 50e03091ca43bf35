//! Foundation value objects shared across the billing domain.

mod errors;
mod ids;
mod money;

pub use errors::{BillingError, ValidationError};
pub use ids::{ChargeId, InvoiceId, PaymentId, UserId};
pub use money::{Currency, Money};
