//! Payments, plans, and the canonical status vocabulary.

mod payment;
mod plan;
mod status;

pub use payment::{GatewayKind, Payment};
pub use plan::{BillingInterval, Plan, PlanId};
pub use status::{PaymentStatus, ProviderChargeState};
