//! The per-user subscription state machine.

mod subscription;

pub use subscription::{Subscription, SubscriptionStatus};
