//! Application handlers.
//!
//! Command handlers that orchestrate domain operations across the ports.

pub mod billing;
pub mod payment;
pub mod subscription;
