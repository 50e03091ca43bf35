//! Domain layer: pure billing logic with no IO.

pub mod billing;
pub mod foundation;
pub mod payment;
pub mod subscription;
pub mod webhook;
