//! Adapters - concrete implementations of the ports.
//!
//! - `gateway` - card and redirect payment processor clients
//! - `http` - REST API surface
//! - `memory` - in-memory stores for tests and local development
//! - `postgres` - persistent stores

pub mod gateway;
pub mod http;
pub mod memory;
pub mod postgres;
