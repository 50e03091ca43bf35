//! Payment gateway adapters.
//!
//! One adapter per external processor, plus a scriptable mock for tests.

pub mod card;
pub mod mock;
pub mod redirect;

pub use card::{CardGateway, CardGatewayConfig};
pub use mock::MockGateway;
pub use redirect::{RedirectGateway, RedirectGatewayConfig};
