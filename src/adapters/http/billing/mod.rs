//! HTTP adapter for billing endpoints.
//!
//! Exposes the billing engine via REST API:
//! - `POST /api/payments` - Start a checkout on the default gateway
//! - `POST /api/payments/verify` - Poll the gateway and settle a charge
//! - `POST /api/payments/refund` - Refund a settled charge
//! - `POST /api/subscription/cancel` - Flag cancellation at period end
//! - `POST /api/subscription/reactivate` - Clear a pending cancellation
//! - `GET|PUT|DELETE /api/admin/invoice-counter/:period` - Counter administration
//! - `POST /webhooks/card` - Handle signed card processor webhooks
//! - `GET /webhooks/redirect` - Handle id-only redirect notifications

pub mod dto;
pub mod handlers;
pub mod routes;

pub use handlers::{AuthenticatedUser, BillingApiError, BillingAppState};
pub use routes::billing_router;
