//! Canonical webhook event model.
//!
//! Gateway adapters translate their provider-specific notifications into
//! `GatewayEvent` before anything touches the ledger; downstream code never
//! sees provider wire formats.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::ChargeId;
use crate::domain::payment::{GatewayKind, ProviderChargeState};

/// A verified, normalized notification from a payment gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayEvent {
    /// Originating gateway.
    pub gateway: GatewayKind,
    /// Provider-assigned event id, used for logging/tracing. Ledger-level
    /// idempotency keys off the charge id, not this.
    pub event_id: String,
    /// The charge the event refers to.
    pub charge_id: ChargeId,
    /// Present on recurring-child events: the charge that established the
    /// chain.
    pub parent_charge_id: Option<ChargeId>,
    /// Settlement state reported (or re-fetched) from the gateway.
    pub state: ProviderChargeState,
}

impl GatewayEvent {
    /// Whether this event belongs to a recurring chain's child charge.
    pub fn is_recurring_child(&self) -> bool {
        self.parent_charge_id.is_some()
    }
}

/// Result of ingesting one webhook delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookOutcome {
    /// The event mutated the ledger.
    Processed,
    /// Duplicate delivery; the ledger already reflected this event.
    AlreadyProcessed,
    /// Recognized but intentionally without ledger effect (e.g. a pending
    /// progress notification).
    Ignored,
}
