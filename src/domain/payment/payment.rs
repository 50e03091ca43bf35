//! Payment ledger entry.
//!
//! One `Payment` row exists per gateway transaction. A recurring chain is a
//! parent payment (`has_recurrence = true`) plus the child payments the
//! gateway charged automatically, linked through `parent_charge_id`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::{PaymentStatus, PlanId};
use crate::domain::foundation::{
    BillingError, ChargeId, Money, PaymentId, UserId, ValidationError,
};

/// Which gateway integration produced a charge.
///
/// Used only to route ledger operations back to the adapter that owns the
/// charge; business logic never branches on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GatewayKind {
    /// HMAC-signed-webhook card processor.
    Card,
    /// Redirect-flow processor with id-only notifications.
    Redirect,
}

impl GatewayKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            GatewayKind::Card => "card",
            GatewayKind::Redirect => "redirect",
        }
    }
}

impl fmt::Display for GatewayKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for GatewayKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "card" => Ok(GatewayKind::Card),
            "redirect" => Ok(GatewayKind::Redirect),
            other => Err(ValidationError::invalid_format(
                "gateway",
                format!("unknown gateway: {}", other),
            )),
        }
    }
}

/// One gateway transaction in the ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,
    pub user_id: UserId,
    pub user_email: String,
    pub plan: PlanId,
    pub amount: Money,
    pub gateway: GatewayKind,
    /// Gateway-assigned id; the ledger's idempotency key.
    pub charge_id: ChargeId,
    pub status: PaymentStatus,
    /// True on the charge that established a recurring chain.
    pub has_recurrence: bool,
    /// For recurring children: the parent's charge id.
    pub parent_charge_id: Option<ChargeId>,
    pub created_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
}

impl Payment {
    /// Creates the initial (parent or one-off) payment for a checkout.
    ///
    /// Starts `pending`; settlement is never assumed synchronous. The
    /// payment is flagged as a recurrence parent when the plan recurs.
    pub fn initial(
        user_id: UserId,
        user_email: String,
        plan: PlanId,
        gateway: GatewayKind,
        charge_id: ChargeId,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: PaymentId::new(),
            user_id,
            user_email,
            amount: plan.plan().price,
            plan,
            gateway,
            charge_id,
            status: PaymentStatus::Pending,
            has_recurrence: plan.plan().recurring,
            parent_charge_id: None,
            created_at: now,
            paid_at: None,
        }
    }

    /// Creates a child payment in a recurring chain.
    ///
    /// The parent must itself carry `has_recurrence = true`; a child linked
    /// to a non-recurring payment would break the chain invariant.
    pub fn recurring_child(
        parent: &Payment,
        charge_id: ChargeId,
        status: PaymentStatus,
        now: DateTime<Utc>,
    ) -> Result<Self, BillingError> {
        if !parent.has_recurrence {
            return Err(BillingError::InvalidTransition(format!(
                "payment {} is not a recurrence parent",
                parent.charge_id
            )));
        }
        Ok(Self {
            id: PaymentId::new(),
            user_id: parent.user_id.clone(),
            user_email: parent.user_email.clone(),
            plan: parent.plan,
            amount: parent.amount,
            gateway: parent.gateway,
            charge_id,
            status,
            has_recurrence: false,
            parent_charge_id: Some(parent.charge_id.clone()),
            created_at: now,
            paid_at: if status == PaymentStatus::Succeeded {
                Some(now)
            } else {
                None
            },
        })
    }

    /// Whether this payment is a recurring child.
    pub fn is_child(&self) -> bool {
        self.parent_charge_id.is_some()
    }

    /// Applies a canonical status observed at the gateway.
    ///
    /// Returns `true` when this call is the payment's first transition to
    /// `succeeded` — the only moment that may activate a subscription.
    /// Re-applying the current status is a no-op. Moving away from a
    /// terminal status is rejected, with one exception: `succeeded →
    /// refunded`, which is a legal post-settlement transition.
    pub fn apply_status(
        &mut self,
        status: PaymentStatus,
        now: DateTime<Utc>,
    ) -> Result<bool, BillingError> {
        if self.status == status {
            return Ok(false);
        }
        let allowed = match (self.status, status) {
            (PaymentStatus::Pending, _) => true,
            (PaymentStatus::Succeeded, PaymentStatus::Refunded) => true,
            _ => false,
        };
        if !allowed {
            return Err(BillingError::InvalidTransition(format!(
                "payment {}: {} -> {}",
                self.charge_id, self.status, status
            )));
        }

        let newly_succeeded = status == PaymentStatus::Succeeded;
        if newly_succeeded {
            self.paid_at = Some(now);
        }
        self.status = status;
        Ok(newly_succeeded)
    }
}
