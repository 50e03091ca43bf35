//! Subscription plan catalog.
//!
//! Two paid plans exist: a monthly plan billed through a gateway-side
//! recurrence, and a yearly plan paid once up front. The catalog is static;
//! prices come from the product, not from configuration, so that a
//! misconfigured deployment can never charge the wrong amount.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::foundation::{Money, ValidationError};

/// Billing interval of a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BillingInterval {
    Month,
    Year,
}

impl BillingInterval {
    /// Interval length in days, used when advancing subscription periods.
    pub fn days(&self) -> i64 {
        match self {
            BillingInterval::Month => 30,
            BillingInterval::Year => 365,
        }
    }
}

/// Identifier of a purchasable plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanId {
    PremiumMonthly,
    PremiumYearly,
}

impl PlanId {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanId::PremiumMonthly => "premium_monthly",
            PlanId::PremiumYearly => "premium_yearly",
        }
    }

    /// The full plan definition from the catalog.
    pub fn plan(&self) -> &'static Plan {
        match self {
            PlanId::PremiumMonthly => &CATALOG[0],
            PlanId::PremiumYearly => &CATALOG[1],
        }
    }
}

impl fmt::Display for PlanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for PlanId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "premium_monthly" => Ok(PlanId::PremiumMonthly),
            "premium_yearly" => Ok(PlanId::PremiumYearly),
            other => Err(ValidationError::invalid_format(
                "plan",
                format!("unknown plan: {}", other),
            )),
        }
    }
}

/// A purchasable subscription plan.
#[derive(Debug, Clone, PartialEq)]
pub struct Plan {
    pub id: PlanId,
    pub name: &'static str,
    pub price: Money,
    pub interval: BillingInterval,
    /// Whether buying this plan establishes a gateway-side recurring chain.
    /// Yearly access is a single up-front charge with no recurrence.
    pub recurring: bool,
}

static CATALOG: Lazy<[Plan; 2]> = Lazy::new(|| {
    [
        Plan {
            id: PlanId::PremiumMonthly,
            name: "Premium monthly",
            price: Money::czk(29900),
            interval: BillingInterval::Month,
            recurring: true,
        },
        Plan {
            id: PlanId::PremiumYearly,
            name: "Premium yearly",
            price: Money::czk(299_900),
            interval: BillingInterval::Year,
            recurring: false,
        },
    ]
});
