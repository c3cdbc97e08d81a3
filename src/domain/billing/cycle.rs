//! Billing cycle periodicity.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::foundation::{SubscriptionId, ValidationError};

use super::RecurrenceError;

/// How often a subscription charges.
///
/// `Custom` subscriptions never auto-advance: their anchor date is a
/// one-shot charge and nothing recurs after it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BillingCycle {
    Weekly,
    Monthly,
    Yearly,
    Custom,
}

impl BillingCycle {
    /// Storage and wire representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            BillingCycle::Weekly => "weekly",
            BillingCycle::Monthly => "monthly",
            BillingCycle::Yearly => "yearly",
            BillingCycle::Custom => "custom",
        }
    }

    /// True for cycles that produce more than one billing date.
    pub fn is_recurring(&self) -> bool {
        !matches!(self, BillingCycle::Custom)
    }

    /// Parses a raw stored value, attributing failures to a subscription.
    pub fn parse_for(subscription_id: &SubscriptionId, raw: &str) -> Result<Self, RecurrenceError> {
        raw.parse().map_err(|_| RecurrenceError::UnknownCycle {
            subscription_id: subscription_id.clone(),
            value: raw.to_string(),
        })
    }
}

impl fmt::Display for BillingCycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BillingCycle {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "weekly" => Ok(BillingCycle::Weekly),
            "monthly" => Ok(BillingCycle::Monthly),
            "yearly" | "annual" => Ok(BillingCycle::Yearly),
            "custom" => Ok(BillingCycle::Custom),
            other => Err(ValidationError::invalid_format(
                "cycle",
                format!("unknown billing cycle '{}'", other),
            )),
        }
    }
}
