//! Kinds of events a reminder can warn about.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::foundation::ValidationError;

/// The event a reminder is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReminderEventType {
    /// Free trial converts to a paid plan.
    TrialEnding,
    /// A charge is about to be made, for any cycle.
    PaymentUpcoming,
    /// Annual renewal. Only yearly subscriptions produce it.
    SubscriptionRenewal,
}

impl ReminderEventType {
    pub const ALL: [ReminderEventType; 3] = [
        ReminderEventType::TrialEnding,
        ReminderEventType::PaymentUpcoming,
        ReminderEventType::SubscriptionRenewal,
    ];

    /// Storage and wire representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            ReminderEventType::TrialEnding => "trial-ending",
            ReminderEventType::PaymentUpcoming => "payment-upcoming",
            ReminderEventType::SubscriptionRenewal => "subscription-renewal",
        }
    }
}

impl fmt::Display for ReminderEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReminderEventType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "trial-ending" | "trial_ending" => Ok(ReminderEventType::TrialEnding),
            "payment-upcoming" | "payment_upcoming" => Ok(ReminderEventType::PaymentUpcoming),
            "subscription-renewal" | "subscription_renewal" => {
                Ok(ReminderEventType::SubscriptionRenewal)
            }
            other => Err(ValidationError::invalid_format(
                "event_type",
                format!("unknown reminder event type '{}'", other),
            )),
        }
    }
}
