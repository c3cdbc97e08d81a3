//! Computed occurrence of a billing or trial-end event.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::foundation::SubscriptionId;
use crate::domain::reminder::ReminderEventType;

/// One concrete dated event for a subscription. Computed, never stored.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Occurrence {
    pub event_date: NaiveDate,
    pub subscription_id: SubscriptionId,
    pub event_type: ReminderEventType,
}

impl Occurrence {
    pub fn new(
        subscription_id: SubscriptionId,
        event_type: ReminderEventType,
        event_date: NaiveDate,
    ) -> Self {
        Self {
            event_date,
            subscription_id,
            event_type,
        }
    }
}
