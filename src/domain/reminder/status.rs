//! Reminder ledger status state machine.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::foundation::{StateMachine, ValidationError};

/// Delivery status of a scheduled reminder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReminderStatus {
    /// Waiting for a dispatcher to pick it up.
    Pending,

    /// Claimed by one dispatcher; delivery in flight.
    Sending,

    /// Delivered.
    Sent,

    /// Delivery attempts exhausted. Needs an operator.
    Failed,

    /// Subscription went inactive or disappeared before delivery.
    Skipped,

    /// Invalidated by a schedule change before delivery.
    Cancelled,
}

impl ReminderStatus {
    /// Statuses covered by the one-reminder-per-occurrence constraint.
    ///
    /// Skipped and cancelled rows are history and do not block a recomputed
    /// reminder for the same occurrence.
    pub const DEDUP_GROUP: [ReminderStatus; 4] = [
        ReminderStatus::Pending,
        ReminderStatus::Sending,
        ReminderStatus::Sent,
        ReminderStatus::Failed,
    ];

    pub fn in_dedup_group(&self) -> bool {
        Self::DEDUP_GROUP.contains(self)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ReminderStatus::Pending => "pending",
            ReminderStatus::Sending => "sending",
            ReminderStatus::Sent => "sent",
            ReminderStatus::Failed => "failed",
            ReminderStatus::Skipped => "skipped",
            ReminderStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for ReminderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReminderStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ReminderStatus::Pending),
            "sending" => Ok(ReminderStatus::Sending),
            "sent" => Ok(ReminderStatus::Sent),
            "failed" => Ok(ReminderStatus::Failed),
            "skipped" => Ok(ReminderStatus::Skipped),
            "cancelled" => Ok(ReminderStatus::Cancelled),
            other => Err(ValidationError::invalid_format(
                "status",
                format!("unknown reminder status '{}'", other),
            )),
        }
    }
}

impl StateMachine for ReminderStatus {
    fn can_transition_to(&self, target: &Self) -> bool {
        use ReminderStatus::*;
        matches!(
            (self, target),
            // From PENDING
            (Pending, Sending)
                | (Pending, Sent)
                | (Pending, Failed)
                | (Pending, Skipped)
                | (Pending, Cancelled)
            // From SENDING
                | (Sending, Sent)
                | (Sending, Pending) // retry or stale claim released
                | (Sending, Failed)
                | (Sending, Skipped)
        )
    }

    fn valid_transitions(&self) -> Vec<Self> {
        use ReminderStatus::*;
        match self {
            Pending => vec![Sending, Sent, Failed, Skipped, Cancelled],
            Sending => vec![Sent, Pending, Failed, Skipped],
            Sent | Failed | Skipped | Cancelled => vec![],
        }
    }
}
