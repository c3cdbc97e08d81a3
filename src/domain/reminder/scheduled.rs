//! ScheduledReminder - the ledger row for one reminder instance.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::foundation::{
    ReminderId, StateMachine, SubscriptionId, Timestamp, UserId, ValidationError,
};

use super::{ReminderEventType, ReminderStatus};

/// Default cap on delivery attempts before a reminder is terminally failed.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Error recorded when a stale `sending` claim is released.
pub const STALE_CLAIM_ERROR: &str = "delivery interrupted before completion";

/// Identity of the occurrence a reminder is attached to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DedupKey {
    pub subscription_id: SubscriptionId,
    pub event_type: ReminderEventType,
    pub event_date: NaiveDate,
}

/// Request to queue a reminder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewReminder {
    pub subscription_id: SubscriptionId,
    pub user_id: UserId,
    pub event_type: ReminderEventType,
    pub event_date: NaiveDate,
    pub lead_days: u32,
    pub scheduled_for: Timestamp,
}

impl NewReminder {
    pub fn dedup_key(&self) -> DedupKey {
        DedupKey {
            subscription_id: self.subscription_id.clone(),
            event_type: self.event_type,
            event_date: self.event_date,
        }
    }
}

/// A queued, sent, or failed reminder. Retained as history once finished.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledReminder {
    pub id: ReminderId,
    pub subscription_id: SubscriptionId,
    pub user_id: UserId,
    pub event_type: ReminderEventType,
    pub event_date: NaiveDate,
    /// Rule lead time at scheduling; later rule edits do not touch it.
    pub lead_days: u32,
    pub status: ReminderStatus,
    pub attempts: u32,
    pub scheduled_for: Timestamp,
    pub claimed_at: Option<Timestamp>,
    pub delivery_id: Option<String>,
    pub error_message: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl ScheduledReminder {
    /// Creates a pending reminder with no attempts.
    pub fn new(request: NewReminder, now: Timestamp) -> Self {
        Self {
            id: ReminderId::new(),
            subscription_id: request.subscription_id,
            user_id: request.user_id,
            event_type: request.event_type,
            event_date: request.event_date,
            lead_days: request.lead_days,
            status: ReminderStatus::Pending,
            attempts: 0,
            scheduled_for: request.scheduled_for,
            claimed_at: None,
            delivery_id: None,
            error_message: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn dedup_key(&self) -> DedupKey {
        DedupKey {
            subscription_id: self.subscription_id.clone(),
            event_type: self.event_type,
            event_date: self.event_date,
        }
    }

    /// Pending, eligible by time, and still under the attempt cap.
    pub fn is_due(&self, now: Timestamp, max_attempts: u32) -> bool {
        self.status == ReminderStatus::Pending
            && self.scheduled_for <= now
            && self.attempts < max_attempts
    }

    /// Takes the single-writer claim for delivery.
    pub fn claim(&mut self, now: Timestamp) -> Result<(), ValidationError> {
        self.status = self.status.transition_to(ReminderStatus::Sending)?;
        self.claimed_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    pub fn mark_sent(&mut self, delivery_id: Option<String>, now: Timestamp) -> Result<(), ValidationError> {
        self.status = self.status.transition_to(ReminderStatus::Sent)?;
        self.attempts = self.attempts.saturating_add(1);
        self.delivery_id = delivery_id;
        self.error_message = None;
        self.claimed_at = None;
        self.updated_at = now;
        Ok(())
    }

    /// Records a failed attempt.
    ///
    /// Returns the resulting status: `Pending` while attempts remain under
    /// `max_attempts`, otherwise terminal `Failed`.
    pub fn record_failure(
        &mut self,
        error: impl Into<String>,
        max_attempts: u32,
        now: Timestamp,
    ) -> Result<ReminderStatus, ValidationError> {
        if !matches!(self.status, ReminderStatus::Pending | ReminderStatus::Sending) {
            return Err(ValidationError::invalid_format(
                "state_transition",
                format!("Cannot record a failure on a {} reminder", self.status),
            ));
        }

        self.attempts = self.attempts.saturating_add(1);
        self.error_message = Some(error.into());
        self.claimed_at = None;
        self.updated_at = now;
        self.status = if self.attempts >= max_attempts {
            ReminderStatus::Failed
        } else {
            ReminderStatus::Pending
        };
        Ok(self.status)
    }

    pub fn mark_skipped(&mut self, reason: impl Into<String>, now: Timestamp) -> Result<(), ValidationError> {
        self.status = self.status.transition_to(ReminderStatus::Skipped)?;
        self.error_message = Some(reason.into());
        self.claimed_at = None;
        self.updated_at = now;
        Ok(())
    }

    pub fn cancel(&mut self, now: Timestamp) -> Result<(), ValidationError> {
        self.status = self.status.transition_to(ReminderStatus::Cancelled)?;
        self.updated_at = now;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(now: Timestamp) -> NewReminder {
        NewReminder {
            subscription_id: SubscriptionId::new("sub-1").unwrap(),
            user_id: UserId::new("user-1").unwrap(),
            event_type: ReminderEventType::PaymentUpcoming,
            event_date: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            lead_days: 3,
            scheduled_for: now,
        }
    }

    #[test]
    fn new_reminder_is_pending_with_no_attempts() {
        let now = Timestamp::now();
        let reminder = ScheduledReminder::new(request(now), now);

        assert_eq!(reminder.status, ReminderStatus::Pending);
        assert_eq!(reminder.attempts, 0);
        assert!(reminder.is_due(now, DEFAULT_MAX_ATTEMPTS));
        assert!(!reminder.is_due(now.plus_secs(-1), DEFAULT_MAX_ATTEMPTS));
    }

    #[test]
    fn claim_then_send_counts_one_attempt() {
        let now = Timestamp::now();
        let mut reminder = ScheduledReminder::new(request(now), now);

        reminder.claim(now).unwrap();
        assert_eq!(reminder.status, ReminderStatus::Sending);
        assert!(!reminder.is_due(now, DEFAULT_MAX_ATTEMPTS));

        reminder.mark_sent(Some("msg-1".to_string()), now).unwrap();
        assert_eq!(reminder.status, ReminderStatus::Sent);
        assert_eq!(reminder.attempts, 1);
        assert_eq!(reminder.delivery_id.as_deref(), Some("msg-1"));
    }

    #[test]
    fn second_claim_is_rejected() {
        let now = Timestamp::now();
        let mut reminder = ScheduledReminder::new(request(now), now);

        reminder.claim(now).unwrap();
        assert!(reminder.claim(now).is_err());
    }

    #[test]
    fn failures_retry_until_cap_then_become_terminal() {
        let now = Timestamp::now();
        let mut reminder = ScheduledReminder::new(request(now), now);

        assert_eq!(reminder.record_failure("smtp down", 3, now), Ok(ReminderStatus::Pending));
        assert_eq!(reminder.record_failure("smtp down", 3, now), Ok(ReminderStatus::Pending));
        assert_eq!(reminder.record_failure("smtp down", 3, now), Ok(ReminderStatus::Failed));

        assert_eq!(reminder.attempts, 3);
        assert_eq!(reminder.error_message.as_deref(), Some("smtp down"));
        assert!(!reminder.is_due(now, 3));
        assert!(reminder.record_failure("again", 3, now).is_err());
    }

    #[test]
    fn cancel_only_from_pending() {
        let now = Timestamp::now();
        let mut reminder = ScheduledReminder::new(request(now), now);
        reminder.claim(now).unwrap();

        assert!(reminder.cancel(now).is_err());
    }
}
