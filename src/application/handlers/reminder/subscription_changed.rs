//! SubscriptionChangedHandler - Keeps the ledger consistent with edits.
//!
//! Pending reminders were computed from the subscription's old schedule.
//! After a schedule edit, only those whose occurrence the new schedule no
//! longer produces are cancelled, and the subscription is evaluated again
//! for the current day so a date that became due today is queued at once.
//! Deactivation or deletion cancels everything pending. Sent and failed
//! history is left untouched.

use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{info, warn};

use super::evaluate_reminders::enqueue_due;
use crate::domain::billing::Subscription;
use crate::domain::foundation::{DomainError, Timestamp};
use crate::domain::reminder::{DedupKey, ReminderRuleEvaluator};
use crate::ports::{ReminderLedger, RuleSource};

/// Notification that a subscription was edited or removed.
#[derive(Debug, Clone)]
pub struct SubscriptionChangedCommand {
    pub previous: Subscription,
    /// `None` when the subscription was deleted.
    pub current: Option<Subscription>,
    /// The day the edit happened, in the user's calendar.
    pub reference_date: NaiveDate,
    /// Becomes `scheduled_for` of reminders queued by the re-evaluation.
    pub now: Timestamp,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SubscriptionChangedResult {
    /// Pending reminders cancelled.
    pub cancelled: u64,
    /// Pending reminders whose occurrence survived the edit.
    pub kept: usize,
    /// Reminders queued by re-evaluating the new schedule.
    pub requeued: usize,
    /// Whether the change invalidated scheduled reminders.
    pub invalidated: bool,
}

pub struct SubscriptionChangedHandler {
    ledger: Arc<dyn ReminderLedger>,
    rules: Arc<dyn RuleSource>,
}

impl SubscriptionChangedHandler {
    pub fn new(ledger: Arc<dyn ReminderLedger>, rules: Arc<dyn RuleSource>) -> Self {
        Self { ledger, rules }
    }

    pub async fn handle(&self, cmd: SubscriptionChangedCommand) -> Result<SubscriptionChangedResult, DomainError> {
        let current = match &cmd.current {
            Some(current) if current.active => current,
            _ => return self.cancel_all(&cmd).await,
        };

        if !current.schedule_changed_from(&cmd.previous) {
            return Ok(SubscriptionChangedResult::default());
        }

        let pending = self.ledger.pending_for_subscription(&cmd.previous.id).await?;
        let mut stale: Vec<DedupKey> = Vec::new();
        for reminder in &pending {
            let keep = match ReminderRuleEvaluator::still_scheduled(current, reminder.event_type, reminder.event_date) {
                Ok(keep) => keep,
                Err(e) => {
                    warn!(subscription_id = %current.id, error = %e, "Cannot project edited subscription");
                    false
                }
            };
            if !keep {
                stale.push(reminder.dedup_key());
            }
        }
        let cancelled = self.ledger.cancel_pending_keys(&stale).await?;

        let rule_set = self.rules.rules_for_user(&current.user_id).await?;
        let report = enqueue_due(self.ledger.as_ref(), current, &rule_set, cmd.reference_date, cmd.now).await;
        if report.storage_errors > 0 {
            return Err(DomainError::database(format!(
                "Failed to queue {} reminder(s) for rescheduled subscription {}",
                report.storage_errors, current.id
            )));
        }

        let result = SubscriptionChangedResult {
            cancelled,
            kept: pending.len() - stale.len(),
            requeued: report.reminders_created,
            invalidated: true,
        };
        info!(
            subscription_id = %current.id,
            cancelled = result.cancelled,
            kept = result.kept,
            requeued = result.requeued,
            "Rescheduled reminders after subscription change"
        );
        Ok(result)
    }

    async fn cancel_all(&self, cmd: &SubscriptionChangedCommand) -> Result<SubscriptionChangedResult, DomainError> {
        let cancelled = self.ledger.cancel_pending(&cmd.previous.id).await?;
        info!(
            subscription_id = %cmd.previous.id,
            cancelled,
            deleted = cmd.current.is_none(),
            "Cancelled reminders of removed subscription"
        );

        Ok(SubscriptionChangedResult {
            cancelled,
            invalidated: true,
            ..Default::default()
        })
    }
}
