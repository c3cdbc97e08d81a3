//! ReminderLedger port - Durable, deduplicated store of scheduled reminders.
//!
//! The ledger is the only mutable state shared between evaluation runs and
//! dispatchers. Two operations are synchronization points and must be
//! atomic under any number of concurrent callers:
//!
//! - [`ReminderLedger::try_enqueue`] - at most one live reminder per
//!   (subscription, event type, event date)
//! - [`ReminderLedger::claim`] - at most one dispatcher delivers a reminder
//!
//! Implementations must enforce both with a single atomic storage operation
//! (unique constraint, conditional update, or one critical section), never
//! with a check followed by a separate write.
//!
//! Rows are never deleted: sent and failed reminders keep their occurrence
//! covered, so re-running an evaluation cannot queue it again.

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, ReminderId, SubscriptionId, Timestamp};
use crate::domain::reminder::{DedupKey, NewReminder, ReminderStatus, ScheduledReminder};

/// Result of attempting to enqueue a reminder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueResult {
    /// A new pending reminder was stored.
    Created(ReminderId),
    /// A pending, in-flight, sent, or failed reminder already covers this
    /// occurrence. Not an error.
    AlreadyExists,
}

impl EnqueueResult {
    pub fn is_created(&self) -> bool {
        matches!(self, EnqueueResult::Created(_))
    }
}

#[async_trait]
pub trait ReminderLedger: Send + Sync {
    /// Stores a new pending reminder unless its occurrence is already covered.
    ///
    /// Uses `ON CONFLICT DO NOTHING` semantics: exactly one of any set of
    /// concurrent callers for the same occurrence gets `Created`.
    async fn try_enqueue(&self, reminder: NewReminder) -> Result<EnqueueResult, DomainError>;

    /// Pending reminders eligible at `now` and under the attempt cap,
    /// oldest `scheduled_for` first.
    async fn list_due(&self, now: Timestamp, limit: usize) -> Result<Vec<ScheduledReminder>, DomainError>;

    /// Moves a pending reminder to `sending`.
    ///
    /// Returns `false` when another caller claimed it first or it is no
    /// longer pending.
    async fn claim(&self, id: ReminderId, now: Timestamp) -> Result<bool, DomainError>;

    /// Records a successful delivery.
    async fn mark_sent(&self, id: ReminderId, delivery_id: Option<String>) -> Result<(), DomainError>;

    /// Records a failed attempt and returns the resulting status:
    /// `Pending` while attempts remain, `Failed` once the cap is reached.
    async fn mark_failed(&self, id: ReminderId, error: &str) -> Result<ReminderStatus, DomainError>;

    /// Marks a reminder as not delivered on purpose (e.g. subscription gone).
    async fn mark_skipped(&self, id: ReminderId, reason: &str) -> Result<(), DomainError>;

    /// Cancels every pending reminder of a subscription. Returns how many.
    async fn cancel_pending(&self, subscription_id: &SubscriptionId) -> Result<u64, DomainError>;

    /// Pending reminders of one subscription, earliest event first.
    async fn pending_for_subscription(
        &self,
        subscription_id: &SubscriptionId,
    ) -> Result<Vec<ScheduledReminder>, DomainError>;

    /// Cancels the pending reminders attached to exactly these occurrences.
    /// Rows already claimed, sent, or failed are left alone. Returns how many
    /// were cancelled.
    async fn cancel_pending_keys(&self, keys: &[DedupKey]) -> Result<u64, DomainError>;

    /// Returns reminders stuck in `sending` since before `claimed_before` to
    /// the queue, counting the interrupted attempt as a failure.
    async fn release_stale_claims(&self, claimed_before: Timestamp) -> Result<u64, DomainError>;

    async fn find(&self, id: ReminderId) -> Result<Option<ScheduledReminder>, DomainError>;

    /// Terminally failed reminders updated at or after `since`.
    async fn failed_since(&self, since: Timestamp) -> Result<Vec<ScheduledReminder>, DomainError>;
}
