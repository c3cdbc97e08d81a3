//! In-memory reminder ledger.
//!
//! Every operation runs inside one `tokio::sync::Mutex` critical section, so
//! the dedup check and insert in `try_enqueue` (and the status check and
//! update in `claim`) are a single atomic step. Suitable for tests, local
//! runs, and single-process deployments without a database.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::foundation::{
    DomainError, ReminderId, StateMachine, SubscriptionId, Timestamp, ValidationError,
};
use crate::domain::reminder::{
    DedupKey, NewReminder, ReminderStatus, ScheduledReminder, DEFAULT_MAX_ATTEMPTS, STALE_CLAIM_ERROR,
};
use crate::ports::{EnqueueResult, ReminderLedger};

/// Ledger backed by a map guarded by an async mutex.
///
/// # Example
///
/// ```ignore
/// let ledger = Arc::new(InMemoryReminderLedger::new());
/// ledger.try_enqueue(request).await?;
/// assert_eq!(ledger.len().await, 1);
/// ```
pub struct InMemoryReminderLedger {
    reminders: Mutex<HashMap<ReminderId, ScheduledReminder>>,
    max_attempts: u32,
}

impl InMemoryReminderLedger {
    pub fn new() -> Self {
        Self::with_max_attempts(DEFAULT_MAX_ATTEMPTS)
    }

    pub fn with_max_attempts(max_attempts: u32) -> Self {
        Self {
            reminders: Mutex::new(HashMap::new()),
            max_attempts,
        }
    }

    // === Test Helpers ===

    /// Snapshot of every stored reminder, oldest first.
    pub async fn all(&self) -> Vec<ScheduledReminder> {
        let mut all: Vec<_> = self.reminders.lock().await.values().cloned().collect();
        all.sort_by_key(|r| (r.created_at, r.id.to_string()));
        all
    }

    pub async fn len(&self) -> usize {
        self.reminders.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.reminders.lock().await.is_empty()
    }

    /// Inserts a reminder as-is, bypassing dedup. Lets tests seed history.
    pub async fn insert_raw(&self, reminder: ScheduledReminder) {
        self.reminders.lock().await.insert(reminder.id, reminder);
    }
}

impl Default for InMemoryReminderLedger {
    fn default() -> Self {
        Self::new()
    }
}

fn invalid_transition(id: ReminderId, err: ValidationError) -> DomainError {
    DomainError::invalid_transition(id, err.to_string())
}

#[async_trait]
impl ReminderLedger for InMemoryReminderLedger {
    async fn try_enqueue(&self, reminder: NewReminder) -> Result<EnqueueResult, DomainError> {
        let key = reminder.dedup_key();
        let mut reminders = self.reminders.lock().await;

        let covered = reminders
            .values()
            .any(|r| r.status.in_dedup_group() && r.dedup_key() == key);
        if covered {
            return Ok(EnqueueResult::AlreadyExists);
        }

        let scheduled = ScheduledReminder::new(reminder, Timestamp::now());
        let id = scheduled.id;
        reminders.insert(id, scheduled);
        Ok(EnqueueResult::Created(id))
    }

    async fn list_due(&self, now: Timestamp, limit: usize) -> Result<Vec<ScheduledReminder>, DomainError> {
        let reminders = self.reminders.lock().await;
        let mut due: Vec<_> = reminders
            .values()
            .filter(|r| r.is_due(now, self.max_attempts))
            .cloned()
            .collect();
        due.sort_by_key(|r| (r.scheduled_for, r.created_at));
        due.truncate(limit);
        Ok(due)
    }

    async fn claim(&self, id: ReminderId, now: Timestamp) -> Result<bool, DomainError> {
        let mut reminders = self.reminders.lock().await;
        let reminder = reminders.get_mut(&id).ok_or_else(|| DomainError::reminder_not_found(id))?;

        if reminder.status != ReminderStatus::Pending {
            return Ok(false);
        }
        reminder.claim(now).map_err(|e| invalid_transition(id, e))?;
        Ok(true)
    }

    async fn mark_sent(&self, id: ReminderId, delivery_id: Option<String>) -> Result<(), DomainError> {
        let mut reminders = self.reminders.lock().await;
        let reminder = reminders.get_mut(&id).ok_or_else(|| DomainError::reminder_not_found(id))?;
        reminder
            .mark_sent(delivery_id, Timestamp::now())
            .map_err(|e| invalid_transition(id, e))
    }

    async fn mark_failed(&self, id: ReminderId, error: &str) -> Result<ReminderStatus, DomainError> {
        let mut reminders = self.reminders.lock().await;
        let reminder = reminders.get_mut(&id).ok_or_else(|| DomainError::reminder_not_found(id))?;
        reminder
            .record_failure(error, self.max_attempts, Timestamp::now())
            .map_err(|e| invalid_transition(id, e))
    }

    async fn mark_skipped(&self, id: ReminderId, reason: &str) -> Result<(), DomainError> {
        let mut reminders = self.reminders.lock().await;
        let reminder = reminders.get_mut(&id).ok_or_else(|| DomainError::reminder_not_found(id))?;
        reminder
            .mark_skipped(reason, Timestamp::now())
            .map_err(|e| invalid_transition(id, e))
    }

    async fn cancel_pending(&self, subscription_id: &SubscriptionId) -> Result<u64, DomainError> {
        let now = Timestamp::now();
        let mut reminders = self.reminders.lock().await;
        let mut cancelled = 0;
        for reminder in reminders
            .values_mut()
            .filter(|r| r.status == ReminderStatus::Pending && &r.subscription_id == subscription_id)
        {
            reminder.cancel(now).map_err(|e| invalid_transition(reminder.id, e))?;
            cancelled += 1;
        }
        Ok(cancelled)
    }

    async fn pending_for_subscription(
        &self,
        subscription_id: &SubscriptionId,
    ) -> Result<Vec<ScheduledReminder>, DomainError> {
        let reminders = self.reminders.lock().await;
        let mut pending: Vec<_> = reminders
            .values()
            .filter(|r| r.status == ReminderStatus::Pending && &r.subscription_id == subscription_id)
            .cloned()
            .collect();
        pending.sort_by_key(|r| (r.event_date, r.event_type.as_str()));
        Ok(pending)
    }

    async fn cancel_pending_keys(&self, keys: &[DedupKey]) -> Result<u64, DomainError> {
        let now = Timestamp::now();
        let mut reminders = self.reminders.lock().await;
        let mut cancelled = 0;
        for reminder in reminders
            .values_mut()
            .filter(|r| r.status == ReminderStatus::Pending && keys.contains(&r.dedup_key()))
        {
            reminder.cancel(now).map_err(|e| invalid_transition(reminder.id, e))?;
            cancelled += 1;
        }
        Ok(cancelled)
    }

    async fn release_stale_claims(&self, claimed_before: Timestamp) -> Result<u64, DomainError> {
        let now = Timestamp::now();
        let mut reminders = self.reminders.lock().await;
        let mut released = 0;
        for reminder in reminders.values_mut().filter(|r| {
            r.status == ReminderStatus::Sending
                && r.claimed_at.map_or(true, |at| at < claimed_before)
        }) {
            reminder
                .record_failure(STALE_CLAIM_ERROR, self.max_attempts, now)
                .map_err(|e| invalid_transition(reminder.id, e))?;
            released += 1;
        }
        Ok(released)
    }

    async fn find(&self, id: ReminderId) -> Result<Option<ScheduledReminder>, DomainError> {
        Ok(self.reminders.lock().await.get(&id).cloned())
    }

    async fn failed_since(&self, since: Timestamp) -> Result<Vec<ScheduledReminder>, DomainError> {
        let reminders = self.reminders.lock().await;
        let mut failed: Vec<_> = reminders
            .values()
            .filter(|r| r.status == ReminderStatus::Failed && r.updated_at >= since)
            .cloned()
            .collect();
        failed.sort_by_key(|r| r.updated_at);
        Ok(failed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::{ErrorCode, UserId};
    use crate::domain::reminder::ReminderEventType;
    use chrono::NaiveDate;
    use std::sync::Arc;

    fn request(subscription: &str, event_type: ReminderEventType, day: u32) -> NewReminder {
        NewReminder {
            subscription_id: SubscriptionId::new(subscription).unwrap(),
            user_id: UserId::new("user-1").unwrap(),
            event_type,
            event_date: NaiveDate::from_ymd_opt(2024, 6, day).unwrap(),
            lead_days: 3,
            scheduled_for: Timestamp::now().minus_days(1),
        }
    }

    fn created_id(result: EnqueueResult) -> ReminderId {
        match result {
            EnqueueResult::Created(id) => id,
            EnqueueResult::AlreadyExists => panic!("expected a new reminder"),
        }
    }

    // ══════════════════════════════════════════════════════════════
    // Deduplication
    // ══════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn second_enqueue_of_same_occurrence_is_a_duplicate() {
        let ledger = InMemoryReminderLedger::new();

        let first = ledger.try_enqueue(request("sub-1", ReminderEventType::PaymentUpcoming, 4)).await.unwrap();
        let second = ledger.try_enqueue(request("sub-1", ReminderEventType::PaymentUpcoming, 4)).await.unwrap();

        assert!(first.is_created());
        assert_eq!(second, EnqueueResult::AlreadyExists);
        assert_eq!(ledger.len().await, 1);
    }

    #[tokio::test]
    async fn different_event_type_or_date_is_not_a_duplicate() {
        let ledger = InMemoryReminderLedger::new();

        ledger.try_enqueue(request("sub-1", ReminderEventType::PaymentUpcoming, 4)).await.unwrap();
        let renewal = ledger.try_enqueue(request("sub-1", ReminderEventType::SubscriptionRenewal, 4)).await.unwrap();
        let next_date = ledger.try_enqueue(request("sub-1", ReminderEventType::PaymentUpcoming, 5)).await.unwrap();

        assert!(renewal.is_created());
        assert!(next_date.is_created());
    }

    #[tokio::test]
    async fn terminal_failure_blocks_recreation_but_cancellation_does_not() {
        let ledger = InMemoryReminderLedger::with_max_attempts(1);
        let failed = created_id(ledger.try_enqueue(request("sub-1", ReminderEventType::PaymentUpcoming, 4)).await.unwrap());
        ledger.mark_failed(failed, "bounced").await.unwrap();

        let again = ledger.try_enqueue(request("sub-1", ReminderEventType::PaymentUpcoming, 4)).await.unwrap();
        assert_eq!(again, EnqueueResult::AlreadyExists);

        ledger.try_enqueue(request("sub-2", ReminderEventType::PaymentUpcoming, 4)).await.unwrap();
        let sub2 = SubscriptionId::new("sub-2").unwrap();
        assert_eq!(ledger.cancel_pending(&sub2).await.unwrap(), 1);

        let recomputed = ledger.try_enqueue(request("sub-2", ReminderEventType::PaymentUpcoming, 4)).await.unwrap();
        assert!(recomputed.is_created());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_enqueue_creates_exactly_one() {
        let ledger = Arc::new(InMemoryReminderLedger::new());

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let ledger = Arc::clone(&ledger);
                tokio::spawn(async move {
                    ledger
                        .try_enqueue(request("sub-1", ReminderEventType::TrialEnding, 10))
                        .await
                        .unwrap()
                })
            })
            .collect();

        let mut created = 0;
        for handle in handles {
            if handle.await.unwrap().is_created() {
                created += 1;
            }
        }

        assert_eq!(created, 1);
        assert_eq!(ledger.len().await, 1);
    }

    // ══════════════════════════════════════════════════════════════
    // Claim and delivery outcomes
    // ══════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn only_first_claim_wins() {
        let ledger = InMemoryReminderLedger::new();
        let id = created_id(ledger.try_enqueue(request("sub-1", ReminderEventType::PaymentUpcoming, 4)).await.unwrap());
        let now = Timestamp::now();

        assert!(ledger.claim(id, now).await.unwrap());
        assert!(!ledger.claim(id, now).await.unwrap());
        assert!(ledger.list_due(now, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn list_due_respects_schedule_and_limit() {
        let ledger = InMemoryReminderLedger::new();
        for day in 1..=3 {
            ledger.try_enqueue(request("sub-1", ReminderEventType::PaymentUpcoming, day)).await.unwrap();
        }
        let mut future = request("sub-2", ReminderEventType::PaymentUpcoming, 1);
        future.scheduled_for = Timestamp::now().plus_days(1);
        ledger.try_enqueue(future).await.unwrap();

        let now = Timestamp::now();
        assert_eq!(ledger.list_due(now, 10).await.unwrap().len(), 3);
        assert_eq!(ledger.list_due(now, 2).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn failures_retry_until_cap() {
        let ledger = InMemoryReminderLedger::with_max_attempts(3);
        let id = created_id(ledger.try_enqueue(request("sub-1", ReminderEventType::PaymentUpcoming, 4)).await.unwrap());

        assert_eq!(ledger.mark_failed(id, "timeout").await.unwrap(), ReminderStatus::Pending);
        assert_eq!(ledger.mark_failed(id, "timeout").await.unwrap(), ReminderStatus::Pending);
        assert_eq!(ledger.mark_failed(id, "timeout").await.unwrap(), ReminderStatus::Failed);

        let stored = ledger.find(id).await.unwrap().unwrap();
        assert_eq!(stored.attempts, 3);
        assert!(ledger.list_due(Timestamp::now(), 10).await.unwrap().is_empty());
        assert_eq!(ledger.failed_since(Timestamp::now().minus_days(1)).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn unknown_reminder_is_not_found() {
        let ledger = InMemoryReminderLedger::new();
        let err = ledger.mark_sent(ReminderId::new(), None).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::ReminderNotFound);
    }

    #[tokio::test]
    async fn stale_claims_return_to_queue_with_attempt_counted() {
        let ledger = InMemoryReminderLedger::new();
        let id = created_id(ledger.try_enqueue(request("sub-1", ReminderEventType::PaymentUpcoming, 4)).await.unwrap());
        let long_ago = Timestamp::now().minus_days(1);
        ledger.claim(id, long_ago).await.unwrap();

        let released = ledger.release_stale_claims(Timestamp::now()).await.unwrap();

        let stored = ledger.find(id).await.unwrap().unwrap();
        assert_eq!(released, 1);
        assert_eq!(stored.status, ReminderStatus::Pending);
        assert_eq!(stored.attempts, 1);
        assert_eq!(stored.error_message.as_deref(), Some(STALE_CLAIM_ERROR));
    }

    #[tokio::test]
    async fn fresh_claims_are_left_alone() {
        let ledger = InMemoryReminderLedger::new();
        let id = created_id(ledger.try_enqueue(request("sub-1", ReminderEventType::PaymentUpcoming, 4)).await.unwrap());
        ledger.claim(id, Timestamp::now()).await.unwrap();

        let released = ledger.release_stale_claims(Timestamp::now().minus_days(1)).await.unwrap();
        assert_eq!(released, 0);
    }

    #[tokio::test]
    async fn keyed_cancel_leaves_other_occurrences_pending() {
        let ledger = InMemoryReminderLedger::new();
        let stale = created_id(ledger.try_enqueue(request("sub-1", ReminderEventType::PaymentUpcoming, 4)).await.unwrap());
        ledger.try_enqueue(request("sub-1", ReminderEventType::TrialEnding, 4)).await.unwrap();
        let sent = created_id(ledger.try_enqueue(request("sub-1", ReminderEventType::PaymentUpcoming, 5)).await.unwrap());
        ledger.mark_sent(sent, Some("msg".to_string())).await.unwrap();

        let keys = vec![
            request("sub-1", ReminderEventType::PaymentUpcoming, 4).dedup_key(),
            request("sub-1", ReminderEventType::PaymentUpcoming, 5).dedup_key(),
        ];
        let cancelled = ledger.cancel_pending_keys(&keys).await.unwrap();

        assert_eq!(cancelled, 1);
        assert_eq!(ledger.find(stale).await.unwrap().unwrap().status, ReminderStatus::Cancelled);
        assert_eq!(ledger.find(sent).await.unwrap().unwrap().status, ReminderStatus::Sent);

        let pending = ledger.pending_for_subscription(&SubscriptionId::new("sub-1").unwrap()).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].event_type, ReminderEventType::TrialEnding);
    }

    #[tokio::test]
    async fn finished_rows_are_kept_as_history() {
        let ledger = InMemoryReminderLedger::with_max_attempts(1);
        let sent = created_id(ledger.try_enqueue(request("sub-1", ReminderEventType::PaymentUpcoming, 4)).await.unwrap());
        ledger.mark_sent(sent, Some("msg".to_string())).await.unwrap();
        let failed = created_id(ledger.try_enqueue(request("sub-1", ReminderEventType::PaymentUpcoming, 5)).await.unwrap());
        ledger.mark_failed(failed, "bounced").await.unwrap();

        ledger.release_stale_claims(Timestamp::now().plus_days(365)).await.unwrap();
        ledger.cancel_pending(&SubscriptionId::new("sub-1").unwrap()).await.unwrap();

        assert_eq!(ledger.len().await, 2);
        for day in [4, 5] {
            let again = ledger.try_enqueue(request("sub-1", ReminderEventType::PaymentUpcoming, day)).await.unwrap();
            assert_eq!(again, EnqueueResult::AlreadyExists);
        }
    }
}
