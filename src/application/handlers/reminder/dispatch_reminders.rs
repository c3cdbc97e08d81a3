//! ReminderDispatcher - Drains due reminders and delivers them.
//!
//! For each due reminder:
//! 1. Claim it (`pending -> sending`); losing the race means another
//!    dispatcher owns it.
//! 2. Re-check the subscription. Deleted or inactive subscriptions are
//!    skipped instead of delivered.
//! 3. Render and send through the channel, bounded by the delivery timeout.
//! 4. Record the outcome. Failures go back to `pending` until the attempt
//!    cap makes them terminal. Recording a delivery is retried a few times,
//!    since a row left in `sending` is re-queued once its claim expires.
//!
//! A fault on one reminder never aborts the batch.

use std::ops::AddAssign;
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::domain::foundation::{DomainError, Timestamp};
use crate::domain::reminder::{ReminderPayload, ReminderStatus, ScheduledReminder};
use crate::ports::{DeliveryChannel, DeliveryError, ReminderLedger, SubscriptionSource};

/// Times `mark_sent` is tried after a successful delivery.
const RECORD_ATTEMPTS: u32 = 3;
const RECORD_RETRY_DELAY: Duration = Duration::from_millis(50);

/// Tuning knobs for a dispatcher.
#[derive(Debug, Clone)]
pub struct DispatchSettings {
    /// Max reminders fetched per drain.
    pub batch_size: usize,
    /// Max deliveries in flight at once.
    pub concurrency: usize,
    /// Upper bound on a single channel call.
    pub delivery_timeout: Duration,
    /// Claims older than this are considered abandoned.
    pub claim_timeout: Duration,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            batch_size: 100,
            concurrency: 4,
            delivery_timeout: Duration::from_secs(10),
            claim_timeout: Duration::from_secs(300),
        }
    }
}

/// Outcome counters of one drain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub sent: usize,
    /// Terminally failed in this drain.
    pub failed: usize,
    /// Failed but returned to the queue for another attempt.
    pub retrying: usize,
    /// Not delivered because the subscription is gone or inactive.
    pub skipped: usize,
    /// Claimed by a concurrent dispatcher first.
    pub lost_claims: usize,
    pub storage_errors: usize,
    /// Delivered, but the ledger could not record it. These may be
    /// delivered again after their claim expires.
    pub unrecorded: usize,
}

impl DispatchReport {
    pub fn processed(&self) -> usize {
        self.sent
            + self.failed
            + self.retrying
            + self.skipped
            + self.lost_claims
            + self.storage_errors
            + self.unrecorded
    }

    /// True when the ledger misbehaved during the drain.
    pub fn has_storage_faults(&self) -> bool {
        self.storage_errors > 0 || self.unrecorded > 0
    }
}

impl AddAssign for DispatchReport {
    fn add_assign(&mut self, other: Self) {
        self.sent += other.sent;
        self.failed += other.failed;
        self.retrying += other.retrying;
        self.skipped += other.skipped;
        self.lost_claims += other.lost_claims;
        self.storage_errors += other.storage_errors;
        self.unrecorded += other.unrecorded;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Sent,
    Retrying,
    Failed,
    Skipped,
    LostClaim,
    StorageError,
    Unrecorded,
}

impl From<Outcome> for DispatchReport {
    fn from(outcome: Outcome) -> Self {
        let mut report = DispatchReport::default();
        match outcome {
            Outcome::Sent => report.sent = 1,
            Outcome::Retrying => report.retrying = 1,
            Outcome::Failed => report.failed = 1,
            Outcome::Skipped => report.skipped = 1,
            Outcome::LostClaim => report.lost_claims = 1,
            Outcome::StorageError => report.storage_errors = 1,
            Outcome::Unrecorded => report.unrecorded = 1,
        }
        report
    }
}

/// Delivers due reminders from the ledger through a channel.
pub struct ReminderDispatcher {
    ledger: Arc<dyn ReminderLedger>,
    subscriptions: Arc<dyn SubscriptionSource>,
    channel: Arc<dyn DeliveryChannel>,
    settings: DispatchSettings,
}

impl ReminderDispatcher {
    pub fn new(
        ledger: Arc<dyn ReminderLedger>,
        subscriptions: Arc<dyn SubscriptionSource>,
        channel: Arc<dyn DeliveryChannel>,
    ) -> Self {
        Self::with_settings(ledger, subscriptions, channel, DispatchSettings::default())
    }

    pub fn with_settings(
        ledger: Arc<dyn ReminderLedger>,
        subscriptions: Arc<dyn SubscriptionSource>,
        channel: Arc<dyn DeliveryChannel>,
        settings: DispatchSettings,
    ) -> Self {
        Self {
            ledger,
            subscriptions,
            channel,
            settings,
        }
    }

    pub fn settings(&self) -> &DispatchSettings {
        &self.settings
    }

    /// Sends every reminder due at `now`, up to one batch.
    ///
    /// Fails only when the due list itself cannot be read.
    pub async fn drain_and_send(&self, now: Timestamp) -> Result<DispatchReport, DomainError> {
        let due = self.ledger.list_due(now, self.settings.batch_size).await?;
        if due.is_empty() {
            return Ok(DispatchReport::default());
        }

        let outcomes: Vec<Outcome> = stream::iter(due)
            .map(|reminder| self.dispatch_one(reminder, now))
            .buffer_unordered(self.settings.concurrency.max(1))
            .collect()
            .await;

        let mut report = DispatchReport::default();
        for outcome in outcomes {
            report += DispatchReport::from(outcome);
        }

        info!(
            channel = self.channel.name(),
            sent = report.sent,
            retrying = report.retrying,
            failed = report.failed,
            skipped = report.skipped,
            lost_claims = report.lost_claims,
            storage_errors = report.storage_errors,
            unrecorded = report.unrecorded,
            "Dispatch batch finished"
        );
        Ok(report)
    }

    /// Returns abandoned `sending` claims to the queue.
    pub async fn recover_stale_claims(&self, now: Timestamp) -> Result<u64, DomainError> {
        let cutoff = now.minus_std(self.settings.claim_timeout);
        let released = self.ledger.release_stale_claims(cutoff).await?;
        if released > 0 {
            warn!(released, "Released stale reminder claims");
        }
        Ok(released)
    }

    async fn dispatch_one(&self, reminder: ScheduledReminder, now: Timestamp) -> Outcome {
        let id = reminder.id;

        match self.ledger.claim(id, now).await {
            Ok(true) => {}
            Ok(false) => {
                debug!(reminder_id = %id, "Reminder claimed elsewhere");
                return Outcome::LostClaim;
            }
            Err(e) => {
                error!(reminder_id = %id, error = %e, "Failed to claim reminder");
                return Outcome::StorageError;
            }
        }

        let subscription = match self.subscriptions.find(&reminder.subscription_id).await {
            Ok(Some(Ok(subscription))) if subscription.active => subscription,
            Ok(Some(Ok(_))) => return self.skip(&reminder, "subscription is inactive").await,
            Ok(None) => return self.skip(&reminder, "subscription no longer exists").await,
            Ok(Some(Err(e))) => return self.skip(&reminder, &format!("subscription is malformed: {}", e)).await,
            Err(e) => {
                error!(reminder_id = %id, error = %e, "Liveness check failed");
                if let Err(e) = self.ledger.mark_failed(id, &format!("liveness check failed: {}", e)).await {
                    error!(reminder_id = %id, error = %e, "Failed to release reminder");
                }
                return Outcome::StorageError;
            }
        };

        let payload = ReminderPayload::render(&reminder, &subscription, now.date());
        let delivery = match timeout(self.settings.delivery_timeout, self.channel.send(&payload)).await {
            Ok(result) => result,
            Err(_) => Err(DeliveryError::Timeout(self.settings.delivery_timeout.as_secs())),
        };

        match delivery {
            Ok(delivery_id) => self.record_delivery(&reminder, delivery_id.into_inner()).await,
            Err(delivery_error) => {
                let message = delivery_error.to_string();
                match self.ledger.mark_failed(id, &message).await {
                    Ok(ReminderStatus::Failed) => {
                        error!(
                            reminder_id = %id,
                            attempts = reminder.attempts + 1,
                            error = %message,
                            "Reminder delivery failed permanently"
                        );
                        Outcome::Failed
                    }
                    Ok(_) => {
                        warn!(reminder_id = %id, error = %message, "Reminder delivery failed, will retry");
                        Outcome::Retrying
                    }
                    Err(e) => {
                        error!(reminder_id = %id, error = %e, "Failed to record delivery failure");
                        Outcome::StorageError
                    }
                }
            }
        }
    }

    async fn record_delivery(&self, reminder: &ScheduledReminder, delivery_id: String) -> Outcome {
        let id = reminder.id;
        let mut attempt = 1;
        loop {
            match self.ledger.mark_sent(id, Some(delivery_id.clone())).await {
                Ok(()) => {
                    debug!(reminder_id = %id, event_type = %reminder.event_type, "Reminder delivered");
                    return Outcome::Sent;
                }
                Err(e) if attempt < RECORD_ATTEMPTS && e.is_infrastructure() => {
                    warn!(reminder_id = %id, attempt, error = %e, "Failed to record delivery, retrying");
                    tokio::time::sleep(RECORD_RETRY_DELAY * attempt).await;
                    attempt += 1;
                }
                Err(e) => {
                    error!(
                        reminder_id = %id,
                        subscription_id = %reminder.subscription_id,
                        delivery_id = %delivery_id,
                        error = %e,
                        "Reminder delivered but not recorded; it may be delivered again once its claim expires"
                    );
                    return Outcome::Unrecorded;
                }
            }
        }
    }

    async fn skip(&self, reminder: &ScheduledReminder, reason: &str) -> Outcome {
        match self.ledger.mark_skipped(reminder.id, reason).await {
            Ok(()) => {
                info!(reminder_id = %reminder.id, subscription_id = %reminder.subscription_id, reason, "Reminder skipped");
                Outcome::Skipped
            }
            Err(e) => {
                error!(reminder_id = %reminder.id, error = %e, "Failed to skip reminder");
                Outcome::StorageError
            }
        }
    }
}
