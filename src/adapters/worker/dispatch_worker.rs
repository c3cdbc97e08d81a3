//! DispatchWorker - Background loop draining the reminder ledger.
//!
//! Evaluation runs only queue reminders; this worker delivers them:
//! 1. Evaluation writes pending reminders to the ledger
//! 2. **DispatchWorker polls the ledger and hands them to the dispatcher** ← This module
//!
//! ## Configuration
//!
//! | Setting | Default | Description |
//! |---------|---------|-------------|
//! | `poll_interval` | 30s | How often to drain due reminders |
//! | `recover_every` | 10 polls | How often abandoned claims are released |
//!
//! ## Graceful Shutdown
//!
//! The worker listens for a shutdown signal and runs one final drain
//! before stopping. A failing drain is logged and retried on the next tick
//! rather than ending the loop.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time;
use tracing::{error, info};

use crate::application::{DispatchReport, ReminderDispatcher};
use crate::domain::foundation::{DomainError, Timestamp};

/// Configuration for the DispatchWorker.
#[derive(Debug, Clone)]
pub struct DispatchWorkerConfig {
    /// How often to drain due reminders.
    pub poll_interval: Duration,

    /// Stale claims are recovered every this many polls.
    pub recover_every: u32,
}

impl Default for DispatchWorkerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(30),
            recover_every: 10,
        }
    }
}

impl DispatchWorkerConfig {
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_recover_every(mut self, polls: u32) -> Self {
        self.recover_every = polls.max(1);
        self
    }
}

/// Background service that periodically runs the dispatcher.
pub struct DispatchWorker {
    dispatcher: Arc<ReminderDispatcher>,
    config: DispatchWorkerConfig,
}

impl DispatchWorker {
    pub fn new(dispatcher: Arc<ReminderDispatcher>) -> Self {
        Self::with_config(dispatcher, DispatchWorkerConfig::default())
    }

    pub fn with_config(dispatcher: Arc<ReminderDispatcher>, config: DispatchWorkerConfig) -> Self {
        Self { dispatcher, config }
    }

    /// Runs until `shutdown` flips to `true` or its sender is dropped.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> DispatchReport {
        let mut interval = time::interval(self.config.poll_interval);
        interval.set_missed_tick_behavior(time::MissedTickBehavior::Delay);
        let mut total = DispatchReport::default();
        let mut polls: u32 = 0;

        info!(poll_interval_ms = self.config.poll_interval.as_millis() as u64, "Dispatch worker started");

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        // Shutdown requested - drain one final batch then exit
                        if let Some(report) = self.log_failure(self.poll_once().await) {
                            total += report;
                        }
                        info!(sent = total.sent, failed = total.failed, "Dispatch worker stopped");
                        return total;
                    }
                }

                _ = interval.tick() => {
                    if polls % self.config.recover_every.max(1) == 0 {
                        if let Err(e) = self.dispatcher.recover_stale_claims(Timestamp::now()).await {
                            error!(error = %e, "Failed to recover stale claims");
                        }
                    }
                    polls = polls.wrapping_add(1);

                    if let Some(report) = self.log_failure(self.poll_once().await) {
                        total += report;
                    }
                }
            }
        }
    }

    /// Runs exactly one drain at the current time.
    pub async fn poll_once(&self) -> Result<DispatchReport, DomainError> {
        self.dispatcher.drain_and_send(Timestamp::now()).await
    }

    fn log_failure(&self, result: Result<DispatchReport, DomainError>) -> Option<DispatchReport> {
        match result {
            Ok(report) => Some(report),
            Err(e) => {
                error!(error = %e, "Dispatch poll failed");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::email::MockDeliveryChannel;
    use crate::adapters::memory::{InMemoryReminderLedger, InMemorySubscriptionSource};
    use crate::domain::billing::{BillingCycle, Subscription};
    use crate::domain::foundation::{SubscriptionId, UserId};
    use crate::domain::reminder::{NewReminder, ReminderEventType, ReminderStatus};
    use crate::ports::ReminderLedger;
    use chrono::NaiveDate;

    async fn setup() -> (Arc<InMemoryReminderLedger>, MockDeliveryChannel, DispatchWorker) {
        let subscription = Subscription::new(
            SubscriptionId::new("sub-1").unwrap(),
            UserId::new("user-1").unwrap(),
            "Cloud Storage",
            BillingCycle::Monthly,
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        );
        let ledger = Arc::new(InMemoryReminderLedger::new());
        ledger
            .try_enqueue(NewReminder {
                subscription_id: subscription.id.clone(),
                user_id: subscription.user_id.clone(),
                event_type: ReminderEventType::PaymentUpcoming,
                event_date: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
                lead_days: 3,
                scheduled_for: Timestamp::now().minus_days(1),
            })
            .await
            .unwrap();

        let channel = MockDeliveryChannel::new();
        let dispatcher = Arc::new(ReminderDispatcher::new(
            ledger.clone(),
            Arc::new(InMemorySubscriptionSource::with_subscriptions(vec![subscription])),
            Arc::new(channel.clone()),
        ));
        let worker = DispatchWorker::with_config(
            dispatcher,
            DispatchWorkerConfig::default().with_poll_interval(Duration::from_millis(10)),
        );
        (ledger, channel, worker)
    }

    #[tokio::test]
    async fn poll_once_delivers_due_reminders() {
        let (ledger, channel, worker) = setup().await;

        let report = worker.poll_once().await.unwrap();

        assert_eq!(report.sent, 1);
        assert_eq!(channel.call_count(), 1);
        assert_eq!(ledger.all().await[0].status, ReminderStatus::Sent);
    }

    #[tokio::test]
    async fn run_stops_on_shutdown_signal() {
        let (ledger, _channel, worker) = setup().await;
        let (tx, rx) = watch::channel(false);

        let handle = tokio::spawn(async move { worker.run(rx).await });
        tokio::time::sleep(Duration::from_millis(50)).await;
        tx.send(true).unwrap();

        let total = tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("worker should stop")
            .unwrap();

        assert_eq!(total.sent, 1);
        assert_eq!(ledger.all().await[0].status, ReminderStatus::Sent);
    }
}
