//! EvaluateRemindersHandler - Daily evaluation run.
//!
//! Loads a user's subscriptions and rules, asks the evaluator which
//! reminders fire on the reference day, and enqueues them in the ledger.
//! Re-running for the same day is harmless: the ledger reports the
//! occurrences already covered as duplicates.

use std::ops::AddAssign;
use std::sync::Arc;

use chrono::NaiveDate;
use futures::stream::{self, StreamExt};
use tracing::{debug, error, info, warn};

use crate::domain::billing::Subscription;
use crate::domain::foundation::{DomainError, Timestamp, UserId};
use crate::domain::reminder::{NewReminder, ReminderRuleEvaluator, RuleSet};
use crate::ports::{EnqueueResult, ReminderLedger, RuleSource, SubscriptionSource};

const DEFAULT_CONCURRENCY: usize = 8;

/// Command to evaluate one user's reminders for a day.
#[derive(Debug, Clone)]
pub struct EvaluateRemindersCommand {
    pub user_id: UserId,
    /// The day "today" is, in the user's calendar.
    pub reference_date: NaiveDate,
    /// Becomes `scheduled_for` of every reminder created.
    pub now: Timestamp,
}

/// Outcome counters of an evaluation run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EvaluationReport {
    pub subscriptions_evaluated: usize,
    pub reminders_created: usize,
    pub duplicates: usize,
    /// Subscriptions whose data could not be parsed or projected.
    pub malformed: usize,
    /// Ledger or source faults. The next scheduled run retries them.
    pub storage_errors: usize,
}

impl EvaluationReport {
    /// True when some work was lost to storage faults and should be retried.
    pub fn is_partial_failure(&self) -> bool {
        self.storage_errors > 0
    }
}

impl AddAssign for EvaluationReport {
    fn add_assign(&mut self, other: Self) {
        self.subscriptions_evaluated += other.subscriptions_evaluated;
        self.reminders_created += other.reminders_created;
        self.duplicates += other.duplicates;
        self.malformed += other.malformed;
        self.storage_errors += other.storage_errors;
    }
}

/// Handler for evaluation runs.
pub struct EvaluateRemindersHandler {
    subscriptions: Arc<dyn SubscriptionSource>,
    rules: Arc<dyn RuleSource>,
    ledger: Arc<dyn ReminderLedger>,
    concurrency: usize,
}

impl EvaluateRemindersHandler {
    pub fn new(
        subscriptions: Arc<dyn SubscriptionSource>,
        rules: Arc<dyn RuleSource>,
        ledger: Arc<dyn ReminderLedger>,
    ) -> Self {
        Self {
            subscriptions,
            rules,
            ledger,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    /// Caps how many subscriptions are evaluated at once.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Evaluates one user.
    ///
    /// Fails only when the user's subscriptions or rules cannot be loaded.
    /// Per-subscription problems are counted in the report instead.
    pub async fn handle(&self, cmd: EvaluateRemindersCommand) -> Result<EvaluationReport, DomainError> {
        let loaded = self.subscriptions.active_subscriptions(&cmd.user_id).await?;
        let rule_set = self.rules.rules_for_user(&cmd.user_id).await?;

        let mut report = EvaluationReport::default();
        let mut subscriptions = Vec::with_capacity(loaded.len());
        for row in loaded {
            match row {
                Ok(subscription) => subscriptions.push(subscription),
                Err(e) => {
                    warn!(user_id = %cmd.user_id, error = %e, "Skipping malformed subscription");
                    report.malformed += 1;
                }
            }
        }

        let rule_set = &rule_set;
        let cmd = &cmd;
        let per_subscription: Vec<EvaluationReport> = stream::iter(subscriptions)
            .map(|subscription| async move {
                enqueue_due(self.ledger.as_ref(), &subscription, rule_set, cmd.reference_date, cmd.now).await
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        for partial in per_subscription {
            report += partial;
        }

        debug!(
            user_id = %cmd.user_id,
            reference_date = %cmd.reference_date,
            created = report.reminders_created,
            duplicates = report.duplicates,
            "Evaluated reminders for user"
        );
        Ok(report)
    }

    /// Evaluates every user owning an active subscription.
    ///
    /// A user whose data cannot be loaded is logged and counted as a storage
    /// error; the remaining users are still evaluated.
    pub async fn run_all(&self, reference_date: NaiveDate, now: Timestamp) -> Result<EvaluationReport, DomainError> {
        let users = self.subscriptions.users_with_active_subscriptions().await?;
        let mut report = EvaluationReport::default();

        for user_id in users {
            let cmd = EvaluateRemindersCommand {
                user_id: user_id.clone(),
                reference_date,
                now,
            };
            match self.handle(cmd).await {
                Ok(partial) => report += partial,
                Err(e) => {
                    error!(user_id = %user_id, error = %e, "Evaluation failed for user");
                    report.storage_errors += 1;
                }
            }
        }

        info!(
            reference_date = %reference_date,
            subscriptions = report.subscriptions_evaluated,
            created = report.reminders_created,
            duplicates = report.duplicates,
            malformed = report.malformed,
            storage_errors = report.storage_errors,
            "Evaluation run finished"
        );
        Ok(report)
    }
}

/// Evaluates one subscription for `reference_date` and enqueues what fires.
///
/// Shared by evaluation runs and by rescheduling after a subscription edit.
pub(crate) async fn enqueue_due(
    ledger: &dyn ReminderLedger,
    subscription: &Subscription,
    rule_set: &RuleSet,
    reference_date: NaiveDate,
    now: Timestamp,
) -> EvaluationReport {
    let mut report = EvaluationReport::default();

    let due = match ReminderRuleEvaluator::evaluate(subscription, rule_set.rules(), reference_date) {
        Ok(due) => due,
        Err(e) => {
            warn!(subscription_id = %subscription.id, error = %e, "Cannot evaluate subscription");
            report.malformed += 1;
            return report;
        }
    };
    report.subscriptions_evaluated += 1;

    for reminder in due {
        let request = NewReminder {
            subscription_id: subscription.id.clone(),
            user_id: subscription.user_id.clone(),
            event_type: reminder.event_type,
            event_date: reminder.event_date,
            lead_days: reminder.lead_days,
            scheduled_for: now,
        };

        match ledger.try_enqueue(request).await {
            Ok(EnqueueResult::Created(id)) => {
                debug!(
                    reminder_id = %id,
                    subscription_id = %subscription.id,
                    event_type = %reminder.event_type,
                    event_date = %reminder.event_date,
                    "Reminder scheduled"
                );
                report.reminders_created += 1;
            }
            Ok(EnqueueResult::AlreadyExists) => report.duplicates += 1,
            Err(e) => {
                error!(
                    subscription_id = %subscription.id,
                    event_type = %reminder.event_type,
                    error = %e,
                    "Failed to enqueue reminder"
                );
                report.storage_errors += 1;
            }
        }
    }

    report
}
