//! Operator reporting over the ledger.
//!
//! Ledger rows are history and are never deleted here; cleanup of old rows
//! belongs to whoever operates the database.

use std::sync::Arc;

use crate::domain::foundation::{DomainError, Timestamp};
use crate::domain::reminder::ScheduledReminder;
use crate::ports::ReminderLedger;

/// Lists recent terminal failures for operators.
pub struct ReminderMaintenanceHandler {
    ledger: Arc<dyn ReminderLedger>,
}

impl ReminderMaintenanceHandler {
    pub fn new(ledger: Arc<dyn ReminderLedger>) -> Self {
        Self { ledger }
    }

    /// Reminders that exhausted their attempts within the last `days` days.
    pub async fn recent_failures(&self, now: Timestamp, days: u32) -> Result<Vec<ScheduledReminder>, DomainError> {
        self.ledger.failed_since(now.minus_days(i64::from(days))).await
    }
}
