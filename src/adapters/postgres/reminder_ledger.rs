//! PostgreSQL implementation of ReminderLedger.
//!
//! Deduplication rests on the partial unique index
//! `scheduled_reminders_dedup_idx` over (subscription_id, event_type,
//! event_date) for live statuses; `try_enqueue` inserts with
//! `ON CONFLICT DO NOTHING` against it. Claims are a conditional `UPDATE`
//! guarded by `status = 'pending'`.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::foundation::{
    DomainError, ErrorCode, ReminderId, SubscriptionId, Timestamp, UserId,
};
use crate::domain::reminder::{
    DedupKey, NewReminder, ReminderEventType, ReminderStatus, ScheduledReminder, DEFAULT_MAX_ATTEMPTS,
    STALE_CLAIM_ERROR,
};
use crate::ports::{EnqueueResult, ReminderLedger};

const SELECT_COLUMNS: &str = r#"
    SELECT id, subscription_id, user_id, event_type, event_date, lead_days, status,
           attempts, scheduled_for, claimed_at, delivery_id, error_message,
           created_at, updated_at
    FROM scheduled_reminders
"#;

/// PostgreSQL implementation of the ReminderLedger port.
pub struct PostgresReminderLedger {
    pool: PgPool,
    max_attempts: u32,
}

impl PostgresReminderLedger {
    pub fn new(pool: PgPool) -> Self {
        Self::with_max_attempts(pool, DEFAULT_MAX_ATTEMPTS)
    }

    pub fn with_max_attempts(pool: PgPool, max_attempts: u32) -> Self {
        Self { pool, max_attempts }
    }

    fn max_attempts_param(&self) -> i32 {
        i32::try_from(self.max_attempts).unwrap_or(i32::MAX)
    }

    /// Explains why a guarded update touched no row.
    async fn missed_update(&self, id: ReminderId, action: &str) -> DomainError {
        match self.find(id).await {
            Ok(Some(reminder)) => {
                DomainError::invalid_transition(id, format!("Cannot {} a {} reminder", action, reminder.status))
            }
            Ok(None) => DomainError::reminder_not_found(id),
            Err(e) => e,
        }
    }
}

/// Database row representation of a scheduled reminder.
#[derive(Debug, sqlx::FromRow)]
struct ReminderRow {
    id: Uuid,
    subscription_id: String,
    user_id: String,
    event_type: String,
    event_date: NaiveDate,
    lead_days: i32,
    status: String,
    attempts: i32,
    scheduled_for: DateTime<Utc>,
    claimed_at: Option<DateTime<Utc>>,
    delivery_id: Option<String>,
    error_message: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ReminderRow> for ScheduledReminder {
    type Error = DomainError;

    fn try_from(row: ReminderRow) -> Result<Self, Self::Error> {
        let corrupt = |field: &str, e: String| {
            DomainError::new(ErrorCode::DatabaseError, format!("Invalid {}: {}", field, e))
                .with_detail("reminder_id", row.id.to_string())
        };

        Ok(ScheduledReminder {
            id: ReminderId::from_uuid(row.id),
            subscription_id: SubscriptionId::new(row.subscription_id.clone())
                .map_err(|e| corrupt("subscription_id", e.to_string()))?,
            user_id: UserId::new(row.user_id.clone()).map_err(|e| corrupt("user_id", e.to_string()))?,
            event_type: row
                .event_type
                .parse::<ReminderEventType>()
                .map_err(|e| corrupt("event_type", e.to_string()))?,
            event_date: row.event_date,
            lead_days: u32::try_from(row.lead_days).map_err(|e| corrupt("lead_days", e.to_string()))?,
            status: row
                .status
                .parse::<ReminderStatus>()
                .map_err(|e| corrupt("status", e.to_string()))?,
            attempts: u32::try_from(row.attempts).map_err(|e| corrupt("attempts", e.to_string()))?,
            scheduled_for: Timestamp::from_datetime(row.scheduled_for),
            claimed_at: row.claimed_at.map(Timestamp::from_datetime),
            delivery_id: row.delivery_id,
            error_message: row.error_message,
            created_at: Timestamp::from_datetime(row.created_at),
            updated_at: Timestamp::from_datetime(row.updated_at),
        })
    }
}

fn db_error(context: &str, e: sqlx::Error) -> DomainError {
    DomainError::database(format!("Failed to {}: {}", context, e))
}

fn into_reminders(rows: Vec<ReminderRow>) -> Result<Vec<ScheduledReminder>, DomainError> {
    rows.into_iter().map(ScheduledReminder::try_from).collect()
}

#[async_trait]
impl ReminderLedger for PostgresReminderLedger {
    async fn try_enqueue(&self, reminder: NewReminder) -> Result<EnqueueResult, DomainError> {
        let id = ReminderId::new();
        let now = Timestamp::now();
        let lead_days = i32::try_from(reminder.lead_days)
            .map_err(|_| DomainError::validation("lead_days", "Lead time does not fit the ledger"))?;

        let result = sqlx::query(
            r#"
            INSERT INTO scheduled_reminders (
                id, subscription_id, user_id, event_type, event_date, lead_days,
                status, attempts, scheduled_for, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, 'pending', 0, $7, $8, $8)
            ON CONFLICT (subscription_id, event_type, event_date)
                WHERE status IN ('pending', 'sending', 'sent', 'failed')
            DO NOTHING
            "#,
        )
        .bind(id.as_uuid())
        .bind(reminder.subscription_id.as_str())
        .bind(reminder.user_id.as_str())
        .bind(reminder.event_type.as_str())
        .bind(reminder.event_date)
        .bind(lead_days)
        .bind(reminder.scheduled_for.as_datetime())
        .bind(now.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("enqueue reminder", e))?;

        if result.rows_affected() == 1 {
            Ok(EnqueueResult::Created(id))
        } else {
            Ok(EnqueueResult::AlreadyExists)
        }
    }

    async fn list_due(&self, now: Timestamp, limit: usize) -> Result<Vec<ScheduledReminder>, DomainError> {
        let query = format!(
            "{} WHERE status = 'pending' AND scheduled_for <= $1 AND attempts < $2 \
             ORDER BY scheduled_for, created_at LIMIT $3",
            SELECT_COLUMNS
        );
        let rows: Vec<ReminderRow> = sqlx::query_as(&query)
            .bind(now.as_datetime())
            .bind(self.max_attempts_param())
            .bind(i64::try_from(limit).unwrap_or(i64::MAX))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| db_error("list due reminders", e))?;

        into_reminders(rows)
    }

    async fn claim(&self, id: ReminderId, now: Timestamp) -> Result<bool, DomainError> {
        let result = sqlx::query(
            r#"
            UPDATE scheduled_reminders
            SET status = 'sending', claimed_at = $2, updated_at = $2
            WHERE id = $1 AND status = 'pending'
            "#,
        )
        .bind(id.as_uuid())
        .bind(now.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("claim reminder", e))?;

        Ok(result.rows_affected() == 1)
    }

    async fn mark_sent(&self, id: ReminderId, delivery_id: Option<String>) -> Result<(), DomainError> {
        let result = sqlx::query(
            r#"
            UPDATE scheduled_reminders
            SET status = 'sent', attempts = attempts + 1, delivery_id = $2,
                error_message = NULL, claimed_at = NULL, updated_at = $3
            WHERE id = $1 AND status IN ('pending', 'sending')
            "#,
        )
        .bind(id.as_uuid())
        .bind(delivery_id)
        .bind(Timestamp::now().as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("mark reminder sent", e))?;

        if result.rows_affected() == 0 {
            return Err(self.missed_update(id, "send").await);
        }
        Ok(())
    }

    async fn mark_failed(&self, id: ReminderId, error: &str) -> Result<ReminderStatus, DomainError> {
        let status: Option<String> = sqlx::query_scalar(
            r#"
            UPDATE scheduled_reminders
            SET attempts = attempts + 1,
                status = CASE WHEN attempts + 1 >= $3 THEN 'failed' ELSE 'pending' END,
                error_message = $2, claimed_at = NULL, updated_at = $4
            WHERE id = $1 AND status IN ('pending', 'sending')
            RETURNING status
            "#,
        )
        .bind(id.as_uuid())
        .bind(error)
        .bind(self.max_attempts_param())
        .bind(Timestamp::now().as_datetime())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("mark reminder failed", e))?;

        match status {
            Some(status) => status
                .parse::<ReminderStatus>()
                .map_err(|e| DomainError::database(format!("Invalid status: {}", e))),
            None => Err(self.missed_update(id, "fail").await),
        }
    }

    async fn mark_skipped(&self, id: ReminderId, reason: &str) -> Result<(), DomainError> {
        let result = sqlx::query(
            r#"
            UPDATE scheduled_reminders
            SET status = 'skipped', error_message = $2, claimed_at = NULL, updated_at = $3
            WHERE id = $1 AND status IN ('pending', 'sending')
            "#,
        )
        .bind(id.as_uuid())
        .bind(reason)
        .bind(Timestamp::now().as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("mark reminder skipped", e))?;

        if result.rows_affected() == 0 {
            return Err(self.missed_update(id, "skip").await);
        }
        Ok(())
    }

    async fn cancel_pending(&self, subscription_id: &SubscriptionId) -> Result<u64, DomainError> {
        let result = sqlx::query(
            r#"
            UPDATE scheduled_reminders
            SET status = 'cancelled', updated_at = $2
            WHERE subscription_id = $1 AND status = 'pending'
            "#,
        )
        .bind(subscription_id.as_str())
        .bind(Timestamp::now().as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("cancel pending reminders", e))?;

        Ok(result.rows_affected())
    }

    async fn pending_for_subscription(
        &self,
        subscription_id: &SubscriptionId,
    ) -> Result<Vec<ScheduledReminder>, DomainError> {
        let query = format!(
            "{} WHERE subscription_id = $1 AND status = 'pending' ORDER BY event_date, event_type",
            SELECT_COLUMNS
        );
        let rows: Vec<ReminderRow> = sqlx::query_as(&query)
            .bind(subscription_id.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| db_error("list pending reminders", e))?;

        into_reminders(rows)
    }

    async fn cancel_pending_keys(&self, keys: &[DedupKey]) -> Result<u64, DomainError> {
        if keys.is_empty() {
            return Ok(0);
        }
        let subscription_ids: Vec<String> = keys.iter().map(|k| k.subscription_id.as_str().to_string()).collect();
        let event_types: Vec<String> = keys.iter().map(|k| k.event_type.as_str().to_string()).collect();
        let event_dates: Vec<NaiveDate> = keys.iter().map(|k| k.event_date).collect();

        let result = sqlx::query(
            r#"
            UPDATE scheduled_reminders r
            SET status = 'cancelled', updated_at = $4
            FROM UNNEST($1::text[], $2::text[], $3::date[]) AS k(subscription_id, event_type, event_date)
            WHERE r.subscription_id = k.subscription_id
              AND r.event_type = k.event_type
              AND r.event_date = k.event_date
              AND r.status = 'pending'
            "#,
        )
        .bind(&subscription_ids)
        .bind(&event_types)
        .bind(&event_dates)
        .bind(Timestamp::now().as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("cancel pending reminders by occurrence", e))?;

        Ok(result.rows_affected())
    }

    async fn release_stale_claims(&self, claimed_before: Timestamp) -> Result<u64, DomainError> {
        let result = sqlx::query(
            r#"
            UPDATE scheduled_reminders
            SET attempts = attempts + 1,
                status = CASE WHEN attempts + 1 >= $2 THEN 'failed' ELSE 'pending' END,
                error_message = $3, claimed_at = NULL, updated_at = $4
            WHERE status = 'sending' AND (claimed_at IS NULL OR claimed_at < $1)
            "#,
        )
        .bind(claimed_before.as_datetime())
        .bind(self.max_attempts_param())
        .bind(STALE_CLAIM_ERROR)
        .bind(Timestamp::now().as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("release stale claims", e))?;

        Ok(result.rows_affected())
    }

    async fn find(&self, id: ReminderId) -> Result<Option<ScheduledReminder>, DomainError> {
        let query = format!("{} WHERE id = $1", SELECT_COLUMNS);
        let row: Option<ReminderRow> = sqlx::query_as(&query)
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_error("find reminder", e))?;

        row.map(ScheduledReminder::try_from).transpose()
    }

    async fn failed_since(&self, since: Timestamp) -> Result<Vec<ScheduledReminder>, DomainError> {
        let query = format!(
            "{} WHERE status = 'failed' AND updated_at >= $1 ORDER BY updated_at",
            SELECT_COLUMNS
        );
        let rows: Vec<ReminderRow> = sqlx::query_as(&query)
            .bind(since.as_datetime())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| db_error("list failed reminders", e))?;

        into_reminders(rows)
    }
}
