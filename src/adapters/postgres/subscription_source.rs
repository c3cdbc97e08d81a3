//! PostgreSQL implementation of SubscriptionSource.
//!
//! Reads the `subscriptions` table owned by the CRUD service. Rows are
//! parsed one by one; a malformed row becomes an `Err` entry instead of
//! failing the whole query.

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::PgPool;
use tracing::warn;

use crate::domain::billing::{BillingCycle, Price, RecurrenceError, Subscription};
use crate::domain::foundation::{DomainError, SubscriptionId, UserId};
use crate::ports::{LoadedSubscription, SubscriptionSource};

const SELECT_COLUMNS: &str = r#"
    SELECT id, user_id, name, price_minor, currency, billing_cycle,
           anchor_date, trial_end_date, active
    FROM subscriptions
"#;

pub struct PostgresSubscriptionSource {
    pool: PgPool,
}

impl PostgresSubscriptionSource {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct SubscriptionRow {
    id: String,
    user_id: String,
    name: String,
    price_minor: Option<i64>,
    currency: Option<String>,
    billing_cycle: String,
    anchor_date: NaiveDate,
    trial_end_date: Option<NaiveDate>,
    active: bool,
}

impl SubscriptionRow {
    fn into_loaded(self) -> LoadedSubscription {
        let invalid = |reason: String| RecurrenceError::InvalidRecord {
            record: self.id.clone(),
            reason,
        };

        let id = SubscriptionId::new(self.id.clone()).map_err(|e| invalid(e.to_string()))?;
        let user_id = UserId::new(self.user_id.clone()).map_err(|e| invalid(e.to_string()))?;
        let cycle = BillingCycle::parse_for(&id, &self.billing_cycle)?;
        let price = match (self.price_minor, self.currency) {
            (Some(amount), Some(currency)) => Some(Price::new(amount, currency)),
            _ => None,
        };

        Ok(Subscription {
            id,
            user_id,
            name: self.name,
            price,
            cycle,
            anchor_date: self.anchor_date,
            trial_end_date: self.trial_end_date,
            active: self.active,
        })
    }
}

#[async_trait]
impl SubscriptionSource for PostgresSubscriptionSource {
    async fn active_subscriptions(&self, user_id: &UserId) -> Result<Vec<LoadedSubscription>, DomainError> {
        let query = format!("{} WHERE user_id = $1 AND active ORDER BY id", SELECT_COLUMNS);
        let rows: Vec<SubscriptionRow> = sqlx::query_as(&query)
            .bind(user_id.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| DomainError::database(format!("Failed to load subscriptions: {}", e)))?;

        Ok(rows.into_iter().map(SubscriptionRow::into_loaded).collect())
    }

    async fn users_with_active_subscriptions(&self) -> Result<Vec<UserId>, DomainError> {
        let user_ids: Vec<String> =
            sqlx::query_scalar("SELECT DISTINCT user_id FROM subscriptions WHERE active ORDER BY user_id")
                .fetch_all(&self.pool)
                .await
                .map_err(|e| DomainError::database(format!("Failed to load users: {}", e)))?;

        Ok(user_ids
            .into_iter()
            .filter_map(|raw| match UserId::new(raw) {
                Ok(user_id) => Some(user_id),
                Err(e) => {
                    warn!(error = %e, "Skipping subscription owner with invalid user id");
                    None
                }
            })
            .collect())
    }

    async fn find(&self, id: &SubscriptionId) -> Result<Option<LoadedSubscription>, DomainError> {
        let query = format!("{} WHERE id = $1", SELECT_COLUMNS);
        let row: Option<SubscriptionRow> = sqlx::query_as(&query)
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| DomainError::database(format!("Failed to find subscription: {}", e)))?;

        Ok(row.map(SubscriptionRow::into_loaded))
    }
}
