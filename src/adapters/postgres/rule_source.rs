//! PostgreSQL implementation of RuleSource.

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::warn;

use crate::domain::foundation::{DomainError, ErrorCode, SubscriptionId, UserId};
use crate::domain::reminder::{ReminderEventType, ReminderRule, RuleScope, RuleSet};
use crate::ports::RuleSource;

/// Reads `reminder_rules`; a NULL `subscription_id` marks a user default.
pub struct PostgresRuleSource {
    pool: PgPool,
}

impl PostgresRuleSource {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct RuleRow {
    subscription_id: Option<String>,
    event_type: String,
    enabled: bool,
    lead_days: i32,
}

impl TryFrom<RuleRow> for ReminderRule {
    type Error = String;

    fn try_from(row: RuleRow) -> Result<Self, Self::Error> {
        let scope = match row.subscription_id {
            Some(id) => RuleScope::Subscription(SubscriptionId::new(id).map_err(|e| e.to_string())?),
            None => RuleScope::Default,
        };
        let event_type = row
            .event_type
            .parse::<ReminderEventType>()
            .map_err(|e| e.to_string())?;
        let lead_days = u32::try_from(row.lead_days)
            .map_err(|_| format!("lead_days must not be negative, got {}", row.lead_days))?;

        let rule = ReminderRule::new(scope, event_type, lead_days);
        Ok(if row.enabled { rule } else { rule.disabled() })
    }
}

/// Converts every row or none.
///
/// Dropping a bad row could leave the user without any default rule, which
/// would silently switch them to the built-in defaults.
fn rules_from_rows(user_id: &UserId, rows: Vec<RuleRow>) -> Result<RuleSet, DomainError> {
    let rules = rows
        .into_iter()
        .map(ReminderRule::try_from)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|reason| {
            warn!(user_id = %user_id, reason = %reason, "Malformed reminder rule");
            DomainError::new(ErrorCode::InvalidFormat, format!("Malformed reminder rule: {}", reason))
                .with_detail("user_id", user_id.as_str())
        })?;

    Ok(RuleSet::new(rules))
}

#[async_trait]
impl RuleSource for PostgresRuleSource {
    async fn rules_for_user(&self, user_id: &UserId) -> Result<RuleSet, DomainError> {
        let rows: Vec<RuleRow> = sqlx::query_as(
            r#"
            SELECT subscription_id, event_type, enabled, lead_days
            FROM reminder_rules
            WHERE user_id = $1
            ORDER BY subscription_id NULLS FIRST, event_type, enabled DESC, lead_days DESC
            "#,
        )
        .bind(user_id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to load reminder rules: {}", e)))?;

        rules_from_rows(user_id, rows)
    }
}
