//! CalendarQueryHandler - Upcoming events for calendar export.

use std::sync::Arc;

use chrono::NaiveDate;
use serde::Serialize;
use tracing::warn;

use crate::domain::calendar::{CalendarEvent, CalendarProjector};
use crate::domain::foundation::{DomainError, UserId};
use crate::ports::{RuleSource, SubscriptionSource};

/// Default lookahead when the query does not set one.
pub const DEFAULT_MONTHS_AHEAD: u32 = 12;

#[derive(Debug, Clone)]
pub struct CalendarQuery {
    pub user_id: UserId,
    pub today: NaiveDate,
    pub months_ahead: Option<u32>,
}

/// Projected events plus how many subscriptions had to be left out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CalendarView {
    pub events: Vec<CalendarEvent>,
    pub skipped_subscriptions: usize,
}

/// Read-only: never touches the reminder ledger.
pub struct CalendarQueryHandler {
    subscriptions: Arc<dyn SubscriptionSource>,
    rules: Arc<dyn RuleSource>,
    default_months_ahead: u32,
}

impl CalendarQueryHandler {
    pub fn new(subscriptions: Arc<dyn SubscriptionSource>, rules: Arc<dyn RuleSource>) -> Self {
        Self {
            subscriptions,
            rules,
            default_months_ahead: DEFAULT_MONTHS_AHEAD,
        }
    }

    pub fn with_default_months_ahead(mut self, months: u32) -> Self {
        self.default_months_ahead = months;
        self
    }

    pub async fn handle(&self, query: CalendarQuery) -> Result<CalendarView, DomainError> {
        let loaded = self.subscriptions.active_subscriptions(&query.user_id).await?;
        let rule_set = self.rules.rules_for_user(&query.user_id).await?;

        let mut skipped_subscriptions = 0;
        let subscriptions: Vec<_> = loaded
            .into_iter()
            .filter_map(|row| {
                row.map_err(|e| {
                    warn!(user_id = %query.user_id, error = %e, "Leaving malformed subscription out of calendar");
                    skipped_subscriptions += 1;
                })
                .ok()
            })
            .collect();

        let months_ahead = query.months_ahead.unwrap_or(self.default_months_ahead);
        let occurrences = CalendarProjector::project_events(&subscriptions, query.today, months_ahead);
        let events = CalendarProjector::with_alarms(occurrences, &subscriptions, rule_set.rules());

        Ok(CalendarView {
            events,
            skipped_subscriptions,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::{InMemoryRuleSource, InMemorySubscriptionSource};
    use crate::domain::billing::{BillingCycle, RecurrenceError, Subscription};
    use crate::domain::foundation::SubscriptionId;
    use crate::domain::reminder::{ReminderEventType, ReminderRule};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn user() -> UserId {
        UserId::new("user-1").unwrap()
    }

    #[tokio::test]
    async fn returns_sorted_events_with_alarms() {
        let yearly = Subscription::new(
            SubscriptionId::new("sub-y").unwrap(),
            user(),
            "Domain",
            BillingCycle::Yearly,
            date(2023, 2, 10),
        );
        let source = Arc::new(InMemorySubscriptionSource::with_subscriptions(vec![yearly]));
        let rules = Arc::new(InMemoryRuleSource::new());
        rules
            .set_rules(
                user(),
                vec![
                    ReminderRule::default_scope(ReminderEventType::SubscriptionRenewal, 14),
                    ReminderRule::default_scope(ReminderEventType::PaymentUpcoming, 1),
                ],
            )
            .await;
        let handler = CalendarQueryHandler::new(source, rules);

        let view = handler
            .handle(CalendarQuery {
                user_id: user(),
                today: date(2024, 1, 1),
                months_ahead: Some(3),
            })
            .await
            .unwrap();

        assert_eq!(view.events.len(), 2);
        assert!(view.events.iter().all(|e| e.occurrence.event_date == date(2024, 2, 10)));
        let renewal = view
            .events
            .iter()
            .find(|e| e.occurrence.event_type == ReminderEventType::SubscriptionRenewal)
            .unwrap();
        assert_eq!(renewal.alarm_lead_days, vec![14]);
    }

    #[tokio::test]
    async fn malformed_subscriptions_are_counted() {
        let source = Arc::new(InMemorySubscriptionSource::new());
        let id = SubscriptionId::new("sub-bad").unwrap();
        source
            .insert_malformed(
                id.clone(),
                user(),
                RecurrenceError::UnknownCycle {
                    subscription_id: id,
                    value: "biweekly".to_string(),
                },
            )
            .await;
        let handler = CalendarQueryHandler::new(source, Arc::new(InMemoryRuleSource::new()));

        let view = handler
            .handle(CalendarQuery {
                user_id: user(),
                today: date(2024, 1, 1),
                months_ahead: None,
            })
            .await
            .unwrap();

        assert!(view.events.is_empty());
        assert_eq!(view.skipped_subscriptions, 1);
    }
}
