//! Calendar Projector - bounded lookahead of subscription events.
//!
//! Read-only consumer of the Recurrence Calculator. It walks forward by
//! feeding each discovered billing date back in as the next reference day,
//! so projected dates are exactly the dates evaluation runs target.

use chrono::{Months, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::domain::billing::{BillingCycle, Occurrence, RecurrenceCalculator, RecurrenceError, Subscription};
use crate::domain::reminder::{effective_rules, ReminderEventType, ReminderRule};

/// Occurrence plus the alarm lead times an iCal exporter should attach.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarEvent {
    pub occurrence: Occurrence,
    pub subscription_name: String,
    /// One VALARM per enabled rule of the occurrence's event type.
    pub alarm_lead_days: Vec<u32>,
}

pub struct CalendarProjector;

impl CalendarProjector {
    /// Last day included in a projection of `months_ahead` months.
    pub fn horizon(today: NaiveDate, months_ahead: u32) -> NaiveDate {
        today
            .checked_add_months(Months::new(months_ahead))
            .unwrap_or(NaiveDate::MAX)
    }

    /// Projects every active subscription up to the horizon, sorted by date.
    ///
    /// Malformed subscriptions are logged and left out.
    pub fn project_events(subscriptions: &[Subscription], today: NaiveDate, months_ahead: u32) -> Vec<Occurrence> {
        let horizon = Self::horizon(today, months_ahead);

        let mut occurrences: Vec<Occurrence> = subscriptions
            .iter()
            .flat_map(|subscription| {
                Self::project_subscription(subscription, today, horizon).unwrap_or_else(|e| {
                    warn!(subscription_id = %subscription.id, error = %e, "Skipping subscription in calendar projection");
                    Vec::new()
                })
            })
            .collect();

        occurrences.sort();
        occurrences
    }

    /// Occurrences of one subscription from `today` through `horizon`.
    pub fn project_subscription(
        subscription: &Subscription,
        today: NaiveDate,
        horizon: NaiveDate,
    ) -> Result<Vec<Occurrence>, RecurrenceError> {
        let mut occurrences = Vec::new();
        if !subscription.active {
            return Ok(occurrences);
        }

        let first = RecurrenceCalculator::next_occurrences(subscription, today)?;
        if let Some(trial_end) = first.trial_end.filter(|d| *d <= horizon) {
            occurrences.push(Occurrence::new(
                subscription.id.clone(),
                ReminderEventType::TrialEnding,
                trial_end,
            ));
        }

        for billing in RecurrenceCalculator::occurrences_between(subscription, today, horizon)? {
            occurrences.push(Occurrence::new(
                subscription.id.clone(),
                ReminderEventType::PaymentUpcoming,
                billing,
            ));
            if subscription.cycle == BillingCycle::Yearly {
                occurrences.push(Occurrence::new(
                    subscription.id.clone(),
                    ReminderEventType::SubscriptionRenewal,
                    billing,
                ));
            }
        }

        Ok(occurrences)
    }

    /// Attaches alarm lead times from the subscription's effective rules.
    pub fn with_alarms(
        occurrences: Vec<Occurrence>,
        subscriptions: &[Subscription],
        rules: &[ReminderRule],
    ) -> Vec<CalendarEvent> {
        occurrences
            .into_iter()
            .map(|occurrence| {
                let alarm_lead_days = effective_rules(&occurrence.subscription_id, rules)
                    .into_iter()
                    .filter(|r| r.enabled && r.event_type == occurrence.event_type)
                    .map(|r| r.lead_days)
                    .collect();
                let subscription_name = subscriptions
                    .iter()
                    .find(|s| s.id == occurrence.subscription_id)
                    .map(|s| s.name.clone())
                    .unwrap_or_default();
                CalendarEvent {
                    occurrence,
                    subscription_name,
                    alarm_lead_days,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::{SubscriptionId, UserId};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn sub(id: &str, cycle: BillingCycle, anchor: NaiveDate) -> Subscription {
        Subscription::new(
            SubscriptionId::new(id).unwrap(),
            UserId::new("user-1").unwrap(),
            id,
            cycle,
            anchor,
        )
    }

    fn dates_of(occurrences: &[Occurrence], event_type: ReminderEventType) -> Vec<NaiveDate> {
        occurrences
            .iter()
            .filter(|o| o.event_type == event_type)
            .map(|o| o.event_date)
            .collect()
    }

    #[test]
    fn monthly_projection_keeps_month_end_dates() {
        let s = sub("sub-1", BillingCycle::Monthly, date(2024, 1, 31));
        let occurrences = CalendarProjector::project_events(&[s], date(2024, 1, 31), 4);

        assert_eq!(
            dates_of(&occurrences, ReminderEventType::PaymentUpcoming),
            vec![date(2024, 2, 29), date(2024, 3, 31), date(2024, 4, 30)]
        );
    }

    #[test]
    fn trial_projection_starts_at_trial_end() {
        let s = sub("sub-1", BillingCycle::Monthly, date(2024, 1, 5)).with_trial_end(date(2024, 1, 20));
        let occurrences = CalendarProjector::project_events(&[s], date(2024, 1, 10), 2);

        assert_eq!(
            dates_of(&occurrences, ReminderEventType::TrialEnding),
            vec![date(2024, 1, 20)]
        );
        assert_eq!(
            dates_of(&occurrences, ReminderEventType::PaymentUpcoming),
            vec![date(2024, 1, 20), date(2024, 2, 5), date(2024, 3, 5)]
        );
    }

    #[test]
    fn yearly_projection_adds_renewal_events() {
        let s = sub("sub-1", BillingCycle::Yearly, date(2023, 3, 1));
        let occurrences = CalendarProjector::project_events(&[s], date(2024, 1, 1), 12);

        assert_eq!(
            dates_of(&occurrences, ReminderEventType::SubscriptionRenewal),
            vec![date(2024, 3, 1)]
        );
        assert_eq!(occurrences.len(), 2);
    }

    #[test]
    fn inactive_and_expired_custom_subscriptions_project_nothing() {
        let inactive = sub("sub-1", BillingCycle::Weekly, date(2024, 1, 1)).deactivated();
        let custom = sub("sub-2", BillingCycle::Custom, date(2023, 1, 1));

        assert!(CalendarProjector::project_events(&[inactive, custom], date(2024, 1, 1), 3).is_empty());
    }

    #[test]
    fn output_is_sorted_across_subscriptions() {
        let weekly = sub("sub-w", BillingCycle::Weekly, date(2024, 1, 3));
        let monthly = sub("sub-m", BillingCycle::Monthly, date(2024, 1, 5));
        let occurrences = CalendarProjector::project_events(&[monthly, weekly], date(2024, 1, 1), 1);

        let mut sorted = occurrences.clone();
        sorted.sort();
        assert_eq!(occurrences, sorted);
        assert_eq!(occurrences.first().map(|o| o.event_date), Some(date(2024, 1, 3)));
    }

    #[test]
    fn malformed_subscription_is_skipped_not_fatal() {
        let today = NaiveDate::MAX.checked_sub_days(chrono::Days::new(10)).unwrap();
        let broken = sub("sub-broken", BillingCycle::Yearly, today);
        let fine = sub(
            "sub-ok",
            BillingCycle::Custom,
            NaiveDate::MAX.checked_sub_days(chrono::Days::new(5)).unwrap(),
        );

        let occurrences = CalendarProjector::project_events(&[broken, fine], today, 1);

        assert_eq!(occurrences.len(), 1);
        assert_eq!(occurrences[0].subscription_id.as_str(), "sub-ok");
    }

    #[test]
    fn alarms_follow_effective_rules() {
        let s = sub("sub-1", BillingCycle::Monthly, date(2024, 1, 5));
        let occurrences = CalendarProjector::project_events(std::slice::from_ref(&s), date(2024, 1, 1), 1);
        let rules = vec![
            ReminderRule::default_scope(ReminderEventType::PaymentUpcoming, 3),
            ReminderRule::default_scope(ReminderEventType::TrialEnding, 2),
        ];

        let events = CalendarProjector::with_alarms(occurrences, &[s], &rules);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].alarm_lead_days, vec![3]);
        assert_eq!(events[0].subscription_name, "sub-1");
    }
}
