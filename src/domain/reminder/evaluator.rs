//! Reminder Rule Evaluator - decides which reminders fire on a given day.
//!
//! Stateless: running it twice for the same day yields the same answer, and
//! de-duplication of what was already queued belongs to the ledger.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::billing::{
    days_between, BillingCycle, NextOccurrences, RecurrenceCalculator, RecurrenceError, Subscription,
};

use super::{effective_rules, ReminderEventType, ReminderRule};

/// A reminder that should be queued today.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DueReminder {
    pub event_type: ReminderEventType,
    pub event_date: NaiveDate,
    /// Lead time of the rule that fired, snapshotted into the ledger.
    pub lead_days: u32,
}

/// Pure evaluation of reminder rules against a subscription.
pub struct ReminderRuleEvaluator;

impl ReminderRuleEvaluator {
    /// Returns the reminders whose lead time lands exactly on `reference`.
    ///
    /// A rule fires only when the target is exactly `lead_days` away, so a
    /// reminder is proposed on a single day per occurrence. Renewal rules
    /// only apply to yearly subscriptions. A yearly subscription may get
    /// both a renewal and a payment reminder for the same charge.
    pub fn evaluate(
        subscription: &Subscription,
        rules: &[ReminderRule],
        reference: NaiveDate,
    ) -> Result<Vec<DueReminder>, RecurrenceError> {
        if !subscription.active {
            return Ok(Vec::new());
        }

        let next = RecurrenceCalculator::next_occurrences(subscription, reference)?;

        let due = effective_rules(&subscription.id, rules)
            .into_iter()
            .filter(|rule| rule.enabled)
            .filter_map(|rule| {
                let target = target_for(subscription, &next, rule.event_type)?;

                (days_between(reference, target) == i64::from(rule.lead_days)).then_some(DueReminder {
                    event_type: rule.event_type,
                    event_date: target,
                    lead_days: rule.lead_days,
                })
            })
            .collect();

        Ok(due)
    }

    /// Whether `subscription`'s current schedule still has an `event_type`
    /// event on `event_date`.
    ///
    /// A queued reminder whose occurrence fails this check was computed from
    /// data that no longer holds.
    pub fn still_scheduled(
        subscription: &Subscription,
        event_type: ReminderEventType,
        event_date: NaiveDate,
    ) -> Result<bool, RecurrenceError> {
        if !subscription.active {
            return Ok(false);
        }
        let Some(day_before) = event_date.pred_opt() else {
            return Ok(false);
        };

        let next = RecurrenceCalculator::next_occurrences(subscription, day_before)?;
        Ok(target_for(subscription, &next, event_type) == Some(event_date))
    }
}

fn target_for(
    subscription: &Subscription,
    next: &NextOccurrences,
    event_type: ReminderEventType,
) -> Option<NaiveDate> {
    match event_type {
        ReminderEventType::TrialEnding => next.trial_end,
        ReminderEventType::PaymentUpcoming => next.next_billing_date,
        ReminderEventType::SubscriptionRenewal if subscription.cycle == BillingCycle::Yearly => {
            next.next_billing_date
        }
        ReminderEventType::SubscriptionRenewal => None,
    }
}
