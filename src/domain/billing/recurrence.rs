//! Recurrence Calculator - the single source of truth for billing dates.
//!
//! Every consumer (evaluation runs, calendar projection) derives dates from
//! [`RecurrenceCalculator::next_occurrences`]. Cycle dates are always computed
//! as `anchor + n * unit` from the original anchor, never by stepping from the
//! previous result, so month-end anchors clamp per month without drifting:
//! a Jan 31 monthly subscription bills Feb 28 (or 29), Mar 31, Apr 30, ...

use chrono::{Datelike, Days, Months, NaiveDate};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::foundation::SubscriptionId;

use super::{BillingCycle, Subscription};

/// Malformed subscription data detected while computing dates.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecurrenceError {
    #[error("Subscription {subscription_id} has unknown billing cycle '{value}'")]
    UnknownCycle {
        subscription_id: SubscriptionId,
        value: String,
    },

    #[error("Subscription {subscription_id} produces a billing date outside the supported calendar range")]
    DateOutOfRange { subscription_id: SubscriptionId },

    #[error("Subscription record '{record}' is malformed: {reason}")]
    InvalidRecord { record: String, reason: String },
}

/// Next money-moving events for a subscription relative to a reference day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NextOccurrences {
    /// Trial end, when it falls on or after the reference day.
    pub trial_end: Option<NaiveDate>,
    /// Next charge strictly after the reference day. `None` only for a
    /// custom subscription whose one-shot date has passed.
    pub next_billing_date: Option<NaiveDate>,
}

impl NextOccurrences {
    /// True while the trial end is still strictly ahead, i.e. the next charge
    /// is the trial conversion.
    pub fn in_trial(&self) -> bool {
        matches!(
            (self.trial_end, self.next_billing_date),
            (Some(trial), Some(billing)) if trial == billing
        )
    }
}

/// Whole days from `from` to `to`; negative when `to` is earlier.
pub fn days_between(from: NaiveDate, to: NaiveDate) -> i64 {
    to.signed_duration_since(from).num_days()
}

/// Pure date projection for subscriptions.
pub struct RecurrenceCalculator;

impl RecurrenceCalculator {
    /// Computes the trial end and next billing date as seen on `reference`.
    ///
    /// - A trial ending strictly after `reference` is the next billing event.
    /// - Otherwise the next billing date is the first `anchor + n * cycle`
    ///   (n >= 0) strictly after `reference`.
    /// - `Custom` cycles bill once, on the anchor date.
    pub fn next_occurrences(
        subscription: &Subscription,
        reference: NaiveDate,
    ) -> Result<NextOccurrences, RecurrenceError> {
        let trial_end = subscription
            .trial_end_date
            .filter(|trial_end| *trial_end >= reference);

        if let Some(trial_end) = subscription.trial_end_date {
            if trial_end > reference {
                return Ok(NextOccurrences {
                    trial_end: Some(trial_end),
                    next_billing_date: Some(trial_end),
                });
            }
        }

        let next_billing_date = Self::next_cycle_date_after(subscription, reference)?;

        Ok(NextOccurrences {
            trial_end,
            next_billing_date,
        })
    }

    /// Billing dates strictly after `from` up to and including `until`.
    ///
    /// Each date is found by asking [`Self::next_occurrences`] again with the
    /// previous result as reference, so the series matches what daily
    /// evaluation runs would see.
    pub fn occurrences_between(
        subscription: &Subscription,
        from: NaiveDate,
        until: NaiveDate,
    ) -> Result<Vec<NaiveDate>, RecurrenceError> {
        let mut dates = Vec::new();
        let mut reference = from;
        while let Some(billing) = Self::next_occurrences(subscription, reference)?.next_billing_date {
            if billing > until {
                break;
            }
            dates.push(billing);
            reference = billing;
        }
        Ok(dates)
    }

    /// First cycle date strictly after `reference`, ignoring any trial.
    pub fn next_cycle_date_after(
        subscription: &Subscription,
        reference: NaiveDate,
    ) -> Result<Option<NaiveDate>, RecurrenceError> {
        let anchor = subscription.anchor_date;

        if !subscription.cycle.is_recurring() {
            return Ok((anchor > reference).then_some(anchor));
        }

        let mut n = Self::first_candidate_index(subscription.cycle, anchor, reference);
        loop {
            let candidate = Self::nth_cycle_date(subscription, n)?;
            if candidate > reference {
                return Ok(Some(candidate));
            }
            n = n.checked_add(1).ok_or_else(|| out_of_range(subscription))?;
        }
    }

    /// The `n`-th cycle date counted from the anchor (n = 0 is the anchor).
    pub fn nth_cycle_date(
        subscription: &Subscription,
        n: u32,
    ) -> Result<NaiveDate, RecurrenceError> {
        let anchor = subscription.anchor_date;
        let date = match subscription.cycle {
            BillingCycle::Weekly => anchor.checked_add_days(Days::new(7 * u64::from(n))),
            BillingCycle::Monthly => anchor.checked_add_months(Months::new(n)),
            BillingCycle::Yearly => n
                .checked_mul(12)
                .and_then(|months| anchor.checked_add_months(Months::new(months))),
            BillingCycle::Custom => (n == 0).then_some(anchor),
        };
        date.ok_or_else(|| out_of_range(subscription))
    }

    /// Index whose cycle date is guaranteed to be on or before `reference`,
    /// so the forward scan only walks a step or two even for old anchors.
    fn first_candidate_index(cycle: BillingCycle, anchor: NaiveDate, reference: NaiveDate) -> u32 {
        if reference < anchor {
            return 0;
        }
        let estimate = match cycle {
            BillingCycle::Weekly => days_between(anchor, reference) / 7,
            BillingCycle::Monthly => months_between(anchor, reference) - 1,
            BillingCycle::Yearly => i64::from(reference.year() - anchor.year()) - 1,
            BillingCycle::Custom => 0,
        };
        u32::try_from(estimate.max(0)).unwrap_or(u32::MAX)
    }
}

fn months_between(from: NaiveDate, to: NaiveDate) -> i64 {
    i64::from(to.year() - from.year()) * 12 + i64::from(to.month()) - i64::from(from.month())
}

fn out_of_range(subscription: &Subscription) -> RecurrenceError {
    RecurrenceError::DateOutOfRange {
        subscription_id: subscription.id.clone(),
    }
}
