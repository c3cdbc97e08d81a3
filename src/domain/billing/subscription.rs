//! Read-only view of a tracked subscription.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::foundation::{SubscriptionId, UserId};

use super::BillingCycle;

/// Display price of a subscription. Never converted between currencies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Price {
    /// Amount in the currency's minor unit (cents for USD).
    pub amount_minor: i64,
    /// ISO 4217 code as entered by the user.
    pub currency: String,
}

impl Price {
    pub fn new(amount_minor: i64, currency: impl Into<String>) -> Self {
        Self {
            amount_minor,
            currency: currency.into(),
        }
    }

    /// Formats as `12.99 USD`.
    pub fn display(&self) -> String {
        let sign = if self.amount_minor < 0 { "-" } else { "" };
        let abs = self.amount_minor.unsigned_abs();
        format!("{}{}.{:02} {}", sign, abs / 100, abs % 100, self.currency)
    }
}

/// A subscription as seen by the reminder engine.
///
/// Owned by the CRUD layer; the engine only reads it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    pub id: SubscriptionId,
    pub user_id: UserId,
    pub name: String,
    pub price: Option<Price>,
    pub cycle: BillingCycle,
    /// Date billing conceptually began. Every cycle occurrence is derived from it.
    pub anchor_date: NaiveDate,
    pub trial_end_date: Option<NaiveDate>,
    pub active: bool,
}

impl Subscription {
    /// Creates an active subscription without trial or price.
    pub fn new(
        id: SubscriptionId,
        user_id: UserId,
        name: impl Into<String>,
        cycle: BillingCycle,
        anchor_date: NaiveDate,
    ) -> Self {
        Self {
            id,
            user_id,
            name: name.into(),
            price: None,
            cycle,
            anchor_date,
            trial_end_date: None,
            active: true,
        }
    }

    pub fn with_trial_end(mut self, trial_end: NaiveDate) -> Self {
        self.trial_end_date = Some(trial_end);
        self
    }

    pub fn with_price(mut self, price: Price) -> Self {
        self.price = Some(price);
        self
    }

    pub fn deactivated(mut self) -> Self {
        self.active = false;
        self
    }

    /// True when a change from `previous` moves the schedule, meaning reminders
    /// queued against the old dates are stale.
    pub fn schedule_changed_from(&self, previous: &Subscription) -> bool {
        self.cycle != previous.cycle
            || self.anchor_date != previous.anchor_date
            || self.trial_end_date != previous.trial_end_date
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn netflix() -> Subscription {
        Subscription::new(
            SubscriptionId::new("sub-1").unwrap(),
            UserId::new("user-1").unwrap(),
            "Netflix",
            BillingCycle::Monthly,
            date(2024, 1, 15),
        )
    }

    #[test]
    fn new_subscription_is_active_without_trial() {
        let sub = netflix();
        assert!(sub.active);
        assert!(sub.trial_end_date.is_none());
        assert!(sub.price.is_none());
    }

    #[test]
    fn price_display_pads_minor_units() {
        assert_eq!(Price::new(1299, "USD").display(), "12.99 USD");
        assert_eq!(Price::new(5, "EUR").display(), "0.05 EUR");
        assert_eq!(Price::new(-250, "GBP").display(), "-2.50 GBP");
    }

    #[test]
    fn schedule_change_detects_cycle_and_anchor_edits() {
        let before = netflix();

        let mut renamed = before.clone();
        renamed.name = "Netflix Premium".to_string();
        assert!(!renamed.schedule_changed_from(&before));

        let mut recycled = before.clone();
        recycled.cycle = BillingCycle::Yearly;
        assert!(recycled.schedule_changed_from(&before));

        let mut moved = before.clone();
        moved.anchor_date = date(2024, 1, 20);
        assert!(moved.schedule_changed_from(&before));
    }
}
