//! Rendered content handed to a delivery channel.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::billing::{days_between, Price, Subscription};
use crate::domain::foundation::{ReminderId, SubscriptionId, UserId};

use super::{ReminderEventType, ScheduledReminder};

/// Channel-agnostic reminder message.
///
/// `reminder_id` doubles as the idempotency key channels should forward to
/// their provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReminderPayload {
    pub reminder_id: ReminderId,
    pub user_id: UserId,
    pub subscription_id: SubscriptionId,
    pub subscription_name: String,
    pub event_type: ReminderEventType,
    pub event_date: NaiveDate,
    pub days_until: i64,
    pub price: Option<Price>,
    pub subject: String,
    pub body: String,
}

impl ReminderPayload {
    /// Renders the message for `reminder` as of `today`.
    pub fn render(reminder: &ScheduledReminder, subscription: &Subscription, today: NaiveDate) -> Self {
        let days_until = days_between(today, reminder.event_date);
        let when = describe_distance(days_until);
        let name = subscription.name.as_str();
        let date = reminder.event_date.format("%B %-d, %Y");
        let price = subscription.price.as_ref().map(Price::display);
        let of_amount = price.as_ref().map(|p| format!(" of {}", p)).unwrap_or_default();
        let for_amount = price.as_ref().map(|p| format!(" for {}", p)).unwrap_or_default();

        let (subject, body) = match reminder.event_type {
            ReminderEventType::TrialEnding => (
                format!("Your {} trial ends {}", name, when),
                format!(
                    "Your free trial of {} ends on {}. Cancel before then to avoid a charge{}.",
                    name, date, of_amount
                ),
            ),
            ReminderEventType::PaymentUpcoming => (
                format!("{} payment due {}", name, when),
                format!("A payment{} for {} is scheduled on {}.", of_amount, name, date),
            ),
            ReminderEventType::SubscriptionRenewal => (
                format!("{} renews {}", name, when),
                format!(
                    "Your annual {} subscription renews on {}{}. Review it now if you no longer need it.",
                    name, date, for_amount
                ),
            ),
        };

        Self {
            reminder_id: reminder.id,
            user_id: reminder.user_id.clone(),
            subscription_id: reminder.subscription_id.clone(),
            subscription_name: subscription.name.clone(),
            event_type: reminder.event_type,
            event_date: reminder.event_date,
            days_until,
            price: subscription.price.clone(),
            subject,
            body,
        }
    }
}

fn describe_distance(days: i64) -> String {
    match days {
        i64::MIN..=-1 => "soon".to_string(),
        0 => "today".to_string(),
        1 => "tomorrow".to_string(),
        n => format!("in {} days", n),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::billing::BillingCycle;
    use crate::domain::foundation::Timestamp;
    use crate::domain::reminder::NewReminder;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn fixture(event_type: ReminderEventType) -> (ScheduledReminder, Subscription) {
        let subscription = Subscription::new(
            SubscriptionId::new("sub-1").unwrap(),
            UserId::new("user-1").unwrap(),
            "Spotify",
            BillingCycle::Yearly,
            date(2023, 6, 4),
        )
        .with_price(Price::new(9999, "USD"));
        let now = Timestamp::now();
        let reminder = ScheduledReminder::new(
            NewReminder {
                subscription_id: subscription.id.clone(),
                user_id: subscription.user_id.clone(),
                event_type,
                event_date: date(2024, 6, 4),
                lead_days: 3,
                scheduled_for: now,
            },
            now,
        );
        (reminder, subscription)
    }

    #[test]
    fn payment_payload_mentions_amount_and_distance() {
        let (reminder, subscription) = fixture(ReminderEventType::PaymentUpcoming);
        let payload = ReminderPayload::render(&reminder, &subscription, date(2024, 6, 1));

        assert_eq!(payload.days_until, 3);
        assert_eq!(payload.subject, "Spotify payment due in 3 days");
        assert!(payload.body.contains("99.99 USD"));
        assert!(payload.body.contains("June 4, 2024"));
        assert_eq!(payload.reminder_id, reminder.id);
    }

    #[test]
    fn renewal_payload_reads_naturally() {
        let (reminder, subscription) = fixture(ReminderEventType::SubscriptionRenewal);
        let payload = ReminderPayload::render(&reminder, &subscription, date(2024, 6, 3));

        assert_eq!(payload.subject, "Spotify renews tomorrow");
        assert!(payload.body.contains("renews on June 4, 2024 for 99.99 USD."));
    }

    #[test]
    fn trial_payload_without_price_omits_amount() {
        let (reminder, mut subscription) = fixture(ReminderEventType::TrialEnding);
        subscription.price = None;
        let payload = ReminderPayload::render(&reminder, &subscription, date(2024, 6, 4));

        assert_eq!(payload.subject, "Your Spotify trial ends today");
        assert!(payload.body.ends_with("avoid a charge."));
    }
}
