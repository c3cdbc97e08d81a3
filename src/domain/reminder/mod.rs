//! Reminder domain module.
//!
//! Rules deciding when reminders fire and the ledger entity tracking each
//! reminder from creation to delivery.
//!
//! # Module Structure
//!
//! - `event_type` - ReminderEventType
//! - `rule` - ReminderRule, RuleSet and override resolution
//! - `evaluator` - ReminderRuleEvaluator, which reminders fire today
//! - `status` - ReminderStatus state machine
//! - `scheduled` - ScheduledReminder ledger entity
//! - `payload` - Rendered message for delivery channels

mod evaluator;
mod event_type;
mod payload;
mod rule;
mod scheduled;
mod status;

pub use evaluator::{DueReminder, ReminderRuleEvaluator};
pub use event_type::ReminderEventType;
pub use payload::ReminderPayload;
pub use rule::{builtin_default_rules, effective_rules, ReminderRule, RuleScope, RuleSet};
pub use scheduled::{DedupKey, NewReminder, ScheduledReminder, DEFAULT_MAX_ATTEMPTS, STALE_CLAIM_ERROR};
pub use status::ReminderStatus;
