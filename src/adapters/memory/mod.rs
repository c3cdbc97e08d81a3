//! In-memory adapters.
//!
//! Back the ports with process-local state for tests, local runs, and the
//! calendar/engine agreement checks. Not durable.

mod recipient_directory;
mod reminder_ledger;
mod rule_source;
mod subscription_source;

pub use recipient_directory::InMemoryRecipientDirectory;
pub use reminder_ledger::InMemoryReminderLedger;
pub use rule_source::InMemoryRuleSource;
pub use subscription_source::InMemorySubscriptionSource;
