//! PostgreSQL adapters - Database implementations for the engine's ports.
//!
//! - `PostgresReminderLedger` - Owns `scheduled_reminders` (see `migrations/`)
//! - `PostgresSubscriptionSource` - Reads the CRUD service's `subscriptions`
//! - `PostgresRuleSource` - Reads `reminder_rules`
//! - `PostgresRecipientDirectory` - Reads `users.email`

mod recipient_directory;
mod reminder_ledger;
mod rule_source;
mod subscription_source;

pub use recipient_directory::PostgresRecipientDirectory;
pub use reminder_ledger::PostgresReminderLedger;
pub use rule_source::PostgresRuleSource;
pub use subscription_source::PostgresSubscriptionSource;
