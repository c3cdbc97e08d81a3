//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the domain and the outside world. Adapters implement these ports.
//!
//! ## Ledger
//!
//! - `ReminderLedger` - Deduplicated reminder storage and claim protocol
//!
//! ## Inputs
//!
//! - `SubscriptionSource` - Externally owned subscriptions
//! - `RuleSource` - User reminder rules
//! - `RecipientDirectory` - User contact addresses
//!
//! ## Outputs
//!
//! - `DeliveryChannel` - Sends rendered reminders

mod delivery_channel;
mod recipient_directory;
mod reminder_ledger;
mod rule_source;
mod subscription_source;

pub use delivery_channel::{DeliveryChannel, DeliveryError, DeliveryId};
pub use recipient_directory::RecipientDirectory;
pub use reminder_ledger::{EnqueueResult, ReminderLedger};
pub use rule_source::RuleSource;
pub use subscription_source::{LoadedSubscription, SubscriptionSource};
