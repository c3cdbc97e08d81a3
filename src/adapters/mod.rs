//! Adapters - Implementations of port interfaces.
//!
//! Adapters connect the reminder engine to external systems:
//! - `email` - Delivery channels (Resend HTTP API, scripted mock)
//! - `memory` - In-memory ports for tests and local runs
//! - `postgres` - Ledger and read models backed by PostgreSQL
//! - `worker` - Background dispatch loop

pub mod email;
pub mod memory;
pub mod postgres;
pub mod worker;

pub use email::{MockDeliveryChannel, ResendConfig, ResendEmailChannel};
pub use memory::{
    InMemoryRecipientDirectory, InMemoryReminderLedger, InMemoryRuleSource, InMemorySubscriptionSource,
};
pub use postgres::{
    PostgresRecipientDirectory, PostgresReminderLedger, PostgresRuleSource, PostgresSubscriptionSource,
};
pub use worker::{DispatchWorker, DispatchWorkerConfig};
