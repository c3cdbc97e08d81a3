//! Domain layer containing business logic and domain types.
//!
//! # Module Organization
//!
//! - `foundation` - Shared domain primitives (IDs, timestamps, errors, state machine)
//! - `billing` - Subscriptions and the recurrence calculator
//! - `reminder` - Reminder rules, evaluation and the ledger entity
//! - `calendar` - Bounded lookahead projection for calendar export

pub mod billing;
pub mod calendar;
pub mod foundation;
pub mod reminder;
