//! Billing domain module.
//!
//! Subscriptions as read from the CRUD layer and the pure date arithmetic
//! that projects their trial-end and billing events.
//!
//! # Module Structure
//!
//! - `cycle` - BillingCycle periodicity
//! - `subscription` - Read-only Subscription view
//! - `recurrence` - RecurrenceCalculator, the one source of billing dates
//! - `occurrence` - Computed dated events

mod cycle;
mod occurrence;
mod recurrence;
mod subscription;

pub use cycle::BillingCycle;
pub use occurrence::Occurrence;
pub use recurrence::{days_between, NextOccurrences, RecurrenceCalculator, RecurrenceError};
pub use subscription::{Price, Subscription};
