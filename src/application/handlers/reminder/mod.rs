//! Reminder command handlers.

mod dispatch_reminders;
mod evaluate_reminders;
mod maintenance;
mod subscription_changed;

pub use dispatch_reminders::{DispatchReport, DispatchSettings, ReminderDispatcher};
pub use evaluate_reminders::{EvaluateRemindersCommand, EvaluateRemindersHandler, EvaluationReport};
pub use maintenance::ReminderMaintenanceHandler;
pub use subscription_changed::{
    SubscriptionChangedCommand, SubscriptionChangedHandler, SubscriptionChangedResult,
};
