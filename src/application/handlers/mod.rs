//! Application handlers.
//!
//! Command and query handlers that orchestrate domain operations.

pub mod calendar;
pub mod reminder;

pub use calendar::{CalendarQuery, CalendarQueryHandler, CalendarView, DEFAULT_MONTHS_AHEAD};
pub use reminder::{
    // Evaluation
    EvaluateRemindersCommand, EvaluateRemindersHandler, EvaluationReport,
    // Dispatch
    DispatchReport, DispatchSettings, ReminderDispatcher,
    // Rescheduling
    SubscriptionChangedCommand, SubscriptionChangedHandler, SubscriptionChangedResult,
    // Retention
    ReminderMaintenanceHandler,
};
