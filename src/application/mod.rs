//! Application layer - Commands, Queries, and Handlers.
//!
//! This layer orchestrates domain operations and coordinates between ports.
//! Commands (evaluation, dispatch, rescheduling) write to the reminder
//! ledger; the calendar query and the failure report only read.

pub mod handlers;

pub use handlers::{
    CalendarQuery, CalendarQueryHandler, CalendarView, DispatchReport, DispatchSettings,
    EvaluateRemindersCommand, EvaluateRemindersHandler, EvaluationReport, ReminderDispatcher,
    ReminderMaintenanceHandler, SubscriptionChangedCommand, SubscriptionChangedHandler,
    SubscriptionChangedResult,
};
