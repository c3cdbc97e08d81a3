//! Calendar query handlers.

mod calendar_query;

pub use calendar_query::{CalendarQuery, CalendarQueryHandler, CalendarView, DEFAULT_MONTHS_AHEAD};
