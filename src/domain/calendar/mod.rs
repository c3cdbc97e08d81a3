//! Calendar domain module.
//!
//! Read-only projection of upcoming occurrences for calendar export.

mod projector;

pub use projector::{CalendarEvent, CalendarProjector};
