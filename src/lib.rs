//! Subtrack - Subscription Reminder Engine
//!
//! Projects billing dates for recurring subscriptions, turns reminder rules
//! into at-most-once scheduled notifications, delivers them through an email
//! channel, and renders the same dates as calendar events.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
