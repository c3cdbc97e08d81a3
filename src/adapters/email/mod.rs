//! Delivery channel adapters.
//!
//! - `ResendEmailChannel` - Email through the Resend HTTP API
//! - `MockDeliveryChannel` - Scriptable in-process channel for tests

mod mock;
mod resend;

pub use mock::MockDeliveryChannel;
pub use resend::{ResendConfig, ResendEmailChannel};
