//! DeliveryChannel port - Outbound reminder delivery (email, push, ...).

use std::fmt;

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::reminder::ReminderPayload;

/// Provider-assigned identifier for a delivered message.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeliveryId(String);

impl DeliveryId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for DeliveryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Why a delivery attempt failed. Every variant counts as one attempt.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeliveryError {
    #[error("Delivery timed out after {0} seconds")]
    Timeout(u64),

    #[error("Provider rejected the message ({status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("No deliverable recipient for user {0}")]
    InvalidRecipient(String),
}

#[async_trait]
pub trait DeliveryChannel: Send + Sync {
    /// Delivers one reminder.
    ///
    /// `payload.reminder_id` is stable across retries; channels should pass
    /// it to their provider as an idempotency key.
    async fn send(&self, payload: &ReminderPayload) -> Result<DeliveryId, DeliveryError>;

    /// Short name for logs ("email", "mock").
    fn name(&self) -> &'static str;
}
