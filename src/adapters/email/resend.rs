//! Resend email delivery channel.
//!
//! Sends each reminder as a plain-text email through the Resend HTTP API.
//! The reminder id is forwarded as the `Idempotency-Key` header so a retry
//! after an ambiguous failure does not produce a second email.
//!
//! # Configuration
//!
//! ```ignore
//! let config = ResendConfig::new(api_key, "Subtrack <reminders@subtrack.app>");
//! let channel = ResendEmailChannel::new(config, recipients)?;
//! ```

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::domain::foundation::{DomainError, ErrorCode};
use crate::domain::reminder::ReminderPayload;
use crate::ports::{DeliveryChannel, DeliveryError, DeliveryId, RecipientDirectory};

/// Resend API configuration.
#[derive(Clone)]
pub struct ResendConfig {
    /// Resend API key (re_...).
    api_key: SecretString,

    /// Formatted "From" header, e.g. `Subtrack <reminders@subtrack.app>`.
    from: String,

    /// Base URL for the Resend API (default: https://api.resend.com).
    api_base_url: String,

    /// Per-request HTTP timeout.
    timeout: Duration,
}

impl ResendConfig {
    pub fn new(api_key: impl Into<String>, from: impl Into<String>) -> Self {
        Self {
            api_key: SecretString::new(api_key.into()),
            from: from.into(),
            api_base_url: "https://api.resend.com".to_string(),
            timeout: Duration::from_secs(10),
        }
    }

    /// Set custom API base URL (for testing).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[derive(Debug, Serialize)]
struct SendEmailRequest<'a> {
    from: &'a str,
    to: [&'a str; 1],
    subject: &'a str,
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct SendEmailResponse {
    id: String,
}

/// Email delivery through Resend.
pub struct ResendEmailChannel {
    config: ResendConfig,
    recipients: Arc<dyn RecipientDirectory>,
    http_client: reqwest::Client,
}

impl ResendEmailChannel {
    pub fn new(config: ResendConfig, recipients: Arc<dyn RecipientDirectory>) -> Result<Self, DomainError> {
        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| {
                DomainError::new(ErrorCode::InternalError, format!("Failed to build HTTP client: {}", e))
            })?;

        Ok(Self {
            config,
            recipients,
            http_client,
        })
    }

    async fn recipient(&self, payload: &ReminderPayload) -> Result<String, DeliveryError> {
        match self.recipients.email_for(&payload.user_id).await {
            Ok(Some(email)) if email.contains('@') => Ok(email),
            Ok(_) => Err(DeliveryError::InvalidRecipient(payload.user_id.to_string())),
            Err(e) => Err(DeliveryError::Transport(format!("Recipient lookup failed: {}", e))),
        }
    }
}

#[async_trait]
impl DeliveryChannel for ResendEmailChannel {
    async fn send(&self, payload: &ReminderPayload) -> Result<DeliveryId, DeliveryError> {
        let to = self.recipient(payload).await?;
        let url = format!("{}/emails", self.config.api_base_url);
        let body = SendEmailRequest {
            from: &self.config.from,
            to: [to.as_str()],
            subject: &payload.subject,
            text: &payload.body,
        };

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(self.config.api_key.expose_secret())
            .header("Idempotency-Key", payload.reminder_id.to_string())
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    DeliveryError::Timeout(self.config.timeout.as_secs())
                } else {
                    DeliveryError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            tracing::warn!(
                reminder_id = %payload.reminder_id,
                status = status.as_u16(),
                error = %error_text,
                "Resend rejected reminder email"
            );
            return Err(DeliveryError::Rejected {
                status: status.as_u16(),
                body: error_text,
            });
        }

        let sent: SendEmailResponse = response
            .json()
            .await
            .map_err(|e| DeliveryError::Transport(format!("Failed to parse Resend response: {}", e)))?;

        tracing::debug!(reminder_id = %payload.reminder_id, delivery_id = %sent.id, "Reminder email accepted");
        Ok(DeliveryId::new(sent.id))
    }

    fn name(&self) -> &'static str {
        "email"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryRecipientDirectory;
    use crate::domain::foundation::{ReminderId, SubscriptionId, UserId};
    use crate::domain::reminder::ReminderEventType;
    use chrono::NaiveDate;

    fn payload() -> ReminderPayload {
        ReminderPayload {
            reminder_id: ReminderId::new(),
            user_id: UserId::new("user-1").unwrap(),
            subscription_id: SubscriptionId::new("sub-1").unwrap(),
            subscription_name: "Spotify".to_string(),
            event_type: ReminderEventType::PaymentUpcoming,
            event_date: NaiveDate::from_ymd_opt(2024, 6, 4).unwrap(),
            days_until: 3,
            price: None,
            subject: "Spotify payment due in 3 days".to_string(),
            body: "A payment for Spotify is scheduled on June 4, 2024.".to_string(),
        }
    }

    #[test]
    fn request_body_serializes_single_recipient() {
        let p = payload();
        let body = SendEmailRequest {
            from: "Subtrack <reminders@subtrack.app>",
            to: ["user@example.com"],
            subject: &p.subject,
            text: &p.body,
        };

        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["to"], serde_json::json!(["user@example.com"]));
        assert_eq!(json["subject"], "Spotify payment due in 3 days");
    }

    #[tokio::test]
    async fn missing_recipient_is_invalid_recipient() {
        let channel = ResendEmailChannel::new(
            ResendConfig::new("re_test", "Subtrack <reminders@subtrack.app>")
                .with_base_url("http://127.0.0.1:9"),
            Arc::new(InMemoryRecipientDirectory::new()),
        )
        .unwrap();

        let err = channel.send(&payload()).await.unwrap_err();
        assert_eq!(err, DeliveryError::InvalidRecipient("user-1".to_string()));
    }

    #[tokio::test]
    async fn unreachable_provider_is_transport_error() {
        let recipients = Arc::new(InMemoryRecipientDirectory::new());
        recipients
            .set_email(UserId::new("user-1").unwrap(), "user@example.com")
            .await;
        let channel = ResendEmailChannel::new(
            ResendConfig::new("re_test", "Subtrack <reminders@subtrack.app>")
                .with_base_url("http://127.0.0.1:9")
                .with_timeout(Duration::from_secs(2)),
            recipients,
        )
        .unwrap();

        let err = channel.send(&payload()).await.unwrap_err();
        assert!(matches!(err, DeliveryError::Transport(_) | DeliveryError::Timeout(_)));
    }
}
