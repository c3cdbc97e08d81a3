//! Mock delivery channel for tests and dry runs.
//!
//! # Features
//!
//! - Scripted outcomes consumed in order, then a default outcome
//! - Simulated latency for timeout testing
//! - Records every payload it was asked to deliver
//!
//! # Example
//!
//! ```ignore
//! let channel = MockDeliveryChannel::new()
//!     .with_failure(DeliveryError::Transport("connection reset".into()))
//!     .with_delay(Duration::from_millis(50));
//!
//! dispatcher.drain_and_send(now).await?;
//! assert_eq!(channel.call_count(), 1);
//! ```

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::sleep;

use crate::domain::reminder::ReminderPayload;
use crate::ports::{DeliveryChannel, DeliveryError, DeliveryId};

/// Channel that never leaves the process.
#[derive(Debug, Clone, Default)]
pub struct MockDeliveryChannel {
    /// Outcomes consumed before falling back to `default_failure`.
    script: Arc<Mutex<VecDeque<Result<(), DeliveryError>>>>,
    /// Returned once the script is exhausted; `None` means success.
    default_failure: Option<DeliveryError>,
    delay: Duration,
    sent: Arc<Mutex<Vec<ReminderPayload>>>,
}

fn locked<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MockDeliveryChannel {
    /// Creates a channel that accepts everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues one failing attempt.
    pub fn with_failure(self, error: DeliveryError) -> Self {
        locked(&self.script).push_back(Err(error));
        self
    }

    /// Queues one successful attempt.
    pub fn with_success(self) -> Self {
        locked(&self.script).push_back(Ok(()));
        self
    }

    /// Fails every attempt not covered by the script.
    pub fn always_failing(mut self, error: DeliveryError) -> Self {
        self.default_failure = Some(error);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Number of delivery attempts, successful or not.
    pub fn call_count(&self) -> usize {
        locked(&self.sent).len()
    }

    /// Every payload the channel was asked to deliver.
    pub fn sent_payloads(&self) -> Vec<ReminderPayload> {
        locked(&self.sent).clone()
    }

    fn next_outcome(&self) -> Result<(), DeliveryError> {
        locked(&self.script)
            .pop_front()
            .unwrap_or_else(|| match &self.default_failure {
                Some(error) => Err(error.clone()),
                None => Ok(()),
            })
    }
}

#[async_trait]
impl DeliveryChannel for MockDeliveryChannel {
    async fn send(&self, payload: &ReminderPayload) -> Result<DeliveryId, DeliveryError> {
        locked(&self.sent).push(payload.clone());

        if !self.delay.is_zero() {
            sleep(self.delay).await;
        }

        self.next_outcome()
            .map(|()| DeliveryId::new(format!("mock-{}", payload.reminder_id)))
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}
