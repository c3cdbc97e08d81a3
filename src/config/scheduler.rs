//! Scheduler configuration
//!
//! Knobs for evaluation runs and the dispatcher.

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;
use crate::application::DispatchSettings;
use crate::domain::reminder::DEFAULT_MAX_ATTEMPTS;

#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerConfig {
    /// Delivery attempts before a reminder becomes terminally failed
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_delivery_timeout")]
    pub delivery_timeout_secs: u64,

    /// A `sending` claim older than this is treated as abandoned
    #[serde(default = "default_claim_timeout")]
    pub claim_timeout_secs: u64,

    #[serde(default = "default_batch_size")]
    pub dispatch_batch_size: usize,

    #[serde(default = "default_dispatch_concurrency")]
    pub dispatch_concurrency: usize,

    /// Subscriptions evaluated in parallel per user
    #[serde(default = "default_evaluation_concurrency")]
    pub evaluation_concurrency: usize,

    /// Worker poll interval
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    #[serde(default = "default_months_ahead")]
    pub calendar_months_ahead: u32,
}

impl SchedulerConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn dispatch_settings(&self) -> DispatchSettings {
        DispatchSettings {
            batch_size: self.dispatch_batch_size,
            concurrency: self.dispatch_concurrency,
            delivery_timeout: Duration::from_secs(self.delivery_timeout_secs),
            claim_timeout: Duration::from_secs(self.claim_timeout_secs),
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        let positive = [
            ("scheduler.max_attempts", self.max_attempts as u64),
            ("scheduler.delivery_timeout_secs", self.delivery_timeout_secs),
            ("scheduler.claim_timeout_secs", self.claim_timeout_secs),
            ("scheduler.dispatch_batch_size", self.dispatch_batch_size as u64),
            ("scheduler.dispatch_concurrency", self.dispatch_concurrency as u64),
            ("scheduler.evaluation_concurrency", self.evaluation_concurrency as u64),
            ("scheduler.poll_interval_secs", self.poll_interval_secs),
            ("scheduler.calendar_months_ahead", self.calendar_months_ahead as u64),
        ];
        if let Some((name, _)) = positive.iter().find(|(_, value)| *value == 0) {
            return Err(ValidationError::MustBePositive(*name));
        }
        // A claim must outlive the delivery it guards
        if self.delivery_timeout_secs >= self.claim_timeout_secs {
            return Err(ValidationError::DeliveryOutlivesClaim);
        }
        Ok(())
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            delivery_timeout_secs: default_delivery_timeout(),
            claim_timeout_secs: default_claim_timeout(),
            dispatch_batch_size: default_batch_size(),
            dispatch_concurrency: default_dispatch_concurrency(),
            evaluation_concurrency: default_evaluation_concurrency(),
            poll_interval_secs: default_poll_interval(),
            calendar_months_ahead: default_months_ahead(),
        }
    }
}

fn default_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}

fn default_delivery_timeout() -> u64 {
    10
}

fn default_claim_timeout() -> u64 {
    300
}

fn default_batch_size() -> usize {
    100
}

fn default_dispatch_concurrency() -> usize {
    4
}

fn default_evaluation_concurrency() -> usize {
    8
}

fn default_poll_interval() -> u64 {
    30
}

fn default_months_ahead() -> u32 {
    12
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_dispatcher_defaults() {
        let settings = SchedulerConfig::default().dispatch_settings();
        let expected = DispatchSettings::default();

        assert_eq!(settings.batch_size, expected.batch_size);
        assert_eq!(settings.concurrency, expected.concurrency);
        assert_eq!(settings.delivery_timeout, expected.delivery_timeout);
        assert_eq!(settings.claim_timeout, expected.claim_timeout);
    }

    #[test]
    fn defaults_are_valid() {
        let config = SchedulerConfig::default();
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.poll_interval(), Duration::from_secs(30));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_values_are_rejected_by_name() {
        let config = SchedulerConfig {
            dispatch_concurrency: 0,
            ..Default::default()
        };
        assert_eq!(
            config.validate(),
            Err(ValidationError::MustBePositive("scheduler.dispatch_concurrency"))
        );
    }

    #[test]
    fn delivery_timeout_must_fit_inside_claim() {
        let config = SchedulerConfig {
            delivery_timeout_secs: 300,
            claim_timeout_secs: 300,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ValidationError::DeliveryOutlivesClaim));
    }
}
