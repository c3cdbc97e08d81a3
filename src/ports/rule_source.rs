//! RuleSource port - A user's configured reminder rules.

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, UserId};
use crate::domain::reminder::RuleSet;

#[async_trait]
pub trait RuleSource: Send + Sync {
    /// Defaults and per-subscription overrides for `user_id`.
    ///
    /// An empty set is valid; built-in defaults then apply.
    async fn rules_for_user(&self, user_id: &UserId) -> Result<RuleSet, DomainError>;
}
