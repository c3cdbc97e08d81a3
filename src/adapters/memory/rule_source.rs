//! In-memory rule source for tests and local runs.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::foundation::{DomainError, UserId};
use crate::domain::reminder::{ReminderRule, RuleSet};
use crate::ports::RuleSource;

/// Users without an entry get an empty set, so built-in defaults apply.
#[derive(Default)]
pub struct InMemoryRuleSource {
    rules: RwLock<HashMap<UserId, Vec<ReminderRule>>>,
}

impl InMemoryRuleSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_rules(&self, user_id: UserId, rules: Vec<ReminderRule>) {
        self.rules.write().await.insert(user_id, rules);
    }
}

#[async_trait]
impl RuleSource for InMemoryRuleSource {
    async fn rules_for_user(&self, user_id: &UserId) -> Result<RuleSet, DomainError> {
        let rules = self.rules.read().await.get(user_id).cloned().unwrap_or_default();
        Ok(RuleSet::new(rules))
    }
}
