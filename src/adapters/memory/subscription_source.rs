//! In-memory subscription source for tests and local runs.

use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::billing::{RecurrenceError, Subscription};
use crate::domain::foundation::{DomainError, SubscriptionId, UserId};
use crate::ports::{LoadedSubscription, SubscriptionSource};

struct Entry {
    user_id: UserId,
    active: bool,
    row: LoadedSubscription,
}

/// Subscriptions keyed by id. Malformed rows can be seeded to exercise the
/// per-row error path.
#[derive(Default)]
pub struct InMemorySubscriptionSource {
    entries: RwLock<BTreeMap<SubscriptionId, Entry>>,
}

impl InMemorySubscriptionSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_subscriptions(subscriptions: impl IntoIterator<Item = Subscription>) -> Self {
        let entries = subscriptions
            .into_iter()
            .map(|s| {
                (
                    s.id.clone(),
                    Entry {
                        user_id: s.user_id.clone(),
                        active: s.active,
                        row: Ok(s),
                    },
                )
            })
            .collect();
        Self {
            entries: RwLock::new(entries),
        }
    }

    /// Inserts or replaces a subscription.
    pub async fn upsert(&self, subscription: Subscription) {
        let entry = Entry {
            user_id: subscription.user_id.clone(),
            active: subscription.active,
            row: Ok(subscription.clone()),
        };
        self.entries.write().await.insert(subscription.id, entry);
    }

    /// Seeds an active row that fails to parse.
    pub async fn insert_malformed(&self, id: SubscriptionId, user_id: UserId, error: RecurrenceError) {
        let entry = Entry {
            user_id,
            active: true,
            row: Err(error),
        };
        self.entries.write().await.insert(id, entry);
    }

    pub async fn remove(&self, id: &SubscriptionId) {
        self.entries.write().await.remove(id);
    }
}

#[async_trait]
impl SubscriptionSource for InMemorySubscriptionSource {
    async fn active_subscriptions(&self, user_id: &UserId) -> Result<Vec<LoadedSubscription>, DomainError> {
        Ok(self
            .entries
            .read()
            .await
            .values()
            .filter(|e| e.active && &e.user_id == user_id)
            .map(|e| e.row.clone())
            .collect())
    }

    async fn users_with_active_subscriptions(&self) -> Result<Vec<UserId>, DomainError> {
        let mut users: Vec<UserId> = self
            .entries
            .read()
            .await
            .values()
            .filter(|e| e.active)
            .map(|e| e.user_id.clone())
            .collect();
        users.sort();
        users.dedup();
        Ok(users)
    }

    async fn find(&self, id: &SubscriptionId) -> Result<Option<LoadedSubscription>, DomainError> {
        Ok(self.entries.read().await.get(id).map(|e| e.row.clone()))
    }
}
