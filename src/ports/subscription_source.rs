//! SubscriptionSource port - Read access to externally owned subscriptions.

use async_trait::async_trait;

use crate::domain::billing::{RecurrenceError, Subscription};
use crate::domain::foundation::{DomainError, SubscriptionId, UserId};

/// One subscription row as loaded, or the reason it could not be parsed.
///
/// Rows are returned individually so a single malformed record never hides
/// the rest of a user's subscriptions.
pub type LoadedSubscription = Result<Subscription, RecurrenceError>;

#[async_trait]
pub trait SubscriptionSource: Send + Sync {
    /// Active subscriptions owned by `user_id`.
    async fn active_subscriptions(&self, user_id: &UserId) -> Result<Vec<LoadedSubscription>, DomainError>;

    /// Every user owning at least one active subscription.
    async fn users_with_active_subscriptions(&self) -> Result<Vec<UserId>, DomainError>;

    /// Current state of one subscription, active or not.
    ///
    /// `Ok(None)` when it no longer exists.
    async fn find(&self, id: &SubscriptionId) -> Result<Option<LoadedSubscription>, DomainError>;
}
