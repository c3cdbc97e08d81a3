//! RecipientDirectory port - Resolves where a user's reminders go.

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, UserId};

#[async_trait]
pub trait RecipientDirectory: Send + Sync {
    /// Email address for `user_id`, or `None` when the user has none.
    async fn email_for(&self, user_id: &UserId) -> Result<Option<String>, DomainError>;
}
