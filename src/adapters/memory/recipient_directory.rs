//! In-memory recipient directory.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::foundation::{DomainError, UserId};
use crate::ports::RecipientDirectory;

#[derive(Default)]
pub struct InMemoryRecipientDirectory {
    emails: RwLock<HashMap<UserId, String>>,
}

impl InMemoryRecipientDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_email(&self, user_id: UserId, email: impl Into<String>) {
        self.emails.write().await.insert(user_id, email.into());
    }
}

#[async_trait]
impl RecipientDirectory for InMemoryRecipientDirectory {
    async fn email_for(&self, user_id: &UserId) -> Result<Option<String>, DomainError> {
        Ok(self.emails.read().await.get(user_id).cloned())
    }
}
