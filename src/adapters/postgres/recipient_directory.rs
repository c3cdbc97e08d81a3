//! PostgreSQL implementation of RecipientDirectory.

use async_trait::async_trait;
use sqlx::PgPool;

use crate::domain::foundation::{DomainError, UserId};
use crate::ports::RecipientDirectory;

/// Looks up `users.email`, a table owned by the account service.
pub struct PostgresRecipientDirectory {
    pool: PgPool,
}

impl PostgresRecipientDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RecipientDirectory for PostgresRecipientDirectory {
    async fn email_for(&self, user_id: &UserId) -> Result<Option<String>, DomainError> {
        let email: Option<Option<String>> = sqlx::query_scalar("SELECT email FROM users WHERE id::text = $1")
            .bind(user_id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| DomainError::database(format!("Failed to look up recipient: {}", e)))?;

        Ok(email.flatten().filter(|e| !e.trim().is_empty()))
    }
}
