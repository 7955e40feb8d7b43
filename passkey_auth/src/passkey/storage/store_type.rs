use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres, Sqlite};
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::passkey::errors::PasskeyError;
use crate::passkey::types::{PasskeyCredential, UserId};

/// Lookup and bookkeeping for registered credentials.
///
/// Credential ids are raw bytes as sent by the authenticator.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Create backing tables. Idempotent.
    async fn init(&self) -> Result<(), PasskeyError>;

    async fn find_by_credential_id(
        &self,
        credential_id: &[u8],
    ) -> Result<Option<PasskeyCredential>, PasskeyError>;

    async fn list_by_user(&self, user_id: &UserId) -> Result<Vec<PasskeyCredential>, PasskeyError>;

    /// Sets `last_used_at`. Last writer wins.
    async fn touch_last_used(
        &self,
        credential_id: &[u8],
        last_used_at: DateTime<Utc>,
    ) -> Result<(), PasskeyError>;

    /// Seeds a credential. Fails if the id is already taken.
    async fn insert(&self, credential: PasskeyCredential) -> Result<(), PasskeyError>;
}

#[derive(Debug, Default)]
pub struct InMemoryCredentialStore {
    pub(super) credentials: RwLock<HashMap<Vec<u8>, PasskeyCredential>>,
}

#[derive(Debug, Clone)]
pub struct SqliteCredentialStore {
    pub(super) pool: Pool<Sqlite>,
}

#[derive(Debug, Clone)]
pub struct PostgresCredentialStore {
    pub(super) pool: Pool<Postgres>,
}
