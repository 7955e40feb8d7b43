use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::passkey::errors::PasskeyError;
use crate::passkey::types::{PasskeyCredential, UserId};

use super::store_type::{CredentialStore, InMemoryCredentialStore};

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn init(&self) -> Result<(), PasskeyError> {
        Ok(())
    }

    async fn find_by_credential_id(
        &self,
        credential_id: &[u8],
    ) -> Result<Option<PasskeyCredential>, PasskeyError> {
        Ok(self.credentials.read().await.get(credential_id).cloned())
    }

    async fn list_by_user(&self, user_id: &UserId) -> Result<Vec<PasskeyCredential>, PasskeyError> {
        let mut credentials: Vec<_> = self
            .credentials
            .read()
            .await
            .values()
            .filter(|c| &c.user_id == user_id)
            .cloned()
            .collect();
        credentials.sort_by_key(|c| c.created_at);
        Ok(credentials)
    }

    async fn touch_last_used(
        &self,
        credential_id: &[u8],
        last_used_at: DateTime<Utc>,
    ) -> Result<(), PasskeyError> {
        match self.credentials.write().await.get_mut(credential_id) {
            Some(credential) => {
                credential.last_used_at = last_used_at;
                Ok(())
            }
            None => Err(PasskeyError::Storage(
                "Credential disappeared before last_used_at update".to_string(),
            )),
        }
    }

    async fn insert(&self, credential: PasskeyCredential) -> Result<(), PasskeyError> {
        let mut credentials = self.credentials.write().await;
        let key = credential.credential_id.as_bytes().to_vec();
        if credentials.contains_key(&key) {
            return Err(PasskeyError::Storage(format!(
                "Credential {} already exists",
                credential.credential_id
            )));
        }
        credentials.insert(key, credential);
        Ok(())
    }
}
