use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, Pool, Row, Sqlite, sqlite::SqliteRow};

use crate::passkey::errors::PasskeyError;
use crate::passkey::types::{CredentialId, PasskeyCredential, UserId};
use crate::storage::StorageError;
use crate::utils::base64_decode_lenient;

use super::config::DB_TABLE_PASSKEY_CREDENTIALS;
use super::store_type::{CredentialStore, SqliteCredentialStore};

impl SqliteCredentialStore {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }
}

/// Row wrapper; credential ids are stored as base64url text.
struct CredentialRow(PasskeyCredential);

impl<'r> FromRow<'r, SqliteRow> for CredentialRow {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let credential_id: String = row.try_get("credential_id")?;
        let user_id: String = row.try_get("user_id")?;
        let user_handle: String = row.try_get("user_handle")?;
        let public_key: Vec<u8> = row.try_get("public_key")?;
        let public_key_algorithm: i64 = row.try_get("public_key_algorithm")?;
        let created_at: DateTime<Utc> = row.try_get("created_at")?;
        let last_used_at: DateTime<Utc> = row.try_get("last_used_at")?;

        let credential_id = base64_decode_lenient(&credential_id)
            .map_err(|e| sqlx::Error::Decode(Box::new(e)))?;

        Ok(Self(PasskeyCredential {
            credential_id: CredentialId::new(credential_id),
            user_id: UserId::new(user_id),
            user_handle,
            public_key,
            public_key_algorithm,
            created_at,
            last_used_at,
        }))
    }
}

fn storage_error(err: sqlx::Error) -> PasskeyError {
    StorageError::from(err).into()
}

#[async_trait]
impl CredentialStore for SqliteCredentialStore {
    async fn init(&self) -> Result<(), PasskeyError> {
        let table = DB_TABLE_PASSKEY_CREDENTIALS.as_str();

        sqlx::query(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {table} (
                credential_id TEXT PRIMARY KEY NOT NULL,
                user_id TEXT NOT NULL,
                user_handle TEXT NOT NULL,
                public_key BLOB NOT NULL,
                public_key_algorithm INTEGER NOT NULL,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                last_used_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            )
            "#
        ))
        .execute(&self.pool)
        .await
        .map_err(storage_error)?;

        sqlx::query(&format!(
            "CREATE INDEX IF NOT EXISTS idx_{}_user_id ON {table}(user_id)",
            table.replace('.', "_")
        ))
        .execute(&self.pool)
        .await
        .map_err(storage_error)?;

        Ok(())
    }

    async fn find_by_credential_id(
        &self,
        credential_id: &[u8],
    ) -> Result<Option<PasskeyCredential>, PasskeyError> {
        let table = DB_TABLE_PASSKEY_CREDENTIALS.as_str();

        let row = sqlx::query_as::<_, CredentialRow>(&format!(
            "SELECT * FROM {table} WHERE credential_id = ?"
        ))
        .bind(CredentialId::new(credential_id).to_base64url())
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_error)?;

        Ok(row.map(|r| r.0))
    }

    async fn list_by_user(&self, user_id: &UserId) -> Result<Vec<PasskeyCredential>, PasskeyError> {
        let table = DB_TABLE_PASSKEY_CREDENTIALS.as_str();

        let rows = sqlx::query_as::<_, CredentialRow>(&format!(
            "SELECT * FROM {table} WHERE user_id = ? ORDER BY created_at"
        ))
        .bind(user_id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(storage_error)?;

        Ok(rows.into_iter().map(|r| r.0).collect())
    }

    async fn touch_last_used(
        &self,
        credential_id: &[u8],
        last_used_at: DateTime<Utc>,
    ) -> Result<(), PasskeyError> {
        let table = DB_TABLE_PASSKEY_CREDENTIALS.as_str();

        sqlx::query(&format!(
            "UPDATE {table} SET last_used_at = ? WHERE credential_id = ?"
        ))
        .bind(last_used_at)
        .bind(CredentialId::new(credential_id).to_base64url())
        .execute(&self.pool)
        .await
        .map_err(storage_error)?;

        Ok(())
    }

    async fn insert(&self, credential: PasskeyCredential) -> Result<(), PasskeyError> {
        let table = DB_TABLE_PASSKEY_CREDENTIALS.as_str();

        sqlx::query(&format!(
            r#"
            INSERT INTO {table}
            (credential_id, user_id, user_handle, public_key, public_key_algorithm, created_at, last_used_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#
        ))
        .bind(credential.credential_id.to_base64url())
        .bind(credential.user_id.as_str())
        .bind(&credential.user_handle)
        .bind(&credential.public_key)
        .bind(credential.public_key_algorithm)
        .bind(credential.created_at)
        .bind(credential.last_used_at)
        .execute(&self.pool)
        .await
        .map_err(storage_error)?;

        Ok(())
    }
}
