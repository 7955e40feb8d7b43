use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::passkey::config::PASSKEY_CHALLENGE_TIMEOUT;
use crate::passkey::errors::PasskeyError;
use crate::passkey::types::UserId;
use crate::storage::{CacheData, SharedCacheStore, StorageError};
use crate::utils::{base64url_encode, gen_random_bytes};

pub(super) const CHALLENGE_CACHE_PREFIX: &str = "webauthn_challenge";

/// Raw entropy per challenge. Hex encoding doubles it to 60 characters.
const CHALLENGE_BYTES: usize = 30;

const ANONYMOUS_OWNER: &str = "anonymous";

/// A challenge value and, once bound, the owner and expiry it was bound with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Challenge {
    value: String,
    owner: Option<UserId>,
    expires_at: Option<DateTime<Utc>>,
}

impl Challenge {
    /// Hex-encoded challenge as stored in the session.
    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn owner(&self) -> Option<&UserId> {
        self.owner.as_ref()
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    /// The form the browser signs and echoes back in client data.
    pub fn to_client_challenge(&self) -> String {
        base64url_encode(self.value.as_bytes())
    }
}

/// Issues challenges and binds them to a session.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChallengeIssuer;

impl ChallengeIssuer {
    /// Draws a fresh challenge from the system CSPRNG.
    pub fn issue() -> Result<Challenge, PasskeyError> {
        let bytes = gen_random_bytes(CHALLENGE_BYTES)
            .map_err(|e| PasskeyError::Crypto(e.to_string()))?;

        Ok(Challenge {
            value: hex::encode(bytes),
            owner: None,
            expires_at: None,
        })
    }

    /// Stores `challenge` in `session` for `owner`, replacing any earlier one.
    ///
    /// Without an explicit `expires_at` the challenge lives as long as the session.
    pub async fn bind(
        challenge: Challenge,
        session: &ChallengeSession,
        owner: Option<&UserId>,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<Challenge, PasskeyError> {
        let expires_at = expires_at.unwrap_or(session.expires_at);
        session
            .set_challenge(owner, &challenge.value, expires_at)
            .await?;

        tracing::debug!(
            "Bound challenge for {} in session {}",
            owner_key(owner),
            session.session_id
        );

        Ok(Challenge {
            owner: owner.cloned(),
            expires_at: Some(expires_at),
            ..challenge
        })
    }
}

/// Issues a challenge and binds it to `owner` for the lifetime of `session`.
pub async fn issue_challenge(
    owner: Option<&UserId>,
    session: &ChallengeSession,
) -> Result<Challenge, PasskeyError> {
    let challenge = ChallengeIssuer::issue()?;
    ChallengeIssuer::bind(challenge, session, owner, None).await
}

/// Session-scoped challenge storage on top of a shared cache store.
///
/// Entries are keyed by session id and owner; `None` is the anonymous owner
/// of a first-factor ceremony.
#[derive(Clone)]
pub struct ChallengeSession {
    store: SharedCacheStore,
    session_id: String,
    expires_at: DateTime<Utc>,
}

impl std::fmt::Debug for ChallengeSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChallengeSession")
            .field("session_id", &self.session_id)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredChallenge {
    value: String,
    owner: Option<UserId>,
    issued_at: DateTime<Utc>,
}

impl StoredChallenge {
    fn into_cache_data(self, expires_at: DateTime<Utc>) -> Result<CacheData, StorageError> {
        Ok(CacheData {
            value: serde_json::to_string(&self)?,
            expires_at,
        })
    }
}

impl TryFrom<CacheData> for StoredChallenge {
    type Error = StorageError;

    fn try_from(data: CacheData) -> Result<Self, Self::Error> {
        serde_json::from_str(&data.value).map_err(|e| StorageError::Serde(e.to_string()))
    }
}

fn owner_key(owner: Option<&UserId>) -> String {
    match owner {
        Some(user) => format!("user:{}", user.as_str()),
        None => ANONYMOUS_OWNER.to_string(),
    }
}

impl ChallengeSession {
    pub fn new(
        store: SharedCacheStore,
        session_id: impl Into<String>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            store,
            session_id: session_id.into(),
            expires_at,
        }
    }

    /// Session expiring `PASSKEY_CHALLENGE_TIMEOUT` seconds from now.
    pub fn with_default_ttl(store: SharedCacheStore, session_id: impl Into<String>) -> Self {
        let expires_at = Utc::now() + Duration::seconds(i64::from(*PASSKEY_CHALLENGE_TIMEOUT));
        Self::new(store, session_id, expires_at)
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    fn cache_key(&self, owner: Option<&UserId>) -> String {
        format!("{}:{}", self.session_id, owner_key(owner))
    }

    /// Returns the challenge currently bound to `owner`, if any. Never consumes it.
    pub async fn get_challenge(
        &self,
        owner: Option<&UserId>,
    ) -> Result<Option<String>, PasskeyError> {
        let cache_key = self.cache_key(owner);
        let data = self
            .store
            .lock()
            .await
            .get(CHALLENGE_CACHE_PREFIX, &cache_key)
            .await?;

        match data {
            Some(data) => {
                let stored = StoredChallenge::try_from(data)?;
                Ok(Some(stored.value))
            }
            None => Ok(None),
        }
    }

    pub async fn set_challenge(
        &self,
        owner: Option<&UserId>,
        value: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), PasskeyError> {
        let now = Utc::now();
        let ttl = (expires_at - now).num_seconds().max(1) as usize;
        let data = StoredChallenge {
            value: value.to_string(),
            owner: owner.cloned(),
            issued_at: now,
        }
        .into_cache_data(expires_at)?;

        self.store
            .lock()
            .await
            .put_with_ttl(CHALLENGE_CACHE_PREFIX, &self.cache_key(owner), data, ttl)
            .await?;
        Ok(())
    }

    pub async fn clear_challenge(&self, owner: Option<&UserId>) -> Result<(), PasskeyError> {
        self.store
            .lock()
            .await
            .remove(CHALLENGE_CACHE_PREFIX, &self.cache_key(owner))
            .await?;
        Ok(())
    }
}
