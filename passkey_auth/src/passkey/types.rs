use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::errors::PasskeyError;
use crate::utils::base64url_encode;

/// Stable identifier of a user account.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque credential identifier chosen by the authenticator.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CredentialId(Vec<u8>);

impl CredentialId {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// The id as it travels to the browser in `allowCredentials`.
    pub fn to_base64url(&self) -> String {
        base64url_encode(&self.0)
    }
}

impl fmt::Display for CredentialId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_base64url())
    }
}

/// Whether the assertion establishes identity or confirms an existing session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FactorType {
    /// Passwordless login: the credential alone identifies the user
    FirstFactor,
    /// Confirmation for a session that is already authenticated
    SecondFactor,
}

impl FactorType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FirstFactor => "first_factor",
            Self::SecondFactor => "second_factor",
        }
    }
}

impl FromStr for FactorType {
    type Err = PasskeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "first_factor" => Ok(Self::FirstFactor),
            "second_factor" => Ok(Self::SecondFactor),
            other => Err(PasskeyError::MalformedInput(format!(
                "Unknown factor type: {other}"
            ))),
        }
    }
}

/// Stored credential information for a WebAuthn/Passkey.
///
/// The record is owned by the credential store; verification only reads it,
/// apart from refreshing `last_used_at` after a successful ceremony.
#[derive(Clone, Debug, PartialEq)]
pub struct PasskeyCredential {
    /// Raw credential ID bytes
    pub credential_id: CredentialId,
    /// User the credential belongs to
    pub user_id: UserId,
    /// WebAuthn user handle of the owner, returned by authenticators in first-factor flows
    pub user_handle: String,
    /// COSE_Key encoded public key
    pub public_key: Vec<u8>,
    /// COSE algorithm identifier declared for `public_key`
    pub public_key_algorithm: i64,
    pub created_at: DateTime<Utc>,
    pub last_used_at: DateTime<Utc>,
}

impl PasskeyCredential {
    pub fn new(
        credential_id: CredentialId,
        user_id: UserId,
        user_handle: impl Into<String>,
        public_key: Vec<u8>,
        public_key_algorithm: i64,
    ) -> Self {
        let now = Utc::now();
        Self {
            credential_id,
            user_id,
            user_handle: user_handle.into(),
            public_key,
            public_key_algorithm,
            created_at: now,
            last_used_at: now,
        }
    }
}
