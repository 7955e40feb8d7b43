use thiserror::Error;

use crate::storage::StorageError;

/// Errors that can occur while issuing a challenge or verifying an assertion.
///
/// The first eleven variants are verification outcomes: each one rejects the
/// authentication attempt and maps to a stable [`PasskeyError::kind`]. The
/// remaining variants are infrastructure faults.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PasskeyError {
    /// The assertion parameters are not a mapping, lack a field, or fail to decode
    #[error("Malformed input: {0}")]
    MalformedInput(String),

    /// No credential is registered under the asserted credential id
    #[error("Credential not found: {0}")]
    CredentialNotFound(String),

    /// The credential does not belong to the user the ceremony is for
    #[error("Ownership mismatch: {0}")]
    OwnershipMismatch(String),

    /// The client data describes a ceremony other than authentication
    #[error("Wrong ceremony type: {0}")]
    WrongCeremonyType(String),

    /// The signed challenge is not the one bound to the session
    #[error("Challenge mismatch: {0}")]
    ChallengeMismatch(String),

    #[error("Origin mismatch: {0}")]
    OriginMismatch(String),

    #[error("Relying party mismatch: {0}")]
    RelyingPartyMismatch(String),

    #[error("User presence required: {0}")]
    UserPresenceRequired(String),

    #[error("User verification required: {0}")]
    UserVerificationRequired(String),

    /// The stored credential declares an algorithm this server cannot verify
    #[error("Unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// The signature does not verify, or the stored key cannot be parsed
    #[error("Signature invalid: {0}")]
    SignatureInvalid(String),

    /// Error related to relying-party configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Error accessing the cache or credential store
    #[error("Storage error: {0}")]
    Storage(String),

    /// Error from the entropy source
    #[error("Crypto error: {0}")]
    Crypto(String),
}

impl PasskeyError {
    /// Stable machine-readable tag for this error.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MalformedInput(_) => "malformed_input",
            Self::CredentialNotFound(_) => "credential_not_found",
            Self::OwnershipMismatch(_) => "ownership_mismatch",
            Self::WrongCeremonyType(_) => "wrong_ceremony_type",
            Self::ChallengeMismatch(_) => "challenge_mismatch",
            Self::OriginMismatch(_) => "origin_mismatch",
            Self::RelyingPartyMismatch(_) => "relying_party_mismatch",
            Self::UserPresenceRequired(_) => "user_presence_required",
            Self::UserVerificationRequired(_) => "user_verification_required",
            Self::UnsupportedAlgorithm(_) => "unsupported_algorithm",
            Self::SignatureInvalid(_) => "signature_invalid",
            Self::Config(_) => "config",
            Self::Storage(_) => "storage",
            Self::Crypto(_) => "crypto",
        }
    }

    /// True when the error rejects the assertion rather than signalling a server fault.
    pub fn is_verification_failure(&self) -> bool {
        !matches!(self, Self::Config(_) | Self::Storage(_) | Self::Crypto(_))
    }
}

impl From<StorageError> for PasskeyError {
    fn from(err: StorageError) -> Self {
        Self::Storage(err.to_string())
    }
}
