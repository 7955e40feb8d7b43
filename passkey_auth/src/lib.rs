//! passkey_auth - WebAuthn assertion verification for passkey authentication
//!
//! This crate issues authentication challenges, decodes the assertion a browser
//! returns for them, and verifies it against a previously registered credential.
//! Credential records and the session-scoped challenge store are collaborators
//! supplied by the caller through the [`CredentialStore`] and [`CacheStore`] traits.

mod passkey;
mod storage;
mod utils;


pub use passkey::{
    AllowCredential, Assertion, AssertionVerifier, AuthenticationOptions, AuthenticatorData,
    Challenge, ChallengeIssuer, ChallengeSession, CoseAlgorithm, CredentialId, CredentialStore,
    FactorType, InMemoryCredentialStore, ParsedClientData, PasskeyCredential, PasskeyError,
    PostgresCredentialStore, RelyingParty, SqliteCredentialStore, UserId, VerificationContext,
    issue_challenge,
};

pub use storage::{
    CacheData, CacheStore, InMemoryCacheStore, RedisCacheStore, SharedCacheStore, StorageError,
    cache_store_from_env, shared_cache_store,
};
