mod config;
mod errors;
mod main;
mod storage;
mod types;

pub use config::RelyingParty;
pub use errors::PasskeyError;

pub use main::{
    AllowCredential, Assertion, AssertionVerifier, AuthenticationOptions, AuthenticatorData,
    Challenge, ChallengeIssuer, ChallengeSession, CoseAlgorithm, ParsedClientData,
    VerificationContext, issue_challenge,
};

pub use storage::{
    CredentialStore, InMemoryCredentialStore, PostgresCredentialStore, SqliteCredentialStore,
};

pub use types::{CredentialId, FactorType, PasskeyCredential, UserId};
