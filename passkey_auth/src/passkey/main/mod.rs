mod auth;
mod challenge;
mod cose;
mod types;
mod utils;

pub use auth::{AssertionVerifier, VerificationContext};
pub use challenge::{Challenge, ChallengeIssuer, ChallengeSession, issue_challenge};
pub use cose::CoseAlgorithm;
pub use types::{AllowCredential, Assertion, AuthenticationOptions, AuthenticatorData, ParsedClientData};
