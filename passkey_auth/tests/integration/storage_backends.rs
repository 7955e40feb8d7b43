use chrono::{Duration, Utc};
use passkey_auth::{
    AssertionVerifier, ChallengeSession, CredentialId, CredentialStore, FactorType,
    PasskeyCredential, RelyingParty, SqliteCredentialStore, VerificationContext,
    cache_store_from_env, issue_challenge,
};
use serial_test::serial;
use sqlx::sqlite::SqlitePoolOptions;
use std::sync::Arc;

use crate::common::constants::{ORIGIN, RP_ID, TEST_USER_HANDLE};
use crate::common::{TestAuthenticator, TestSetup};

/// Test the full ceremony against SQLite credentials and the env-selected
/// (in-memory) challenge store
#[tokio::test]
#[serial]
async fn test_ceremony_with_sqlite_credentials() {
    // SAFETY: serialised with every other env-reading test
    unsafe {
        std::env::set_var("GENERIC_CACHE_STORE_TYPE", "memory");
    }

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to open SQLite");
    let credentials = Arc::new(SqliteCredentialStore::new(pool));
    credentials.init().await.expect("Failed to create tables");

    // Reuse the fixture's key and wire builders, swapping in the SQLite store
    let fixture = TestSetup::new(TestAuthenticator::es256()).await;
    credentials
        .insert(PasskeyCredential::new(
            CredentialId::new(fixture.credential_id.clone()),
            fixture.user.clone(),
            TEST_USER_HANDLE,
            fixture.authenticator.cose_key(),
            fixture.authenticator.algorithm(),
        ))
        .await
        .expect("Failed to seed credential");

    let verifier = AssertionVerifier::new(credentials.clone());
    let cache = cache_store_from_env().await.expect("Failed to build cache store");
    let session = ChallengeSession::new(cache, "sqlite-session", Utc::now() + Duration::minutes(5));
    let rp = RelyingParty::new(RP_ID, ORIGIN);

    let options = verifier
        .start_authentication(Some(&fixture.user), FactorType::SecondFactor, &session, &rp)
        .await
        .expect("Failed to start authentication");
    assert_eq!(options.allow_credentials().len(), 1);

    let params = fixture.valid_params(options.challenge());
    let ctx = VerificationContext {
        acting_user: Some(&fixture.user),
        session: &session,
        relying_party: &rp,
    };
    let before = Utc::now();
    let credential = verifier
        .verify(&params, FactorType::SecondFactor, &ctx)
        .await
        .expect("Verification should succeed");
    assert_eq!(credential.user_id, fixture.user);

    let stored = credentials
        .find_by_credential_id(&fixture.credential_id)
        .await
        .unwrap()
        .unwrap();
    assert!(stored.last_used_at.timestamp() >= before.timestamp());
}

/// Test a challenge issued through one session handle is visible through
/// another handle for the same session id
#[tokio::test]
async fn test_session_handles_share_store() {
    let setup = TestSetup::new(TestAuthenticator::ed25519()).await;
    let other_handle = setup.session.clone();

    let challenge = issue_challenge(Some(&setup.user), &setup.session)
        .await
        .unwrap();

    assert_eq!(
        other_handle
            .get_challenge(Some(&setup.user))
            .await
            .unwrap()
            .as_deref(),
        Some(challenge.value())
    );
}
