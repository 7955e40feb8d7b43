use chrono::Utc;
use passkey_auth::{
    ChallengeIssuer, CredentialStore, FactorType, PasskeyError, UserId, VerificationContext,
    issue_challenge,
};

use crate::common::constants::{FLAGS_UP_UV, ORIGIN, RP_ID};
use crate::common::webauthn_helpers::{authenticator_data, client_data_json, encode};
use crate::common::{TestAuthenticator, TestSetup};

/// Test the reference scenario: a 60-hex challenge bound to user 42, answered
/// with user 42's EC key, verifies and refreshes last_used_at
#[tokio::test]
async fn test_second_factor_round_trip() {
    // Given a challenge bound to user 42
    let setup = TestSetup::new(TestAuthenticator::es256()).await;
    let challenge = issue_challenge(Some(&setup.user), &setup.session)
        .await
        .expect("Failed to issue challenge");
    assert_eq!(challenge.value().len(), 60);
    let before = Utc::now();

    // When the browser returns an assertion signed over that challenge
    let params = setup.sign_params(
        &authenticator_data(RP_ID, FLAGS_UP_UV, 7),
        &client_data_json("webauthn.get", &encode(challenge.value().as_bytes()), ORIGIN),
    );
    let credential = setup
        .verifier
        .verify(&params, FactorType::SecondFactor, &setup.context(Some(&setup.user)))
        .await
        .expect("Verification should succeed");

    // Then the matched credential comes back with a fresh last_used_at
    assert_eq!(credential.user_id, UserId::new("42"));
    assert_eq!(credential.credential_id.as_bytes(), setup.credential_id.as_slice());
    assert!(credential.last_used_at >= before);

    let stored = setup
        .credentials
        .find_by_credential_id(&setup.credential_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.last_used_at, credential.last_used_at);
}

/// Test a passwordless ceremony started before the user is known
#[tokio::test]
async fn test_first_factor_round_trip_via_options() {
    let setup = TestSetup::new(TestAuthenticator::ed25519()).await;

    let options = setup
        .verifier
        .start_authentication(None, FactorType::FirstFactor, &setup.session, &setup.rp)
        .await
        .expect("Failed to start authentication");

    let json = serde_json::to_value(&options).unwrap();
    assert_eq!(json["rpId"], RP_ID);
    assert_eq!(json["userVerification"], "required");
    assert_eq!(json["timeout"], 60000);

    let params = setup.valid_params(options.challenge());
    let credential = setup
        .verifier
        .verify(&params, FactorType::FirstFactor, &setup.context(None))
        .await
        .expect("Verification should succeed");

    assert_eq!(credential.user_id, setup.user);
}

/// Test a passwordless login succeeds while an older step-up challenge is
/// still bound to the same user in the session
#[tokio::test]
async fn test_first_factor_with_stale_user_challenge() {
    let setup = TestSetup::new(TestAuthenticator::es256()).await;
    issue_challenge(Some(&setup.user), &setup.session)
        .await
        .expect("Failed to issue user challenge");

    let options = setup
        .verifier
        .start_authentication(None, FactorType::FirstFactor, &setup.session, &setup.rp)
        .await
        .expect("Failed to start authentication");

    let params = setup.valid_params(options.challenge());
    let credential = setup
        .verifier
        .verify(&params, FactorType::FirstFactor, &setup.context(None))
        .await
        .expect("Fresh anonymous challenge should verify");
    assert_eq!(credential.user_id, setup.user);

    // A second factor never looks at the anonymous binding
    let result = setup
        .verifier
        .verify(&params, FactorType::SecondFactor, &setup.context(Some(&setup.user)))
        .await;
    assert!(matches!(result, Err(PasskeyError::ChallengeMismatch(_))));
}

/// Test the stored challenge is not consumed, and that rebinding a new one
/// closes the replay window
#[tokio::test]
async fn test_replay_rejected_after_rebinding() {
    let setup = TestSetup::new(TestAuthenticator::es256()).await;
    let challenge = issue_challenge(Some(&setup.user), &setup.session)
        .await
        .unwrap();
    let params = setup.valid_params(&challenge.to_client_challenge());
    let ctx = setup.context(Some(&setup.user));

    // First use succeeds
    setup
        .verifier
        .verify(&params, FactorType::SecondFactor, &ctx)
        .await
        .expect("First verification should succeed");

    // Replaying while the same challenge is bound still passes
    setup
        .verifier
        .verify(&params, FactorType::SecondFactor, &ctx)
        .await
        .expect("Challenge is not consumed by verification");

    // Once a new challenge is bound the old assertion is dead
    let fresh = ChallengeIssuer::issue().unwrap();
    ChallengeIssuer::bind(fresh, &setup.session, Some(&setup.user), None)
        .await
        .unwrap();

    let result = setup
        .verifier
        .verify(&params, FactorType::SecondFactor, &ctx)
        .await;
    assert!(matches!(result, Err(PasskeyError::ChallengeMismatch(_))));
}

/// Test verifications running on separate tasks against shared stores
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_verifications() {
    let setup = TestSetup::new(TestAuthenticator::es256()).await;
    let challenge = issue_challenge(Some(&setup.user), &setup.session)
        .await
        .unwrap();

    let mut handles = Vec::new();
    for _ in 0..8 {
        let params = setup.valid_params(&challenge.to_client_challenge());
        let verifier = setup.verifier.clone();
        let session = setup.session.clone();
        let rp = setup.rp.clone();
        let user = setup.user.clone();

        handles.push(tokio::spawn(async move {
            let ctx = VerificationContext {
                acting_user: Some(&user),
                session: &session,
                relying_party: &rp,
            };
            verifier
                .verify(&params, FactorType::SecondFactor, &ctx)
                .await
        }));
    }

    for handle in handles {
        let result = handle.await.expect("Task panicked");
        assert!(result.is_ok(), "{result:?}");
    }
}
