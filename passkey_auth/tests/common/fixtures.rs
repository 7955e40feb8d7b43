//! Test authenticators and a ready-made verification environment.

use chrono::{Duration, Utc};
use ciborium::value::{Integer, Value as CborValue};
use passkey_auth::{
    AssertionVerifier, ChallengeSession, CredentialId, CredentialStore, InMemoryCacheStore,
    InMemoryCredentialStore, PasskeyCredential, RelyingParty, UserId, VerificationContext,
    shared_cache_store,
};
use ring::rand::SystemRandom;
use ring::signature::{self, EcdsaKeyPair, Ed25519KeyPair, KeyPair};
use serde_json::Value;
use std::sync::Arc;

use super::constants::{FLAGS_UP_UV, ORIGIN, RP_ID, TEST_USER_HANDLE, TEST_USER_ID};
use super::webauthn_helpers::{
    assertion_params, authenticator_data, client_data_json, signed_message,
};

/// A software authenticator holding one key pair
pub enum TestAuthenticator {
    Es256(EcdsaKeyPair),
    Ed25519(Ed25519KeyPair),
}

impl TestAuthenticator {
    pub fn es256() -> Self {
        let rng = SystemRandom::new();
        let alg = &signature::ECDSA_P256_SHA256_ASN1_SIGNING;
        let pkcs8 = EcdsaKeyPair::generate_pkcs8(alg, &rng).expect("Failed to generate key");
        Self::Es256(EcdsaKeyPair::from_pkcs8(alg, pkcs8.as_ref(), &rng).expect("Bad pkcs8"))
    }

    pub fn ed25519() -> Self {
        let rng = SystemRandom::new();
        let pkcs8 = Ed25519KeyPair::generate_pkcs8(&rng).expect("Failed to generate key");
        Self::Ed25519(Ed25519KeyPair::from_pkcs8(pkcs8.as_ref()).expect("Bad pkcs8"))
    }

    pub fn algorithm(&self) -> i64 {
        match self {
            Self::Es256(_) => -7,
            Self::Ed25519(_) => -8,
        }
    }

    /// Public key as a COSE_Key map
    pub fn cose_key(&self) -> Vec<u8> {
        let int = |v: i64| CborValue::Integer(Integer::from(v));
        let map = match self {
            Self::Es256(kp) => {
                let point = kp.public_key().as_ref();
                vec![
                    (int(1), int(2)),
                    (int(3), int(-7)),
                    (int(-1), int(1)),
                    (int(-2), CborValue::Bytes(point[1..33].to_vec())),
                    (int(-3), CborValue::Bytes(point[33..65].to_vec())),
                ]
            }
            Self::Ed25519(kp) => vec![
                (int(1), int(1)),
                (int(3), int(-8)),
                (int(-1), int(6)),
                (int(-2), CborValue::Bytes(kp.public_key().as_ref().to_vec())),
            ],
        };

        let mut out = Vec::new();
        ciborium::ser::into_writer(&CborValue::Map(map), &mut out).expect("CBOR encode");
        out
    }

    pub fn sign(&self, message: &[u8]) -> Vec<u8> {
        match self {
            Self::Es256(kp) => kp
                .sign(&SystemRandom::new(), message)
                .expect("Failed to sign")
                .as_ref()
                .to_vec(),
            Self::Ed25519(kp) => kp.sign(message).as_ref().to_vec(),
        }
    }
}

/// Verifier, session and relying party with one registered credential
pub struct TestSetup {
    pub verifier: AssertionVerifier,
    pub credentials: Arc<InMemoryCredentialStore>,
    pub session: ChallengeSession,
    pub rp: RelyingParty,
    pub authenticator: TestAuthenticator,
    pub user: UserId,
    pub credential_id: Vec<u8>,
}

impl TestSetup {
    pub async fn new(authenticator: TestAuthenticator) -> Self {
        let credentials = Arc::new(InMemoryCredentialStore::new());
        let user = UserId::new(TEST_USER_ID);
        let credential_id = b"registered-credential-of-user-42".to_vec();

        credentials
            .insert(PasskeyCredential::new(
                CredentialId::new(credential_id.clone()),
                user.clone(),
                TEST_USER_HANDLE,
                authenticator.cose_key(),
                authenticator.algorithm(),
            ))
            .await
            .expect("Failed to seed credential");

        Self {
            verifier: AssertionVerifier::new(credentials.clone()),
            credentials,
            session: ChallengeSession::new(
                shared_cache_store(InMemoryCacheStore::new()),
                "integration-session",
                Utc::now() + Duration::minutes(5),
            ),
            rp: RelyingParty::new(RP_ID, ORIGIN),
            authenticator,
            user,
            credential_id,
        }
    }

    pub fn context<'a>(&'a self, acting_user: Option<&'a UserId>) -> VerificationContext<'a> {
        VerificationContext {
            acting_user,
            session: &self.session,
            relying_party: &self.rp,
        }
    }

    /// Signs `auth_data` and `client_data` with the registered key
    pub fn sign_params(&self, auth_data: &[u8], client_data: &[u8]) -> Value {
        let signature = self
            .authenticator
            .sign(&signed_message(auth_data, client_data));
        assertion_params(
            &self.credential_id,
            auth_data,
            client_data,
            &signature,
            Some(TEST_USER_HANDLE.as_bytes()),
        )
    }

    /// A fully valid assertion answering `client_challenge`
    pub fn valid_params(&self, client_challenge: &str) -> Value {
        self.sign_params(
            &authenticator_data(RP_ID, FLAGS_UP_UV, 1),
            &client_data_json("webauthn.get", client_challenge, ORIGIN),
        )
    }
}
