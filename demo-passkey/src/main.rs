//! Runs one passkey authentication ceremony in-process: a software
//! authenticator answers the challenge, then a replay is attempted after the
//! challenge has been rotated.

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use ciborium::value::{Integer, Value as CborValue};
use ring::rand::SystemRandom;
use ring::signature::{self, EcdsaKeyPair, KeyPair};
use serde_json::{Value, json};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use passkey_auth::{
    AssertionVerifier, ChallengeSession, CredentialId, CredentialStore, FactorType,
    InMemoryCredentialStore, PasskeyCredential, RelyingParty, UserId, VerificationContext,
    cache_store_from_env, issue_challenge,
};

const USER_HANDLE: &str = "demo-user-handle";

struct SoftwareAuthenticator {
    key_pair: EcdsaKeyPair,
    rng: SystemRandom,
}

impl SoftwareAuthenticator {
    fn new() -> Result<Self, Box<dyn std::error::Error>> {
        let rng = SystemRandom::new();
        let alg = &signature::ECDSA_P256_SHA256_ASN1_SIGNING;
        let pkcs8 = EcdsaKeyPair::generate_pkcs8(alg, &rng).map_err(|e| e.to_string())?;
        let key_pair =
            EcdsaKeyPair::from_pkcs8(alg, pkcs8.as_ref(), &rng).map_err(|e| e.to_string())?;
        Ok(Self { key_pair, rng })
    }

    fn cose_key(&self) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
        let point = self.key_pair.public_key().as_ref();
        let int = |v: i64| CborValue::Integer(Integer::from(v));
        let key = CborValue::Map(vec![
            (int(1), int(2)),
            (int(3), int(-7)),
            (int(-1), int(1)),
            (int(-2), CborValue::Bytes(point[1..33].to_vec())),
            (int(-3), CborValue::Bytes(point[33..65].to_vec())),
        ]);
        let mut out = Vec::new();
        ciborium::ser::into_writer(&key, &mut out)?;
        Ok(out)
    }

    /// Produces the assertion a browser would post back for `options`.
    fn get_assertion(
        &self,
        credential_id: &[u8],
        rp: &RelyingParty,
        client_challenge: &str,
    ) -> Result<Value, Box<dyn std::error::Error>> {
        let mut auth_data = ring::digest::digest(&ring::digest::SHA256, rp.id().as_bytes())
            .as_ref()
            .to_vec();
        auth_data.push(0x05); // UP | UV
        auth_data.extend_from_slice(&1u32.to_be_bytes());

        let client_data = json!({
            "type": "webauthn.get",
            "challenge": client_challenge,
            "origin": rp.origin(),
        })
        .to_string();

        let mut message = auth_data.clone();
        message.extend_from_slice(
            ring::digest::digest(&ring::digest::SHA256, client_data.as_bytes()).as_ref(),
        );
        let signature = self
            .key_pair
            .sign(&self.rng, &message)
            .map_err(|e| e.to_string())?;

        Ok(json!({
            "credentialId": URL_SAFE_NO_PAD.encode(credential_id),
            "authenticatorData": URL_SAFE_NO_PAD.encode(&auth_data),
            "clientData": URL_SAFE_NO_PAD.encode(client_data.as_bytes()),
            "signature": URL_SAFE_NO_PAD.encode(signature.as_ref()),
            "userHandle": URL_SAFE_NO_PAD.encode(USER_HANDLE.as_bytes()),
        }))
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let rp = match RelyingParty::from_env() {
        Ok(rp) => rp,
        Err(e) => {
            tracing::info!("{e}; falling back to https://localhost");
            RelyingParty::new("localhost", "https://localhost")
        }
    };

    // Registration is out of scope here, so the credential is seeded directly
    let authenticator = SoftwareAuthenticator::new()?;
    let user = UserId::new("42");
    let credential_id = b"demo-credential".to_vec();
    let credentials = Arc::new(InMemoryCredentialStore::new());
    credentials
        .insert(PasskeyCredential::new(
            CredentialId::new(credential_id.clone()),
            user.clone(),
            USER_HANDLE,
            authenticator.cose_key()?,
            -7,
        ))
        .await?;

    let verifier = AssertionVerifier::new(credentials);
    let session = ChallengeSession::with_default_ttl(cache_store_from_env().await?, "demo-session");

    // Passwordless login: the challenge is bound before the user is known
    let options = verifier
        .start_authentication(None, FactorType::FirstFactor, &session, &rp)
        .await?;
    tracing::info!("Authentication options: {}", serde_json::to_string(&options)?);

    let assertion = authenticator.get_assertion(&credential_id, &rp, options.challenge())?;
    let ctx = VerificationContext {
        acting_user: None,
        session: &session,
        relying_party: &rp,
    };

    let credential = verifier
        .verify(&assertion, FactorType::FirstFactor, &ctx)
        .await?;
    tracing::info!(
        "Logged in as user {} (last used {})",
        credential.user_id,
        credential.last_used_at
    );

    // Rotating the challenge invalidates the assertion above
    issue_challenge(None, &session).await?;
    match verifier
        .verify(&assertion, FactorType::FirstFactor, &ctx)
        .await
    {
        Ok(_) => tracing::error!("Replay unexpectedly accepted"),
        Err(e) => tracing::info!("Replay rejected ({}): {}", e.kind(), e),
    }

    Ok(())
}
