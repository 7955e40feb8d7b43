use chrono::Utc;
use ring::digest;
use serde_json::Value;
use std::sync::Arc;

use super::challenge::{ChallengeSession, issue_challenge};
use super::cose::{CoseAlgorithm, verify_signature};
use super::types::{Assertion, AuthenticationOptions, ParsedClientData};
use super::utils::allow_credentials_for;

use crate::passkey::config::{PASSKEY_TIMEOUT, RelyingParty};
use crate::passkey::errors::PasskeyError;
use crate::passkey::storage::CredentialStore;
use crate::passkey::types::{FactorType, PasskeyCredential, UserId};
use crate::utils::constant_time_eq;

/// Caller state for one verification.
#[derive(Debug, Clone, Copy)]
pub struct VerificationContext<'a> {
    /// User of the already-authenticated session, absent in passwordless flows.
    pub acting_user: Option<&'a UserId>,
    pub session: &'a ChallengeSession,
    pub relying_party: &'a RelyingParty,
}

/// Verifies WebAuthn assertions against registered credentials.
///
/// Safe to share between tasks; the only shared state lives in the
/// credential store and the challenge session.
#[derive(Clone)]
pub struct AssertionVerifier {
    credentials: Arc<dyn CredentialStore>,
}

impl AssertionVerifier {
    pub fn new(credentials: Arc<dyn CredentialStore>) -> Self {
        Self { credentials }
    }

    pub fn credentials(&self) -> &Arc<dyn CredentialStore> {
        &self.credentials
    }

    /// Issues a challenge for `owner` and builds the options the client needs
    /// to call `navigator.credentials.get()`.
    ///
    /// Second-factor ceremonies need a known owner; first-factor ceremonies may
    /// start anonymously.
    pub async fn start_authentication(
        &self,
        owner: Option<&UserId>,
        factor_type: FactorType,
        session: &ChallengeSession,
        relying_party: &RelyingParty,
    ) -> Result<AuthenticationOptions, PasskeyError> {
        if factor_type == FactorType::SecondFactor && owner.is_none() {
            return Err(PasskeyError::OwnershipMismatch(
                "Second-factor authentication requires an authenticated user".into(),
            ));
        }

        let challenge = issue_challenge(owner, session).await?;
        let allow_credentials = allow_credentials_for(self.credentials.as_ref(), owner).await?;

        let user_verification = match factor_type {
            FactorType::FirstFactor => "required",
            FactorType::SecondFactor => "discouraged",
        };

        let options = AuthenticationOptions {
            challenge: challenge.to_client_challenge(),
            timeout: (*PASSKEY_TIMEOUT).saturating_mul(1000),
            rp_id: relying_party.id().to_string(),
            allow_credentials,
            user_verification: user_verification.to_string(),
        };

        tracing::debug!("Authentication options: {:?}", options);

        Ok(options)
    }

    /// Runs the full assertion check and returns the matched credential with
    /// `last_used_at` refreshed.
    ///
    /// Checks run in a fixed order and the first failure is returned:
    /// 1. parameters decode
    /// 2. credential exists
    /// 3. credential belongs to the acting user or the presented user handle
    /// 4. client data parses
    /// 5. ceremony type is `webauthn.get`
    /// 6. challenge matches the one bound in the session
    /// 7. origin matches
    /// 8. RP ID hash matches
    /// 9. user present, and 10. user verified for first factor
    /// 11. signature verifies under the stored key
    ///
    /// The bound challenge is left in place.
    pub async fn verify(
        &self,
        params: &Value,
        factor_type: FactorType,
        ctx: &VerificationContext<'_>,
    ) -> Result<PasskeyCredential, PasskeyError> {
        let assertion = Assertion::decode(params, factor_type)?;

        let mut credential = self
            .credentials
            .find_by_credential_id(assertion.credential_id.as_bytes())
            .await?
            .ok_or_else(|| {
                tracing::debug!("Unknown credential: {}", assertion.credential_id);
                PasskeyError::CredentialNotFound(format!(
                    "Credential {} is not registered",
                    assertion.credential_id
                ))
            })?;

        verify_ownership(&assertion, &credential, ctx.acting_user)?;

        let client_data = ParsedClientData::from_bytes(&assertion.client_data_json)?;
        client_data.verify_type()?;

        let stored_challenges = self
            .bound_challenges(ctx.session, &credential.user_id, factor_type)
            .await?;
        client_data.verify_challenge(&stored_challenges)?;
        client_data.verify_origin(ctx.relying_party.origin())?;

        let auth_data = &assertion.authenticator_data;
        auth_data.verify_rp_id_hash(ctx.relying_party)?;
        auth_data.verify_user_flags(factor_type)?;

        let algorithm = CoseAlgorithm::from_i64(credential.public_key_algorithm).ok_or_else(|| {
            tracing::warn!(
                "Credential {} of user {} has unsupported algorithm {}",
                credential.credential_id,
                credential.user_id,
                credential.public_key_algorithm
            );
            PasskeyError::UnsupportedAlgorithm(format!(
                "Algorithm {} is not supported",
                credential.public_key_algorithm
            ))
        })?;

        let client_data_hash = digest::digest(&digest::SHA256, &client_data.raw_data);
        let mut signed_data = Vec::with_capacity(auth_data.as_bytes().len() + 32);
        signed_data.extend_from_slice(auth_data.as_bytes());
        signed_data.extend_from_slice(client_data_hash.as_ref());

        tracing::debug!(
            "Verifying {} signature over {} bytes",
            algorithm,
            signed_data.len()
        );
        verify_signature(
            algorithm,
            &credential.public_key,
            &signed_data,
            &assertion.signature,
        )?;

        let now = Utc::now();
        if let Err(e) = self
            .credentials
            .touch_last_used(credential.credential_id.as_bytes(), now)
            .await
        {
            tracing::warn!(
                "Failed to update last_used_at for credential {}: {}",
                credential.credential_id,
                e
            );
        }
        credential.last_used_at = now;

        tracing::info!(
            "Passkey {} authentication succeeded for user {} with credential {}",
            factor_type.as_str(),
            credential.user_id,
            credential.credential_id
        );

        Ok(credential)
    }

    /// Challenges the signed one may match: the one bound to the credential
    /// owner and, for first factor, the one bound anonymously before the user
    /// was known. Either binding may be the live one, so both are candidates.
    async fn bound_challenges(
        &self,
        session: &ChallengeSession,
        owner: &UserId,
        factor_type: FactorType,
    ) -> Result<Vec<String>, PasskeyError> {
        let mut challenges = Vec::with_capacity(2);
        if factor_type == FactorType::FirstFactor {
            challenges.extend(session.get_challenge(None).await?);
        }
        challenges.extend(session.get_challenge(Some(owner)).await?);
        Ok(challenges)
    }
}

fn verify_ownership(
    assertion: &Assertion,
    credential: &PasskeyCredential,
    acting_user: Option<&UserId>,
) -> Result<(), PasskeyError> {
    match assertion.factor_type {
        FactorType::SecondFactor => match acting_user {
            Some(user) if user == &credential.user_id => Ok(()),
            Some(user) => {
                tracing::debug!(
                    "Credential owner {} differs from acting user {}",
                    credential.user_id,
                    user
                );
                Err(PasskeyError::OwnershipMismatch(
                    "Credential does not belong to the current user".into(),
                ))
            }
            None => Err(PasskeyError::OwnershipMismatch(
                "Second-factor authentication requires an authenticated user".into(),
            )),
        },
        FactorType::FirstFactor => {
            let handle = assertion.user_handle.as_deref().unwrap_or_default();
            if constant_time_eq(handle, credential.user_handle.as_bytes()) {
                Ok(())
            } else {
                tracing::debug!(
                    "User handle does not match credential {}",
                    credential.credential_id
                );
                Err(PasskeyError::OwnershipMismatch(
                    "User handle does not match the credential".into(),
                ))
            }
        }
    }
}
