use serde::Serialize;
use serde_json::{Map, Value};

use crate::passkey::config::RelyingParty;
use crate::passkey::errors::PasskeyError;
use crate::passkey::types::{CredentialId, FactorType};
use crate::utils::{base64_decode_lenient, constant_time_eq};

/// Ceremony type browsers put in client data for `navigator.credentials.get()`.
pub(super) const AUTHENTICATION_CEREMONY_TYPE: &str = "webauthn.get";

/// Options for initiating a WebAuthn authentication request.
///
/// Serialized as the `publicKey` argument of `navigator.credentials.get()`.
#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticationOptions {
    pub(super) challenge: String,
    pub(super) timeout: u32,
    pub(super) rp_id: String,
    pub(super) allow_credentials: Vec<AllowCredential>,
    pub(super) user_verification: String,
}

impl AuthenticationOptions {
    /// Base64url challenge the client must sign.
    pub fn challenge(&self) -> &str {
        &self.challenge
    }

    pub fn allow_credentials(&self) -> &[AllowCredential] {
        &self.allow_credentials
    }

    pub fn user_verification(&self) -> &str {
        &self.user_verification
    }
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct AllowCredential {
    #[serde(rename = "type")]
    pub(super) type_: String,
    pub(super) id: String,
}

impl AllowCredential {
    pub fn id(&self) -> &str {
        &self.id
    }
}

/// A decoded assertion, valid for the duration of one verification call.
#[derive(Debug, Clone)]
pub struct Assertion {
    pub(super) credential_id: CredentialId,
    pub(super) client_data_json: Vec<u8>,
    pub(super) authenticator_data: AuthenticatorData,
    pub(super) signature: Vec<u8>,
    pub(super) user_handle: Option<Vec<u8>>,
    pub(super) factor_type: FactorType,
}

impl Assertion {
    /// Decodes the wire parameters of an assertion.
    ///
    /// `credentialId`, `authenticatorData`, `clientData` and `signature` are
    /// required; `userHandle` is required for first-factor flows only.
    pub fn decode(params: &Value, factor_type: FactorType) -> Result<Self, PasskeyError> {
        let map = params
            .as_object()
            .filter(|map| !map.is_empty())
            .ok_or_else(|| {
                PasskeyError::MalformedInput(
                    "Assertion parameters must be a non-empty object".into(),
                )
            })?;

        let credential_id = CredentialId::new(required_field(map, "credentialId")?);
        let authenticator_data =
            AuthenticatorData::from_bytes(required_field(map, "authenticatorData")?)?;
        let client_data_json = required_field(map, "clientData")?;
        let signature = required_field(map, "signature")?;
        let user_handle = optional_field(map, "userHandle")?;

        if factor_type == FactorType::FirstFactor && user_handle.is_none() {
            return Err(PasskeyError::MalformedInput(
                "userHandle is required for first-factor authentication".into(),
            ));
        }

        Ok(Self {
            credential_id,
            client_data_json,
            authenticator_data,
            signature,
            user_handle,
            factor_type,
        })
    }

    pub fn credential_id(&self) -> &CredentialId {
        &self.credential_id
    }

    pub fn authenticator_data(&self) -> &AuthenticatorData {
        &self.authenticator_data
    }

    pub fn factor_type(&self) -> FactorType {
        self.factor_type
    }
}

fn required_field(map: &Map<String, Value>, name: &str) -> Result<Vec<u8>, PasskeyError> {
    optional_field(map, name)?
        .ok_or_else(|| PasskeyError::MalformedInput(format!("Missing {name}")))
}

fn optional_field(map: &Map<String, Value>, name: &str) -> Result<Option<Vec<u8>>, PasskeyError> {
    match map.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) if s.is_empty() => Ok(None),
        Some(Value::String(s)) => base64_decode_lenient(s)
            .map(Some)
            .map_err(|e| PasskeyError::MalformedInput(format!("Invalid {name}: {e}"))),
        Some(_) => Err(PasskeyError::MalformedInput(format!(
            "{name} must be a base64 string"
        ))),
    }
}

/// Client data JSON as signed by the browser.
#[derive(Debug, Clone)]
pub struct ParsedClientData {
    pub(super) type_: String,
    pub(super) challenge: String,
    pub(super) origin: String,
    pub(super) raw_data: Vec<u8>,
}

impl ParsedClientData {
    /// UTF-8 decodes and JSON-parses client data. Every field must be present.
    pub fn from_bytes(raw_data: &[u8]) -> Result<Self, PasskeyError> {
        let data_str = std::str::from_utf8(raw_data)
            .map_err(|e| PasskeyError::MalformedInput(format!("Invalid UTF-8: {e}")))?;

        let data: Value = serde_json::from_str(data_str)
            .map_err(|e| PasskeyError::MalformedInput(format!("Invalid JSON: {e}")))?;

        let field = |name: &str| {
            data[name]
                .as_str()
                .map(str::to_string)
                .ok_or_else(|| PasskeyError::MalformedInput(format!("Missing {name}")))
        };

        Ok(Self {
            type_: field("type")?,
            challenge: field("challenge")?,
            origin: field("origin")?,
            raw_data: raw_data.to_vec(),
        })
    }

    pub fn type_(&self) -> &str {
        &self.type_
    }

    pub fn challenge(&self) -> &str {
        &self.challenge
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub(super) fn verify_type(&self) -> Result<(), PasskeyError> {
        if self.type_ != AUTHENTICATION_CEREMONY_TYPE {
            tracing::debug!("Wrong ceremony type: {}", self.type_);
            return Err(PasskeyError::WrongCeremonyType(format!(
                "Expected '{AUTHENTICATION_CEREMONY_TYPE}', Got: {}",
                self.type_
            )));
        }
        Ok(())
    }

    /// Compares the signed challenge with the ones bound to the session.
    ///
    /// The client signs the base64url encoding of the challenge string, so the
    /// decoded bytes must equal one stored string's bytes. Every candidate is
    /// compared so the outcome does not depend on which one matched.
    pub(super) fn verify_challenge(&self, stored_challenges: &[String]) -> Result<(), PasskeyError> {
        if stored_challenges.is_empty() {
            tracing::debug!("No challenge bound to this session");
            return Err(PasskeyError::ChallengeMismatch(
                "No challenge bound to this session".into(),
            ));
        }

        let signed = base64_decode_lenient(&self.challenge).map_err(|_| {
            PasskeyError::ChallengeMismatch("Challenge is not valid base64".into())
        })?;

        let matched = stored_challenges
            .iter()
            .fold(false, |found, stored| {
                constant_time_eq(&signed, stored.as_bytes()) | found
            });

        if !matched {
            tracing::debug!(
                "Challenge mismatch: stored={:?}, signed={}",
                stored_challenges,
                String::from_utf8_lossy(&signed)
            );
            return Err(PasskeyError::ChallengeMismatch(
                "Challenge mismatch. For more details, run with RUST_LOG=debug".into(),
            ));
        }
        Ok(())
    }

    pub(super) fn verify_origin(&self, expected: &str) -> Result<(), PasskeyError> {
        if self.origin != expected {
            tracing::debug!("Origin mismatch: expected={}, got={}", expected, self.origin);
            return Err(PasskeyError::OriginMismatch(format!(
                "Expected: {expected}, Got: {}",
                self.origin
            )));
        }
        Ok(())
    }
}

/// Flags for AuthenticatorData as defined in WebAuthn Level 2.
///
/// Bit 0 is the least-significant bit of the flags byte.
mod auth_data_flags {
    /// User Present (UP) - Bit 0
    pub(super) const UP: u8 = 0;
    /// User Verified (UV) - Bit 2
    pub(super) const UV: u8 = 2;
    /// Backup Eligibility (BE) - Bit 3
    pub(super) const BE: u8 = 3;
    /// Backup State (BS) - Bit 4
    pub(super) const BS: u8 = 4;
    /// Attested Credential Data Present - Bit 6
    pub(super) const AT: u8 = 6;
    /// Extension Data Present - Bit 7
    pub(super) const ED: u8 = 7;
}

const RP_ID_HASH_LEN: usize = 32;
const FLAGS_OFFSET: usize = 32;
const MIN_AUTH_DATA_LEN: usize = 37;

/// AuthenticatorData structure as defined in WebAuthn Level 2
/// https://www.w3.org/TR/webauthn-2/#sctn-authenticator-data
#[derive(Debug, Clone)]
pub struct AuthenticatorData {
    pub(super) flags: u8,
    /// Signature counter, 32-bit unsigned big-endian. Parsed but not enforced.
    pub(super) counter: u32,
    pub(super) raw_data: Vec<u8>,
}

impl AuthenticatorData {
    /// Parse raw authenticator data
    /// Format (minimum 37 bytes):
    /// - RP ID Hash (32 bytes)
    /// - Flags (1 byte)
    /// - Counter (4 bytes)
    /// - Optional: Attested Credential Data
    /// - Optional: Extensions
    pub fn from_bytes(data: Vec<u8>) -> Result<Self, PasskeyError> {
        if data.len() < MIN_AUTH_DATA_LEN {
            return Err(PasskeyError::MalformedInput(format!(
                "Authenticator data too short: {} bytes",
                data.len()
            )));
        }

        Ok(Self {
            flags: data[FLAGS_OFFSET],
            counter: u32::from_be_bytes([data[33], data[34], data[35], data[36]]),
            raw_data: data,
        })
    }

    pub fn rp_id_hash(&self) -> &[u8] {
        &self.raw_data[..RP_ID_HASH_LEN]
    }

    pub fn counter(&self) -> u32 {
        self.counter
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.raw_data
    }

    /// Reads one bit of the flags byte; bit 0 is the least-significant bit.
    pub fn flag(&self, bit_index: u8) -> bool {
        bit_index < 8 && (self.flags >> bit_index) & 1 == 1
    }

    pub fn is_user_present(&self) -> bool {
        self.flag(auth_data_flags::UP)
    }

    pub fn is_user_verified(&self) -> bool {
        self.flag(auth_data_flags::UV)
    }

    pub fn is_backup_eligible(&self) -> bool {
        self.flag(auth_data_flags::BE)
    }

    pub fn is_backed_up(&self) -> bool {
        self.flag(auth_data_flags::BS)
    }

    pub fn has_attested_credential_data(&self) -> bool {
        self.flag(auth_data_flags::AT)
    }

    pub fn has_extension_data(&self) -> bool {
        self.flag(auth_data_flags::ED)
    }

    pub(super) fn verify_rp_id_hash(&self, rp: &RelyingParty) -> Result<(), PasskeyError> {
        let expected_hash = rp.id_hash();
        if self.rp_id_hash() != expected_hash.as_ref() {
            tracing::debug!(
                "Invalid RP ID hash. Expected: {:?}, Got: {:?}",
                expected_hash.as_ref(),
                self.rp_id_hash()
            );
            return Err(PasskeyError::RelyingPartyMismatch(format!(
                "Authenticator data is not scoped to relying party {}",
                rp.id()
            )));
        }
        Ok(())
    }

    /// Checks UP always and UV when the factor type demands it.
    pub(super) fn verify_user_flags(&self, factor_type: FactorType) -> Result<(), PasskeyError> {
        if !self.is_user_present() {
            return Err(PasskeyError::UserPresenceRequired(format!(
                "User present flag not set. Flags: {:02x}",
                self.flags
            )));
        }

        if factor_type == FactorType::FirstFactor && !self.is_user_verified() {
            return Err(PasskeyError::UserVerificationRequired(format!(
                "User verification required but flag not set. Flags: {:02x}",
                self.flags
            )));
        }

        tracing::debug!(
            "Authenticator flags: UP={}, UV={}, BE={}, BS={}, AT={}, ED={}, counter={}",
            self.is_user_present(),
            self.is_user_verified(),
            self.is_backup_eligible(),
            self.is_backed_up(),
            self.has_attested_credential_data(),
            self.has_extension_data(),
            self.counter
        );

        Ok(())
    }
}
