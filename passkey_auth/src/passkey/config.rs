use ring::digest;
use std::{env, sync::LazyLock};

use super::errors::PasskeyError;

/// Default challenge lifetime in seconds, used when the session supplies none.
pub(super) static PASSKEY_CHALLENGE_TIMEOUT: LazyLock<u32> = LazyLock::new(|| {
    env::var("PASSKEY_CHALLENGE_TIMEOUT")
        .map(|v| v.parse::<u32>().unwrap_or(300))
        .unwrap_or(300)
});

/// Client-side ceremony timeout in seconds, sent with the authentication options.
pub(super) static PASSKEY_TIMEOUT: LazyLock<u32> = LazyLock::new(|| {
    env::var("PASSKEY_TIMEOUT")
        .map(|v| v.parse::<u32>().unwrap_or(60))
        .unwrap_or(60)
});

/// The relying party an assertion must have been produced for.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RelyingParty {
    id: String,
    origin: String,
}

impl RelyingParty {
    pub fn new(id: impl Into<String>, origin: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            origin: origin.into(),
        }
    }

    /// Reads `ORIGIN` and, optionally, `PASSKEY_RP_ID`.
    ///
    /// When `PASSKEY_RP_ID` is not set the relying-party id is the host of `ORIGIN`.
    pub fn from_env() -> Result<Self, PasskeyError> {
        let origin = env::var("ORIGIN")
            .map_err(|_| PasskeyError::Config("ORIGIN must be set".to_string()))?;
        let origin = origin.trim_end_matches('/').to_string();

        let id = match env::var("PASSKEY_RP_ID") {
            Ok(id) if !id.is_empty() => id,
            _ => rp_id_from_origin(&origin)?,
        };

        tracing::debug!("Relying party configured: id={}, origin={}", id, origin);

        Ok(Self { id, origin })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// SHA-256 of the relying-party id, as found in the first 32 bytes of authenticator data.
    pub(super) fn id_hash(&self) -> digest::Digest {
        digest::digest(&digest::SHA256, self.id.as_bytes())
    }
}

fn rp_id_from_origin(origin: &str) -> Result<String, PasskeyError> {
    let url = url::Url::parse(origin)
        .map_err(|e| PasskeyError::Config(format!("Invalid ORIGIN {origin}: {e}")))?;

    url.host_str()
        .map(|host| host.to_string())
        .ok_or_else(|| PasskeyError::Config(format!("ORIGIN has no host: {origin}")))
}
