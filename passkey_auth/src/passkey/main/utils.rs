use crate::passkey::errors::PasskeyError;
use crate::passkey::storage::CredentialStore;
use crate::passkey::types::UserId;

use super::types::AllowCredential;

const PUBLIC_KEY_CREDENTIAL_TYPE: &str = "public-key";

/// Credentials the client may offer. Empty for an anonymous owner, which
/// lets the authenticator pick a discoverable credential.
pub(super) async fn allow_credentials_for(
    store: &dyn CredentialStore,
    owner: Option<&UserId>,
) -> Result<Vec<AllowCredential>, PasskeyError> {
    let Some(owner) = owner else {
        return Ok(Vec::new());
    };

    let credentials = store.list_by_user(owner).await?;
    Ok(credentials
        .iter()
        .map(|c| AllowCredential {
            type_: PUBLIC_KEY_CREDENTIAL_TYPE.to_string(),
            id: c.credential_id.to_base64url(),
        })
        .collect())
}
