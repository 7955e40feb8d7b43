use std::{env, sync::LazyLock};

/// Passkey credentials table name
pub(super) static DB_TABLE_PASSKEY_CREDENTIALS: LazyLock<String> = LazyLock::new(|| {
    env::var("DB_TABLE_PASSKEY_CREDENTIALS").unwrap_or_else(|_| "passkey_credentials".to_string())
});
