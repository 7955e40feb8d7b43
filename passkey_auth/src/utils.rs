use base64::{
    Engine as _,
    engine::general_purpose::{STANDARD_NO_PAD, URL_SAFE_NO_PAD},
};
use ring::rand::SecureRandom;
use subtle::ConstantTimeEq;
use thiserror::Error;

/// Decodes base64 as browsers and server frameworks send it.
///
/// Accepts both the url-safe and the standard alphabet, with or without padding.
/// Mixing the two alphabets in one value is rejected.
pub(crate) fn base64_decode_lenient(input: &str) -> Result<Vec<u8>, UtilError> {
    let trimmed = input.trim_end_matches('=');
    let engine = if trimmed.contains(['-', '_']) {
        &URL_SAFE_NO_PAD
    } else {
        &STANDARD_NO_PAD
    };
    engine
        .decode(trimmed)
        .map_err(|e| UtilError::Format(format!("Failed to decode base64: {e}")))
}

pub(crate) fn base64url_encode(input: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(input)
}

pub(crate) fn gen_random_bytes(len: usize) -> Result<Vec<u8>, UtilError> {
    let rng = ring::rand::SystemRandom::new();
    let mut bytes = vec![0u8; len];
    rng.fill(&mut bytes)
        .map_err(|_| UtilError::Crypto("Failed to generate random bytes".to_string()))?;
    Ok(bytes)
}

pub(crate) fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.ct_eq(b).into()
}

#[derive(Debug, Error, Clone)]
pub(crate) enum UtilError {
    #[error("Crypto error: {0}")]
    Crypto(String),

    #[error("Invalid format: {0}")]
    Format(String),
}
