use ciborium::value::Value as CborValue;
use ring::signature::{self, RsaPublicKeyComponents, UnparsedPublicKey};

use crate::passkey::errors::PasskeyError;

// COSE_Key common and key-type specific labels (RFC 9053)
const LABEL_KTY: i128 = 1;
const LABEL_ALG: i128 = 3;
const LABEL_CRV: i128 = -1;
const LABEL_X: i128 = -2;
const LABEL_Y: i128 = -3;
const LABEL_RSA_N: i128 = -1;
const LABEL_RSA_E: i128 = -2;

const KTY_OKP: i128 = 1;
const KTY_EC2: i128 = 2;
const KTY_RSA: i128 = 3;

const CRV_P256: i128 = 1;
const CRV_P384: i128 = 2;
const CRV_ED25519: i128 = 6;

/// Signature algorithms a stored credential may declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoseAlgorithm {
    /// ECDSA w/ SHA-256 on P-256
    Es256,
    /// ECDSA w/ SHA-384 on P-384
    Es384,
    /// Ed25519
    EdDsa,
    /// RSASSA-PKCS1-v1_5 w/ SHA-256
    Rs256,
    /// RSASSA-PSS w/ SHA-256
    Ps256,
}

impl CoseAlgorithm {
    pub fn from_i64(alg: i64) -> Option<Self> {
        match alg {
            -7 => Some(Self::Es256),
            -35 => Some(Self::Es384),
            -8 => Some(Self::EdDsa),
            -257 => Some(Self::Rs256),
            -37 => Some(Self::Ps256),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> i64 {
        match self {
            Self::Es256 => -7,
            Self::Es384 => -35,
            Self::EdDsa => -8,
            Self::Rs256 => -257,
            Self::Ps256 => -37,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Es256 => "ES256",
            Self::Es384 => "ES384",
            Self::EdDsa => "EdDSA",
            Self::Rs256 => "RS256",
            Self::Ps256 => "PS256",
        }
    }
}

impl std::fmt::Display for CoseAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.as_str(), self.as_i64())
    }
}

struct CoseKey {
    entries: Vec<(CborValue, CborValue)>,
}

impl CoseKey {
    fn from_bytes(bytes: &[u8]) -> Result<Self, PasskeyError> {
        let value: CborValue = ciborium::de::from_reader(bytes).map_err(|e| {
            tracing::debug!("Invalid public key CBOR: {}", e);
            invalid_key("public key is not valid CBOR")
        })?;

        match value {
            CborValue::Map(entries) => Ok(Self { entries }),
            _ => Err(invalid_key("public key is not a COSE_Key map")),
        }
    }

    fn get(&self, label: i128) -> Option<&CborValue> {
        self.entries.iter().find_map(|(key, value)| match key {
            CborValue::Integer(i) if i128::from(*i) == label => Some(value),
            _ => None,
        })
    }

    fn int(&self, label: i128) -> Option<i128> {
        match self.get(label) {
            Some(CborValue::Integer(i)) => Some(i128::from(*i)),
            _ => None,
        }
    }

    fn bytes(&self, label: i128) -> Result<&[u8], PasskeyError> {
        match self.get(label) {
            Some(CborValue::Bytes(b)) => Ok(b.as_slice()),
            _ => Err(invalid_key(&format!("missing byte string at label {label}"))),
        }
    }

    fn expect_int(&self, label: i128, expected: i128, what: &str) -> Result<(), PasskeyError> {
        match self.int(label) {
            Some(v) if v == expected => Ok(()),
            other => Err(invalid_key(&format!(
                "{what} mismatch: expected {expected}, got {other:?}"
            ))),
        }
    }

    /// Uncompressed SEC1 point for an EC2 key on the given curve.
    fn ec2_point(&self, crv: i128, coord_len: usize) -> Result<Vec<u8>, PasskeyError> {
        self.expect_int(LABEL_KTY, KTY_EC2, "key type")?;
        self.expect_int(LABEL_CRV, crv, "curve")?;
        let x = self.bytes(LABEL_X)?;
        let y = self.bytes(LABEL_Y)?;
        if x.len() != coord_len || y.len() != coord_len {
            return Err(invalid_key("invalid EC coordinate length"));
        }

        let mut point = Vec::with_capacity(1 + 2 * coord_len);
        point.push(0x04);
        point.extend_from_slice(x);
        point.extend_from_slice(y);
        Ok(point)
    }
}

fn invalid_key(reason: &str) -> PasskeyError {
    PasskeyError::SignatureInvalid(format!("Unusable public key: {reason}"))
}

/// Verifies `signature` over `message` with a COSE_Key encoded public key.
///
/// Any failure to interpret the key is reported as `SignatureInvalid`, the
/// same as a signature that does not verify.
pub(super) fn verify_signature(
    alg: CoseAlgorithm,
    cose_key: &[u8],
    message: &[u8],
    signature: &[u8],
) -> Result<(), PasskeyError> {
    let key = CoseKey::from_bytes(cose_key)?;

    if let Some(key_alg) = key.int(LABEL_ALG) {
        if key_alg != i128::from(alg.as_i64()) {
            return Err(invalid_key(&format!(
                "key algorithm {key_alg} does not match declared {alg}"
            )));
        }
    }

    let result = match alg {
        CoseAlgorithm::Es256 => {
            let point = key.ec2_point(CRV_P256, 32)?;
            UnparsedPublicKey::new(&signature::ECDSA_P256_SHA256_ASN1, point)
                .verify(message, signature)
        }
        CoseAlgorithm::Es384 => {
            let point = key.ec2_point(CRV_P384, 48)?;
            UnparsedPublicKey::new(&signature::ECDSA_P384_SHA384_ASN1, point)
                .verify(message, signature)
        }
        CoseAlgorithm::EdDsa => {
            key.expect_int(LABEL_KTY, KTY_OKP, "key type")?;
            key.expect_int(LABEL_CRV, CRV_ED25519, "curve")?;
            let x = key.bytes(LABEL_X)?;
            UnparsedPublicKey::new(&signature::ED25519, x).verify(message, signature)
        }
        CoseAlgorithm::Rs256 | CoseAlgorithm::Ps256 => {
            key.expect_int(LABEL_KTY, KTY_RSA, "key type")?;
            let components = RsaPublicKeyComponents {
                n: key.bytes(LABEL_RSA_N)?,
                e: key.bytes(LABEL_RSA_E)?,
            };
            let params = if alg == CoseAlgorithm::Rs256 {
                &signature::RSA_PKCS1_2048_8192_SHA256
            } else {
                &signature::RSA_PSS_2048_8192_SHA256
            };
            components.verify(params, message, signature)
        }
    };

    result.map_err(|_| {
        PasskeyError::SignatureInvalid(
            "Signature verification failed. For more details, run with RUST_LOG=debug".into(),
        )
    })
}
