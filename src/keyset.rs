use std::fs;
use std::path::Path;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use jsonwebtoken::EncodingKey;
use p256::elliptic_curve::sec1::ToEncodedPoint;
use p256::pkcs8::{DecodePrivateKey, EncodePrivateKey, LineEnding};
use p256::SecretKey;
use rand_core::OsRng;
use sha2::{Digest, Sha256};
use tracing::info;

use crate::error::{TrustaError, TrustaResult};
use crate::jwks::{Jwk, JwkSet};

/// This service's own signing key plus the public half ready to publish.
///
/// Loaded from a PKCS#8 PEM file, generated on first run. Failure here is
/// fatal to startup; there is no fallback key.
pub struct KeyMaterial {
    encoding_key: EncodingKey,
    kid: String,
    public_jwks: String,
}

impl KeyMaterial {
    pub fn load_or_generate(path: impl AsRef<Path>) -> TrustaResult<Self> {
        let path = path.as_ref();
        let pem = if path.exists() {
            fs::read_to_string(path).map_err(|err| {
                TrustaError::KeyMaterial(format!("failed to read {}: {err}", path.display()))
            })?
        } else {
            let secret = SecretKey::random(&mut OsRng);
            let pem = secret.to_pkcs8_pem(LineEnding::LF).map_err(|err| {
                TrustaError::KeyMaterial(format!("failed to encode generated key: {err}"))
            })?;
            fs::write(path, pem.as_bytes()).map_err(|err| {
                TrustaError::KeyMaterial(format!("failed to write {}: {err}", path.display()))
            })?;
            info!(path = %path.display(), "generated new ES256 signing key");
            pem.as_str().to_owned()
        };

        let secret = SecretKey::from_pkcs8_pem(&pem).map_err(|err| {
            TrustaError::KeyMaterial(format!("corrupt key file {}: {err}", path.display()))
        })?;
        let encoding_key = EncodingKey::from_ec_pem(pem.as_bytes()).map_err(|err| {
            TrustaError::KeyMaterial(format!("unusable key file {}: {err}", path.display()))
        })?;

        let point = secret.public_key().to_encoded_point(false);
        let (x, y) = match (point.x(), point.y()) {
            (Some(x), Some(y)) => (
                URL_SAFE_NO_PAD.encode(x.as_slice()),
                URL_SAFE_NO_PAD.encode(y.as_slice()),
            ),
            _ => {
                return Err(TrustaError::KeyMaterial(
                    "public key has no affine coordinates".to_string(),
                ))
            }
        };

        let kid = thumbprint(&x, &y);
        let set = JwkSet {
            keys: vec![Jwk {
                kty: "EC".to_string(),
                crv: Some("P-256".to_string()),
                alg: Some("ES256".to_string()),
                use_: Some("sig".to_string()),
                kid: Some(kid.clone()),
                x: Some(x),
                y: Some(y),
            }],
        };
        let public_jwks = serde_json::to_string(&set)
            .map_err(|err| TrustaError::KeyMaterial(format!("failed to serialize key set: {err}")))?;

        Ok(Self {
            encoding_key,
            kid,
            public_jwks,
        })
    }

    pub fn encoding_key(&self) -> &EncodingKey {
        &self.encoding_key
    }

    pub fn kid(&self) -> &str {
        &self.kid
    }

    /// Public key set as JSON, the document served at the well-known path.
    pub fn public_jwks(&self) -> &str {
        &self.public_jwks
    }
}

/// RFC 7638 thumbprint over the required EC members in lexicographic order.
fn thumbprint(x: &str, y: &str) -> String {
    let canonical = format!(r#"{{"crv":"P-256","kty":"EC","x":"{x}","y":"{y}"}}"#);
    URL_SAFE_NO_PAD.encode(Sha256::digest(canonical.as_bytes()))
}
