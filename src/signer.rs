use std::collections::BTreeMap;

use chrono::{Duration, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde_json::{Map, Value};

use crate::error::{TrustaError, TrustaResult};

const WILDCARD_AUDIENCE: &str = "*";

fn default_validity() -> Duration {
    Duration::minutes(3)
}

/// What to sign. An immutable value rather than a mutable builder, so a
/// request can be shared or reused across concurrent callers.
#[derive(Debug, Clone)]
pub struct SignRequest {
    subject: Option<String>,
    audience: Option<String>,
    validity: Duration,
    claims: BTreeMap<String, String>,
}

impl Default for SignRequest {
    fn default() -> Self {
        Self {
            subject: None,
            audience: None,
            validity: default_validity(),
            claims: BTreeMap::new(),
        }
    }
}

impl SignRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    /// Restrict the token to one recipient. Unset means any audience; the
    /// wildcard sentinel `*` is written into the token.
    pub fn with_audience(mut self, audience: impl Into<String>) -> Self {
        self.audience = Some(audience.into());
        self
    }

    pub fn with_validity(mut self, validity: Duration) -> Self {
        self.validity = validity;
        self
    }

    pub fn with_claim(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.claims.insert(name.into(), value.into());
        self
    }

    pub fn with_claims<I, K, V>(mut self, claims: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        for (name, value) in claims {
            self.claims.insert(name.into(), value.into());
        }
        self
    }
}

/// Signs outbound tokens with this service's key and issuer identifier.
#[derive(Clone)]
pub struct TokenSigner {
    encoding_key: EncodingKey,
    issuer: String,
    kid: String,
}

impl TokenSigner {
    pub fn new(encoding_key: EncodingKey, issuer: impl Into<String>, kid: impl Into<String>) -> Self {
        Self {
            encoding_key,
            issuer: issuer.into(),
            kid: kid.into(),
        }
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    pub fn sign(&self, request: &SignRequest) -> TrustaResult<String> {
        let subject = request.subject.as_deref().ok_or(TrustaError::MissingSubject)?;

        let now = Utc::now();
        let expires_at = now + request.validity;

        // Custom claims first; the registered fields below always win, so
        // a request can never override iss/sub/aud/exp/iat.
        let mut payload = Map::new();
        for (name, value) in &request.claims {
            payload.insert(name.clone(), Value::String(value.clone()));
        }
        payload.insert("iss".to_string(), Value::String(self.issuer.clone()));
        payload.insert("sub".to_string(), Value::String(subject.to_string()));
        payload.insert(
            "aud".to_string(),
            Value::String(
                request
                    .audience
                    .clone()
                    .unwrap_or_else(|| WILDCARD_AUDIENCE.to_string()),
            ),
        );
        payload.insert("iat".to_string(), Value::from(now.timestamp()));
        payload.insert("exp".to_string(), Value::from(expires_at.timestamp()));

        let mut header = Header::new(Algorithm::ES256);
        header.kid = Some(self.kid.clone());
        encode(&header, &Value::Object(payload), &self.encoding_key)
            .map_err(|err| TrustaError::Signing(err.to_string()))
    }
}
