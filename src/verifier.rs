use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use reqwest::Url;
use serde_json::Value;
use tracing::debug;

use crate::claims::{ClaimValue, ReservedClaim, VerifiedClaims, RESERVED_CLAIMS, SUBJECT_CLAIM};
use crate::config::TrustedIssuerConfig;
use crate::error::{TrustaError, TrustaResult};
use crate::jwks::KeySetFetcher;

/// Key material cached from the issuer's last successful fetch, replaced
/// as a unit so concurrent verification never sees a partial update.
struct CachedKey {
    key: DecodingKey,
    fetched_at: DateTime<Utc>,
}

/// Validation policy and cached public key for one trusted issuer.
///
/// Starts not ready; the first successful [`refresh`](Self::refresh) makes
/// it ready and it never regresses — a failed refresh leaves the previous
/// key in place.
pub struct IssuerVerifier {
    issuer: String,
    public_key_uri: Url,
    subject_claim: Option<String>,
    claim_mapping: BTreeMap<String, String>,
    validation: Validation,
    fetcher: KeySetFetcher,
    state: RwLock<Option<Arc<CachedKey>>>,
}

impl IssuerVerifier {
    /// Validate the issuer descriptor and derive the immutable policy.
    ///
    /// `self_issuer` is this service's own identifier, used as the expected
    /// audience when enforcement is on and no custom audience is set.
    pub fn new(
        config: TrustedIssuerConfig,
        self_issuer: &str,
        allow_http: bool,
    ) -> TrustaResult<Self> {
        let issuer = config.issuer;

        let public_key_uri = match config.public_key_uri.as_deref().filter(|uri| !uri.trim().is_empty())
        {
            Some(uri) => {
                let url = Url::parse(uri).map_err(|err| {
                    TrustaError::Config(format!("invalid public key URI '{uri}': {err}"))
                })?;
                if url.scheme() == "http" && !allow_http {
                    return Err(TrustaError::Config(format!(
                        "plain HTTP key URI '{uri}' is not allowed"
                    )));
                }
                url
            }
            None => {
                let derived = format!("https://{issuer}/.well-known/trusta/jwks.json");
                Url::parse(&derived).map_err(|err| {
                    TrustaError::Config(format!(
                        "cannot derive key URI from issuer '{issuer}': {err}"
                    ))
                })?
            }
        };

        let subject_claim = match config
            .subject_claim
            .as_deref()
            .filter(|name| !name.trim().is_empty())
        {
            None => None,
            Some(SUBJECT_CLAIM) => None,
            Some(name) if RESERVED_CLAIMS.contains(&name) => {
                return Err(TrustaError::Config(format!(
                    "reserved claim '{name}' cannot be used as subject claim"
                )));
            }
            Some(name) => Some(name.to_string()),
        };

        let mut output_keys = HashSet::new();
        for output in config.claim_mapping.values() {
            if !output_keys.insert(output.as_str()) {
                return Err(TrustaError::Config(format!(
                    "duplicate output key '{output}' in claim mapping"
                )));
            }
        }

        let expected_audience = config
            .custom_audience
            .as_deref()
            .filter(|audience| !audience.trim().is_empty())
            .unwrap_or(self_issuer);

        let mut validation = Validation::new(Algorithm::ES256);
        validation.leeway = 0;
        validation.set_issuer(&[&issuer]);
        if config.expect_audience {
            validation.set_audience(&[expected_audience]);
        } else {
            validation.validate_aud = false;
        }

        Ok(Self {
            issuer,
            public_key_uri,
            subject_claim,
            claim_mapping: config.claim_mapping,
            validation,
            fetcher: KeySetFetcher::new(),
            state: RwLock::new(None),
        })
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    pub fn public_key_uri(&self) -> &Url {
        &self.public_key_uri
    }

    /// Whether at least one key fetch has ever succeeded.
    pub fn ready(&self) -> bool {
        self.state.read().expect("rwlock poisoned").is_some()
    }

    /// Timestamp of the last successful key fetch.
    pub fn last_refreshed(&self) -> Option<DateTime<Utc>> {
        self.state
            .read()
            .expect("rwlock poisoned")
            .as_ref()
            .map(|cached| cached.fetched_at)
    }

    /// Fetch the issuer's key set and swap the cached key in atomically.
    /// On failure the previous key, if any, stays valid for verification.
    pub async fn refresh(&self) -> TrustaResult<()> {
        let key = self.fetcher.fetch(&self.public_key_uri).await?;
        let cached = Arc::new(CachedKey {
            key,
            fetched_at: Utc::now(),
        });
        *self.state.write().expect("rwlock poisoned") = Some(cached);
        debug!(issuer = %self.issuer, "refreshed issuer public key");
        Ok(())
    }

    /// Verify a token against the cached key and project its claims.
    /// Performs no network I/O; safe to call concurrently with a refresh.
    pub fn verify(&self, token: &str) -> TrustaResult<VerifiedClaims> {
        let cached = self
            .state
            .read()
            .expect("rwlock poisoned")
            .clone()
            .ok_or_else(|| TrustaError::NotReady(self.issuer.clone()))?;

        let data = decode::<Value>(token, &cached.key, &self.validation)
            .map_err(|err| TrustaError::ClaimValidation(err.to_string()))?;
        let payload = data.claims;

        let subject_claim = self.subject_claim.as_deref().unwrap_or(SUBJECT_CLAIM);
        let subject = payload
            .get(subject_claim)
            .and_then(Value::as_str)
            .ok_or_else(|| {
                TrustaError::ClaimValidation(format!("subject claim '{subject_claim}' missing"))
            })?;

        let mut verified = VerifiedClaims::new(subject.to_string());
        for (source, output) in &self.claim_mapping {
            let value = match ReservedClaim::from_name(source) {
                Some(reserved) => reserved.extract(&payload),
                None => payload
                    .get(source)
                    .and_then(Value::as_str)
                    .map(|value| ClaimValue::String(value.to_string())),
            };
            // An absent source claim is not an error, the output key is
            // simply omitted.
            if let Some(value) = value {
                verified.claims.insert(output.clone(), value);
            }
        }
        Ok(verified)
    }
}
