use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde_json::Value;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::claims::VerifiedClaims;
use crate::config::{TrustaConfig, TrustedIssuerConfig};
use crate::error::{TrustaError, TrustaResult};
use crate::keyset::KeyMaterial;
use crate::signer::TokenSigner;
use crate::verifier::IssuerVerifier;

/// Owns the local key material and one [`IssuerVerifier`] per trusted
/// issuer. Constructed once at startup and shared by reference with the
/// request path and the refresh schedule.
pub struct TrustaManager {
    issuer: String,
    allow_http: bool,
    key_material: KeyMaterial,
    verifiers: RwLock<HashMap<String, Arc<IssuerVerifier>>>,
}

impl TrustaManager {
    /// Load or generate the signing key and register the configured
    /// issuers. Only key-material failure is fatal; a descriptor that
    /// fails validation is logged and skipped.
    pub fn new(config: TrustaConfig) -> TrustaResult<Self> {
        let key_material = KeyMaterial::load_or_generate(&config.private_key_file)?;
        let manager = Self {
            issuer: config.issuer,
            allow_http: config.allow_http,
            key_material,
            verifiers: RwLock::new(HashMap::new()),
        };
        for trusted in config.trusted_issuers {
            manager.register(trusted);
        }
        Ok(manager)
    }

    /// [`new`](Self::new) followed by a best-effort initial refresh pass.
    pub async fn init(config: TrustaConfig) -> TrustaResult<Self> {
        let manager = Self::new(config)?;
        info!(issuer = %manager.issuer, "updating trusted issuer public keys");
        manager.refresh_all().await;
        Ok(manager)
    }

    /// Register one trusted issuer. A duplicate identifier replaces the
    /// prior entry; an invalid descriptor is logged and skipped.
    pub fn register(&self, config: TrustedIssuerConfig) {
        let issuer = config.issuer.clone();
        match IssuerVerifier::new(config, &self.issuer, self.allow_http) {
            Ok(verifier) => {
                let replaced = self
                    .verifiers
                    .write()
                    .expect("rwlock poisoned")
                    .insert(issuer.clone(), Arc::new(verifier));
                if replaced.is_some() {
                    warn!(issuer = %issuer, "replaced previously registered issuer");
                }
            }
            Err(err) => {
                error!(issuer = %issuer, error = %err, "skipping issuer with invalid configuration");
            }
        }
    }

    /// Refresh every registered verifier in turn. Failures are logged per
    /// issuer and never abort the pass or reach the caller.
    pub async fn refresh_all(&self) {
        let verifiers: Vec<Arc<IssuerVerifier>> = self
            .verifiers
            .read()
            .expect("rwlock poisoned")
            .values()
            .cloned()
            .collect();

        for verifier in verifiers {
            if let Err(err) = verifier.refresh().await {
                let last_success = verifier
                    .last_refreshed()
                    .map(|at| at.to_rfc3339())
                    .unwrap_or_else(|| "never".to_string());
                error!(
                    issuer = %verifier.issuer(),
                    last_success = %last_success,
                    error = %err,
                    "failed to refresh issuer public key"
                );
            }
        }
    }

    /// Route a token to the verifier for its claimed issuer and verify it.
    ///
    /// The issuer is read from the unverified payload purely for routing;
    /// the matched verifier re-validates the claim cryptographically.
    /// Never performs network I/O.
    pub fn verify(&self, token: &str) -> TrustaResult<VerifiedClaims> {
        let segments: Vec<&str> = token.split('.').collect();
        if segments.len() != 3 {
            return Err(TrustaError::MalformedToken(format!(
                "expected 3 segments, found {}",
                segments.len()
            )));
        }

        let payload_bytes = URL_SAFE_NO_PAD.decode(segments[1]).map_err(|err| {
            TrustaError::MalformedToken(format!("payload segment is not base64url: {err}"))
        })?;
        let payload_json = String::from_utf8(payload_bytes)
            .map_err(|err| TrustaError::MalformedToken(format!("payload is not UTF-8: {err}")))?;
        let payload: Value = serde_json::from_str(&payload_json)
            .map_err(|err| TrustaError::MalformedToken(format!("payload is not JSON: {err}")))?;

        let claimed_issuer = payload.get("iss").and_then(Value::as_str).unwrap_or_default();
        let verifier = self
            .verifiers
            .read()
            .expect("rwlock poisoned")
            .get(claimed_issuer)
            .cloned()
            .ok_or_else(|| TrustaError::UnknownIssuer(claimed_issuer.to_string()))?;

        verifier
            .verify(token)
            .map(|claims| claims.with_raw_payload(payload_json))
    }

    /// A signer bound to this service's key and issuer identifier.
    pub fn signer(&self) -> TokenSigner {
        TokenSigner::new(
            self.key_material.encoding_key().clone(),
            self.issuer.clone(),
            self.key_material.kid(),
        )
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Public key set JSON served at the well-known path.
    pub fn public_jwks(&self) -> &str {
        self.key_material.public_jwks()
    }

    pub fn verifier(&self, issuer: &str) -> Option<Arc<IssuerVerifier>> {
        self.verifiers
            .read()
            .expect("rwlock poisoned")
            .get(issuer)
            .cloned()
    }
}

/// Drive [`TrustaManager::refresh_all`] on a fixed schedule.
pub fn spawn_refresh(manager: Arc<TrustaManager>, period: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            debug!("running scheduled issuer key refresh");
            manager.refresh_all().await;
        }
    })
}
