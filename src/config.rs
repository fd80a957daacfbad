use std::collections::BTreeMap;

use serde::Deserialize;

/// Top-level configuration, bound once at startup.
#[derive(Debug, Clone, Deserialize)]
pub struct TrustaConfig {
    /// Path of the PKCS#8 PEM file holding this service's signing key.
    /// Generated on first run when the file does not exist.
    #[serde(default = "default_private_key_file")]
    pub private_key_file: String,
    /// Issuer identifier written into every token this service signs.
    pub issuer: String,
    /// Permit fetching remote key sets over plain HTTP.
    #[serde(default)]
    pub allow_http: bool,
    /// Issuers whose tokens this service accepts.
    #[serde(default)]
    pub trusted_issuers: Vec<TrustedIssuerConfig>,
}

fn default_private_key_file() -> String {
    ".jwt-es256-private-key.pem".to_string()
}

impl TrustaConfig {
    pub fn new(issuer: impl Into<String>) -> Self {
        Self {
            private_key_file: default_private_key_file(),
            issuer: issuer.into(),
            allow_http: false,
            trusted_issuers: Vec::new(),
        }
    }

    pub fn with_private_key_file(mut self, path: impl Into<String>) -> Self {
        self.private_key_file = path.into();
        self
    }

    pub fn with_allow_http(mut self, allow: bool) -> Self {
        self.allow_http = allow;
        self
    }

    pub fn with_trusted_issuer(mut self, issuer: TrustedIssuerConfig) -> Self {
        self.trusted_issuers.push(issuer);
        self
    }
}

/// Validation policy for one remote issuer.
#[derive(Debug, Clone, Deserialize)]
pub struct TrustedIssuerConfig {
    /// Issuer identifier, e.g. `system-a.site/context/path`.
    pub issuer: String,
    /// Where the issuer publishes its key set. Defaults to
    /// `https://{issuer}/.well-known/trusta/jwks.json`.
    #[serde(default)]
    pub public_key_uri: Option<String>,
    /// Enforce the audience claim during verification.
    #[serde(default)]
    pub expect_audience: bool,
    /// Expected audience when enforcement is on; falls back to this
    /// service's own issuer identifier when unset.
    #[serde(default)]
    pub custom_audience: Option<String>,
    /// Claim to read the subject from instead of `sub`. Reserved claim
    /// names other than `sub` are rejected at registration.
    #[serde(default)]
    pub subject_claim: Option<String>,
    /// Source claim name to output key name. Output keys must be unique.
    #[serde(default)]
    pub claim_mapping: BTreeMap<String, String>,
}

impl TrustedIssuerConfig {
    pub fn new(issuer: impl Into<String>) -> Self {
        Self {
            issuer: issuer.into(),
            public_key_uri: None,
            expect_audience: false,
            custom_audience: None,
            subject_claim: None,
            claim_mapping: BTreeMap::new(),
        }
    }

    pub fn with_public_key_uri(mut self, uri: impl Into<String>) -> Self {
        self.public_key_uri = Some(uri.into());
        self
    }

    pub fn with_expect_audience(mut self, expect: bool) -> Self {
        self.expect_audience = expect;
        self
    }

    pub fn with_custom_audience(mut self, audience: impl Into<String>) -> Self {
        self.custom_audience = Some(audience.into());
        self
    }

    pub fn with_subject_claim(mut self, claim: impl Into<String>) -> Self {
        self.subject_claim = Some(claim.into());
        self
    }

    pub fn with_mapped_claim(
        mut self,
        source: impl Into<String>,
        output: impl Into<String>,
    ) -> Self {
        self.claim_mapping.insert(source.into(), output.into());
        self
    }
}
