use std::time::Duration;

use jsonwebtoken::DecodingKey;
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};

use crate::error::{TrustaError, TrustaResult};

const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// One key of a published key set. Only the fields relevant to ES256
/// verification are modelled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Jwk {
    pub kty: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crv: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alg: Option<String>,
    #[serde(default, rename = "use", skip_serializing_if = "Option::is_none")]
    pub use_: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwkSet {
    pub keys: Vec<Jwk>,
}

impl Jwk {
    /// Whether this entry can back ES256 verification.
    fn is_usable(&self) -> bool {
        self.kty == "EC"
            && self.crv.as_deref() == Some("P-256")
            && self.alg.as_deref().map_or(true, |alg| alg == "ES256")
            && self.x.is_some()
            && self.y.is_some()
    }
}

/// Fetches a remote issuer's published key set. Retry and backoff belong
/// to the caller's refresh schedule, not here.
#[derive(Clone, Default)]
pub struct KeySetFetcher {
    client: Client,
}

impl KeySetFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    pub async fn fetch(&self, url: &Url) -> TrustaResult<DecodingKey> {
        let response = self
            .client
            .get(url.clone())
            .timeout(FETCH_TIMEOUT)
            .send()
            .await
            .map_err(|err| TrustaError::KeyFetch(err.to_string()))?;

        if response.status() != reqwest::StatusCode::OK {
            return Err(TrustaError::KeyFetch(format!(
                "HTTP {} from {}",
                response.status(),
                url
            )));
        }

        let body: JwkSet = response
            .json()
            .await
            .map_err(|err| TrustaError::KeyFetch(err.to_string()))?;

        decoding_key_from_set(&body, url)
    }
}

fn decoding_key_from_set(set: &JwkSet, url: &Url) -> TrustaResult<DecodingKey> {
    let key = set
        .keys
        .iter()
        .find(|key| key.is_usable())
        .ok_or_else(|| TrustaError::KeyFetch(format!("no usable P-256 key in set from {url}")))?;

    let x = key.x.as_deref().unwrap_or_default();
    let y = key.y.as_deref().unwrap_or_default();
    DecodingKey::from_ec_components(x, y).map_err(|err| {
        TrustaError::KeyFetch(format!("invalid EC components in set from {url}: {err}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    use crate::keyset::KeyMaterial;

    fn published_jwks() -> String {
        let dir = tempfile::tempdir().expect("tempdir");
        let material = KeyMaterial::load_or_generate(dir.path().join("key.pem")).expect("material");
        material.public_jwks().to_string()
    }

    #[tokio::test]
    async fn fetch_parses_published_key_set() {
        let server = MockServer::start();
        let body = published_jwks();
        server.mock(|when, then| {
            when.method(GET).path("/jwks.json");
            then.status(200)
                .header("content-type", "application/json")
                .body(body);
        });

        let url = Url::parse(&format!("{}/jwks.json", server.base_url())).expect("url");
        let fetcher = KeySetFetcher::new();
        fetcher.fetch(&url).await.expect("fetch succeeds");
    }

    #[tokio::test]
    async fn fetch_rejects_non_200() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/jwks.json");
            then.status(500);
        });

        let url = Url::parse(&format!("{}/jwks.json", server.base_url())).expect("url");
        let err = KeySetFetcher::new()
            .fetch(&url)
            .await
            .map(|_| ())
            .expect_err("fetch should fail");
        assert!(matches!(err, TrustaError::KeyFetch(_)));
    }

    #[tokio::test]
    async fn fetch_rejects_unparseable_body() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/jwks.json");
            then.status(200).body("not a key set");
        });

        let url = Url::parse(&format!("{}/jwks.json", server.base_url())).expect("url");
        let err = KeySetFetcher::new()
            .fetch(&url)
            .await
            .map(|_| ())
            .expect_err("fetch should fail");
        assert!(matches!(err, TrustaError::KeyFetch(_)));
    }

    #[tokio::test]
    async fn fetch_rejects_set_without_usable_key() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/jwks.json");
            then.status(200)
                .header("content-type", "application/json")
                .body(r#"{"keys":[{"kty":"RSA","kid":"a","n":"x","e":"AQAB"}]}"#);
        });

        let url = Url::parse(&format!("{}/jwks.json", server.base_url())).expect("url");
        let err = KeySetFetcher::new()
            .fetch(&url)
            .await
            .map(|_| ())
            .expect_err("fetch should fail");
        match err {
            TrustaError::KeyFetch(message) => assert!(message.contains("no usable")),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
