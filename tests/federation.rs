//! Two services, each publishing its own key set and trusting the other.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::routing::get;
use axum::Router;
use httpmock::prelude::*;
use tower::ServiceExt;

use trusta::{
    AuthContext, SignRequest, TrustaConfig, TrustaError, TrustaManager, TrustedIssuerConfig,
    WELL_KNOWN_JWKS_PATH,
};

const SERVICE_A: &str = "service-a.test";
const SERVICE_B: &str = "service-b.test";

struct Peer {
    manager: Arc<TrustaManager>,
    _dir: tempfile::TempDir,
}

fn peer(issuer: &str, trusted: TrustedIssuerConfig) -> Peer {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = TrustaConfig::new(issuer)
        .with_private_key_file(dir.path().join("key.pem").to_string_lossy())
        .with_allow_http(true)
        .with_trusted_issuer(trusted);
    Peer {
        manager: Arc::new(TrustaManager::new(config).expect("manager")),
        _dir: dir,
    }
}

fn publish(server: &MockServer, jwks: String) {
    server.mock(|when, then| {
        when.method(GET).path(WELL_KNOWN_JWKS_PATH);
        then.status(200)
            .header("content-type", "application/json")
            .body(jwks);
    });
}

#[tokio::test]
async fn services_verify_each_other() {
    let server_a = MockServer::start();
    let server_b = MockServer::start();

    // A enforces that B addresses it; B accepts any audience from A.
    let a = peer(
        SERVICE_A,
        TrustedIssuerConfig::new(SERVICE_B)
            .with_public_key_uri(server_b.url(WELL_KNOWN_JWKS_PATH))
            .with_expect_audience(true)
            .with_mapped_claim("dept", "department")
            .with_mapped_claim("aud", "audiences"),
    );
    let b = peer(
        SERVICE_B,
        TrustedIssuerConfig::new(SERVICE_A)
            .with_public_key_uri(server_a.url(WELL_KNOWN_JWKS_PATH)),
    );

    publish(&server_a, a.manager.public_jwks().to_string());
    publish(&server_b, b.manager.public_jwks().to_string());

    // Nothing fetched yet: readiness gates verification.
    let early = b
        .manager
        .signer()
        .sign(&SignRequest::new().with_subject("svc-b-user"))
        .expect("sign");
    assert!(matches!(
        a.manager.verify(&early),
        Err(TrustaError::NotReady(_))
    ));

    a.manager.refresh_all().await;
    b.manager.refresh_all().await;

    // B -> A, addressed and with a mapped claim.
    let token = b
        .manager
        .signer()
        .sign(
            &SignRequest::new()
                .with_subject("svc-b-user")
                .with_audience(SERVICE_A)
                .with_claim("dept", "ops"),
        )
        .expect("sign");
    let claims = a.manager.verify(&token).expect("A verifies B");
    assert_eq!(claims.subject, "svc-b-user");
    assert_eq!(
        claims.claim("department").and_then(|value| value.as_str()),
        Some("ops")
    );
    assert_eq!(
        claims.claim("audiences").and_then(|value| value.as_list()),
        Some(&[SERVICE_A.to_string()][..])
    );
    assert!(claims.raw_payload.contains(SERVICE_B));

    // A -> B with the wildcard audience; B does not enforce.
    let token = a
        .manager
        .signer()
        .sign(&SignRequest::new().with_subject("svc-a-user"))
        .expect("sign");
    let claims = b.manager.verify(&token).expect("B verifies A");
    assert_eq!(claims.subject, "svc-a-user");

    // B never registered itself as trusted.
    let own = b
        .manager
        .signer()
        .sign(&SignRequest::new().with_subject("svc-b-user"))
        .expect("sign");
    assert!(matches!(
        b.manager.verify(&own),
        Err(TrustaError::UnknownIssuer(_))
    ));
}

async fn whoami(auth: AuthContext) -> String {
    auth.claims.subject
}

#[tokio::test]
async fn extractor_verifies_bearer_tokens_end_to_end() {
    let server_b = MockServer::start();

    let a = peer(
        SERVICE_A,
        TrustedIssuerConfig::new(SERVICE_B)
            .with_public_key_uri(server_b.url(WELL_KNOWN_JWKS_PATH)),
    );
    let b = peer(
        SERVICE_B,
        TrustedIssuerConfig::new(SERVICE_A)
            .with_public_key_uri("https://unused.test/jwks.json"),
    );
    publish(&server_b, b.manager.public_jwks().to_string());
    a.manager.refresh_all().await;

    let app = Router::new()
        .route("/whoami", get(whoami))
        .with_state(a.manager.clone());

    let token = b
        .manager
        .signer()
        .sign(&SignRequest::new().with_subject("svc-b-user"))
        .expect("sign");
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/whoami")
                .header(header::AUTHORIZATION, format!("Bearer {token}"))
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/whoami")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
