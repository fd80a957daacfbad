use std::sync::Arc;

use axum::extract::State;
use axum::http::header;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;

use crate::registry::TrustaManager;

/// Where peers expect a service's public key set to be published.
pub const WELL_KNOWN_JWKS_PATH: &str = "/.well-known/trusta/jwks.json";

/// Router serving this service's public key set at the well-known path.
pub fn well_known_routes(manager: Arc<TrustaManager>) -> Router {
    Router::new()
        .route(WELL_KNOWN_JWKS_PATH, get(serve_jwks))
        .with_state(manager)
}

async fn serve_jwks(State(manager): State<Arc<TrustaManager>>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "application/json")],
        manager.public_jwks().to_owned(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    use crate::config::TrustaConfig;

    #[tokio::test]
    async fn serves_public_key_set_as_json() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = TrustaConfig::new("service-a.test")
            .with_private_key_file(dir.path().join("key.pem").to_string_lossy());
        let manager = Arc::new(TrustaManager::new(config).expect("manager"));
        let expected = manager.public_jwks().to_string();

        let response = well_known_routes(manager)
            .oneshot(
                Request::builder()
                    .uri(WELL_KNOWN_JWKS_PATH)
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response
                .headers()
                .get(header::CONTENT_TYPE)
                .and_then(|value| value.to_str().ok()),
            Some("application/json")
        );
        let body = response.into_body().collect().await.expect("body").to_bytes();
        assert_eq!(body, expected.as_bytes());
    }
}
