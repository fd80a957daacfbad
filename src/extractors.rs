use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::{FromRef, FromRequestParts};
use axum::http::{header::AUTHORIZATION, request::Parts};

use crate::claims::VerifiedClaims;
use crate::error::{TrustaError, TrustaResult};
use crate::registry::TrustaManager;

/// Extracts and verifies the Bearer token of a request through the
/// registry shared in the router state.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub claims: VerifiedClaims,
    pub token: String,
}

impl AuthContext {
    pub fn into_claims(self) -> VerifiedClaims {
        self.claims
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthContext
where
    Arc<TrustaManager>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = TrustaError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let manager = Arc::<TrustaManager>::from_ref(state);

        let header_value = parts
            .headers
            .get(AUTHORIZATION)
            .ok_or(TrustaError::MissingAuthorization)?;

        let token = parse_bearer(header_value)?;
        let claims = manager.verify(&token)?;

        Ok(Self { claims, token })
    }
}

fn parse_bearer(value: &axum::http::HeaderValue) -> TrustaResult<String> {
    let raw = value
        .to_str()
        .map_err(|_| TrustaError::InvalidAuthorization)?
        .trim();

    let token = raw
        .strip_prefix("Bearer ")
        .ok_or(TrustaError::InvalidAuthorization)?
        .trim();

    if token.is_empty() {
        return Err(TrustaError::InvalidAuthorization);
    }

    Ok(token.to_string())
}
