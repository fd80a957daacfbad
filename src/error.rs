use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

pub type TrustaResult<T> = Result<T, TrustaError>;

#[derive(Debug, Error)]
pub enum TrustaError {
    #[error("signing key material unavailable: {0}")]
    KeyMaterial(String),
    #[error("invalid trusted issuer configuration: {0}")]
    Config(String),
    #[error("failed to fetch public key set: {0}")]
    KeyFetch(String),
    #[error("no public key fetched yet for issuer '{0}'")]
    NotReady(String),
    #[error("malformed token: {0}")]
    MalformedToken(String),
    #[error("unknown issuer '{0}'")]
    UnknownIssuer(String),
    #[error("token validation failed: {0}")]
    ClaimValidation(String),
    #[error("subject must be set before signing")]
    MissingSubject,
    #[error("failed to sign token: {0}")]
    Signing(String),
    #[error("authorization header missing")]
    MissingAuthorization,
    #[error("authorization header malformed")]
    InvalidAuthorization,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: &'static str,
    message: String,
}

impl IntoResponse for TrustaError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            TrustaError::MissingAuthorization | TrustaError::InvalidAuthorization => {
                (StatusCode::UNAUTHORIZED, "TRUSTA_HEADER")
            }
            TrustaError::MalformedToken(_) | TrustaError::ClaimValidation(_) => {
                (StatusCode::UNAUTHORIZED, "TRUSTA_TOKEN")
            }
            TrustaError::UnknownIssuer(_) => (StatusCode::UNAUTHORIZED, "TRUSTA_ISSUER"),
            TrustaError::NotReady(_) => (StatusCode::SERVICE_UNAVAILABLE, "TRUSTA_NOT_READY"),
            TrustaError::KeyMaterial(_) | TrustaError::Config(_) | TrustaError::KeyFetch(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "TRUSTA_KEYS")
            }
            TrustaError::MissingSubject | TrustaError::Signing(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "TRUSTA_SIGN")
            }
        };

        let body = ErrorBody {
            code,
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
