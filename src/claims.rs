use std::collections::HashMap;

use serde::Serialize;
use serde_json::Value;

/// Registered JWT claim names that carry structured meaning.
pub(crate) const RESERVED_CLAIMS: [&str; 7] = ["iss", "sub", "aud", "exp", "nbf", "iat", "jti"];

pub(crate) const SUBJECT_CLAIM: &str = "sub";

/// A projected claim value. Timestamps are epoch seconds; audiences are a
/// string list even when the token carried a single string.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ClaimValue {
    String(String),
    Timestamp(i64),
    List(Vec<String>),
}

impl ClaimValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ClaimValue::String(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_timestamp(&self) -> Option<i64> {
        match self {
            ClaimValue::Timestamp(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            ClaimValue::List(values) => Some(values),
            _ => None,
        }
    }
}

/// Claims extracted from a verified token, keyed by the output names of
/// the issuer's claim mapping.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VerifiedClaims {
    pub subject: String,
    pub claims: HashMap<String, ClaimValue>,
    /// Decoded payload JSON, retained verbatim for audit and debugging.
    pub raw_payload: String,
}

impl VerifiedClaims {
    pub(crate) fn new(subject: String) -> Self {
        Self {
            subject,
            claims: HashMap::new(),
            raw_payload: String::new(),
        }
    }

    pub(crate) fn with_raw_payload(mut self, payload: impl Into<String>) -> Self {
        self.raw_payload = payload.into();
        self
    }

    pub fn claim(&self, key: &str) -> Option<&ClaimValue> {
        self.claims.get(key)
    }
}

/// Reserved claims are read from their structured payload fields rather
/// than through the generic string-claim lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ReservedClaim {
    Issuer,
    Subject,
    Audience,
    Expiration,
    NotBefore,
    IssuedAt,
    TokenId,
}

impl ReservedClaim {
    pub(crate) fn from_name(name: &str) -> Option<Self> {
        match name {
            "iss" => Some(Self::Issuer),
            "sub" => Some(Self::Subject),
            "aud" => Some(Self::Audience),
            "exp" => Some(Self::Expiration),
            "nbf" => Some(Self::NotBefore),
            "iat" => Some(Self::IssuedAt),
            "jti" => Some(Self::TokenId),
            _ => None,
        }
    }

    /// Extract the claim from a decoded payload. `None` when the field is
    /// absent or carries an unexpected shape.
    pub(crate) fn extract(self, payload: &Value) -> Option<ClaimValue> {
        match self {
            Self::Issuer => string_field(payload, "iss"),
            Self::Subject => string_field(payload, "sub"),
            Self::TokenId => string_field(payload, "jti"),
            Self::Expiration => timestamp_field(payload, "exp"),
            Self::NotBefore => timestamp_field(payload, "nbf"),
            Self::IssuedAt => timestamp_field(payload, "iat"),
            Self::Audience => match payload.get("aud") {
                Some(Value::String(single)) => Some(ClaimValue::List(vec![single.clone()])),
                Some(Value::Array(items)) => Some(ClaimValue::List(
                    items
                        .iter()
                        .filter_map(Value::as_str)
                        .map(str::to_string)
                        .collect(),
                )),
                _ => None,
            },
        }
    }
}

fn string_field(payload: &Value, field: &str) -> Option<ClaimValue> {
    payload
        .get(field)
        .and_then(Value::as_str)
        .map(|value| ClaimValue::String(value.to_string()))
}

fn timestamp_field(payload: &Value, field: &str) -> Option<ClaimValue> {
    payload
        .get(field)
        .and_then(Value::as_i64)
        .map(ClaimValue::Timestamp)
}
