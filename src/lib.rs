//! Mutual trust between independent services without a shared secret.
//!
//! Each service signs tokens with its own ES256 key pair and publishes the
//! public half as a JWK set under `/.well-known/trusta/jwks.json`. A
//! [`TrustaManager`] tracks any number of trusted issuers, keeps their key
//! sets fresh through periodic out-of-band fetches, routes incoming tokens
//! to the matching issuer policy and projects the validated claims into an
//! application-defined shape.

pub mod claims;
pub mod config;
pub mod endpoint;
pub mod error;
pub mod extractors;
pub mod jwks;
pub mod keyset;
pub mod registry;
pub mod signer;
pub mod verifier;

pub use claims::{ClaimValue, VerifiedClaims};
pub use config::{TrustaConfig, TrustedIssuerConfig};
pub use endpoint::{well_known_routes, WELL_KNOWN_JWKS_PATH};
pub use error::{TrustaError, TrustaResult};
pub use extractors::AuthContext;
pub use jwks::{Jwk, JwkSet, KeySetFetcher};
pub use keyset::KeyMaterial;
pub use registry::{spawn_refresh, TrustaManager};
pub use signer::{SignRequest, TokenSigner};
pub use verifier::IssuerVerifier;
