//! Bearer token verification against a remote key set.

mod error;
mod jwks;
mod verifier;

pub use error::AuthError;
pub use jwks::{
    jwks_url_from_publishable_key, JwksConfig, KeyCache, KeySource, DEFAULT_FETCH_TIMEOUT,
    DEFAULT_MIN_REFRESH_INTERVAL, DEFAULT_TTL,
};
pub use verifier::{bearer_token, AuthenticatedUser, TokenVerifier};
