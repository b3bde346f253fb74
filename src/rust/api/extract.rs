use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::http::HeaderMap;

use super::error::ApiError;
use super::AppState;
use crate::auth::{AuthError, AuthenticatedUser};

/// Raw `Authorization` header. A value that is not visible ASCII counts as a
/// bad scheme rather than as absent.
fn authorization(headers: &HeaderMap) -> Result<Option<&str>, AuthError> {
    match headers.get(AUTHORIZATION) {
        None => Ok(None),
        Some(value) => value.to_str().map(Some).map_err(|_| AuthError::BadScheme),
    }
}

/// Required authentication: rejects the request with 401 on any failure.
#[async_trait]
impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let verifier = state.verifier.as_ref().ok_or(AuthError::Disabled)?;
        let header = authorization(&parts.headers)?;
        match verifier.authenticate(header).await {
            Ok(user) => Ok(user),
            Err(e) => {
                log::debug!("Rejected credentials ({}): {}", e.kind(), e);
                Err(e.into())
            }
        }
    }
}

/// Optional authentication: never fails, yields `None` instead. May fetch the
/// key set, so handlers call it after their own request checks.
pub async fn optional_user(state: &AppState, headers: &HeaderMap) -> Option<AuthenticatedUser> {
    let verifier = state.verifier.as_ref()?;
    match authorization(headers) {
        Ok(header) => verifier.authenticate_optional(header).await,
        Err(_) => None,
    }
}
