use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use super::error::AuthError;
use super::jwks::{JwksConfig, KeyCache, KeySource};

/// Identity taken from a verified token. Never persisted by the verifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthenticatedUser {
    pub user_id: String,
    pub email: Option<String>,
    pub name: Option<String>,
    pub email_verified: bool,
}

#[derive(Debug, Deserialize)]
struct Claims {
    sub: String,
    email: Option<String>,
    name: Option<String>,
    full_name: Option<String>,
    email_verified: Option<bool>,
}

impl From<Claims> for AuthenticatedUser {
    fn from(claims: Claims) -> Self {
        AuthenticatedUser {
            user_id: claims.sub,
            email: claims.email,
            name: claims.name.or(claims.full_name),
            email_verified: claims.email_verified.unwrap_or(false),
        }
    }
}

/// Extracts the token from an `Authorization: Bearer <token>` header value.
pub fn bearer_token(header: &str) -> Result<&str, AuthError> {
    let mut parts = header.split_whitespace();
    match (parts.next(), parts.next(), parts.next()) {
        (Some(scheme), Some(token), None) if scheme.eq_ignore_ascii_case("bearer") => Ok(token),
        _ => Err(AuthError::BadScheme),
    }
}

/// Verifies RS256 bearer tokens against a JWKS.
///
/// Signature and `exp` are checked. The `aud` claim is not:
/// the identity provider does not always set it, so any token signed by a
/// key in the set is accepted regardless of which application it was
/// minted for.
#[derive(Debug)]
pub struct TokenVerifier {
    keys: KeyCache,
    validation: Validation,
}

impl TokenVerifier {
    pub fn new(source: KeySource, config: JwksConfig) -> Self {
        let mut validation = Validation::new(Algorithm::RS256);
        validation.validate_exp = true;
        validation.validate_aud = false;
        Self { keys: KeyCache::new(source, config), validation }
    }

    /// Verifies a raw token (no `Bearer ` prefix).
    pub async fn verify(&self, token: &str) -> Result<AuthenticatedUser, AuthError> {
        let header = decode_header(token).map_err(|e| AuthError::MalformedToken(e.to_string()))?;
        let kid = header.kid.ok_or(AuthError::NoKid)?;

        let jwk = self.keys.key_for(&kid).await?;
        let key = DecodingKey::from_jwk(&jwk).map_err(|e| AuthError::Rejected(e.to_string()))?;

        let data = decode::<Claims>(token, &key, &self.validation)?;
        Ok(data.claims.into())
    }

    /// Required mode: a missing or bad header is an error.
    pub async fn authenticate(&self, header: Option<&str>) -> Result<AuthenticatedUser, AuthError> {
        let header = header.ok_or(AuthError::MissingHeader)?;
        let token = bearer_token(header)?;
        self.verify(token).await
    }

    /// Optional mode: any failure means "no identity".
    pub async fn authenticate_optional(&self, header: Option<&str>) -> Option<AuthenticatedUser> {
        match self.authenticate(header).await {
            Ok(user) => Some(user),
            Err(AuthError::MissingHeader) => None,
            Err(e) => {
                log::debug!("Ignoring invalid credentials on optional auth ({}): {}", e.kind(), e);
                None
            }
        }
    }
}
