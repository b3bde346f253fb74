use jsonwebtoken::errors::{Error as JwtError, ErrorKind};

/// Reasons a bearer token is not accepted.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("Authorization header missing")]
    MissingHeader,
    #[error("Invalid authentication scheme")]
    BadScheme,
    #[error("Malformed token: {0}")]
    MalformedToken(String),
    #[error("Token missing key ID")]
    NoKid,
    #[error("Invalid token key")]
    UnknownKey,
    #[error("Unable to fetch signing keys: {0}")]
    KeySetUnavailable(String),
    #[error("Token has expired")]
    Expired,
    #[error("Invalid token signature")]
    InvalidSignature,
    #[error("Malformed token claims: {0}")]
    MalformedClaims(String),
    #[error("Invalid token: {0}")]
    Rejected(String),
    #[error("Authentication is not configured")]
    Disabled,
}

impl AuthError {
    /// Short machine-readable name, used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MissingHeader => "missing_header",
            Self::BadScheme => "bad_scheme",
            Self::MalformedToken(_) => "malformed_token",
            Self::NoKid => "no_kid",
            Self::UnknownKey => "unknown_key",
            Self::KeySetUnavailable(_) => "key_set_unavailable",
            Self::Expired => "expired",
            Self::InvalidSignature => "invalid_signature",
            Self::MalformedClaims(_) => "malformed_claims",
            Self::Rejected(_) => "rejected",
            Self::Disabled => "disabled",
        }
    }
}

impl From<JwtError> for AuthError {
    fn from(err: JwtError) -> Self {
        match err.kind() {
            ErrorKind::ExpiredSignature => AuthError::Expired,
            ErrorKind::InvalidSignature => AuthError::InvalidSignature,
            ErrorKind::Json(_) | ErrorKind::MissingRequiredClaim(_) => AuthError::MalformedClaims(err.to_string()),
            ErrorKind::InvalidToken | ErrorKind::Base64(_) | ErrorKind::Utf8(_) => {
                AuthError::MalformedToken(err.to_string())
            }
            _ => AuthError::Rejected(err.to_string()),
        }
    }
}
