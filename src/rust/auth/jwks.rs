use std::time::{Duration, Instant};

use base64::engine::general_purpose::STANDARD_NO_PAD;
use base64::Engine;
use jsonwebtoken::jwk::{Jwk, JwkSet};
use tokio::sync::RwLock;

use super::error::AuthError;

pub const DEFAULT_TTL: Duration = Duration::from_secs(60 * 60);
pub const DEFAULT_MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(60);
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct JwksConfig {
    /// How long a fetched key set is trusted before it is fetched again.
    pub ttl: Duration,
    /// Minimum spacing between refreshes forced by an unknown key ID.
    pub min_refresh_interval: Duration,
    /// Upper bound on one key set request.
    pub fetch_timeout: Duration,
}

impl Default for JwksConfig {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_TTL,
            min_refresh_interval: DEFAULT_MIN_REFRESH_INTERVAL,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
        }
    }
}

/// Where signing keys come from.
#[derive(Debug, Clone)]
pub enum KeySource {
    /// A JWKS document served over HTTP(S).
    Remote { url: String, client: reqwest::Client },
    /// A fixed key set, for tests and air-gapped deployments.
    Static(JwkSet),
}

impl KeySource {
    pub fn remote(url: impl Into<String>, timeout: Duration) -> Result<Self, AuthError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AuthError::KeySetUnavailable(e.to_string()))?;
        Ok(KeySource::Remote { url: url.into(), client })
    }

    async fn fetch(&self) -> Result<JwkSet, AuthError> {
        match self {
            KeySource::Static(set) => Ok(set.clone()),
            KeySource::Remote { url, client } => {
                log::info!("Fetching JWKS from: {}", url);
                let unavailable = |e: reqwest::Error| AuthError::KeySetUnavailable(e.to_string());
                client.get(url)
                    .send()
                    .await
                    .and_then(|r| r.error_for_status())
                    .map_err(unavailable)?
                    .json::<JwkSet>()
                    .await
                    .map_err(unavailable)
            }
        }
    }
}

/// JWKS endpoint for a Clerk publishable key.
///
/// The key looks like `pk_test_<base64("frontend-api.host$")>`.
pub fn jwks_url_from_publishable_key(key: &str) -> Option<String> {
    let mut parts = key.splitn(3, '_');
    match (parts.next(), parts.next(), parts.next()) {
        (Some("pk"), Some(_env), Some(encoded)) => {
            let decoded = STANDARD_NO_PAD.decode(encoded.trim_end_matches('=')).ok()?;
            let host = String::from_utf8(decoded).ok()?;
            let host = host.trim_end_matches('$').trim();
            if host.is_empty() {
                return None;
            }
            Some(format!("https://{}/.well-known/jwks.json", host))
        }
        _ => None,
    }
}

#[derive(Debug)]
struct Cached {
    keys: JwkSet,
    fetched_at: Instant,
}

/// Process-wide cache of signing keys.
///
/// Cache-aside: readers take the read lock, a stale or missing entry is
/// refetched without holding any lock across the request and then stored.
/// Concurrent refreshes may both hit the network; they store the same data.
#[derive(Debug)]
pub struct KeyCache {
    source: KeySource,
    config: JwksConfig,
    cached: RwLock<Option<Cached>>,
}

impl KeyCache {
    pub fn new(source: KeySource, config: JwksConfig) -> Self {
        Self { source, config, cached: RwLock::new(None) }
    }

    /// Signing key for `kid`.
    ///
    /// A miss against a fresh key set triggers one refetch, provided the last
    /// fetch is older than `min_refresh_interval`; this picks up rotated keys
    /// without letting bogus key IDs hammer the provider.
    pub async fn key_for(&self, kid: &str) -> Result<Jwk, AuthError> {
        let (hit, age) = {
            let guard = self.cached.read().await;
            match guard.as_ref() {
                Some(c) => (c.keys.find(kid).cloned(), Some(c.fetched_at.elapsed())),
                None => (None, None),
            }
        };

        match (hit, age) {
            (Some(jwk), Some(age)) if age < self.config.ttl => return Ok(jwk),
            (None, Some(age)) if age < self.config.min_refresh_interval => {
                return Err(AuthError::UnknownKey);
            }
            _ => {}
        }

        let keys = self.refresh().await?;
        keys.find(kid).cloned().ok_or(AuthError::UnknownKey)
    }

    async fn refresh(&self) -> Result<JwkSet, AuthError> {
        let keys = self.source.fetch().await.map_err(|e| {
            log::error!("Error fetching JWKS: {}", e);
            e
        })?;
        log::debug!("JWKS refreshed with {} keys", keys.keys.len());
        *self.cached.write().await = Some(Cached { keys: keys.clone(), fetched_at: Instant::now() });
        Ok(keys)
    }
}
