//! HTTP surface.
//!
//! | Route | Auth |
//! |---|---|
//! | `GET /`, `GET /health` | none |
//! | `POST /predict` | optional |
//! | `GET /history`, `GET /stats` | required |
//! | `GET /breeds`, `GET /breed/:name` | none |
//! | `GET /user/profile`, `POST /user/profile` | required |

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;

mod error;
mod extract;
pub mod handlers;

pub use error::ApiError;
pub use extract::optional_user;

use crate::auth::TokenVerifier;
use crate::breeds::BreedCatalog;
use crate::classifier::BreedClassifier;
use crate::history::HistoryStore;

pub const DEFAULT_BODY_LIMIT: usize = 10 * 1024 * 1024;

/// Everything the handlers share. Built once at startup, never mutated.
#[derive(Clone)]
pub struct AppState {
    /// `None` when the model failed to load; predictions then answer 503.
    pub classifier: Option<Arc<BreedClassifier>>,
    /// Class labels, available even when the model is not.
    pub labels: Arc<Vec<String>>,
    pub catalog: Arc<BreedCatalog>,
    /// `None` when no key set is configured; authentication is then off.
    pub verifier: Option<Arc<TokenVerifier>>,
    pub history: Arc<dyn HistoryStore>,
}

pub fn router(state: AppState, body_limit: usize) -> Router {
    Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health))
        .route("/predict", post(handlers::predict))
        .route("/history", get(handlers::history))
        .route("/stats", get(handlers::stats))
        .route("/breeds", get(handlers::breeds))
        .route("/breed/:name", get(handlers::breed_details))
        .route("/user/profile", get(handlers::get_profile).post(handlers::update_profile))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}
