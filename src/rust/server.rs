//! Startup: load artifacts, wire the shared state, serve.
//!
//! Every artifact is optional at startup. A missing model leaves the server
//! up with predictions answering 503; missing breed info leaves every lookup
//! on the default record; missing auth config turns authentication off.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use log::{error, info, warn};

use crate::api::{self, AppState};
use crate::auth::{jwks_url_from_publishable_key, JwksConfig, KeySource, TokenVerifier};
use crate::breeds::BreedCatalog;
use crate::classifier::{load_labels, BreedClassifier};
use crate::history::{FileStore, HistoryStore, MemoryStore};
use crate::model_manager::{ModelManager, ModelSource};
use crate::preprocess::PreprocessConfig;
use crate::runtime::RuntimeConfig;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub addr: SocketAddr,
    pub model_path: PathBuf,
    pub labels_path: PathBuf,
    pub breed_info_path: PathBuf,
    pub model_source: ModelSource,
    pub fresh: bool,
    pub runtime: RuntimeConfig,
    pub preprocess: PreprocessConfig,
    pub jwks_url: Option<String>,
    pub publishable_key: Option<String>,
    pub jwks: JwksConfig,
    pub history_file: Option<PathBuf>,
    pub body_limit: usize,
}

fn load_catalog(config: &ServerConfig) -> BreedCatalog {
    match BreedCatalog::from_file(&config.breed_info_path) {
        Ok(catalog) => {
            info!("Loaded {} breeds from database", catalog.len());
            catalog
        }
        Err(e) => {
            warn!("{}; breed lookups will return default info", e);
            BreedCatalog::default()
        }
    }
}

fn load_class_labels(config: &ServerConfig, catalog: &BreedCatalog) -> Vec<String> {
    match load_labels(&config.labels_path) {
        Ok(labels) => {
            info!("Loaded {} class names", labels.len());
            labels
        }
        Err(e) => {
            warn!("{}; falling back to breed database names", e);
            catalog.names()
        }
    }
}

async fn load_classifier(config: &ServerConfig, labels: &[String]) -> Option<Arc<BreedClassifier>> {
    let manager = config.model_path.parent().map(ModelManager::new);
    match manager {
        Some(Ok(manager)) => {
            if let Err(e) = manager.ensure_model(&config.model_path, &config.model_source, config.fresh).await {
                error!("Model artifact unavailable: {}", e);
                return None;
            }
        }
        Some(Err(e)) => {
            error!("Cannot prepare models directory: {}", e);
            return None;
        }
        None => {}
    }

    let built = BreedClassifier::builder()
        .with_preprocessing(config.preprocess)
        .with_onnx_model(&config.model_path, &config.runtime)
        .and_then(|b| b.with_labels(labels.to_vec()).build());
    match built {
        Ok(classifier) => {
            info!("Model loaded successfully from {}", config.model_path.display());
            Some(Arc::new(classifier))
        }
        Err(e) => {
            error!("Error loading model: {}", e);
            None
        }
    }
}

fn build_verifier(config: &ServerConfig) -> anyhow::Result<Option<Arc<TokenVerifier>>> {
    let url = config.jwks_url.clone().or_else(|| {
        config.publishable_key.as_deref().and_then(|key| {
            let url = jwks_url_from_publishable_key(key);
            if url.is_none() {
                warn!("Could not derive a JWKS URL from the publishable key");
            }
            url
        })
    });
    let Some(url) = url else {
        warn!("No JWKS URL configured; authentication is disabled");
        return Ok(None);
    };
    info!("Verifying bearer tokens against {}", url);
    let source = KeySource::remote(url, config.jwks.fetch_timeout).context("building JWKS client")?;
    Ok(Some(Arc::new(TokenVerifier::new(source, config.jwks.clone()))))
}

async fn open_history(config: &ServerConfig) -> anyhow::Result<Arc<dyn HistoryStore>> {
    Ok(match &config.history_file {
        Some(path) => Arc::new(
            FileStore::open(path)
                .await
                .with_context(|| format!("opening history file {}", path.display()))?,
        ),
        None => {
            info!("Using in-memory prediction history");
            Arc::new(MemoryStore::new())
        }
    })
}

/// Loads every artifact and assembles the shared state.
///
/// Only a broken history file or an unusable JWKS client is fatal; the
/// model and metadata degrade instead.
pub async fn load_state(config: &ServerConfig) -> anyhow::Result<AppState> {
    let catalog = load_catalog(config);
    let labels = load_class_labels(config, &catalog);
    let classifier = load_classifier(config, &labels).await;
    if classifier.is_none() {
        warn!("Model not loaded. API will not serve predictions.");
        warn!("Please ensure the model file exists at: {}", config.model_path.display());
    }

    Ok(AppState {
        classifier,
        labels: Arc::new(labels),
        catalog: Arc::new(catalog),
        verifier: build_verifier(config)?,
        history: open_history(config).await?,
    })
}

pub async fn serve(config: ServerConfig) -> anyhow::Result<()> {
    let state = load_state(&config).await?;
    let app = api::router(state, config.body_limit);

    let listener = tokio::net::TcpListener::bind(config.addr)
        .await
        .with_context(|| format!("binding {}", config.addr))?;
    info!("Listening on http://{}", config.addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;
    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        // Without a signal handler, never resolve and keep serving.
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
