mod common;

use std::fs;
use std::net::SocketAddr;
use std::path::PathBuf;

use base64::engine::general_purpose::STANDARD_NO_PAD;
use base64::Engine;

use common::{BREED_INFO_JSON, LABELS_JSON};
use pawpredict::auth::JwksConfig;
use pawpredict::history::HistoryStore;
use pawpredict::model_manager::{ModelError, ModelManager, ModelSource};
use pawpredict::server::load_state;
use pawpredict::{PreprocessConfig, RuntimeConfig, ServerConfig};

fn scratch_dir() -> PathBuf {
    let dir = std::env::temp_dir().join(format!("pawpredict-server-{}", uuid::Uuid::new_v4()));
    fs::create_dir_all(&dir).unwrap();
    dir
}

fn config_in(dir: &PathBuf) -> ServerConfig {
    ServerConfig {
        addr: SocketAddr::from(([127, 0, 0, 1], 0)),
        model_path: dir.join("breed_classifier.onnx"),
        labels_path: dir.join("class_indices.json"),
        breed_info_path: dir.join("breed_info.json"),
        model_source: ModelSource { url: None, sha256: None },
        fresh: false,
        runtime: RuntimeConfig::default(),
        preprocess: PreprocessConfig::default(),
        jwks_url: None,
        publishable_key: None,
        jwks: JwksConfig::default(),
        history_file: None,
        body_limit: pawpredict::api::DEFAULT_BODY_LIMIT,
    }
}

#[tokio::test]
async fn test_missing_model_degrades() -> anyhow::Result<()> {
    common::init();
    let dir = scratch_dir();
    fs::write(dir.join("class_indices.json"), LABELS_JSON)?;
    fs::write(dir.join("breed_info.json"), BREED_INFO_JSON)?;

    let state = load_state(&config_in(&dir)).await?;
    assert!(state.classifier.is_none());
    assert_eq!(state.labels.len(), 4);
    assert_eq!(state.catalog.len(), 3);
    assert!(state.verifier.is_none());
    assert_eq!(state.history.name(), "memory");
    Ok(())
}

#[tokio::test]
async fn test_labels_fall_back_to_breed_names() -> anyhow::Result<()> {
    let dir = scratch_dir();
    fs::write(dir.join("breed_info.json"), BREED_INFO_JSON)?;

    let state = load_state(&config_in(&dir)).await?;
    assert_eq!(*state.labels, vec!["Beagle", "Golden Retriever", "Pug"]);
    Ok(())
}

#[tokio::test]
async fn test_nothing_on_disk_still_starts() -> anyhow::Result<()> {
    let dir = scratch_dir();
    let state = load_state(&config_in(&dir)).await?;
    assert!(state.classifier.is_none());
    assert!(state.labels.is_empty());
    assert!(state.catalog.is_empty());
    assert_eq!(state.catalog.lookup("beagle").origin, "Unknown");
    Ok(())
}

#[tokio::test]
async fn test_auth_from_publishable_key() -> anyhow::Result<()> {
    let dir = scratch_dir();
    let mut config = config_in(&dir);
    config.publishable_key = Some(format!(
        "pk_test_{}",
        STANDARD_NO_PAD.encode("clerk.example.dev$")
    ));
    let state = load_state(&config).await?;
    assert!(state.verifier.is_some());

    config.publishable_key = Some("pk_test_!!!".into());
    let state = load_state(&config).await?;
    assert!(state.verifier.is_none());
    Ok(())
}

#[tokio::test]
async fn test_file_history_survives_restart() -> anyhow::Result<()> {
    let dir = scratch_dir();
    let mut config = config_in(&dir);
    config.history_file = Some(dir.join("history.json"));

    let state = load_state(&config).await?;
    assert_eq!(state.history.name(), "file");
    state.history.create_or_update_user("user_123", None, Some("Ada".into())).await?;

    let reopened = load_state(&config).await?;
    let profile = reopened.history.get_user("user_123").await?.expect("profile persisted");
    assert_eq!(profile.name.as_deref(), Some("Ada"));
    Ok(())
}

#[tokio::test]
async fn test_corrupt_history_file_is_fatal() {
    let dir = scratch_dir();
    fs::write(dir.join("history.json"), "{ not json").unwrap();
    let mut config = config_in(&dir);
    config.history_file = Some(dir.join("history.json"));
    assert!(load_state(&config).await.is_err());
}

#[test]
fn test_model_manager_requires_url_for_missing_model() {
    let dir = scratch_dir();
    let manager = ModelManager::new(&dir).unwrap();
    let path = manager.artifact_path("breed_classifier.onnx");
    let source = ModelSource { url: None, sha256: None };

    let result = tokio_test::block_on(manager.ensure_model(&path, &source, false));
    assert!(matches!(result, Err(ModelError::NotDownloaded(_))));

    fs::write(&path, b"weights").unwrap();
    assert!(tokio_test::block_on(manager.ensure_model(&path, &source, false)).is_ok());
    assert!(path.ends_with("breed_classifier.onnx"));
}
