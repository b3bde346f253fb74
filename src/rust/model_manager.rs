use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use sha2::{Digest, Sha256};
use tokio::sync::Mutex;

pub const DEFAULT_MODEL_FILE: &str = "breed_classifier.onnx";
pub const DEFAULT_LABELS_FILE: &str = "class_indices.json";
pub const DEFAULT_BREED_INFO_FILE: &str = "breed_info.json";

#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("Model not found at {0} and no download URL configured")]
    NotDownloaded(String),
    #[error("Download error: {0}")]
    DownloadError(#[from] reqwest::Error),
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
    #[error("Model verification failed")]
    VerificationFailed,
    #[error("Hash mismatch: expected {expected}, got {actual} for {file}")]
    HashMismatch {
        file: String,
        expected: String,
        actual: String,
    },
}

/// Where to fetch the model from when it is missing or corrupt.
#[derive(Debug, Clone)]
pub struct ModelSource {
    pub url: Option<String>,
    /// Lowercase hex SHA-256 of the model file
    pub sha256: Option<String>,
}

/// Resolves and validates the artifacts the server loads at startup.
#[derive(Debug, Clone)]
pub struct ModelManager {
    models_dir: PathBuf,
    download_lock: Arc<Mutex<()>>,
}

impl ModelManager {
    /// Creates a new ModelManager with the default models directory
    pub fn new_default() -> io::Result<Self> {
        Self::new(Self::get_default_models_dir())
    }

    /// Returns the default models directory path
    pub fn get_default_models_dir() -> PathBuf {
        // 1. Check environment variable
        if let Ok(path) = env::var("PAWPREDICT_HOME") {
            return PathBuf::from(path).join("models");
        }

        // 2. Use platform-specific data directory
        if let Some(data_dir) = dirs::data_dir() {
            return data_dir.join("pawpredict").join("models");
        }

        // 3. Fallback to user's home directory
        if let Some(home_dir) = dirs::home_dir() {
            return home_dir.join(".local").join("share").join("pawpredict").join("models");
        }

        // 4. If all else fails, use system temp directory
        env::temp_dir().join("pawpredict").join("models")
    }

    pub fn new<P: AsRef<Path>>(models_dir: P) -> io::Result<Self> {
        let models_dir = models_dir.as_ref().to_path_buf();
        fs::create_dir_all(&models_dir)?;
        Ok(Self {
            models_dir,
            download_lock: Arc::new(Mutex::new(())),
        })
    }

    pub fn models_dir(&self) -> &Path {
        &self.models_dir
    }

    /// Path of an artifact file inside the models directory.
    pub fn artifact_path(&self, file_name: &str) -> PathBuf {
        self.models_dir.join(file_name)
    }

    /// Returns whether the file at `path` hashes to `expected_hash`.
    pub fn verify_file(&self, path: &Path, expected_hash: &str) -> Result<bool, ModelError> {
        log::debug!("Verifying file: {:?}", path);
        let bytes = fs::read(path)?;
        let hash = sha256_hex(&bytes);
        log::debug!("Calculated hash: {}", hash);
        log::debug!("Expected hash:   {}", expected_hash);
        Ok(hash.eq_ignore_ascii_case(expected_hash))
    }

    /// Makes sure a usable model file exists at `path`.
    ///
    /// An existing file is kept unless `fresh` is set or it fails hash
    /// verification; in those cases it is downloaded again from
    /// `source.url`. The existing file is only replaced by a successful
    /// download, and `fresh` without a URL keeps it. A missing file with no
    /// URL is an error.
    pub async fn ensure_model(&self, path: &Path, source: &ModelSource, fresh: bool) -> Result<(), ModelError> {
        let _lock = self.download_lock.lock().await;

        let redownload = fresh && source.url.is_some();
        if fresh && !redownload && path.exists() {
            log::warn!("Fresh download requested but no model URL is configured - keeping {:?}", path);
        }

        if path.exists() && !redownload {
            match &source.sha256 {
                Some(expected) if !self.verify_file(path, expected)? => {
                    log::warn!("Model file {:?} failed verification", path);
                    if source.url.is_none() {
                        return Err(ModelError::VerificationFailed);
                    }
                }
                _ => {
                    log::info!("Model file present at {:?}", path);
                    return Ok(());
                }
            }
        }

        let url = source.url.as_deref()
            .ok_or_else(|| ModelError::NotDownloaded(path.display().to_string()))?;
        self.download_and_verify_file(url, path, source.sha256.as_deref()).await
    }

    async fn download_and_verify_file(
        &self,
        url: &str,
        path: &Path,
        expected_hash: Option<&str>,
    ) -> Result<(), ModelError> {
        log::info!("Downloading model from {} to {:?}", url, path);
        let response = reqwest::get(url).await?.error_for_status()?;
        log::info!("Download response status: {}", response.status());
        let bytes = response.bytes().await?;
        log::info!("Downloaded {} bytes", bytes.len());

        if let Some(expected) = expected_hash {
            let hash = sha256_hex(&bytes);
            if !hash.eq_ignore_ascii_case(expected) {
                log::error!("Model hash mismatch: expected {}, got {}", expected, hash);
                return Err(ModelError::HashMismatch {
                    file: path.display().to_string(),
                    expected: expected.to_string(),
                    actual: hash,
                });
            }
        }

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp = path.with_extension("download");
        fs::write(&tmp, &bytes)?;
        fs::rename(&tmp, path)?;

        if let Some(expected) = expected_hash {
            if !self.verify_file(path, expected)? {
                let _ = fs::remove_file(path);
                return Err(ModelError::VerificationFailed);
            }
        }

        log::info!("Model downloaded and verified successfully");
        Ok(())
    }
}

pub(crate) fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}
