use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::memory::HistoryState;
use super::{BreedStat, HistoryError, HistoryStore, PredictionRecord, StoredPrediction, UserProfile};

/// History kept in memory and written to a JSON file after every change.
///
/// Writes go to a sibling temp file that is then renamed over the target,
/// so a crash mid-write leaves the previous snapshot intact. A change only
/// becomes visible in memory once its snapshot is on disk.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    state: Mutex<HistoryState>,
}

impl FileStore {
    /// Opens the store at `path`, loading the existing snapshot if there is one.
    pub async fn open<P: AsRef<Path>>(path: P) -> Result<Self, HistoryError> {
        let path = path.as_ref().to_path_buf();
        let state = match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HistoryState::default(),
            Err(e) => return Err(e.into()),
        };
        log::info!(
            "Opened history file {:?} ({} predictions, {} users)",
            path,
            state.predictions.len(),
            state.users.len()
        );
        Ok(Self { path, state: Mutex::new(state) })
    }

    async fn persist(&self, state: &HistoryState) -> Result<(), HistoryError> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let bytes = serde_json::to_vec(state)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl HistoryStore for FileStore {
    fn name(&self) -> &'static str {
        "file"
    }

    async fn save_prediction(&self, record: PredictionRecord) -> Result<String, HistoryError> {
        let mut state = self.state.lock().await;
        let mut next = state.clone();
        let id = next.save_prediction(record);
        self.persist(&next).await?;
        *state = next;
        Ok(id)
    }

    async fn get_user_predictions(&self, user_id: &str, limit: usize) -> Result<Vec<StoredPrediction>, HistoryError> {
        Ok(self.state.lock().await.user_predictions(user_id, limit))
    }

    async fn get_prediction_count(&self, user_id: &str) -> Result<usize, HistoryError> {
        Ok(self.state.lock().await.prediction_count(user_id))
    }

    async fn get_breed_stats(&self, user_id: &str) -> Result<Vec<BreedStat>, HistoryError> {
        Ok(self.state.lock().await.breed_stats(user_id))
    }

    async fn create_or_update_user(
        &self,
        user_id: &str,
        email: Option<String>,
        name: Option<String>,
    ) -> Result<UserProfile, HistoryError> {
        let mut state = self.state.lock().await;
        let mut next = state.clone();
        let profile = next.upsert_user(user_id, email, name);
        self.persist(&next).await?;
        *state = next;
        Ok(profile)
    }

    async fn get_user(&self, user_id: &str) -> Result<Option<UserProfile>, HistoryError> {
        Ok(self.state.lock().await.users.get(user_id).cloned())
    }

    async fn update_last_active(&self, user_id: &str) -> Result<(), HistoryError> {
        let mut state = self.state.lock().await;
        let mut next = state.clone();
        if next.touch_user(user_id) {
            self.persist(&next).await?;
            *state = next;
        }
        Ok(())
    }
}
