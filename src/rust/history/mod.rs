//! Per-user prediction history and profiles.
//!
//! The API layer talks to a [`HistoryStore`]; [`MemoryStore`] keeps
//! everything in process and [`FileStore`] additionally snapshots to a JSON
//! file after every write.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

#[derive(Debug, thiserror::Error)]
pub enum HistoryError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Corrupt history data: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// One successful authenticated prediction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRecord {
    pub user_id: String,
    pub breed: String,
    pub confidence: f32,
    pub image_name: Option<String>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredPrediction {
    pub id: String,
    #[serde(flatten)]
    pub record: PredictionRecord,
}

/// How often a user got a breed, and how sure the model was on average.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BreedStat {
    pub breed: String,
    pub count: usize,
    pub average_confidence: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: String,
    pub email: Option<String>,
    pub name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_active: Option<DateTime<Utc>>,
}

/// Persistence collaborator for predictions and profiles.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Short backend name reported by the health endpoint.
    fn name(&self) -> &'static str;

    /// Appends a record and returns its id.
    async fn save_prediction(&self, record: PredictionRecord) -> Result<String, HistoryError>;

    /// Most recent predictions first, at most `limit`.
    async fn get_user_predictions(&self, user_id: &str, limit: usize) -> Result<Vec<StoredPrediction>, HistoryError>;

    async fn get_prediction_count(&self, user_id: &str) -> Result<usize, HistoryError>;

    /// Per-breed counts, most frequent first.
    async fn get_breed_stats(&self, user_id: &str) -> Result<Vec<BreedStat>, HistoryError>;

    async fn create_or_update_user(
        &self,
        user_id: &str,
        email: Option<String>,
        name: Option<String>,
    ) -> Result<UserProfile, HistoryError>;

    async fn get_user(&self, user_id: &str) -> Result<Option<UserProfile>, HistoryError>;

    /// Stamps `last_active`. A user without a profile is left alone.
    async fn update_last_active(&self, user_id: &str) -> Result<(), HistoryError>;
}
