use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{BreedStat, HistoryError, HistoryStore, PredictionRecord, StoredPrediction, UserProfile};

/// The data behind both store implementations.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(super) struct HistoryState {
    pub(super) predictions: Vec<StoredPrediction>,
    pub(super) users: HashMap<String, UserProfile>,
}

impl HistoryState {
    pub(super) fn save_prediction(&mut self, record: PredictionRecord) -> String {
        let id = Uuid::new_v4().to_string();
        self.predictions.push(StoredPrediction { id: id.clone(), record });
        id
    }

    pub(super) fn user_predictions(&self, user_id: &str, limit: usize) -> Vec<StoredPrediction> {
        let mut mine: Vec<StoredPrediction> = self.predictions
            .iter()
            .filter(|p| p.record.user_id == user_id)
            .cloned()
            .collect();
        // Insertion order breaks timestamp ties, newest first.
        mine.reverse();
        mine.sort_by(|a, b| b.record.timestamp.cmp(&a.record.timestamp));
        mine.truncate(limit);
        mine
    }

    pub(super) fn prediction_count(&self, user_id: &str) -> usize {
        self.predictions.iter().filter(|p| p.record.user_id == user_id).count()
    }

    pub(super) fn breed_stats(&self, user_id: &str) -> Vec<BreedStat> {
        let mut totals: HashMap<&str, (usize, f32)> = HashMap::new();
        for p in self.predictions.iter().filter(|p| p.record.user_id == user_id) {
            let entry = totals.entry(p.record.breed.as_str()).or_insert((0, 0.0));
            entry.0 += 1;
            entry.1 += p.record.confidence;
        }
        let mut stats: Vec<BreedStat> = totals
            .into_iter()
            .map(|(breed, (count, sum))| BreedStat {
                breed: breed.to_string(),
                count,
                average_confidence: sum / count as f32,
            })
            .collect();
        stats.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.breed.cmp(&b.breed)));
        stats
    }

    pub(super) fn upsert_user(&mut self, user_id: &str, email: Option<String>, name: Option<String>) -> UserProfile {
        let now = Utc::now();
        let profile = self.users
            .entry(user_id.to_string())
            .and_modify(|p| {
                p.email = email.clone();
                p.name = name.clone();
                p.updated_at = now;
            })
            .or_insert_with(|| UserProfile {
                user_id: user_id.to_string(),
                email,
                name,
                created_at: now,
                updated_at: now,
                last_active: Some(now),
            });
        profile.clone()
    }

    /// Returns whether a profile was touched.
    pub(super) fn touch_user(&mut self, user_id: &str) -> bool {
        match self.users.get_mut(user_id) {
            Some(profile) => {
                profile.last_active = Some(Utc::now());
                true
            }
            None => false,
        }
    }
}

/// In-process history. Contents are lost on restart.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<HistoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl HistoryStore for MemoryStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn save_prediction(&self, record: PredictionRecord) -> Result<String, HistoryError> {
        Ok(self.state.write().await.save_prediction(record))
    }

    async fn get_user_predictions(&self, user_id: &str, limit: usize) -> Result<Vec<StoredPrediction>, HistoryError> {
        Ok(self.state.read().await.user_predictions(user_id, limit))
    }

    async fn get_prediction_count(&self, user_id: &str) -> Result<usize, HistoryError> {
        Ok(self.state.read().await.prediction_count(user_id))
    }

    async fn get_breed_stats(&self, user_id: &str) -> Result<Vec<BreedStat>, HistoryError> {
        Ok(self.state.read().await.breed_stats(user_id))
    }

    async fn create_or_update_user(
        &self,
        user_id: &str,
        email: Option<String>,
        name: Option<String>,
    ) -> Result<UserProfile, HistoryError> {
        Ok(self.state.write().await.upsert_user(user_id, email, name))
    }

    async fn get_user(&self, user_id: &str) -> Result<Option<UserProfile>, HistoryError> {
        Ok(self.state.read().await.users.get(user_id).cloned())
    }

    async fn update_last_active(&self, user_id: &str) -> Result<(), HistoryError> {
        self.state.write().await.touch_user(user_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn record(user: &str, breed: &str, confidence: f32, minutes_ago: i64) -> PredictionRecord {
        PredictionRecord {
            user_id: user.to_string(),
            breed: breed.to_string(),
            confidence,
            image_name: Some("dog.jpg".to_string()),
            timestamp: Utc::now() - Duration::minutes(minutes_ago),
        }
    }

    #[tokio::test]
    async fn test_predictions_are_per_user_newest_first() -> Result<(), HistoryError> {
        let store = MemoryStore::new();
        store.save_prediction(record("alice", "Beagle", 0.9, 10)).await?;
        let newest = store.save_prediction(record("alice", "Pug", 0.8, 1)).await?;
        store.save_prediction(record("bob", "Pug", 0.7, 0)).await?;

        let alice = store.get_user_predictions("alice", 50).await?;
        assert_eq!(alice.len(), 2);
        assert_eq!(alice[0].id, newest);
        assert_eq!(store.get_user_predictions("alice", 1).await?.len(), 1);
        assert_eq!(store.get_prediction_count("alice").await?, 2);
        assert_eq!(store.get_prediction_count("carol").await?, 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_breed_stats() -> Result<(), HistoryError> {
        let store = MemoryStore::new();
        store.save_prediction(record("alice", "Pug", 0.5, 3)).await?;
        store.save_prediction(record("alice", "Pug", 0.7, 2)).await?;
        store.save_prediction(record("alice", "Beagle", 0.9, 1)).await?;

        let stats = store.get_breed_stats("alice").await?;
        assert_eq!(stats.len(), 2);
        assert_eq!(stats[0].breed, "Pug");
        assert_eq!(stats[0].count, 2);
        assert!((stats[0].average_confidence - 0.6).abs() < 1e-6);
        assert_eq!(stats[1].breed, "Beagle");
        Ok(())
    }

    #[tokio::test]
    async fn test_profile_upsert_keeps_created_at() -> Result<(), HistoryError> {
        let store = MemoryStore::new();
        assert!(store.get_user("alice").await?.is_none());

        let first = store.create_or_update_user("alice", Some("a@example.com".into()), None).await?;
        let second = store.create_or_update_user("alice", Some("a@example.com".into()), Some("Alice".into())).await?;
        assert_eq!(first.created_at, second.created_at);
        assert_eq!(second.name.as_deref(), Some("Alice"));

        store.update_last_active("alice").await?;
        store.update_last_active("nobody").await?;
        assert!(store.get_user("nobody").await?.is_none());
        assert!(store.get_user("alice").await?.unwrap().last_active.is_some());
        Ok(())
    }
}
