use axum::extract::multipart::{MultipartError, MultipartRejection};
use axum::extract::rejection::QueryRejection;
use axum::extract::{Multipart, Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::error::ApiError;
use super::extract::optional_user;
use super::AppState;
use crate::auth::AuthenticatedUser;
use crate::breeds::{display_name, BreedInfo};
use crate::classifier::{ClassifierError, ScoredBreed};
use crate::history::{BreedStat, PredictionRecord, StoredPrediction, UserProfile};

pub const DEFAULT_HISTORY_LIMIT: usize = 50;
pub const MAX_HISTORY_LIMIT: usize = 500;

const UPLOAD_FIELD: &str = "file";

pub async fn root() -> Json<Value> {
    Json(json!({
        "message": "Dog Breed Predictor API",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running",
        "features": ["authentication", "history", "prediction"],
    }))
}

pub async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "model_loaded": state.classifier.is_some(),
        "breeds_in_database": state.catalog.len(),
        "total_classes": state.labels.len(),
        "history_store": state.history.name(),
        "auth_enabled": state.verifier.is_some(),
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

#[derive(Debug, Serialize)]
pub struct PredictResponse {
    pub success: bool,
    pub prediction_id: Option<String>,
    pub prediction: ScoredBreed,
    pub top_predictions: Vec<ScoredBreed>,
    pub breed_info: BreedInfo,
    pub timestamp: DateTime<Utc>,
    pub authenticated: bool,
}

struct Upload {
    file_name: Option<String>,
    bytes: Vec<u8>,
}

fn upload_error(e: MultipartError) -> ApiError {
    match e.status() {
        StatusCode::PAYLOAD_TOO_LARGE => ApiError::PayloadTooLarge(e.body_text()),
        _ => ApiError::BadRequest(e.body_text()),
    }
}

/// Pulls the `file` part out of the form, insisting on an `image/*` type.
async fn read_upload(multipart: Result<Multipart, MultipartRejection>) -> Result<Upload, ApiError> {
    let mut multipart = multipart.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(upload_error)?
    {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }
        let is_image = field.content_type().is_some_and(|ct| ct.starts_with("image/"));
        if !is_image {
            return Err(ApiError::BadRequest("File must be an image (JPG, PNG, WebP)".into()));
        }
        let file_name = field.file_name().map(str::to_string);
        let bytes = field.bytes().await.map_err(upload_error)?;
        return Ok(Upload { file_name, bytes: bytes.to_vec() });
    }
    Err(ApiError::BadRequest(format!("Missing '{}' upload field", UPLOAD_FIELD)))
}

pub async fn predict(
    State(state): State<AppState>,
    headers: HeaderMap,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<PredictResponse>, ApiError> {
    let classifier = state.classifier.clone().ok_or(ApiError::ModelUnavailable)?;
    let upload = read_upload(multipart).await?;
    let user = optional_user(&state, &headers).await;

    if let Some(user) = &user {
        if let Err(e) = state.history.update_last_active(&user.user_id).await {
            log::warn!("Failed to update activity for {}: {}", user.user_id, e);
        }
    }

    let classification = tokio::task::spawn_blocking(move || classifier.classify(&upload.bytes))
        .await
        .map_err(|e| ApiError::Internal(format!("Prediction failed: {}", e)))?
        .map_err(|e| match e {
            ClassifierError::Preprocess(err) => ApiError::BadRequest(format!("Image preprocessing failed: {}", err)),
            other => ApiError::Internal(format!("Prediction failed: {}", other)),
        })?;

    let top = classification.top;
    let breed_info = state.catalog.lookup(&top.label).clone();
    let timestamp = Utc::now();

    let mut prediction_id = None;
    if let Some(user) = &user {
        let record = PredictionRecord {
            user_id: user.user_id.clone(),
            breed: top.breed.clone(),
            confidence: top.confidence,
            image_name: upload.file_name.clone(),
            timestamp,
        };
        match state.history.save_prediction(record).await {
            Ok(id) => prediction_id = Some(id),
            Err(e) => log::error!("Failed to record prediction for {}: {}", user.user_id, e),
        }
    }

    log::info!(
        "Predicted {} ({:.2}%) authenticated={}",
        top.breed,
        top.percentage,
        user.is_some()
    );

    Ok(Json(PredictResponse {
        success: true,
        prediction_id,
        prediction: top,
        top_predictions: classification.top_k,
        breed_info,
        timestamp,
        authenticated: user.is_some(),
    }))
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub success: bool,
    pub total_predictions: usize,
    pub predictions: Vec<StoredPrediction>,
}

pub async fn history(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    query: Result<Query<HistoryQuery>, QueryRejection>,
) -> Result<Json<HistoryResponse>, ApiError> {
    let Query(query) = query.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let limit = query.limit.unwrap_or(DEFAULT_HISTORY_LIMIT).min(MAX_HISTORY_LIMIT);
    let predictions = state.history
        .get_user_predictions(&user.user_id, limit)
        .await
        .map_err(ApiError::persistence("Failed to fetch history"))?;
    let total_predictions = state.history
        .get_prediction_count(&user.user_id)
        .await
        .map_err(ApiError::persistence("Failed to fetch history"))?;

    Ok(Json(HistoryResponse { success: true, total_predictions, predictions }))
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub success: bool,
    pub total_predictions: usize,
    pub breed_statistics: Vec<BreedStat>,
    pub user_id: String,
}

pub async fn stats(State(state): State<AppState>, user: AuthenticatedUser) -> Result<Json<StatsResponse>, ApiError> {
    let breed_statistics = state.history
        .get_breed_stats(&user.user_id)
        .await
        .map_err(ApiError::persistence("Failed to fetch stats"))?;
    let total_predictions = state.history
        .get_prediction_count(&user.user_id)
        .await
        .map_err(ApiError::persistence("Failed to fetch stats"))?;

    Ok(Json(StatsResponse { success: true, total_predictions, breed_statistics, user_id: user.user_id }))
}

pub async fn breeds(State(state): State<AppState>) -> Json<Value> {
    let mut names: Vec<String> = state.labels.iter().map(|l| display_name(l)).collect();
    names.sort();
    Json(json!({ "total": names.len(), "breeds": names }))
}

pub async fn breed_details(State(state): State<AppState>, Path(name): Path<String>) -> Result<Json<Value>, ApiError> {
    let info = state.catalog
        .find(&name)
        .ok_or_else(|| ApiError::NotFound(format!("No information available for {}", name)))?;
    Ok(Json(json!({ "breed": display_name(&name), "info": info })))
}

pub async fn update_profile(State(state): State<AppState>, user: AuthenticatedUser) -> Result<Json<Value>, ApiError> {
    state.history
        .create_or_update_user(&user.user_id, user.email.clone(), user.name.clone())
        .await
        .map_err(ApiError::persistence("Failed to update profile"))?;
    Ok(Json(json!({
        "success": true,
        "message": "User profile updated",
        "user_id": user.user_id,
    })))
}

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub success: bool,
    pub user: UserProfile,
}

pub async fn get_profile(State(state): State<AppState>, user: AuthenticatedUser) -> Result<Json<ProfileResponse>, ApiError> {
    let profile = state.history
        .get_user(&user.user_id)
        .await
        .map_err(ApiError::persistence("Failed to fetch profile"))?
        .ok_or_else(|| ApiError::NotFound("User not found".into()))?;
    Ok(Json(ProfileResponse { success: true, user: profile }))
}
