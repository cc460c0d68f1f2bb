//! Profile detail endpoints
//!
//! Thin handlers over the profile detail access layer.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    routing::{get, put},
    Json, Router,
};
use fgm_common::catalog::Category;
use fgm_common::db::{AnswerInput, ProfileDetail};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{ApiError, ApiResult};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct SaveAnswerRequest {
    pub answer: Value,
}

#[derive(Debug, Deserialize)]
pub struct SaveBatchRequest {
    pub entries: Vec<AnswerInput>,
}

#[derive(Debug, Serialize)]
pub struct SaveBatchResponse {
    pub saved: usize,
    pub details: Vec<ProfileDetail>,
}

#[derive(Debug, Serialize)]
pub struct SetupStatusResponse {
    pub profile_id: String,
    pub complete: bool,
}

/// 404 unless the profile exists
pub(crate) async fn require_profile(db: &SqlitePool, profile_id: &str) -> ApiResult<()> {
    let found: Option<i64> = sqlx::query_scalar("SELECT 1 FROM profiles WHERE id = ?")
        .bind(profile_id)
        .fetch_optional(db)
        .await
        .map_err(fgm_common::Error::from)?;

    found
        .map(|_| ())
        .ok_or_else(|| ApiError::NotFound(format!("Profile {}", profile_id)))
}

/// GET /api/profiles/:id/details
pub async fn get_details(
    State(state): State<AppState>,
    Path(profile_id): Path<String>,
) -> Json<Vec<ProfileDetail>> {
    Json(state.details.get_all(&profile_id).await)
}

/// GET /api/profiles/:id/details/:category
pub async fn get_category_details(
    State(state): State<AppState>,
    Path((profile_id, category)): Path<(String, String)>,
) -> ApiResult<Json<Vec<ProfileDetail>>> {
    let category: Category = category.parse()?;
    Ok(Json(state.details.get_by_category(&profile_id, category).await))
}

/// PUT /api/profiles/:id/details/:category/:question_id
pub async fn save_answer(
    State(state): State<AppState>,
    Path((profile_id, category, question_id)): Path<(String, String, String)>,
    payload: Result<Json<SaveAnswerRequest>, JsonRejection>,
) -> ApiResult<Json<ProfileDetail>> {
    let Json(request) = payload?;
    let category: Category = category.parse()?;
    require_profile(&state.db, &profile_id).await?;

    let detail = state
        .details
        .save_one(&profile_id, category, &question_id, request.answer)
        .await?;
    Ok(Json(detail))
}

/// POST /api/profiles/:id/details
pub async fn save_batch(
    State(state): State<AppState>,
    Path(profile_id): Path<String>,
    payload: Result<Json<SaveBatchRequest>, JsonRejection>,
) -> ApiResult<Json<SaveBatchResponse>> {
    let Json(request) = payload?;
    require_profile(&state.db, &profile_id).await?;

    let details = state
        .details
        .save_batch(&profile_id, &request.entries)
        .await?;
    debug!(profile_id, saved = details.len(), "Batch answers saved");

    Ok(Json(SaveBatchResponse {
        saved: details.len(),
        details,
    }))
}

/// GET /api/profiles/:id/setup-status
pub async fn setup_status(
    State(state): State<AppState>,
    Path(profile_id): Path<String>,
) -> Json<SetupStatusResponse> {
    let complete = state.details.is_setup_complete(&profile_id).await;
    Json(SetupStatusResponse {
        profile_id,
        complete,
    })
}

pub fn profile_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/profiles/:id/details",
            get(get_details).post(save_batch),
        )
        .route("/api/profiles/:id/details/:category", get(get_category_details))
        .route(
            "/api/profiles/:id/details/:category/:question_id",
            put(save_answer),
        )
        .route("/api/profiles/:id/setup-status", get(setup_status))
}
