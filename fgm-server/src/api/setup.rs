//! Profile setup wizard endpoints
//!
//! One wizard per profile lives in `AppState::setup_sessions`. Each wizard sits
//! behind a mutex; a request arriving while another transition holds it gets
//! `409 Conflict` instead of waiting. Stored answers are reloaded on every
//! request so writes made through the details endpoints are seen. A submitted
//! wizard is removed from the map.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    routing::{get, post, put},
    Json, Router,
};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};
use tracing::info;

use crate::api::profiles::require_profile;
use crate::db::ProfileDetailAccess;
use crate::error::{ApiError, ApiResult};
use crate::wizard::{SetupWizard, WizardState, WizardView};
use crate::{AppState, SharedWizard};

#[derive(Debug, Deserialize)]
pub struct StageAnswerRequest {
    pub question_id: String,
    pub answer: Value,
}

/// Existing wizard for the profile, or a freshly loaded one
///
/// The profile is checked on every request; a wizard left behind by a deleted
/// profile is dropped.
async fn session(state: &AppState, profile_id: &str) -> ApiResult<SharedWizard> {
    if let Err(e) = require_profile(&state.db, profile_id).await {
        evict(state, profile_id).await;
        return Err(e);
    }

    if let Some(wizard) = state.setup_sessions.read().await.get(profile_id) {
        return Ok(wizard.clone());
    }

    let wizard = SetupWizard::start(state.details.clone(), profile_id).await;

    let mut sessions = state.setup_sessions.write().await;
    let shared = sessions
        .entry(profile_id.to_string())
        .or_insert_with(|| {
            info!("Opened setup wizard for profile {}", profile_id);
            Arc::new(Mutex::new(wizard))
        })
        .clone();
    Ok(shared)
}

async fn evict(state: &AppState, profile_id: &str) {
    if state.setup_sessions.write().await.remove(profile_id).is_some() {
        info!("Closed setup wizard for profile {}", profile_id);
    }
}

/// Lock the wizard and reload its stored answers
async fn lock(
    wizard: &SharedWizard,
) -> ApiResult<MutexGuard<'_, SetupWizard<dyn ProfileDetailAccess>>> {
    let guard = wizard.try_lock().map_err(|_| {
        ApiError::Conflict("Another setup request for this profile is in progress".to_string())
    })?;
    guard.refresh().await;
    Ok(guard)
}

/// GET /api/profiles/:id/setup
pub async fn get_setup(
    State(state): State<AppState>,
    Path(profile_id): Path<String>,
) -> ApiResult<Json<WizardView>> {
    let wizard = session(&state, &profile_id).await?;
    let guard = lock(&wizard).await?;
    let view = guard.view().await;
    Ok(Json(view))
}

/// PUT /api/profiles/:id/setup/answers
pub async fn stage_answer(
    State(state): State<AppState>,
    Path(profile_id): Path<String>,
    payload: Result<Json<StageAnswerRequest>, JsonRejection>,
) -> ApiResult<Json<WizardView>> {
    let Json(request) = payload?;
    let wizard = session(&state, &profile_id).await?;
    let mut guard = lock(&wizard).await?;

    guard.stage_answer(&request.question_id, request.answer)?;
    let view = guard.view().await;
    Ok(Json(view))
}

/// POST /api/profiles/:id/setup/next
///
/// Submitting closes the session; the next request opens a new wizard.
pub async fn next_step(
    State(state): State<AppState>,
    Path(profile_id): Path<String>,
) -> ApiResult<Json<WizardView>> {
    let wizard = session(&state, &profile_id).await?;
    let mut guard = lock(&wizard).await?;

    let next = guard.next().await?;
    let view = guard.view().await;
    drop(guard);

    if next == WizardState::Submitted {
        evict(&state, &profile_id).await;
    }
    Ok(Json(view))
}

/// POST /api/profiles/:id/setup/previous
pub async fn previous_step(
    State(state): State<AppState>,
    Path(profile_id): Path<String>,
) -> ApiResult<Json<WizardView>> {
    let wizard = session(&state, &profile_id).await?;
    let mut guard = lock(&wizard).await?;

    guard.previous()?;
    let view = guard.view().await;
    Ok(Json(view))
}

pub fn setup_routes() -> Router<AppState> {
    Router::new()
        .route("/api/profiles/:id/setup", get(get_setup))
        .route("/api/profiles/:id/setup/answers", put(stage_answer))
        .route("/api/profiles/:id/setup/next", post(next_step))
        .route("/api/profiles/:id/setup/previous", post(previous_step))
}
