//! Object storage endpoints
//!
//! Uploads are raw request bodies. The body limit is enforced here against the
//! configured maximum instead of axum's default.

use axum::{
    body::Body,
    extract::{rejection::QueryRejection, DefaultBodyLimit, Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use fgm_common::Error;
use serde::Deserialize;
use tracing::debug;

use crate::error::ApiResult;
use crate::storage::{ObjectPage, UploadedObject};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct UploadParams {
    pub filename: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    #[serde(default)]
    pub prefix: String,
    pub continuation: Option<String>,
    pub limit: Option<usize>,
}

/// POST /api/storage/*folder?filename=
pub async fn upload_object(
    State(state): State<AppState>,
    Path(folder): Path<String>,
    params: Result<Query<UploadParams>, QueryRejection>,
    headers: HeaderMap,
    body: Body,
) -> ApiResult<(StatusCode, Json<UploadedObject>)> {
    let Query(params) = params?;
    let limit = state.storage.max_upload_bytes();

    let declared = headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok());
    if let Some(size) = declared.filter(|size| *size > limit) {
        return Err(Error::TooLarge { size, limit }.into());
    }

    // One byte over the limit is enough to tell an oversized body apart
    let read_limit = usize::try_from(limit.saturating_add(1)).unwrap_or(usize::MAX);
    let data = axum::body::to_bytes(body, read_limit)
        .await
        .map_err(|_| Error::TooLarge {
            size: limit.saturating_add(1),
            limit,
        })?;

    let filename = params.filename.unwrap_or_else(|| "file".to_string());
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .filter(|ct| *ct != "application/octet-stream");

    let report = |written: u64, total: u64| {
        debug!(written, total, "Upload progress");
    };

    let uploaded = state
        .storage
        .upload(&data, &filename, &folder, content_type, Some(&report))
        .await?;
    Ok((StatusCode::CREATED, Json(uploaded)))
}

/// GET /api/storage?prefix=&continuation=&limit=
pub async fn list_objects(
    State(state): State<AppState>,
    params: Result<Query<ListParams>, QueryRejection>,
) -> ApiResult<Json<ObjectPage>> {
    let Query(params) = params?;
    let page = state
        .storage
        .list(&params.prefix, params.continuation.as_deref(), params.limit)
        .await?;
    Ok(Json(page))
}

/// DELETE /api/storage/*key
pub async fn delete_object(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> ApiResult<StatusCode> {
    state.storage.delete(&key).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub fn storage_routes() -> Router<AppState> {
    Router::new()
        .route("/api/storage", get(list_objects))
        .route(
            "/api/storage/*path",
            post(upload_object)
                .delete(delete_object)
                .layer(DefaultBodyLimit::disable()),
        )
}
