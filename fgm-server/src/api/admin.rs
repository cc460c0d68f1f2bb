//! Admin CRUD endpoints
//!
//! Every entity gets the same five routes from one set of generic handlers.
//! The optional `X-Actor` header names who made a change in the audit log.

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::{HeaderMap, StatusCode},
    routing::get,
    Json, Router,
};
use fgm_common::db::{AuditEntry, FocusGroup, Form, Organization, Profile, Role};
use std::collections::HashMap;

use crate::db::{Entity, ListPage, ListQuery, ReadRepository, Record, Repository, SqliteRepository};
use crate::error::ApiResult;
use crate::AppState;

/// Header carrying the acting user's id
pub const ACTOR_HEADER: &str = "x-actor";

fn actor(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(ACTOR_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

/// GET /api/admin/{entity}?search=&sort=&order=&page=&{column}=
pub async fn list_records<R: Record>(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResult<Json<ListPage<R>>> {
    let query = ListQuery::from_params(params)?;
    let page = SqliteRepository::<R>::new(state.db).list(&query).await?;
    Ok(Json(page))
}

/// GET /api/admin/{entity}/:id
pub async fn get_record<R: Record>(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<R>> {
    let record = SqliteRepository::<R>::new(state.db).get(&id).await?;
    Ok(Json(record))
}

/// POST /api/admin/{entity}
pub async fn create_record<E: Entity>(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<E::Draft>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<E>)> {
    let Json(draft) = payload?;
    let record = SqliteRepository::<E>::new(state.db)
        .create(draft, actor(&headers))
        .await?;
    Ok((StatusCode::CREATED, Json(record)))
}

/// PUT /api/admin/{entity}/:id
pub async fn update_record<E: Entity>(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    payload: Result<Json<E::Draft>, JsonRejection>,
) -> ApiResult<Json<E>> {
    let Json(draft) = payload?;
    let record = SqliteRepository::<E>::new(state.db)
        .update(&id, draft, actor(&headers))
        .await?;
    Ok(Json(record))
}

/// DELETE /api/admin/{entity}/:id
pub async fn delete_record<E: Entity>(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> ApiResult<StatusCode> {
    SqliteRepository::<E>::new(state.db)
        .delete(&id, actor(&headers))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

fn entity_routes<E: Entity>(path: &str) -> Router<AppState> {
    Router::new()
        .route(path, get(list_records::<E>).post(create_record::<E>))
        .route(
            &format!("{}/:id", path),
            get(get_record::<E>)
                .put(update_record::<E>)
                .delete(delete_record::<E>),
        )
}

pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .merge(entity_routes::<Profile>("/api/admin/users"))
        .merge(entity_routes::<Organization>("/api/admin/organizations"))
        .merge(entity_routes::<FocusGroup>("/api/admin/focus-groups"))
        .merge(entity_routes::<Form>("/api/admin/forms"))
        .merge(entity_routes::<Role>("/api/admin/roles"))
        .route("/api/admin/audit-logs", get(list_records::<AuditEntry>))
        .route("/api/admin/audit-logs/:id", get(get_record::<AuditEntry>))
}
