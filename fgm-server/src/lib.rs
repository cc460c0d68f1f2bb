//! fgm-server library - focus-group manager backend
//!
//! Questionnaire answers, participant setup wizard, admin repositories and
//! object storage behind one axum router.

use axum::Router;
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod db;
pub mod error;
pub mod pagination;
pub mod playback;
pub mod storage;
pub mod store;
pub mod wizard;

use db::{ProfileDetailAccess, SqliteProfileDetails};
use storage::StorageClient;
use wizard::SetupWizard;

/// Setup wizard of one profile, shared between requests
pub type SharedWizard = Arc<Mutex<SetupWizard<dyn ProfileDetailAccess>>>;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    pub details: Arc<dyn ProfileDetailAccess>,
    pub storage: Arc<StorageClient>,
    /// Directory served under `/files`
    pub storage_root: PathBuf,
    /// SHA-256 digest of the bearer token; `None` disables authentication
    pub api_token_digest: Option<[u8; 32]>,
    /// Active setup wizards keyed by profile id
    pub setup_sessions: Arc<RwLock<HashMap<String, SharedWizard>>>,
}

impl AppState {
    pub fn new(
        db: SqlitePool,
        storage: StorageClient,
        storage_root: PathBuf,
        api_token: Option<&str>,
    ) -> Self {
        Self {
            details: Arc::new(SqliteProfileDetails::new(db.clone())),
            db,
            storage: Arc::new(storage),
            storage_root,
            api_token_digest: api_token.map(api::auth::token_digest),
            setup_sessions: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

/// Build application router
///
/// `/health` and `/files` are public; everything under `/api` requires the
/// bearer token when one is configured.
pub fn build_router(state: AppState) -> Router {
    use axum::middleware;

    let protected = Router::new()
        .merge(api::question_routes())
        .merge(api::profile_routes())
        .merge(api::setup_routes())
        .merge(api::admin_routes())
        .merge(api::storage_routes())
        .layer(middleware::from_fn_with_state(
            state.clone(),
            api::auth_middleware,
        ));

    let public = Router::new()
        .merge(api::health_routes())
        .nest_service("/files", ServeDir::new(&state.storage_root));

    Router::new()
        .merge(protected)
        .merge(public)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
