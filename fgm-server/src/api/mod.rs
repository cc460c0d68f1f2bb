//! HTTP API handlers for fgm-server

pub mod admin;
pub mod auth;
pub mod health;
pub mod profiles;
pub mod questions;
pub mod setup;
pub mod storage;

pub use admin::admin_routes;
pub use auth::auth_middleware;
pub use health::health_routes;
pub use profiles::profile_routes;
pub use questions::question_routes;
pub use setup::setup_routes;
pub use storage::storage_routes;
