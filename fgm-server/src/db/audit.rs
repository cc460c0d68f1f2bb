//! Audit log writer
//!
//! Admin mutations append one row each. A failed append is logged and
//! swallowed so it never fails the mutation it describes.

use fgm_common::db::AuditAction;
use fgm_common::{time, uuid_utils};
use sqlx::SqlitePool;
use tracing::warn;

/// Append an audit entry
pub async fn record(
    pool: &SqlitePool,
    action: AuditAction,
    entity: &str,
    entity_id: &str,
    actor: Option<&str>,
) {
    let result = sqlx::query(
        r#"
        INSERT INTO audit_logs (id, action, entity, entity_id, actor, created_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(uuid_utils::generate_id())
    .bind(action)
    .bind(entity)
    .bind(entity_id)
    .bind(actor)
    .bind(time::now())
    .execute(pool)
    .await;

    if let Err(e) = result {
        warn!(
            "Failed to write audit entry ({} {} {}): {}",
            action.as_str(),
            entity,
            entity_id,
            e
        );
    }
}
