//! Database schema migrations
//!
//! Versioned migrations tracked in the `schema_version` table, plus an
//! idempotent catalog sync that runs on every startup.
//!
//! # Migration Guidelines
//!
//! 1. **Never modify existing migrations** - databases already at that version will not rerun them
//! 2. **Always add new migrations** - one function per schema change, bump `CURRENT_SCHEMA_VERSION`
//! 3. **Keep them idempotent** - check before altering so reruns are harmless

use crate::catalog;
use crate::Result;
use sqlx::SqlitePool;
use tracing::{info, warn};

/// Current schema version
///
/// **IMPORTANT:** Increment this when adding new migrations
pub const CURRENT_SCHEMA_VERSION: i32 = 2;

/// Get current schema version from database
///
/// Returns 0 if schema_version table doesn't exist or has no rows
pub async fn get_schema_version(pool: &SqlitePool) -> Result<i32> {
    let table_exists: bool = sqlx::query_scalar(
        r#"
        SELECT EXISTS(
            SELECT 1 FROM sqlite_master
            WHERE type='table' AND name='schema_version'
        )
        "#,
    )
    .fetch_one(pool)
    .await?;

    if !table_exists {
        return Ok(0);
    }

    let version: Option<i32> =
        sqlx::query_scalar("SELECT version FROM schema_version ORDER BY version DESC LIMIT 1")
            .fetch_optional(pool)
            .await?;

    Ok(version.unwrap_or(0))
}

async fn set_schema_version(pool: &SqlitePool, version: i32) -> Result<()> {
    sqlx::query("INSERT OR IGNORE INTO schema_version (version) VALUES (?)")
        .bind(version)
        .execute(pool)
        .await?;

    Ok(())
}

/// Run all pending migrations, then sync stored answers with the catalog
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    let current_version = get_schema_version(pool).await?;

    if current_version > CURRENT_SCHEMA_VERSION {
        warn!(
            "Database schema version ({}) is newer than code version ({})",
            current_version, CURRENT_SCHEMA_VERSION
        );
        warn!("This may indicate a downgrade. Proceeding with caution.");
    } else if current_version == CURRENT_SCHEMA_VERSION {
        info!("Database schema is up to date (v{})", current_version);
    } else {
        info!(
            "Running database migrations: v{} -> v{}",
            current_version, CURRENT_SCHEMA_VERSION
        );

        if current_version < 1 {
            migrate_v1(pool).await?;
            set_schema_version(pool, 1).await?;
            info!("✓ Migration v1 completed");
        }

        if current_version < 2 {
            migrate_v2(pool).await?;
            set_schema_version(pool, 2).await?;
            info!("✓ Migration v2 completed");
        }
    }

    sync_answer_categories(pool).await?;
    Ok(())
}

/// Migration v1: lookup indexes for answers and audit entries
async fn migrate_v1(pool: &SqlitePool) -> Result<()> {
    info!("Running migration v1: answer and audit indexes");

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_profile_details_category
         ON profile_details (profile_id, category)",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_audit_logs_entity
         ON audit_logs (entity, entity_id)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Migration v2: index profiles by organization for admin filters
async fn migrate_v2(pool: &SqlitePool) -> Result<()> {
    info!("Running migration v2: organization indexes");

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_profiles_organization ON profiles (organization_id)",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_focus_groups_organization
         ON focus_groups (organization_id)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Rewrite the `category` column of stored answers from the catalog
///
/// `category` is not part of the answer uniqueness key, so a question moved to
/// another category would otherwise leave old rows under the old name.
/// Returns the number of rows changed.
pub async fn sync_answer_categories(pool: &SqlitePool) -> Result<u64> {
    let mut changed = 0;

    for (category, question) in catalog::all_questions() {
        let result = sqlx::query(
            "UPDATE profile_details SET category = ? WHERE question_id = ? AND category != ?",
        )
        .bind(category.as_str())
        .bind(question.id)
        .bind(category.as_str())
        .execute(pool)
        .await?;
        changed += result.rows_affected();
    }

    if changed > 0 {
        info!("Realigned {} stored answers with catalog categories", changed);
    }

    Ok(changed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init::init_memory_database;

    #[tokio::test]
    async fn test_fresh_database_reaches_current_version() {
        let pool = init_memory_database().await.unwrap();
        assert_eq!(get_schema_version(&pool).await.unwrap(), CURRENT_SCHEMA_VERSION);
    }

    #[tokio::test]
    async fn test_migrations_are_idempotent() {
        let pool = init_memory_database().await.unwrap();
        run_migrations(&pool).await.unwrap();
        run_migrations(&pool).await.unwrap();

        let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM schema_version")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(rows, CURRENT_SCHEMA_VERSION as i64);
    }

    #[tokio::test]
    async fn test_sync_answer_categories_fixes_skewed_rows() {
        let pool = init_memory_database().await.unwrap();

        sqlx::query("INSERT INTO profiles (id, full_name) VALUES ('p1', 'Pat')")
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query(
            "INSERT INTO profile_details (id, profile_id, category, question_id, answer)
             VALUES ('d1', 'p1', 'lifestyle', 'age', '30')",
        )
        .execute(&pool)
        .await
        .unwrap();

        assert_eq!(sync_answer_categories(&pool).await.unwrap(), 1);

        let category: String =
            sqlx::query_scalar("SELECT category FROM profile_details WHERE id = 'd1'")
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(category, "demographics");

        // Second pass has nothing left to change
        assert_eq!(sync_answer_categories(&pool).await.unwrap(), 0);
    }
}
