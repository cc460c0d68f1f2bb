//! Database initialization against real files

use fgm_common::db::init::init_database;
use fgm_common::db::migrations::{get_schema_version, CURRENT_SCHEMA_VERSION};
use tempfile::TempDir;

#[tokio::test]
async fn test_database_creation_when_missing() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("data").join("fgm.db");

    let pool = init_database(&db_path).await;
    assert!(pool.is_ok(), "Database initialization failed: {:?}", pool.err());
    assert!(db_path.exists(), "Database file was not created");
}

#[tokio::test]
async fn test_database_opens_existing() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("fgm.db");

    let pool1 = init_database(&db_path).await.unwrap();
    pool1.close().await;

    let pool2 = init_database(&db_path).await;
    assert!(pool2.is_ok(), "Failed to open existing database: {:?}", pool2.err());
    assert_eq!(
        get_schema_version(&pool2.unwrap()).await.unwrap(),
        CURRENT_SCHEMA_VERSION
    );
}

#[tokio::test]
async fn test_expected_tables_exist() {
    let dir = TempDir::new().unwrap();
    let pool = init_database(&dir.path().join("fgm.db")).await.unwrap();

    for table in [
        "schema_version",
        "organizations",
        "profiles",
        "profile_details",
        "focus_groups",
        "forms",
        "roles",
        "audit_logs",
    ] {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?)",
        )
        .bind(table)
        .fetch_one(&pool)
        .await
        .unwrap();
        assert!(exists, "Missing table: {}", table);
    }
}

#[tokio::test]
async fn test_builtin_roles_seeded_once() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("fgm.db");

    init_database(&db_path).await.unwrap().close().await;
    let pool = init_database(&db_path).await.unwrap();

    let names: Vec<String> = sqlx::query_scalar("SELECT name FROM roles ORDER BY name")
        .fetch_all(&pool)
        .await
        .unwrap();
    assert_eq!(names, vec!["admin", "client", "manager", "participant"]);
}

#[tokio::test]
async fn test_deleting_profile_cascades_to_answers() {
    let dir = TempDir::new().unwrap();
    let pool = init_database(&dir.path().join("fgm.db")).await.unwrap();

    sqlx::query("INSERT INTO profiles (id, full_name) VALUES ('p1', 'Pat')")
        .execute(&pool)
        .await
        .unwrap();
    sqlx::query(
        "INSERT INTO profile_details (id, profile_id, category, question_id, answer)
         VALUES ('d1', 'p1', 'demographics', 'age', '30')",
    )
    .execute(&pool)
    .await
    .unwrap();

    sqlx::query("DELETE FROM profiles WHERE id = 'p1'")
        .execute(&pool)
        .await
        .unwrap();

    let remaining: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM profile_details")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(remaining, 0);
}

#[tokio::test]
async fn test_duplicate_answer_rows_rejected() {
    let dir = TempDir::new().unwrap();
    let pool = init_database(&dir.path().join("fgm.db")).await.unwrap();

    sqlx::query("INSERT INTO profiles (id, full_name) VALUES ('p1', 'Pat')")
        .execute(&pool)
        .await
        .unwrap();
    let insert = "INSERT INTO profile_details (id, profile_id, category, question_id, answer)
                  VALUES (?, 'p1', 'demographics', 'age', '30')";
    sqlx::query(insert).bind("d1").execute(&pool).await.unwrap();

    let duplicate = sqlx::query(insert).bind("d2").execute(&pool).await;
    assert!(duplicate.is_err(), "UNIQUE (profile_id, question_id) must hold");
}
