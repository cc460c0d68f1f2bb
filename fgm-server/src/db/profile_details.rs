//! Profile detail access layer
//!
//! Questionnaire answers keyed by (profile_id, question_id).
//!
//! Failure policy:
//! - writes propagate every storage error to the caller
//! - reads degrade to an empty result, the completion check to `false`
//! - answers are validated against the catalog before any query runs

use async_trait::async_trait;
use fgm_common::catalog::{self, Category};
use fgm_common::db::{AnswerInput, ProfileDetail, Validate};
use fgm_common::{time, uuid_utils, Result};
use serde_json::Value;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use std::collections::HashMap;
use tracing::{debug, warn};

const DETAIL_COLUMNS: &str =
    "id, profile_id, category, question_id, answer, created_at, updated_at";

/// SQL predicate matching rows whose answer counts as answered
///
/// Mirrors `catalog::is_answered`: not null, not a blank string, not an empty array.
/// Blank means only `catalog::BLANK_CHARS` (space, tab, LF, CR).
const ANSWERED_PREDICATE: &str = "json_type(answer) != 'null' \
     AND NOT (json_type(answer) = 'text' \
          AND trim(json_extract(answer, '$'), ' ' || char(9) || char(10) || char(13)) = '') \
     AND NOT (json_type(answer) = 'array' AND json_array_length(answer) = 0)";

/// Persistence operations for questionnaire answers
#[async_trait]
pub trait ProfileDetailAccess: Send + Sync {
    /// Insert or update the answer to one question
    async fn save_one(
        &self,
        profile_id: &str,
        category: Category,
        question_id: &str,
        answer: Value,
    ) -> Result<ProfileDetail>;

    /// Upsert many answers in one statement; later duplicates of a question win
    async fn save_batch(
        &self,
        profile_id: &str,
        entries: &[AnswerInput],
    ) -> Result<Vec<ProfileDetail>>;

    /// Every answer of a profile; empty on storage failure
    async fn get_all(&self, profile_id: &str) -> Vec<ProfileDetail>;

    /// Answers of one category; empty on storage failure
    async fn get_by_category(&self, profile_id: &str, category: Category) -> Vec<ProfileDetail>;

    /// Whether every required setup question is answered; `false` on storage failure
    async fn is_setup_complete(&self, profile_id: &str) -> bool;
}

/// SQLite-backed [`ProfileDetailAccess`]
#[derive(Clone)]
pub struct SqliteProfileDetails {
    pool: SqlitePool,
}

impl SqliteProfileDetails {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn fetch_by_id(&self, id: &str) -> Result<ProfileDetail> {
        let detail = sqlx::query_as::<_, ProfileDetail>(&format!(
            "SELECT {} FROM profile_details WHERE id = ?",
            DETAIL_COLUMNS
        ))
        .bind(id)
        .fetch_one(&self.pool)
        .await?;
        Ok(detail)
    }

    async fn try_get_all(&self, profile_id: &str) -> Result<Vec<ProfileDetail>> {
        let details = sqlx::query_as::<_, ProfileDetail>(&format!(
            "SELECT {} FROM profile_details WHERE profile_id = ? ORDER BY created_at, question_id",
            DETAIL_COLUMNS
        ))
        .bind(profile_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(details)
    }

    async fn try_get_by_category(
        &self,
        profile_id: &str,
        category: Category,
    ) -> Result<Vec<ProfileDetail>> {
        let details = sqlx::query_as::<_, ProfileDetail>(&format!(
            "SELECT {} FROM profile_details
             WHERE profile_id = ? AND category = ?
             ORDER BY created_at, question_id",
            DETAIL_COLUMNS
        ))
        .bind(profile_id)
        .bind(category)
        .fetch_all(&self.pool)
        .await?;
        Ok(details)
    }

    async fn count_answered_required(&self, profile_id: &str, required: &[&str]) -> Result<i64> {
        let mut query: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT COUNT(*) FROM profile_details WHERE profile_id = ");
        query.push_bind(profile_id.to_string());
        query.push(" AND question_id IN (");
        let mut ids = query.separated(", ");
        for id in required {
            ids.push_bind(id.to_string());
        }
        ids.push_unseparated(") AND ");
        query.push(ANSWERED_PREDICATE);

        let count: i64 = query.build_query_scalar().fetch_one(&self.pool).await?;
        Ok(count)
    }
}

/// Collapse repeated question ids, keeping the first position and the last answer
fn dedupe_entries(entries: &[AnswerInput]) -> Vec<&AnswerInput> {
    let mut positions: HashMap<&str, usize> = HashMap::new();
    let mut unique: Vec<&AnswerInput> = Vec::with_capacity(entries.len());

    for entry in entries {
        match positions.get(entry.question_id.as_str()) {
            Some(&i) => unique[i] = entry,
            None => {
                positions.insert(&entry.question_id, unique.len());
                unique.push(entry);
            }
        }
    }

    unique
}

#[async_trait]
impl ProfileDetailAccess for SqliteProfileDetails {
    async fn save_one(
        &self,
        profile_id: &str,
        category: Category,
        question_id: &str,
        answer: Value,
    ) -> Result<ProfileDetail> {
        catalog::validate_entry(category, question_id, &answer)?;

        // No existing row is the insert branch, not an error
        let existing: Option<String> = sqlx::query_scalar(
            "SELECT id FROM profile_details WHERE profile_id = ? AND question_id = ?",
        )
        .bind(profile_id)
        .bind(question_id)
        .fetch_optional(&self.pool)
        .await?;

        let now = time::now();
        let id = match existing {
            Some(id) => {
                sqlx::query(
                    "UPDATE profile_details
                     SET answer = ?, category = ?, updated_at = ?
                     WHERE id = ?",
                )
                .bind(answer.to_string())
                .bind(category)
                .bind(now)
                .bind(&id)
                .execute(&self.pool)
                .await?;
                debug!(profile_id, question_id, "Updated answer");
                id
            }
            None => {
                // A concurrent insert for the same pair turns into an update
                let id: String = sqlx::query_scalar(
                    "INSERT INTO profile_details
                         (id, profile_id, category, question_id, answer, created_at, updated_at)
                     VALUES (?, ?, ?, ?, ?, ?, ?)
                     ON CONFLICT (profile_id, question_id) DO UPDATE SET
                         category = excluded.category,
                         answer = excluded.answer,
                         updated_at = excluded.updated_at
                     RETURNING id",
                )
                .bind(uuid_utils::generate_id())
                .bind(profile_id)
                .bind(category)
                .bind(question_id)
                .bind(answer.to_string())
                .bind(now)
                .bind(now)
                .fetch_one(&self.pool)
                .await?;
                debug!(profile_id, question_id, "Inserted answer");
                id
            }
        };

        self.fetch_by_id(&id).await
    }

    async fn save_batch(
        &self,
        profile_id: &str,
        entries: &[AnswerInput],
    ) -> Result<Vec<ProfileDetail>> {
        for entry in entries {
            entry.validate()?;
        }

        let unique = dedupe_entries(entries);
        if unique.is_empty() {
            return Ok(Vec::new());
        }

        let now = time::now();
        let mut query: QueryBuilder<Sqlite> = QueryBuilder::new(
            "INSERT INTO profile_details \
             (id, profile_id, category, question_id, answer, created_at, updated_at) ",
        );
        query.push_values(unique.iter(), |mut row, entry| {
            row.push_bind(uuid_utils::generate_id())
                .push_bind(profile_id.to_string())
                .push_bind(entry.category)
                .push_bind(entry.question_id.clone())
                .push_bind(entry.answer.to_string())
                .push_bind(now)
                .push_bind(now);
        });
        query.push(
            " ON CONFLICT (profile_id, question_id) DO UPDATE SET \
             category = excluded.category, \
             answer = excluded.answer, \
             updated_at = excluded.updated_at \
             RETURNING ",
        );
        query.push(DETAIL_COLUMNS);

        let mut written: Vec<ProfileDetail> = query
            .build_query_as::<ProfileDetail>()
            .fetch_all(&self.pool)
            .await?;

        // RETURNING order is unspecified; report rows in submission order
        let order: HashMap<&str, usize> = unique
            .iter()
            .enumerate()
            .map(|(i, e)| (e.question_id.as_str(), i))
            .collect();
        written.sort_by_key(|d| order.get(d.question_id.as_str()).copied().unwrap_or(usize::MAX));

        debug!(profile_id, count = written.len(), "Saved answer batch");
        Ok(written)
    }

    async fn get_all(&self, profile_id: &str) -> Vec<ProfileDetail> {
        match self.try_get_all(profile_id).await {
            Ok(details) => details,
            Err(e) => {
                warn!("Failed to load answers for profile {}: {}", profile_id, e);
                Vec::new()
            }
        }
    }

    async fn get_by_category(&self, profile_id: &str, category: Category) -> Vec<ProfileDetail> {
        match self.try_get_by_category(profile_id, category).await {
            Ok(details) => details,
            Err(e) => {
                warn!(
                    "Failed to load {} answers for profile {}: {}",
                    category, profile_id, e
                );
                Vec::new()
            }
        }
    }

    async fn is_setup_complete(&self, profile_id: &str) -> bool {
        let required = catalog::setup_required_ids();
        if required.is_empty() {
            return true;
        }

        match self.count_answered_required(profile_id, &required).await {
            Ok(answered) => answered >= required.len() as i64,
            Err(e) => {
                warn!(
                    "Setup completion check failed for profile {}: {}",
                    profile_id, e
                );
                false
            }
        }
    }
}
