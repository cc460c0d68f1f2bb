//! Admin repositories
//!
//! One generic SQLite repository serves every admin entity. Each entity
//! declares its table, the columns its draft writes, and the whitelists used
//! by `list` for search, filtering and sorting. Column names never come from
//! the request; they are checked against these whitelists first.

use async_trait::async_trait;
use fgm_common::db::{
    AuditAction, AuditEntry, FocusGroup, FocusGroupDraft, Form, FormDraft, Organization,
    OrganizationDraft, Profile, ProfileDraft, Role, RoleDraft, Validate,
};
use fgm_common::{time, uuid_utils, Error, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, QueryBuilder, Sqlite, SqlitePool};
use std::collections::{BTreeMap, HashMap};
use std::marker::PhantomData;
use std::str::FromStr;
use tracing::debug;

use crate::db::audit;
use crate::pagination::{calculate_pagination, PAGE_SIZE};

/// Sort direction for listings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    fn as_sql(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

impl FromStr for SortOrder {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "asc" => Ok(SortOrder::Asc),
            "desc" => Ok(SortOrder::Desc),
            other => Err(Error::InvalidInput(format!("Invalid sort order: {}", other))),
        }
    }
}

/// A table that can be read and listed
pub trait Record: for<'r> FromRow<'r, SqliteRow> + Serialize + Send + Sync + Unpin + 'static {
    const TABLE: &'static str;
    /// Human-readable name used in error messages
    const LABEL: &'static str;
    const SEARCH_COLUMNS: &'static [&'static str];
    const FILTER_COLUMNS: &'static [&'static str];
    const SORT_COLUMNS: &'static [&'static str];
    const DEFAULT_SORT: (&'static str, SortOrder);
}

/// A record that can also be created, updated and deleted from a draft
pub trait Entity: Record {
    type Draft: Validate + Serialize + DeserializeOwned + Send + Sync + 'static;

    /// Draft fields written to the table, in bind order
    const WRITE_COLUMNS: &'static [&'static str];
}

impl Record for Profile {
    const TABLE: &'static str = "profiles";
    const LABEL: &'static str = "User";
    const SEARCH_COLUMNS: &'static [&'static str] = &["full_name", "email"];
    const FILTER_COLUMNS: &'static [&'static str] = &["role", "organization_id"];
    const SORT_COLUMNS: &'static [&'static str] =
        &["full_name", "email", "role", "created_at", "updated_at"];
    const DEFAULT_SORT: (&'static str, SortOrder) = ("full_name", SortOrder::Asc);
}

impl Entity for Profile {
    type Draft = ProfileDraft;
    const WRITE_COLUMNS: &'static [&'static str] =
        &["full_name", "email", "role", "organization_id"];
}

impl Record for Organization {
    const TABLE: &'static str = "organizations";
    const LABEL: &'static str = "Organization";
    const SEARCH_COLUMNS: &'static [&'static str] = &["name", "industry"];
    const FILTER_COLUMNS: &'static [&'static str] = &["industry"];
    const SORT_COLUMNS: &'static [&'static str] = &["name", "industry", "created_at", "updated_at"];
    const DEFAULT_SORT: (&'static str, SortOrder) = ("name", SortOrder::Asc);
}

impl Entity for Organization {
    type Draft = OrganizationDraft;
    const WRITE_COLUMNS: &'static [&'static str] = &["name", "industry"];
}

impl Record for FocusGroup {
    const TABLE: &'static str = "focus_groups";
    const LABEL: &'static str = "Focus group";
    const SEARCH_COLUMNS: &'static [&'static str] = &["name", "description"];
    const FILTER_COLUMNS: &'static [&'static str] = &["status", "organization_id"];
    const SORT_COLUMNS: &'static [&'static str] =
        &["name", "status", "max_participants", "created_at", "updated_at"];
    const DEFAULT_SORT: (&'static str, SortOrder) = ("created_at", SortOrder::Desc);
}

impl Entity for FocusGroup {
    type Draft = FocusGroupDraft;
    const WRITE_COLUMNS: &'static [&'static str] =
        &["name", "description", "organization_id", "status", "max_participants"];
}

impl Record for Form {
    const TABLE: &'static str = "forms";
    const LABEL: &'static str = "Form";
    const SEARCH_COLUMNS: &'static [&'static str] = &["title", "description"];
    const FILTER_COLUMNS: &'static [&'static str] = &["status", "focus_group_id"];
    const SORT_COLUMNS: &'static [&'static str] = &["title", "status", "created_at", "updated_at"];
    const DEFAULT_SORT: (&'static str, SortOrder) = ("created_at", SortOrder::Desc);
}

impl Entity for Form {
    type Draft = FormDraft;
    const WRITE_COLUMNS: &'static [&'static str] =
        &["title", "description", "focus_group_id", "status", "fields"];
}

impl Record for Role {
    const TABLE: &'static str = "roles";
    const LABEL: &'static str = "Role";
    const SEARCH_COLUMNS: &'static [&'static str] = &["name", "description"];
    const FILTER_COLUMNS: &'static [&'static str] = &["name"];
    const SORT_COLUMNS: &'static [&'static str] = &["name", "created_at", "updated_at"];
    const DEFAULT_SORT: (&'static str, SortOrder) = ("name", SortOrder::Asc);
}

impl Entity for Role {
    type Draft = RoleDraft;
    const WRITE_COLUMNS: &'static [&'static str] = &["name", "description", "permissions"];
}

impl Record for AuditEntry {
    const TABLE: &'static str = "audit_logs";
    const LABEL: &'static str = "Audit entry";
    const SEARCH_COLUMNS: &'static [&'static str] = &["entity", "entity_id", "actor"];
    const FILTER_COLUMNS: &'static [&'static str] = &["action", "entity", "entity_id", "actor"];
    const SORT_COLUMNS: &'static [&'static str] = &["created_at", "action", "entity"];
    const DEFAULT_SORT: (&'static str, SortOrder) = ("created_at", SortOrder::Desc);
}

/// Listing parameters
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListQuery {
    /// Case-insensitive substring matched against the searchable columns
    pub search: Option<String>,
    /// Equality filters keyed by column
    pub filters: BTreeMap<String, String>,
    pub sort: Option<String>,
    pub order: Option<SortOrder>,
    /// Requested page (1-indexed), clamped into range
    pub page: i64,
}

impl ListQuery {
    /// Build from raw query-string parameters
    ///
    /// `search`, `sort`, `order` and `page` are reserved; every other key is a filter.
    /// Empty values are ignored.
    pub fn from_params(params: HashMap<String, String>) -> Result<Self> {
        let mut query = ListQuery {
            page: 1,
            ..Default::default()
        };

        for (key, value) in params {
            if value.trim().is_empty() {
                continue;
            }
            match key.as_str() {
                "search" => query.search = Some(value),
                "sort" => query.sort = Some(value),
                "order" => query.order = Some(value.parse()?),
                "page" => {
                    query.page = value
                        .parse()
                        .map_err(|_| Error::InvalidInput(format!("Invalid page: {}", value)))?
                }
                _ => {
                    query.filters.insert(key, value);
                }
            }
        }

        Ok(query)
    }
}

/// One page of a listing
#[derive(Debug, Serialize)]
pub struct ListPage<T> {
    pub total_results: i64,
    pub page: i64,
    pub page_size: i64,
    pub total_pages: i64,
    pub items: Vec<T>,
}

/// Read access to a table
#[async_trait]
pub trait ReadRepository<R: Record>: Send + Sync {
    async fn get(&self, id: &str) -> Result<R>;
    async fn list(&self, query: &ListQuery) -> Result<ListPage<R>>;
}

/// Full CRUD access; every mutation is written to the audit log
#[async_trait]
pub trait Repository<E: Entity>: ReadRepository<E> {
    async fn create(&self, draft: E::Draft, actor: Option<&str>) -> Result<E>;
    async fn update(&self, id: &str, draft: E::Draft, actor: Option<&str>) -> Result<E>;
    async fn delete(&self, id: &str, actor: Option<&str>) -> Result<()>;
}

/// SQLite implementation of [`Repository`] for any [`Entity`]
pub struct SqliteRepository<R> {
    pool: SqlitePool,
    _record: PhantomData<fn() -> R>,
}

impl<R> SqliteRepository<R> {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            _record: PhantomData,
        }
    }
}

impl<R> Clone for SqliteRepository<R> {
    fn clone(&self) -> Self {
        Self::new(self.pool.clone())
    }
}

/// Escape `%`, `_` and the escape character itself for a LIKE pattern
pub fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn check_column(column: &str, allowed: &[&str], purpose: &str) -> Result<()> {
    if allowed.contains(&column) {
        Ok(())
    } else {
        Err(Error::InvalidInput(format!(
            "Cannot {} by column: {}",
            purpose, column
        )))
    }
}

/// Push `WHERE ...` for the search term and filters of `query`
fn push_conditions<R: Record>(builder: &mut QueryBuilder<'static, Sqlite>, query: &ListQuery) {
    let mut first = true;
    let mut next_clause = |builder: &mut QueryBuilder<'static, Sqlite>| {
        builder.push(if first { " WHERE " } else { " AND " });
        first = false;
    };

    if let Some(term) = query.search.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
        let pattern = format!("%{}%", escape_like(term));
        next_clause(builder);
        builder.push("(");
        for (i, column) in R::SEARCH_COLUMNS.iter().enumerate() {
            if i > 0 {
                builder.push(" OR ");
            }
            builder.push(*column);
            builder.push(" LIKE ");
            builder.push_bind(pattern.clone());
            builder.push(" ESCAPE '\\'");
        }
        builder.push(")");
    }

    for (column, value) in &query.filters {
        next_clause(builder);
        builder.push(column.as_str());
        builder.push(" = ");
        builder.push_bind(value.clone());
    }
}

/// Bind one JSON value from a serialized draft with its natural SQLite type
fn push_json_bind(builder: &mut QueryBuilder<'static, Sqlite>, value: Value) {
    match value {
        Value::Null => builder.push_bind(None::<String>),
        Value::Bool(b) => builder.push_bind(b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => builder.push_bind(i),
            None => builder.push_bind(n.as_f64()),
        },
        Value::String(s) => builder.push_bind(s),
        composite => builder.push_bind(composite.to_string()),
    };
}

/// Serialize a draft and pick out the written columns in order
fn draft_values<E: Entity>(draft: &E::Draft) -> Result<Vec<Value>> {
    let Value::Object(mut fields) = serde_json::to_value(draft)
        .map_err(|e| Error::Internal(format!("Failed to serialize draft: {}", e)))?
    else {
        return Err(Error::Internal("Draft did not serialize to an object".to_string()));
    };

    Ok(E::WRITE_COLUMNS
        .iter()
        .map(|c| fields.remove(*c).unwrap_or(Value::Null))
        .collect())
}

#[async_trait]
impl<R: Record> ReadRepository<R> for SqliteRepository<R> {
    async fn get(&self, id: &str) -> Result<R> {
        sqlx::query_as::<_, R>(&format!("SELECT * FROM {} WHERE id = ?", R::TABLE))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Error::NotFound(format!("{} {}", R::LABEL, id)))
    }

    async fn list(&self, query: &ListQuery) -> Result<ListPage<R>> {
        for column in query.filters.keys() {
            check_column(column, R::FILTER_COLUMNS, "filter")?;
        }
        let (sort_column, default_order) = match &query.sort {
            Some(column) => {
                check_column(column, R::SORT_COLUMNS, "sort")?;
                (column.as_str(), SortOrder::Asc)
            }
            None => R::DEFAULT_SORT,
        };
        let order = query.order.unwrap_or(default_order);

        let mut count: QueryBuilder<'static, Sqlite> =
            QueryBuilder::new(format!("SELECT COUNT(*) FROM {}", R::TABLE));
        push_conditions::<R>(&mut count, query);
        let total_results: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        let pagination = calculate_pagination(total_results, query.page);

        let mut select: QueryBuilder<'static, Sqlite> =
            QueryBuilder::new(format!("SELECT * FROM {}", R::TABLE));
        push_conditions::<R>(&mut select, query);
        select.push(format!(
            " ORDER BY {} {}, id ASC LIMIT {} OFFSET {}",
            sort_column,
            order.as_sql(),
            PAGE_SIZE,
            pagination.offset
        ));
        let items = select.build_query_as::<R>().fetch_all(&self.pool).await?;

        debug!(
            table = R::TABLE,
            total_results,
            page = pagination.page,
            "Listed records"
        );

        Ok(ListPage {
            total_results,
            page: pagination.page,
            page_size: PAGE_SIZE,
            total_pages: pagination.total_pages,
            items,
        })
    }
}

#[async_trait]
impl<E: Entity> Repository<E> for SqliteRepository<E> {
    async fn create(&self, draft: E::Draft, actor: Option<&str>) -> Result<E> {
        draft.validate()?;
        let values = draft_values::<E>(&draft)?;
        let id = uuid_utils::generate_id();
        let now = time::now();

        let mut insert: QueryBuilder<'static, Sqlite> = QueryBuilder::new(format!(
            "INSERT INTO {} (id, {}, created_at, updated_at) VALUES (",
            E::TABLE,
            E::WRITE_COLUMNS.join(", ")
        ));
        insert.push_bind(id.clone());
        for value in values {
            insert.push(", ");
            push_json_bind(&mut insert, value);
        }
        insert.push(", ");
        insert.push_bind(now);
        insert.push(", ");
        insert.push_bind(now);
        insert.push(") RETURNING *");

        let record = insert.build_query_as::<E>().fetch_one(&self.pool).await?;

        audit::record(&self.pool, AuditAction::Create, E::TABLE, &id, actor).await;
        Ok(record)
    }

    async fn update(&self, id: &str, draft: E::Draft, actor: Option<&str>) -> Result<E> {
        draft.validate()?;
        let values = draft_values::<E>(&draft)?;

        let mut update: QueryBuilder<'static, Sqlite> =
            QueryBuilder::new(format!("UPDATE {} SET ", E::TABLE));
        for (column, value) in E::WRITE_COLUMNS.iter().zip(values) {
            update.push(*column);
            update.push(" = ");
            push_json_bind(&mut update, value);
            update.push(", ");
        }
        update.push("updated_at = ");
        update.push_bind(time::now());
        update.push(" WHERE id = ");
        update.push_bind(id.to_string());
        update.push(" RETURNING *");

        let record = update
            .build_query_as::<E>()
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Error::NotFound(format!("{} {}", E::LABEL, id)))?;

        audit::record(&self.pool, AuditAction::Update, E::TABLE, id, actor).await;
        Ok(record)
    }

    async fn delete(&self, id: &str, actor: Option<&str>) -> Result<()> {
        let result = sqlx::query(&format!("DELETE FROM {} WHERE id = ?", E::TABLE))
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("{} {}", E::LABEL, id)));
        }

        audit::record(&self.pool, AuditAction::Delete, E::TABLE, id, actor).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("50%_off"), "50\\%\\_off");
        assert_eq!(escape_like("a\\b"), "a\\\\b");
        assert_eq!(escape_like("plain"), "plain");
    }

    #[test]
    fn test_list_query_from_params() {
        let params: HashMap<String, String> = [
            ("search", "acme"),
            ("status", "active"),
            ("sort", "name"),
            ("order", "DESC"),
            ("page", "3"),
            ("organization_id", ""),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        let query = ListQuery::from_params(params).unwrap();
        assert_eq!(query.search.as_deref(), Some("acme"));
        assert_eq!(query.sort.as_deref(), Some("name"));
        assert_eq!(query.order, Some(SortOrder::Desc));
        assert_eq!(query.page, 3);
        assert_eq!(query.filters.len(), 1);
        assert_eq!(query.filters.get("status").map(String::as_str), Some("active"));
    }

    #[test]
    fn test_list_query_rejects_bad_values() {
        let bad_page: HashMap<String, String> =
            [("page".to_string(), "two".to_string())].into_iter().collect();
        assert!(ListQuery::from_params(bad_page).is_err());

        let bad_order: HashMap<String, String> =
            [("order".to_string(), "sideways".to_string())].into_iter().collect();
        assert!(ListQuery::from_params(bad_order).is_err());
    }

    #[test]
    fn test_draft_values_follow_write_columns() {
        let draft = FocusGroupDraft {
            name: "Snacks".to_string(),
            description: None,
            organization_id: Some("org-1".to_string()),
            status: fgm_common::db::FocusGroupStatus::Active,
            max_participants: Some(12),
        };

        let values = draft_values::<FocusGroup>(&draft).unwrap();
        assert_eq!(
            values,
            vec![
                Value::from("Snacks"),
                Value::Null,
                Value::from("org-1"),
                Value::from("active"),
                Value::from(12),
            ]
        );
    }
}
