//! Database models
//!
//! Records mirror table rows; drafts are the caller-supplied part of a record
//! and are validated before any write.

use crate::catalog::{Category, QuestionType};
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Input validation performed before a draft reaches the database
pub trait Validate {
    fn validate(&self) -> Result<()>;
}

fn require_text(field: &str, value: &str, max_len: usize) -> Result<()> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(Error::InvalidInput(format!("{} must not be empty", field)));
    }
    if trimmed.chars().count() > max_len {
        return Err(Error::InvalidInput(format!(
            "{} must be at most {} characters",
            field, max_len
        )));
    }
    Ok(())
}

fn is_plausible_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && domain.contains('.')
        && !email.chars().any(char::is_whitespace)
}

// ============================================================================
// Questionnaire answers
// ============================================================================

/// One stored questionnaire answer
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ProfileDetail {
    pub id: String,
    pub profile_id: String,
    pub category: Category,
    pub question_id: String,
    #[sqlx(json)]
    pub answer: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Answer submitted for one question
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerInput {
    pub category: Category,
    pub question_id: String,
    pub answer: Value,
}

impl AnswerInput {
    pub fn new(category: Category, question_id: impl Into<String>, answer: Value) -> Self {
        Self {
            category,
            question_id: question_id.into(),
            answer,
        }
    }
}

impl Validate for AnswerInput {
    fn validate(&self) -> Result<()> {
        crate::catalog::validate_entry(self.category, &self.question_id, &self.answer)?;
        Ok(())
    }
}

// ============================================================================
// Profiles (platform users)
// ============================================================================

/// Platform role of a profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum UserRole {
    Admin,
    Manager,
    Client,
    #[default]
    Participant,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Profile {
    pub id: String,
    pub full_name: String,
    pub email: Option<String>,
    pub role: UserRole,
    pub organization_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileDraft {
    pub full_name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub role: UserRole,
    #[serde(default)]
    pub organization_id: Option<String>,
}

impl Validate for ProfileDraft {
    fn validate(&self) -> Result<()> {
        require_text("full_name", &self.full_name, 200)?;
        if let Some(email) = &self.email {
            if !is_plausible_email(email) {
                return Err(Error::InvalidInput(format!("Invalid email: {}", email)));
            }
        }
        Ok(())
    }
}

// ============================================================================
// Organizations
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Organization {
    pub id: String,
    pub name: String,
    pub industry: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrganizationDraft {
    pub name: String,
    #[serde(default)]
    pub industry: Option<String>,
}

impl Validate for OrganizationDraft {
    fn validate(&self) -> Result<()> {
        require_text("name", &self.name, 200)
    }
}

// ============================================================================
// Focus groups
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum FocusGroupStatus {
    #[default]
    Draft,
    Active,
    Completed,
    Archived,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct FocusGroup {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub organization_id: Option<String>,
    pub status: FocusGroupStatus,
    pub max_participants: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FocusGroupDraft {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub organization_id: Option<String>,
    #[serde(default)]
    pub status: FocusGroupStatus,
    #[serde(default)]
    pub max_participants: Option<i64>,
}

impl Validate for FocusGroupDraft {
    fn validate(&self) -> Result<()> {
        require_text("name", &self.name, 200)?;
        if matches!(self.max_participants, Some(n) if n < 0) {
            return Err(Error::InvalidInput(
                "max_participants must not be negative".to_string(),
            ));
        }
        Ok(())
    }
}

// ============================================================================
// Forms
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum FormStatus {
    #[default]
    Draft,
    Published,
    Closed,
}

/// One field of a form built in the form builder
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormField {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: QuestionType,
    pub label: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Form {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub focus_group_id: Option<String>,
    pub status: FormStatus,
    #[sqlx(json)]
    pub fields: Vec<FormField>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormDraft {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub focus_group_id: Option<String>,
    #[serde(default)]
    pub status: FormStatus,
    #[serde(default)]
    pub fields: Vec<FormField>,
}

impl Validate for FormDraft {
    fn validate(&self) -> Result<()> {
        require_text("title", &self.title, 200)?;

        let mut ids: Vec<&str> = Vec::with_capacity(self.fields.len());
        for field in &self.fields {
            require_text("field id", &field.id, 100)?;
            require_text("field label", &field.label, 500)?;
            if ids.contains(&field.id.as_str()) {
                return Err(Error::InvalidInput(format!(
                    "Duplicate field id: {}",
                    field.id
                )));
            }
            ids.push(&field.id);

            let needs_options =
                matches!(field.kind, QuestionType::Select | QuestionType::Multiselect);
            if needs_options && field.options.is_empty() {
                return Err(Error::InvalidInput(format!(
                    "Field '{}' needs at least one option",
                    field.id
                )));
            }
        }
        Ok(())
    }
}

// ============================================================================
// Roles and permissions
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Role {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    #[sqlx(json)]
    pub permissions: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleDraft {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub permissions: Vec<String>,
}

impl Validate for RoleDraft {
    fn validate(&self) -> Result<()> {
        require_text("name", &self.name, 100)?;
        for (i, permission) in self.permissions.iter().enumerate() {
            require_text("permission", permission, 100)?;
            if self.permissions[..i].contains(permission) {
                return Err(Error::InvalidInput(format!(
                    "Duplicate permission: {}",
                    permission
                )));
            }
        }
        Ok(())
    }
}

// ============================================================================
// Audit log
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum AuditAction {
    Create,
    Update,
    Delete,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::Create => "create",
            AuditAction::Update => "update",
            AuditAction::Delete => "delete",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct AuditEntry {
    pub id: String,
    pub action: AuditAction,
    pub entity: String,
    pub entity_id: String,
    pub actor: Option<String>,
    pub created_at: DateTime<Utc>,
}
