//! Tests for the profile store and the setup wizard
//!
//! Both run against an in-memory fake access layer that counts calls and can
//! be told to fail writes, plus one end-to-end run over SQLite.

use async_trait::async_trait;
use chrono::Utc;
use fgm_common::catalog::{self, Category};
use fgm_common::db::{init_memory_database, AnswerInput, ProfileDetail, Validate};
use fgm_common::{Error, Result};
use fgm_server::db::{ProfileDetailAccess, SqliteProfileDetails};
use fgm_server::store::ProfileStore;
use fgm_server::wizard::{SetupWizard, WizardState};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct FakeAccess {
    rows: Mutex<BTreeMap<(String, String), ProfileDetail>>,
    fail_writes: AtomicBool,
    save_calls: AtomicUsize,
}

impl FakeAccess {
    fn insert(&self, profile_id: &str, category: Category, question_id: &str, answer: Value) {
        let now = Utc::now();
        self.rows.lock().unwrap().insert(
            (profile_id.to_string(), question_id.to_string()),
            ProfileDetail {
                id: format!("{}-{}", profile_id, question_id),
                profile_id: profile_id.to_string(),
                category,
                question_id: question_id.to_string(),
                answer,
                created_at: now,
                updated_at: now,
            },
        );
    }

    fn saves(&self) -> usize {
        self.save_calls.load(Ordering::SeqCst)
    }

    fn check_writable(&self) -> Result<()> {
        self.save_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(Error::Internal("storage unavailable".to_string()));
        }
        Ok(())
    }

    fn get(&self, profile_id: &str, question_id: &str) -> Option<ProfileDetail> {
        self.rows
            .lock()
            .unwrap()
            .get(&(profile_id.to_string(), question_id.to_string()))
            .cloned()
    }
}

#[async_trait]
impl ProfileDetailAccess for FakeAccess {
    async fn save_one(
        &self,
        profile_id: &str,
        category: Category,
        question_id: &str,
        answer: Value,
    ) -> Result<ProfileDetail> {
        catalog::validate_entry(category, question_id, &answer)?;
        self.check_writable()?;
        self.insert(profile_id, category, question_id, answer);
        Ok(self.get(profile_id, question_id).unwrap())
    }

    async fn save_batch(
        &self,
        profile_id: &str,
        entries: &[AnswerInput],
    ) -> Result<Vec<ProfileDetail>> {
        for entry in entries {
            entry.validate()?;
        }
        self.check_writable()?;
        for entry in entries {
            self.insert(profile_id, entry.category, &entry.question_id, entry.answer.clone());
        }
        Ok(entries
            .iter()
            .filter_map(|e| self.get(profile_id, &e.question_id))
            .collect())
    }

    async fn get_all(&self, profile_id: &str) -> Vec<ProfileDetail> {
        self.rows
            .lock()
            .unwrap()
            .values()
            .filter(|d| d.profile_id == profile_id)
            .cloned()
            .collect()
    }

    async fn get_by_category(&self, profile_id: &str, category: Category) -> Vec<ProfileDetail> {
        self.get_all(profile_id)
            .await
            .into_iter()
            .filter(|d| d.category == category)
            .collect()
    }

    async fn is_setup_complete(&self, profile_id: &str) -> bool {
        catalog::setup_required_ids().iter().all(|id| {
            self.get(profile_id, id)
                .map(|d| catalog::is_answered(&d.answer))
                .unwrap_or(false)
        })
    }
}

/// A valid answer for every required question of `category`
fn required_answers(category: Category) -> Vec<(&'static str, Value)> {
    catalog::required_questions(category)
        .map(|q| {
            let answer = match q.kind {
                fgm_common::QuestionType::Number => json!(30),
                fgm_common::QuestionType::Date => json!("1994-01-01"),
                fgm_common::QuestionType::Select => json!(q.options[0]),
                fgm_common::QuestionType::Multiselect => json!([q.options[0]]),
                fgm_common::QuestionType::Scale => json!(q.scale.map(|(min, _)| min).unwrap_or(1)),
                _ => json!("answer"),
            };
            (q.id, answer)
        })
        .collect()
}

fn stage_required(wizard: &mut SetupWizard<FakeAccess>, category: Category) {
    for (id, answer) in required_answers(category) {
        wizard.stage_answer(id, answer).unwrap();
    }
}

// =============================================================================
// Profile store
// =============================================================================

#[tokio::test]
async fn test_load_groups_answers_and_completed_categories() {
    let access = Arc::new(FakeAccess::default());
    access.insert("p1", Category::Demographics, "age", json!(30));
    access.insert("p1", Category::Lifestyle, "hobbies", json!(["Reading"]));
    access.insert("p2", Category::Career, "education", json!("Bachelor's degree"));

    let store = ProfileStore::new(access);
    store.load("p1").await;

    assert_eq!(store.profile_id().await.as_deref(), Some("p1"));
    assert_eq!(store.answer(Category::Demographics, "age").await, Some(json!(30)));
    assert_eq!(store.answers_for(Category::Lifestyle).await.len(), 1);
    assert!(store.answers_for(Category::Career).await.is_empty());
    assert_eq!(
        store.completed_categories().await.into_iter().collect::<Vec<_>>(),
        vec![Category::Demographics, Category::Lifestyle]
    );
    assert!(!store.is_loading().await);
}

#[tokio::test]
async fn test_reload_reflects_external_changes() {
    let access = Arc::new(FakeAccess::default());
    access.insert("p1", Category::Demographics, "age", json!(30));

    let store = ProfileStore::new(access.clone());
    store.load("p1").await;
    assert!(store.answer(Category::Demographics, "city").await.is_none());

    access.insert("p1", Category::Demographics, "city", json!("LA"));
    store.load("p1").await;

    assert_eq!(store.answer(Category::Demographics, "city").await, Some(json!("LA")));
    assert_eq!(store.answers_for(Category::Demographics).await.len(), 2);
}

#[tokio::test]
async fn test_load_replaces_previous_profile_state() {
    let access = Arc::new(FakeAccess::default());
    access.insert("p1", Category::Media, "newsSources", json!(["Television"]));

    let store = ProfileStore::new(access);
    store.load("p1").await;
    store.load("p2").await;

    assert!(store.all_answers().await.is_empty());
    assert!(store.completed_categories().await.is_empty());
}

#[tokio::test]
async fn test_save_merges_only_after_success() {
    let access = Arc::new(FakeAccess::default());
    let store = ProfileStore::new(access.clone());
    store.load("p1").await;

    store
        .save_one(Category::Demographics, "age", json!(30))
        .await
        .unwrap();
    assert_eq!(store.answer(Category::Demographics, "age").await, Some(json!(30)));
    assert!(store.completed_categories().await.contains(&Category::Demographics));

    access.fail_writes.store(true, Ordering::SeqCst);
    let result = store
        .save_batch(&[AnswerInput::new(Category::Demographics, "age", json!(99))])
        .await;

    assert!(result.is_err());
    assert_eq!(store.answer(Category::Demographics, "age").await, Some(json!(30)));
}

#[tokio::test]
async fn test_save_without_loaded_profile_is_rejected() {
    let access = Arc::new(FakeAccess::default());
    let store = ProfileStore::new(access.clone());

    let result = store.save_one(Category::Demographics, "age", json!(30)).await;
    assert!(matches!(result, Err(Error::InvalidInput(_))));
    assert_eq!(access.saves(), 0);
}

#[tokio::test]
async fn test_missing_required_prefers_overlay() {
    let access = Arc::new(FakeAccess::default());
    access.insert("p1", Category::Demographics, "age", json!(30));
    access.insert("p1", Category::Demographics, "city", json!("LA"));

    let store = ProfileStore::new(access);
    store.load("p1").await;

    let mut overlay = BTreeMap::new();
    overlay.insert("gender".to_string(), json!("Female"));
    overlay.insert("city".to_string(), json!(""));

    let missing = store.missing_required(Category::Demographics, &overlay).await;
    assert_eq!(missing, vec!["dateOfBirth", "country", "state", "city"]);
}

// =============================================================================
// Setup wizard
// =============================================================================

#[tokio::test]
async fn test_next_with_missing_required_does_not_advance_or_save() {
    let access = Arc::new(FakeAccess::default());
    let mut wizard = SetupWizard::start(access.clone(), "p1").await;

    wizard.stage_answer("age", json!(30)).unwrap();
    let err = wizard.next().await.unwrap_err();

    match err {
        Error::Validation { missing } => {
            assert_eq!(missing, vec!["gender", "dateOfBirth", "country", "state", "city"])
        }
        other => panic!("expected validation error, got {:?}", other),
    }
    assert_eq!(wizard.state(), WizardState::AtCategory(0));
    assert_eq!(access.saves(), 0);
    assert_eq!(wizard.staged(Category::Demographics).len(), 1);
}

#[tokio::test]
async fn test_next_saves_staged_answers_in_one_batch() {
    let access = Arc::new(FakeAccess::default());
    let mut wizard = SetupWizard::start(access.clone(), "p1").await;

    stage_required(&mut wizard, Category::Demographics);
    let state = wizard.next().await.unwrap();

    assert_eq!(state, WizardState::AtCategory(1));
    assert_eq!(access.saves(), 1);
    assert!(wizard.staged(Category::Demographics).is_empty());
    assert_eq!(
        wizard.store().answer(Category::Demographics, "age").await,
        Some(json!(30))
    );
}

#[tokio::test]
async fn test_stored_answers_satisfy_required_questions() {
    let access = Arc::new(FakeAccess::default());
    for (id, answer) in required_answers(Category::Demographics) {
        access.insert("p1", Category::Demographics, id, answer);
    }

    let mut wizard = SetupWizard::start(access.clone(), "p1").await;
    assert_eq!(wizard.next().await.unwrap(), WizardState::AtCategory(1));
    // Nothing staged, nothing to save
    assert_eq!(access.saves(), 0);
}

#[tokio::test]
async fn test_refresh_picks_up_answers_saved_elsewhere() {
    let access = Arc::new(FakeAccess::default());
    let mut wizard = SetupWizard::start(access.clone(), "p1").await;
    wizard.stage_answer("city", json!("SF")).unwrap();

    for (id, answer) in required_answers(Category::Demographics) {
        access.insert("p1", Category::Demographics, id, answer);
    }
    assert!(matches!(wizard.next().await, Err(Error::Validation { .. })));

    wizard.refresh().await;
    assert_eq!(wizard.staged(Category::Demographics).len(), 1);
    assert_eq!(wizard.next().await.unwrap(), WizardState::AtCategory(1));
    assert_eq!(access.get("p1", "city").unwrap().answer, json!("SF"));
}

#[tokio::test]
async fn test_stage_answer_validates_against_current_category() {
    let access = Arc::new(FakeAccess::default());
    let mut wizard = SetupWizard::start(access, "p1").await;

    assert!(wizard.stage_answer("hobbies", json!(["Reading"])).is_err());
    assert!(wizard.stage_answer("age", json!("old")).is_err());
    assert!(wizard.staged(Category::Demographics).is_empty());
}

#[tokio::test]
async fn test_previous_moves_back_without_saving() {
    let access = Arc::new(FakeAccess::default());
    let mut wizard = SetupWizard::start(access.clone(), "p1").await;

    assert!(wizard.previous().is_err());

    stage_required(&mut wizard, Category::Demographics);
    wizard.next().await.unwrap();
    wizard.stage_answer("causes", json!([])).unwrap();

    assert_eq!(wizard.previous().unwrap(), WizardState::AtCategory(0));
    assert_eq!(access.saves(), 1);
    assert_eq!(wizard.staged(Category::Beliefs).len(), 1);
}

#[tokio::test]
async fn test_save_failure_keeps_step_and_staged_answers() {
    let access = Arc::new(FakeAccess::default());
    let mut wizard = SetupWizard::start(access.clone(), "p1").await;

    stage_required(&mut wizard, Category::Demographics);
    access.fail_writes.store(true, Ordering::SeqCst);

    assert!(wizard.next().await.is_err());
    assert_eq!(wizard.state(), WizardState::AtCategory(0));
    assert_eq!(wizard.staged(Category::Demographics).len(), 6);

    access.fail_writes.store(false, Ordering::SeqCst);
    assert_eq!(wizard.next().await.unwrap(), WizardState::AtCategory(1));
}

#[tokio::test]
async fn test_walkthrough_submits_and_reports_completion() {
    let access = Arc::new(FakeAccess::default());
    let mut wizard = SetupWizard::start(access.clone(), "p1").await;

    for category in Category::ALL {
        assert_eq!(wizard.current_category(), Some(category));
        stage_required(&mut wizard, category);
        wizard.next().await.unwrap();
    }

    assert_eq!(wizard.state(), WizardState::Submitted);
    assert_eq!(access.saves(), Category::ALL.len());

    let view = wizard.view().await;
    assert_eq!(view.setup_complete, Some(true));
    assert!(view.category.is_none());

    // Terminal
    assert!(wizard.next().await.is_err());
    assert!(wizard.previous().is_err());
    assert!(wizard.stage_answer("age", json!(40)).is_err());
}

#[tokio::test]
async fn test_view_overlays_staged_answers() {
    let access = Arc::new(FakeAccess::default());
    access.insert("p1", Category::Demographics, "age", json!(30));
    access.insert("p1", Category::Demographics, "city", json!("LA"));

    let mut wizard = SetupWizard::start(access, "p1").await;
    wizard.stage_answer("city", json!("SF")).unwrap();

    let view = wizard.view().await;
    assert_eq!(view.state, WizardState::AtCategory(0));
    assert_eq!(view.total_steps, Category::ALL.len());
    assert_eq!(view.category, Some(Category::Demographics));
    assert_eq!(view.answers.get("age"), Some(&json!(30)));
    assert_eq!(view.answers.get("city"), Some(&json!("SF")));
    assert!(!view.missing_required.contains(&"age".to_string()));
    assert!(view.missing_required.contains(&"gender".to_string()));
}

#[tokio::test]
async fn test_wizard_over_sqlite_completes_setup() {
    let pool = init_memory_database().await.unwrap();
    sqlx::query("INSERT INTO profiles (id, full_name) VALUES ('p1', 'Pat')")
        .execute(&pool)
        .await
        .unwrap();
    let access = Arc::new(SqliteProfileDetails::new(pool));

    let mut wizard = SetupWizard::start(access.clone(), "p1").await;
    for (id, answer) in [
        ("age", json!(30)),
        ("gender", json!("Male")),
        ("dateOfBirth", json!("1994-01-01")),
        ("country", json!("US")),
        ("state", json!("CA")),
        ("city", json!("LA")),
    ] {
        wizard.stage_answer(id, answer).unwrap();
    }
    wizard.next().await.unwrap();

    assert!(access.is_setup_complete("p1").await);
}
