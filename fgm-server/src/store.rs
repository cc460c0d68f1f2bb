//! Profile store
//!
//! In-memory view of one profile's answers, keyed by category and question.
//! Local state changes only after the access layer acknowledges a write, so a
//! failed save leaves the store exactly as it was.

use fgm_common::catalog::{self, Category};
use fgm_common::db::{AnswerInput, ProfileDetail};
use fgm_common::{Error, Result};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

use crate::db::ProfileDetailAccess;

/// Answers grouped by category, then question id
pub type AnswerMap = BTreeMap<Category, BTreeMap<String, Value>>;

#[derive(Debug, Default)]
struct StoreState {
    profile_id: Option<String>,
    answers: AnswerMap,
    completed_categories: BTreeSet<Category>,
    loading: bool,
}

impl StoreState {
    fn merge(&mut self, details: &[ProfileDetail]) {
        for detail in details {
            self.answers
                .entry(detail.category)
                .or_default()
                .insert(detail.question_id.clone(), detail.answer.clone());
            self.completed_categories.insert(detail.category);
        }
    }
}

/// Cached answers of one profile over a [`ProfileDetailAccess`]
pub struct ProfileStore<A: ?Sized> {
    access: Arc<A>,
    state: RwLock<StoreState>,
}

impl<A: ProfileDetailAccess + ?Sized> ProfileStore<A> {
    pub fn new(access: Arc<A>) -> Self {
        Self {
            access,
            state: RwLock::new(StoreState::default()),
        }
    }

    pub fn access(&self) -> &Arc<A> {
        &self.access
    }

    /// Replace local state with everything stored for `profile_id`
    pub async fn load(&self, profile_id: &str) {
        self.state.write().await.loading = true;

        let details = self.access.get_all(profile_id).await;

        let mut loaded = StoreState {
            profile_id: Some(profile_id.to_string()),
            ..Default::default()
        };
        loaded.merge(&details);

        debug!(
            profile_id,
            answers = details.len(),
            categories = loaded.completed_categories.len(),
            "Loaded profile answers"
        );

        *self.state.write().await = loaded;
    }

    async fn loaded_profile(&self) -> Result<String> {
        self.state
            .read()
            .await
            .profile_id
            .clone()
            .ok_or_else(|| Error::InvalidInput("No profile loaded".to_string()))
    }

    /// Save one answer, then merge it
    pub async fn save_one(
        &self,
        category: Category,
        question_id: &str,
        answer: Value,
    ) -> Result<ProfileDetail> {
        let profile_id = self.loaded_profile().await?;
        let detail = self
            .access
            .save_one(&profile_id, category, question_id, answer)
            .await?;

        self.state
            .write()
            .await
            .merge(std::slice::from_ref(&detail));
        Ok(detail)
    }

    /// Save many answers in one call, then merge them
    pub async fn save_batch(&self, entries: &[AnswerInput]) -> Result<Vec<ProfileDetail>> {
        let profile_id = self.loaded_profile().await?;
        let details = self.access.save_batch(&profile_id, entries).await?;

        self.state.write().await.merge(&details);
        Ok(details)
    }

    pub async fn profile_id(&self) -> Option<String> {
        self.state.read().await.profile_id.clone()
    }

    pub async fn answer(&self, category: Category, question_id: &str) -> Option<Value> {
        self.state
            .read()
            .await
            .answers
            .get(&category)
            .and_then(|answers| answers.get(question_id))
            .cloned()
    }

    pub async fn answers_for(&self, category: Category) -> BTreeMap<String, Value> {
        self.state
            .read()
            .await
            .answers
            .get(&category)
            .cloned()
            .unwrap_or_default()
    }

    pub async fn all_answers(&self) -> AnswerMap {
        self.state.read().await.answers.clone()
    }

    /// Categories with at least one saved answer
    pub async fn completed_categories(&self) -> BTreeSet<Category> {
        self.state.read().await.completed_categories.clone()
    }

    pub async fn is_loading(&self) -> bool {
        self.state.read().await.loading
    }

    /// Required questions of `category` unanswered in `overlay` and in the store
    ///
    /// Overlay values take precedence over stored ones.
    pub async fn missing_required(
        &self,
        category: Category,
        overlay: &BTreeMap<String, Value>,
    ) -> Vec<String> {
        let state = self.state.read().await;
        let stored = state.answers.get(&category);

        catalog::missing_required(category, |id| {
            overlay
                .get(id)
                .or_else(|| stored.and_then(|answers| answers.get(id)))
        })
    }
}
