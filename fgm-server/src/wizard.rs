//! Profile setup wizard
//!
//! Steps through the catalog categories in order. Answers are staged locally
//! and saved with one batch call when the participant moves forward.
//!
//! Transitions:
//! - `next`: current category must have every required question answered
//!   (staged over stored); saves the staged answers, then advances or submits
//! - `previous`: steps back without saving; rejected on the first step
//! - `Submitted` is terminal
//!
//! A failed transition leaves the step and the staged answers untouched.
//! Stored answers can change underneath a long-lived wizard; `refresh`
//! reloads them.

use fgm_common::catalog::{self, Category, Question};
use fgm_common::db::AnswerInput;
use fgm_common::{Error, Result};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

use crate::db::ProfileDetailAccess;
use crate::store::ProfileStore;

/// Wizard position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "step", rename_all = "snake_case")]
pub enum WizardState {
    /// Showing the category at this index of [`Category::ALL`]
    AtCategory(usize),
    Submitted,
}

/// Snapshot of the wizard for display
#[derive(Debug, Clone, Serialize)]
pub struct WizardView {
    pub profile_id: String,
    #[serde(flatten)]
    pub state: WizardState,
    pub total_steps: usize,
    pub category: Option<Category>,
    pub questions: &'static [Question],
    /// Stored answers of the current category with staged ones on top
    pub answers: BTreeMap<String, Value>,
    pub missing_required: Vec<String>,
    /// Reported once the wizard is submitted
    pub setup_complete: Option<bool>,
}

/// Step-through setup flow for one profile
pub struct SetupWizard<A: ?Sized> {
    store: ProfileStore<A>,
    profile_id: String,
    state: WizardState,
    staged: BTreeMap<Category, BTreeMap<String, Value>>,
    setup_complete: Option<bool>,
}

impl<A: ProfileDetailAccess + ?Sized> SetupWizard<A> {
    /// Load the profile's answers and open the first step
    pub async fn start(access: Arc<A>, profile_id: &str) -> Self {
        let store = ProfileStore::new(access);
        store.load(profile_id).await;

        debug!(profile_id, "Setup wizard started");

        Self {
            store,
            profile_id: profile_id.to_string(),
            state: WizardState::AtCategory(0),
            staged: BTreeMap::new(),
            setup_complete: None,
        }
    }

    pub fn state(&self) -> WizardState {
        self.state
    }

    pub fn store(&self) -> &ProfileStore<A> {
        &self.store
    }

    /// Reload stored answers; the step and staged answers are kept
    pub async fn refresh(&self) {
        self.store.load(&self.profile_id).await;
    }

    pub fn current_category(&self) -> Option<Category> {
        match self.state {
            WizardState::AtCategory(i) => Category::ALL.get(i).copied(),
            WizardState::Submitted => None,
        }
    }

    fn require_category(&self) -> Result<Category> {
        self.current_category()
            .ok_or_else(|| Error::InvalidInput("Setup has already been submitted".to_string()))
    }

    /// Staged answers of `category`
    pub fn staged(&self, category: Category) -> BTreeMap<String, Value> {
        self.staged.get(&category).cloned().unwrap_or_default()
    }

    /// Keep an answer for the current category until the next `next`
    pub fn stage_answer(&mut self, question_id: &str, answer: Value) -> Result<()> {
        let category = self.require_category()?;
        catalog::validate_entry(category, question_id, &answer)?;

        self.staged
            .entry(category)
            .or_default()
            .insert(question_id.to_string(), answer);
        Ok(())
    }

    /// Validate, save and advance
    pub async fn next(&mut self) -> Result<WizardState> {
        let category = self.require_category()?;
        let staged = self.staged(category);

        let missing = self.store.missing_required(category, &staged).await;
        if !missing.is_empty() {
            debug!(
                profile_id = %self.profile_id,
                %category,
                ?missing,
                "Setup step incomplete"
            );
            return Err(Error::Validation { missing });
        }

        if !staged.is_empty() {
            let entries: Vec<AnswerInput> = staged
                .into_iter()
                .map(|(question_id, answer)| AnswerInput::new(category, question_id, answer))
                .collect();
            self.store.save_batch(&entries).await?;
            self.staged.remove(&category);
        }

        let index = category.index();
        self.state = if index + 1 < Category::ALL.len() {
            WizardState::AtCategory(index + 1)
        } else {
            let complete = self
                .store
                .access()
                .is_setup_complete(&self.profile_id)
                .await;
            self.setup_complete = Some(complete);
            info!(
                "Profile {} submitted setup (complete: {})",
                self.profile_id, complete
            );
            WizardState::Submitted
        };

        Ok(self.state)
    }

    /// Step back without saving
    pub fn previous(&mut self) -> Result<WizardState> {
        match self.state {
            WizardState::Submitted => Err(Error::InvalidInput(
                "Setup has already been submitted".to_string(),
            )),
            WizardState::AtCategory(0) => Err(Error::InvalidInput(
                "Already at the first step".to_string(),
            )),
            WizardState::AtCategory(i) => {
                self.state = WizardState::AtCategory(i - 1);
                Ok(self.state)
            }
        }
    }

    pub async fn view(&self) -> WizardView {
        let (category, questions, answers, missing_required) = match self.current_category() {
            Some(category) => {
                let staged = self.staged(category);
                let missing = self.store.missing_required(category, &staged).await;
                let mut answers = self.store.answers_for(category).await;
                answers.extend(staged);
                (Some(category), category.questions(), answers, missing)
            }
            None => (None, &[][..], BTreeMap::new(), Vec::new()),
        };

        WizardView {
            profile_id: self.profile_id.clone(),
            state: self.state,
            total_steps: Category::ALL.len(),
            category,
            questions,
            answers,
            missing_required,
            setup_complete: self.setup_complete,
        }
    }
}
