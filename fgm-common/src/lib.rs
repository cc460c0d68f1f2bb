//! # FGM Common Library
//!
//! Shared code for the focus-group manager:
//! - Participant questionnaire catalog
//! - Database models, initialization and migrations
//! - Configuration loading and root folder resolution
//! - Error type
//! - Utility functions

pub mod catalog;
pub mod config;
#[cfg(feature = "sqlx")]
pub mod db;
pub mod error;
pub mod time;
pub mod uuid_utils;

pub use catalog::{Category, Question, QuestionType};
pub use error::{Error, Result};
