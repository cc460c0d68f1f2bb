//! Participant questionnaire catalog
//!
//! Static taxonomy of categories → questions → validation metadata.
//! Category order drives the profile setup wizard step sequence.
//!
//! The catalog is compiled in and never mutated at runtime; profile completion
//! is always recomputed from it together with the stored answers.

mod questions;

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Maximum accepted length of a `text` answer
pub const MAX_TEXT_LEN: usize = 500;

/// Maximum accepted length of a `textarea` answer
pub const MAX_TEXTAREA_LEN: usize = 5000;

/// Categories whose required questions must be answered for a profile to count as set up
pub const SETUP_CATEGORIES: &[Category] = &[Category::Demographics];

/// Questionnaire category
///
/// Declaration order is the wizard order (and the `Ord` order).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
pub enum Category {
    Demographics,
    Beliefs,
    Lifestyle,
    Career,
    Media,
    Technology,
    Buying,
    Psychographics,
}

impl Category {
    /// All categories in wizard order
    pub const ALL: [Category; 8] = [
        Category::Demographics,
        Category::Beliefs,
        Category::Lifestyle,
        Category::Career,
        Category::Media,
        Category::Technology,
        Category::Buying,
        Category::Psychographics,
    ];

    /// Identifier stored in the `category` column
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Demographics => "demographics",
            Category::Beliefs => "beliefs",
            Category::Lifestyle => "lifestyle",
            Category::Career => "career",
            Category::Media => "media",
            Category::Technology => "technology",
            Category::Buying => "buying",
            Category::Psychographics => "psychographics",
        }
    }

    /// Human readable step title
    pub fn label(&self) -> &'static str {
        match self {
            Category::Demographics => "Demographics",
            Category::Beliefs => "Beliefs & Values",
            Category::Lifestyle => "Lifestyle",
            Category::Career => "Career & Education",
            Category::Media => "Media Consumption",
            Category::Technology => "Technology",
            Category::Buying => "Buying Behavior",
            Category::Psychographics => "Personality",
        }
    }

    /// Position in the wizard sequence
    pub fn index(&self) -> usize {
        Category::ALL
            .iter()
            .position(|c| c == self)
            .unwrap_or_default()
    }

    /// Questions belonging to this category, in display order
    pub fn questions(&self) -> &'static [Question] {
        questions_by_category(*self)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Category::ALL
            .iter()
            .copied()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| Error::InvalidInput(format!("Unknown category: {}", s)))
    }
}

/// Answer input type of a question
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestionType {
    Text,
    Number,
    Date,
    Textarea,
    Select,
    Multiselect,
    Scale,
}

/// A single questionnaire question
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Question {
    pub id: &'static str,
    #[serde(rename = "type")]
    pub kind: QuestionType,
    pub label: &'static str,
    pub required: bool,
    #[serde(skip_serializing_if = "no_options")]
    pub options: &'static [&'static str],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scale: Option<(i64, i64)>,
}

fn no_options(options: &&'static [&'static str]) -> bool {
    options.is_empty()
}

impl Question {
    pub(crate) const fn new(
        id: &'static str,
        kind: QuestionType,
        label: &'static str,
        required: bool,
    ) -> Self {
        Self {
            id,
            kind,
            label,
            required,
            options: &[],
            scale: None,
        }
    }

    pub(crate) const fn choice(
        id: &'static str,
        kind: QuestionType,
        label: &'static str,
        required: bool,
        options: &'static [&'static str],
    ) -> Self {
        Self {
            id,
            kind,
            label,
            required,
            options,
            scale: None,
        }
    }

    pub(crate) const fn scale(
        id: &'static str,
        label: &'static str,
        required: bool,
        min: i64,
        max: i64,
    ) -> Self {
        Self {
            id,
            kind: QuestionType::Scale,
            label,
            required,
            options: &[],
            scale: Some((min, max)),
        }
    }

    /// Check that an answer has the shape this question expects
    ///
    /// `null` is always accepted and means "cleared".
    pub fn validate_answer(&self, answer: &Value) -> Result<()> {
        if answer.is_null() {
            return Ok(());
        }

        let invalid = |reason: &str| {
            Err(Error::InvalidInput(format!(
                "Invalid answer for '{}': {}",
                self.id, reason
            )))
        };

        match self.kind {
            QuestionType::Text | QuestionType::Textarea => {
                let limit = if self.kind == QuestionType::Text {
                    MAX_TEXT_LEN
                } else {
                    MAX_TEXTAREA_LEN
                };
                match answer.as_str() {
                    Some(s) if s.chars().count() <= limit => Ok(()),
                    Some(_) => invalid(&format!("longer than {} characters", limit)),
                    None => invalid("expected a string"),
                }
            }
            QuestionType::Number => match answer.as_f64() {
                Some(n) if n.is_finite() && n >= 0.0 => Ok(()),
                Some(_) => invalid("expected a non-negative number"),
                None => invalid("expected a number"),
            },
            QuestionType::Date => match answer.as_str().and_then(crate::time::parse_date) {
                Some(_) => Ok(()),
                None => invalid("expected a date formatted YYYY-MM-DD"),
            },
            QuestionType::Select => match answer.as_str() {
                Some(s) if self.options.contains(&s) => Ok(()),
                Some(s) => invalid(&format!("'{}' is not one of the options", s)),
                None => invalid("expected one option"),
            },
            QuestionType::Multiselect => {
                let Some(items) = answer.as_array() else {
                    return invalid("expected a list of options");
                };
                let mut seen = Vec::with_capacity(items.len());
                for item in items {
                    match item.as_str() {
                        Some(s) if !self.options.contains(&s) => {
                            return invalid(&format!("'{}' is not one of the options", s));
                        }
                        Some(s) if seen.contains(&s) => {
                            return invalid(&format!("'{}' selected more than once", s));
                        }
                        Some(s) => seen.push(s),
                        None => return invalid("expected a list of options"),
                    }
                }
                Ok(())
            }
            QuestionType::Scale => {
                let (min, max) = self.scale.unwrap_or((1, 10));
                match answer.as_i64() {
                    Some(n) if (min..=max).contains(&n) => Ok(()),
                    _ => invalid(&format!("expected a whole number from {} to {}", min, max)),
                }
            }
        }
    }
}

/// Questions of one category, in display order
pub fn questions_by_category(category: Category) -> &'static [Question] {
    match category {
        Category::Demographics => questions::DEMOGRAPHICS,
        Category::Beliefs => questions::BELIEFS,
        Category::Lifestyle => questions::LIFESTYLE,
        Category::Career => questions::CAREER,
        Category::Media => questions::MEDIA,
        Category::Technology => questions::TECHNOLOGY,
        Category::Buying => questions::BUYING,
        Category::Psychographics => questions::PSYCHOGRAPHICS,
    }
}

/// Every question in the catalog paired with its category, in wizard order
pub fn all_questions() -> Vec<(Category, &'static Question)> {
    Category::ALL
        .iter()
        .flat_map(|c| questions_by_category(*c).iter().map(move |q| (*c, q)))
        .collect()
}

/// Total number of questions across all categories
pub fn total_question_count() -> usize {
    Category::ALL
        .iter()
        .map(|c| questions_by_category(*c).len())
        .sum()
}

/// Required questions of one category
pub fn required_questions(category: Category) -> impl Iterator<Item = &'static Question> {
    questions_by_category(category).iter().filter(|q| q.required)
}

/// Ids of the required questions across [`SETUP_CATEGORIES`]
pub fn setup_required_ids() -> Vec<&'static str> {
    SETUP_CATEGORIES
        .iter()
        .flat_map(|c| required_questions(*c).map(|q| q.id))
        .collect()
}

/// Look a question up by id anywhere in the catalog
pub fn find_question(question_id: &str) -> Option<(Category, &'static Question)> {
    Category::ALL.iter().find_map(|c| {
        questions_by_category(*c)
            .iter()
            .find(|q| q.id == question_id)
            .map(|q| (*c, q))
    })
}

/// Resolve a `(category, question_id)` pair and validate the answer against it
///
/// Rejects unknown questions, questions filed under a category that does not
/// own them, and answers of the wrong shape.
pub fn validate_entry(
    category: Category,
    question_id: &str,
    answer: &Value,
) -> Result<&'static Question> {
    let (owner, question) = find_question(question_id)
        .ok_or_else(|| Error::InvalidInput(format!("Unknown question: {}", question_id)))?;

    if owner != category {
        return Err(Error::InvalidInput(format!(
            "Question '{}' belongs to '{}', not '{}'",
            question_id, owner, category
        )));
    }

    question.validate_answer(answer)?;
    Ok(question)
}

/// Characters a blank answer may consist of
///
/// Kept to what SQLite's `trim(x, chars)` can be given, so the completion query
/// and [`is_answered`] agree.
pub const BLANK_CHARS: [char; 4] = [' ', '\t', '\n', '\r'];

/// Whether a stored answer counts as answered
///
/// `null`, blank strings and empty arrays do not.
pub fn is_answered(answer: &Value) -> bool {
    match answer {
        Value::Null => false,
        Value::String(s) => !s.trim_matches(&BLANK_CHARS[..]).is_empty(),
        Value::Array(items) => !items.is_empty(),
        _ => true,
    }
}

/// Required questions of `category` that have no answer according to `lookup`
pub fn missing_required<'a, F>(category: Category, lookup: F) -> Vec<String>
where
    F: Fn(&str) -> Option<&'a Value>,
{
    required_questions(category)
        .filter(|q| !lookup(q.id).map(is_answered).unwrap_or(false))
        .map(|q| q.id.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashSet;

    #[test]
    fn test_question_ids_are_unique_across_catalog() {
        let mut seen = HashSet::new();
        for (_, q) in all_questions() {
            assert!(seen.insert(q.id), "duplicate question id: {}", q.id);
        }
        assert_eq!(seen.len(), total_question_count());
    }

    #[test]
    fn test_every_category_has_questions() {
        for category in Category::ALL {
            assert!(!category.questions().is_empty(), "{} is empty", category);
        }
    }

    #[test]
    fn test_choice_questions_carry_options_and_scales_carry_range() {
        for (_, q) in all_questions() {
            match q.kind {
                QuestionType::Select | QuestionType::Multiselect => {
                    assert!(!q.options.is_empty(), "{} has no options", q.id)
                }
                QuestionType::Scale => {
                    let (min, max) = q.scale.expect("scale range");
                    assert!(min < max, "{} has an empty range", q.id);
                }
                _ => assert!(q.options.is_empty() && q.scale.is_none()),
            }
        }
    }

    #[test]
    fn test_demographics_required_set() {
        let required: Vec<_> = required_questions(Category::Demographics)
            .map(|q| q.id)
            .collect();
        assert_eq!(
            required,
            vec!["age", "gender", "dateOfBirth", "country", "state", "city"]
        );
        assert_eq!(setup_required_ids(), required);
    }

    #[test]
    fn test_category_order_and_parse() {
        assert_eq!(Category::ALL[0], Category::Demographics);
        assert_eq!(Category::Psychographics.index(), 7);
        assert_eq!("media".parse::<Category>().unwrap(), Category::Media);
        assert!("sports".parse::<Category>().is_err());
        assert!(Category::Demographics < Category::Beliefs);
    }

    #[test]
    fn test_find_question() {
        let (category, q) = find_question("dateOfBirth").unwrap();
        assert_eq!(category, Category::Demographics);
        assert_eq!(q.kind, QuestionType::Date);
        assert!(find_question("shoeSize").is_none());
    }

    #[test]
    fn test_validate_entry_rejects_wrong_category() {
        let err = validate_entry(Category::Media, "age", &json!(30)).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn test_validate_answer_shapes() {
        let (_, age) = find_question("age").unwrap();
        assert!(age.validate_answer(&json!(30)).is_ok());
        assert!(age.validate_answer(&json!("thirty")).is_err());
        assert!(age.validate_answer(&json!(-1)).is_err());

        let (_, gender) = find_question("gender").unwrap();
        assert!(gender.validate_answer(&json!("Male")).is_ok());
        assert!(gender.validate_answer(&json!("Robot")).is_err());

        let (_, dob) = find_question("dateOfBirth").unwrap();
        assert!(dob.validate_answer(&json!("1994-01-01")).is_ok());
        assert!(dob.validate_answer(&json!("Jan 1 1994")).is_err());

        let (_, hobbies) = find_question("hobbies").unwrap();
        assert!(hobbies.validate_answer(&json!(["Reading", "Gaming"])).is_ok());
        assert!(hobbies.validate_answer(&json!(["Reading", "Reading"])).is_err());
        assert!(hobbies.validate_answer(&json!("Reading")).is_err());

        let (_, scale) = find_question("priceSensitivity").unwrap();
        assert!(scale.validate_answer(&json!(5)).is_ok());
        assert!(scale.validate_answer(&json!(11)).is_err());
        assert!(scale.validate_answer(&json!(2.5)).is_err());

        // Cleared answers are always acceptable
        assert!(age.validate_answer(&Value::Null).is_ok());
    }

    #[test]
    fn test_is_answered() {
        assert!(!is_answered(&Value::Null));
        assert!(!is_answered(&json!("   ")));
        assert!(!is_answered(&json!(" \t\r\n")));
        assert!(is_answered(&json!("\u{a0}")));
        assert!(!is_answered(&json!([])));
        assert!(is_answered(&json!(0)));
        assert!(is_answered(&json!(false)));
        assert!(is_answered(&json!(["News"])));
    }

    #[test]
    fn test_missing_required_uses_lookup() {
        let age = json!(30);
        let missing = missing_required(Category::Demographics, |id| {
            (id == "age").then_some(&age)
        });
        assert_eq!(missing, vec!["gender", "dateOfBirth", "country", "state", "city"]);
    }

    #[test]
    fn test_question_serializes_type_and_skips_empty_metadata() {
        let (_, city) = find_question("city").unwrap();
        let value = serde_json::to_value(city).unwrap();
        assert_eq!(value["type"], "text");
        assert!(value.get("options").is_none());
        assert!(value.get("scale").is_none());

        let (_, scale) = find_question("priceSensitivity").unwrap();
        let value = serde_json::to_value(scale).unwrap();
        assert_eq!(value["scale"], json!([1, 10]));
    }
}
