//! Question catalog endpoints

use axum::{extract::Path, routing::get, Json, Router};
use fgm_common::catalog::{self, Category, Question};
use serde::Serialize;

use crate::error::ApiResult;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct CategoryQuestions {
    pub category: Category,
    pub label: &'static str,
    pub questions: &'static [Question],
}

impl From<Category> for CategoryQuestions {
    fn from(category: Category) -> Self {
        Self {
            category,
            label: category.label(),
            questions: catalog::questions_by_category(category),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CatalogResponse {
    pub total_questions: usize,
    pub categories: Vec<CategoryQuestions>,
}

/// GET /api/questions
pub async fn get_catalog() -> Json<CatalogResponse> {
    Json(CatalogResponse {
        total_questions: catalog::total_question_count(),
        categories: Category::ALL.into_iter().map(CategoryQuestions::from).collect(),
    })
}

/// GET /api/questions/:category
pub async fn get_category(Path(category): Path<String>) -> ApiResult<Json<CategoryQuestions>> {
    let category: Category = category.parse()?;
    Ok(Json(category.into()))
}

pub fn question_routes() -> Router<AppState> {
    Router::new()
        .route("/api/questions", get(get_catalog))
        .route("/api/questions/:category", get(get_category))
}
