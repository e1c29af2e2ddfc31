use std::collections::HashMap;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Serialize;
use serde_json::json;

use crate::db::models::{FacetValues, NewQuestion, QaRecord, Question, QuestionPatch};
use crate::db::UpdateOutcome;
use crate::filter::{compile_selection, FilterCondition, LegacyFilters};

use super::error::ApiError;
use super::AppState;

pub const DEFAULT_PAGE_SIZE: usize = 10;
pub const MAX_PAGE_SIZE: usize = 100;

/// page/limit from raw query params. Out-of-range or unparseable
/// values fall back to defaults rather than erroring.
pub fn pagination(params: &HashMap<String, String>) -> (usize, usize) {
    let page = params
        .get("page")
        .and_then(|v| v.parse::<usize>().ok())
        .filter(|&p| p >= 1)
        .unwrap_or(1);
    let limit = params
        .get("limit")
        .and_then(|v| v.parse::<usize>().ok())
        .map(|l| l.clamp(1, MAX_PAGE_SIZE))
        .unwrap_or(DEFAULT_PAGE_SIZE);
    (page, limit)
}

fn advanced_from_params(
    params: &HashMap<String, String>,
) -> Result<Option<Vec<FilterCondition>>, ApiError> {
    let Some(raw) = params.get("advanced_filters") else {
        return Ok(None);
    };
    let conds: Vec<FilterCondition> = serde_json::from_str(raw)
        .map_err(|e| ApiError::BadRequest(format!("malformed advanced_filters: {e}")))?;
    Ok(Some(conds))
}

/// A question plus its QA record (zero or one entry), the join shape
/// list consumers expect.
#[derive(Serialize)]
pub struct QuestionWithQa {
    #[serde(flatten)]
    pub question: Question,
    pub qa_questions: Vec<QaRecord>,
}

#[derive(Serialize)]
pub struct QuestionPage {
    pub questions: Vec<QuestionWithQa>,
    pub total: i64,
    #[serde(rename = "totalQuestions")]
    pub total_questions: i64,
    pub page: usize,
    pub limit: usize,
    #[serde(rename = "totalPages")]
    pub total_pages: usize,
}

/// GET /api/question-bank
pub async fn list(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<QuestionPage>, ApiError> {
    let (page, limit) = pagination(&params);
    let advanced = advanced_from_params(&params)?;
    let legacy = LegacyFilters::from_query(&params);
    let predicates = compile_selection(Some(&legacy), advanced.as_deref())?;

    let db = state.db.lock().await;
    let total = db.count_questions(&predicates)?;
    let total_questions = db.total_questions()?;
    let offset = page.saturating_sub(1).saturating_mul(limit);
    let rows = db.list_questions(&predicates, limit, offset)?;

    let mut questions = Vec::with_capacity(rows.len());
    for question in rows {
        let qa_questions = db.get_qa(&question.id)?.into_iter().collect();
        questions.push(QuestionWithQa {
            question,
            qa_questions,
        });
    }

    let total_pages = (total as usize).div_ceil(limit);
    Ok(Json(QuestionPage {
        questions,
        total,
        total_questions,
        page,
        limit,
        total_pages,
    }))
}

/// POST /api/question-bank
pub async fn create(
    State(state): State<AppState>,
    Json(body): Json<NewQuestion>,
) -> Result<impl IntoResponse, ApiError> {
    if body.question_text.trim().is_empty() {
        return Err(ApiError::BadRequest("question_text is required".into()));
    }
    if let Some(d) = body.difficulty {
        if !(1..=10).contains(&d) {
            return Err(ApiError::BadRequest(
                "difficulty must be between 1 and 10".into(),
            ));
        }
    }
    let db = state.db.lock().await;
    let question = db.insert_question(&body)?;
    Ok((StatusCode::CREATED, Json(question)))
}

/// GET /api/question-bank/:id
pub async fn show(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<QuestionWithQa>, ApiError> {
    let db = state.db.lock().await;
    let question = db
        .get_question(&id)?
        .ok_or_else(|| ApiError::NotFound(format!("Question not found: {id}")))?;
    let qa_questions = db.get_qa(&id)?.into_iter().collect();
    Ok(Json(QuestionWithQa {
        question,
        qa_questions,
    }))
}

/// PUT /api/question-bank/:id
pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(patch): Json<QuestionPatch>,
) -> Result<Json<Question>, ApiError> {
    if let Some(d) = patch.difficulty {
        if !(1..=10).contains(&d) {
            return Err(ApiError::BadRequest(
                "difficulty must be between 1 and 10".into(),
            ));
        }
    }
    let db = state.db.lock().await;
    match db.update_question(&id, &patch)? {
        UpdateOutcome::NotFound => Err(ApiError::NotFound(format!("Question not found: {id}"))),
        UpdateOutcome::Stale => Err(ApiError::Conflict(
            "Question was modified by another request".into(),
        )),
        UpdateOutcome::Updated(q) => Ok(Json(q)),
    }
}

/// DELETE /api/question-bank/:id (soft delete)
pub async fn delete(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let db = state.db.lock().await;
    if !db.soft_delete_question(&id)? {
        return Err(ApiError::NotFound(format!("Question not found: {id}")));
    }
    Ok(Json(json!({ "deleted": id })))
}

/// GET /api/question-bank/filters
pub async fn facets(State(state): State<AppState>) -> Result<Json<FacetValues>, ApiError> {
    let db = state.db.lock().await;
    Ok(Json(db.facets()?))
}
