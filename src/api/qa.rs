use std::collections::HashMap;

use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::db::models::{Priority, QaHistoryEntry, QaRecord, QaStatus, Question};
use crate::qa::{apply_update, QaUpdate};

use super::error::ApiError;
use super::questions::pagination;
use super::AppState;

/// QA record joined with the question under review.
#[derive(Serialize)]
pub struct QaDetail {
    #[serde(flatten)]
    pub record: QaRecord,
    pub question: Option<Question>,
}

#[derive(Serialize)]
pub struct QaPage {
    pub records: Vec<QaDetail>,
    pub total: i64,
    pub page: usize,
    pub limit: usize,
}

/// GET /api/qa
///
/// With `question_id` returns that question's record (creating nothing);
/// otherwise lists records filtered by status/priority/flagged.
pub async fn list(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<QaPage>, ApiError> {
    let db = state.db.lock().await;

    if let Some(qid) = params.get("question_id") {
        let question = db.get_question(qid)?;
        if question.is_none() {
            return Err(ApiError::NotFound(format!("Question not found: {qid}")));
        }
        let records: Vec<QaDetail> = db
            .get_qa(qid)?
            .into_iter()
            .map(|record| QaDetail {
                record,
                question: question.clone(),
            })
            .collect();
        let total = records.len() as i64;
        return Ok(Json(QaPage {
            records,
            total,
            page: 1,
            limit: 1,
        }));
    }

    let status = match params.get("qa_status").map(String::as_str) {
        None | Some("") | Some("any") => None,
        Some(s) => Some(
            QaStatus::parse(s)
                .ok_or_else(|| ApiError::BadRequest(format!("unknown status '{s}'")))?,
        ),
    };
    let priority = match params.get("priority_level").map(String::as_str) {
        None | Some("") | Some("any") => None,
        Some(s) => Some(
            Priority::parse(s)
                .ok_or_else(|| ApiError::BadRequest(format!("unknown priority '{s}'")))?,
        ),
    };
    let flagged = match params.get("is_flagged").map(String::as_str) {
        None | Some("") | Some("any") => None,
        Some("true") => Some(true),
        Some("false") => Some(false),
        Some(other) => {
            return Err(ApiError::BadRequest(format!(
                "is_flagged expects true or false, got '{other}'"
            )))
        }
    };

    let (page, limit) = pagination(&params);
    let offset = page.saturating_sub(1).saturating_mul(limit);
    let (rows, total) = db.list_qa(status, priority, flagged, limit, offset)?;
    let mut records = Vec::with_capacity(rows.len());
    for record in rows {
        let question = db.get_question(&record.question_id)?;
        records.push(QaDetail { record, question });
    }
    Ok(Json(QaPage {
        records,
        total,
        page,
        limit,
    }))
}

#[derive(Serialize)]
pub struct QaHistoryPage {
    pub history: Vec<QaHistoryEntry>,
}

/// GET /api/qa/history
///
/// Status-change audit trail, newest first, optionally narrowed by
/// `question_id` and `action`.
pub async fn history(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<QaHistoryPage>, ApiError> {
    let db = state.db.lock().await;
    let history = db.list_qa_history(
        params.get("question_id").map(String::as_str),
        params.get("action").map(String::as_str),
    )?;
    Ok(Json(QaHistoryPage { history }))
}

#[derive(Deserialize)]
pub struct QaUpsertBody {
    pub question_id: String,
    #[serde(flatten)]
    pub update: QaUpdate,
}

/// POST /api/qa
///
/// Idempotent upsert: creates the question's QA record on first touch,
/// then applies the status change and ratings through the workflow
/// rules.
pub async fn upsert(
    State(state): State<AppState>,
    Json(body): Json<QaUpsertBody>,
) -> Result<Json<QaRecord>, ApiError> {
    let db = state.db.lock().await;
    let rec = apply_update(&db, &body.question_id, &body.update)?.map_err(ApiError::from)?;
    Ok(Json(rec))
}
