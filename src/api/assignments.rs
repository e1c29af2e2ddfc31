use std::collections::HashMap;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::assign::{self, BulkAssignRequest, BulkOutcome, NewAssignment};
use crate::db::models::{Assignment, AssignmentStatus, AssignmentType, Profile, Question};

use super::error::ApiError;
use super::questions::pagination;
use super::AppState;

/// Assignment joined with the question it covers and the profiles on
/// both ends, the shape the work-queue UI consumes.
#[derive(Serialize)]
pub struct AssignmentDetail {
    #[serde(flatten)]
    pub assignment: Assignment,
    pub question: Option<Question>,
    pub assignee: Option<Profile>,
    pub assigner: Option<Profile>,
}

#[derive(Serialize)]
pub struct AssignmentPage {
    pub assignments: Vec<AssignmentDetail>,
    pub total: i64,
    pub page: usize,
    pub limit: usize,
}

/// GET /api/question-assignments
pub async fn list(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<AssignmentPage>, ApiError> {
    let (page, limit) = pagination(&params);
    let status = match params.get("status").map(String::as_str) {
        None | Some("") | Some("any") => None,
        Some(s) => Some(
            AssignmentStatus::parse(s)
                .ok_or_else(|| ApiError::BadRequest(format!("unknown status '{s}'")))?,
        ),
    };
    let ty = match params.get("assignment_type").map(String::as_str) {
        None | Some("") | Some("any") => None,
        Some(s) => Some(
            AssignmentType::parse(s)
                .ok_or_else(|| ApiError::BadRequest(format!("unknown assignment type '{s}'")))?,
        ),
    };

    let db = state.db.lock().await;
    let (rows, total) = db.list_assignments(
        params.get("assigned_to").map(String::as_str),
        params.get("question_id").map(String::as_str),
        status,
        ty,
        limit,
        page.saturating_sub(1).saturating_mul(limit),
    )?;

    let mut assignments = Vec::with_capacity(rows.len());
    for assignment in rows {
        let question = db.get_question(&assignment.question_id)?;
        let assignee = db.get_profile(&assignment.assigned_to)?;
        let assigner = db.get_profile(&assignment.assigned_by)?;
        assignments.push(AssignmentDetail {
            assignment,
            question,
            assignee,
            assigner,
        });
    }

    Ok(Json(AssignmentPage {
        assignments,
        total,
        page,
        limit,
    }))
}

/// POST /api/question-assignments
pub async fn create(
    State(state): State<AppState>,
    Json(body): Json<NewAssignment>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.db.lock().await;
    let a = assign::create_assignment(&db, &body)?.map_err(ApiError::from)?;
    Ok((StatusCode::CREATED, Json(a)))
}

#[derive(Deserialize)]
pub struct StatusChange {
    pub status: AssignmentStatus,
    pub notes: Option<String>,
}

/// PUT /api/question-assignments/:id
pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<StatusChange>,
) -> Result<Json<Assignment>, ApiError> {
    let db = state.db.lock().await;
    let updated = assign::set_status(&db, &id, body.status, body.notes.as_deref())?
        .map_err(ApiError::from)?
        .ok_or_else(|| ApiError::NotFound(format!("Assignment not found: {id}")))?;
    Ok(Json(updated))
}

/// DELETE /api/question-assignments/:id
pub async fn delete(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let db = state.db.lock().await;
    if !db.delete_assignment(&id)? {
        return Err(ApiError::NotFound(format!("Assignment not found: {id}")));
    }
    Ok(Json(json!({ "deleted": id })))
}

/// POST /api/question-assignments/bulk
///
/// With `"preview": true` the body only resolves the candidate count;
/// a commit inserts the assignments. Both paths run the same question
/// selection.
pub async fn bulk(
    State(state): State<AppState>,
    Json(body): Json<BulkAssignRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.db.lock().await;
    match assign::bulk_assign(&db, &body)?.map_err(ApiError::from)? {
        BulkOutcome::Preview { count } => Ok((
            StatusCode::OK,
            Json(json!({
                "preview": true,
                "count": count,
                "message": format!("{count} question(s) would be assigned"),
            })),
        )),
        BulkOutcome::Committed { assignments } => {
            let assigned_count = assignments.len();
            Ok((
                StatusCode::CREATED,
                Json(json!({
                    "preview": false,
                    "assigned_count": assigned_count,
                    "message": format!("Assigned {assigned_count} question(s)"),
                    "assignments": assignments,
                })),
            ))
        }
    }
}
