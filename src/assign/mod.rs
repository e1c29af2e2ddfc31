//! Question assignments.
//!
//! Single assignments are created directly; bulk assignment selects
//! questions through the same compiled filter predicates used for
//! listing, so a preview count and a subsequent commit see the same
//! rows (modulo concurrent writes).

use anyhow::Result;
use serde::Deserialize;
use thiserror::Error;
use uuid::Uuid;

use crate::db::models::{Assignment, AssignmentStatus, AssignmentType, Priority};
use crate::db::{now_timestamp, Database};
use crate::filter::{compile_selection, FilterCondition, FilterError, LegacyFilters};

pub const DEFAULT_MAX_QUESTIONS: usize = 100;

#[derive(Debug, Error)]
pub enum AssignError {
    #[error("assigned_to is required")]
    MissingAssignee,
    #[error("Unknown assignee: {0}")]
    UnknownAssignee(String),
    #[error("Question not found: {0}")]
    QuestionNotFound(String),
    #[error("Question is already assigned to this user for {0}")]
    Duplicate(AssignmentType),
    #[error("Invalid assignment transition: {from} -> {to}")]
    InvalidTransition {
        from: AssignmentStatus,
        to: AssignmentStatus,
    },
    #[error(transparent)]
    Filter(#[from] FilterError),
}

/// Lifecycle: assigned -> in_progress -> completed | rejected.
pub fn can_transition(from: AssignmentStatus, to: AssignmentStatus) -> bool {
    use AssignmentStatus::*;
    matches!(
        (from, to),
        (Assigned, InProgress) | (InProgress, Completed) | (InProgress, Rejected)
    )
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewAssignment {
    pub question_id: String,
    pub assigned_to: String,
    #[serde(default)]
    pub assigned_by: Option<String>,
    #[serde(default)]
    pub assignment_type: AssignmentType,
    #[serde(default)]
    pub priority: Priority,
    pub due_date: Option<String>,
    pub notes: Option<String>,
}

/// Bulk request body. Exactly one of `filters` / `advanced_filters`
/// drives selection; when both are present the advanced conditions win.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BulkAssignRequest {
    pub assigned_to: Option<String>,
    #[serde(default)]
    pub assigned_by: Option<String>,
    #[serde(default)]
    pub assignment_type: AssignmentType,
    #[serde(default)]
    pub priority: Priority,
    pub due_date: Option<String>,
    pub notes: Option<String>,
    #[serde(default)]
    pub filters: Option<LegacyFilters>,
    #[serde(default)]
    pub advanced_filters: Option<Vec<FilterCondition>>,
    pub max_questions: Option<usize>,
    #[serde(default)]
    pub preview: bool,
}

#[derive(Debug)]
pub enum BulkOutcome {
    Preview { count: usize },
    Committed { assignments: Vec<Assignment> },
}

pub fn create_assignment(
    db: &Database,
    req: &NewAssignment,
) -> Result<Result<Assignment, AssignError>> {
    if req.assigned_to.trim().is_empty() {
        return Ok(Err(AssignError::MissingAssignee));
    }
    if db.get_question(&req.question_id)?.is_none() {
        return Ok(Err(AssignError::QuestionNotFound(req.question_id.clone())));
    }
    if db.assignment_exists(&req.question_id, &req.assigned_to, req.assignment_type)? {
        return Ok(Err(AssignError::Duplicate(req.assignment_type)));
    }

    let now = now_timestamp();
    let a = Assignment {
        id: Uuid::new_v4().to_string(),
        question_id: req.question_id.clone(),
        assigned_to: req.assigned_to.clone(),
        assigned_by: req.assigned_by.clone().unwrap_or_else(|| "system".into()),
        assignment_type: req.assignment_type,
        priority: req.priority,
        due_date: req.due_date.clone(),
        notes: req.notes.clone(),
        status: AssignmentStatus::Assigned,
        created_at: now.clone(),
        updated_at: now,
    };
    db.insert_assignments(std::slice::from_ref(&a))?;
    Ok(Ok(a))
}

/// Run a bulk assignment. Preview and commit both resolve the question
/// set with `select_question_ids`, excluding questions the assignee
/// already holds an assignment of the same type for, whatever its
/// status, so a commit never collides with an existing row.
pub fn bulk_assign(
    db: &Database,
    req: &BulkAssignRequest,
) -> Result<Result<BulkOutcome, AssignError>> {
    let Some(ref assigned_to) = req.assigned_to else {
        return Ok(Err(AssignError::MissingAssignee));
    };
    if assigned_to.trim().is_empty() {
        return Ok(Err(AssignError::MissingAssignee));
    }
    if db.get_profile(assigned_to)?.is_none() {
        return Ok(Err(AssignError::UnknownAssignee(assigned_to.clone())));
    }

    let predicates = match compile_selection(req.filters.as_ref(), req.advanced_filters.as_deref())
    {
        Ok(p) => p,
        Err(e) => return Ok(Err(e.into())),
    };
    let cap = req.max_questions.unwrap_or(DEFAULT_MAX_QUESTIONS);
    let ids = db.select_question_ids(
        &predicates,
        Some((assigned_to.as_str(), req.assignment_type)),
        cap,
    )?;

    if req.preview {
        return Ok(Ok(BulkOutcome::Preview { count: ids.len() }));
    }

    let now = now_timestamp();
    let rows: Vec<Assignment> = ids
        .iter()
        .map(|qid| Assignment {
            id: Uuid::new_v4().to_string(),
            question_id: qid.clone(),
            assigned_to: assigned_to.clone(),
            assigned_by: req.assigned_by.clone().unwrap_or_else(|| "system".into()),
            assignment_type: req.assignment_type,
            priority: req.priority,
            due_date: req.due_date.clone(),
            notes: req.notes.clone(),
            status: AssignmentStatus::Assigned,
            created_at: now.clone(),
            updated_at: now.clone(),
        })
        .collect();
    db.insert_assignments(&rows)?;
    Ok(Ok(BulkOutcome::Committed { assignments: rows }))
}

/// Move an assignment through its lifecycle.
pub fn set_status(
    db: &Database,
    id: &str,
    to: AssignmentStatus,
    notes: Option<&str>,
) -> Result<Result<Option<Assignment>, AssignError>> {
    let Some(current) = db.get_assignment(id)? else {
        return Ok(Ok(None));
    };
    if !can_transition(current.status, to) {
        return Ok(Err(AssignError::InvalidTransition {
            from: current.status,
            to,
        }));
    }
    Ok(Ok(db.set_assignment_status(id, to, notes)?))
}
