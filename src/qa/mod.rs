//! QA review workflow.
//!
//! Every question has at most one QA record, created lazily the first
//! time review state is touched. Status changes move through an
//! explicit transition table and each change is appended to the
//! qa_history audit trail; a question with no record behaves as
//! `pending`.

use anyhow::Result;
use serde::Deserialize;
use thiserror::Error;

use uuid::Uuid;

use crate::db::models::{Priority, QaHistoryEntry, QaRecord, QaStatus};
use crate::db::{now_timestamp, Database};

#[derive(Debug, Error)]
pub enum QaError {
    #[error("Question not found: {0}")]
    QuestionNotFound(String),
    #[error("Invalid QA transition: {from} -> {to}")]
    InvalidTransition { from: QaStatus, to: QaStatus },
    #[error("Transition to {0} requires a reviewer_id")]
    ReviewerRequired(QaStatus),
    #[error("{field} must be between 1 and 5, got {value}")]
    RatingOutOfRange { field: &'static str, value: i64 },
}

/// Allowed status transitions. Staying in the current state is always
/// permitted (rating-only updates).
pub fn can_transition(from: QaStatus, to: QaStatus) -> bool {
    use QaStatus::*;
    if from == to {
        return true;
    }
    matches!(
        (from, to),
        (Pending, InReview)
            | (Pending, Approved)
            | (Pending, Rejected)
            | (InReview, NeedsRevision)
            | (InReview, Approved)
            | (InReview, Rejected)
            | (NeedsRevision, InReview)
            | (Approved, Archived)
            | (Rejected, Archived)
    )
}

/// Fields a reviewer may change in one update. Absent fields are left
/// untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct QaUpdate {
    pub qa_status: Option<QaStatus>,
    pub reviewer_id: Option<String>,
    pub review_notes: Option<String>,
    pub content_accuracy: Option<i64>,
    pub difficulty_appropriateness: Option<i64>,
    pub clarity_rating: Option<i64>,
    pub solution_quality: Option<i64>,
    pub revision_notes: Option<String>,
    pub is_flagged: Option<bool>,
    pub flag_reason: Option<String>,
    pub priority_level: Option<Priority>,
    pub qa_tags: Option<Vec<String>>,
}

fn mean_rating(rec: &QaRecord) -> Option<f64> {
    let ratings: Vec<i64> = [
        rec.content_accuracy,
        rec.difficulty_appropriateness,
        rec.clarity_rating,
        rec.solution_quality,
    ]
    .into_iter()
    .flatten()
    .collect();
    if ratings.is_empty() {
        return None;
    }
    Some(ratings.iter().sum::<i64>() as f64 / ratings.len() as f64)
}

fn validate_ratings(update: &QaUpdate) -> Result<(), QaError> {
    let fields = [
        ("content_accuracy", update.content_accuracy),
        (
            "difficulty_appropriateness",
            update.difficulty_appropriateness,
        ),
        ("clarity_rating", update.clarity_rating),
        ("solution_quality", update.solution_quality),
    ];
    for (field, value) in fields {
        if let Some(value) = value {
            if !(1..=5).contains(&value) {
                return Err(QaError::RatingOutOfRange { field, value });
            }
        }
    }
    Ok(())
}

/// Apply a reviewer's update to a question's QA record, creating the
/// record if this is the first touch. Returns the stored record.
pub fn apply_update(
    db: &Database,
    question_id: &str,
    update: &QaUpdate,
) -> Result<Result<QaRecord, QaError>> {
    if db.get_question(question_id)?.is_none() {
        return Ok(Err(QaError::QuestionNotFound(question_id.to_string())));
    }
    if let Err(e) = validate_ratings(update) {
        return Ok(Err(e));
    }

    let mut rec = db.ensure_qa(question_id)?;
    let from = rec.qa_status;
    let to = update.qa_status.unwrap_or(from);

    if !can_transition(from, to) {
        return Ok(Err(QaError::InvalidTransition { from, to }));
    }

    if let Some(ref r) = update.reviewer_id {
        rec.reviewer_id = Some(r.clone());
    }
    if matches!(to, QaStatus::InReview | QaStatus::Approved)
        && to != from
        && rec.reviewer_id.is_none()
    {
        return Ok(Err(QaError::ReviewerRequired(to)));
    }

    let now = now_timestamp();
    if to != from {
        match to {
            QaStatus::NeedsRevision => {
                rec.revision_count += 1;
                rec.last_revision_date = Some(now.clone());
            }
            QaStatus::InReview | QaStatus::Approved | QaStatus::Rejected => {
                rec.review_date = Some(now.clone());
            }
            _ => {}
        }
    }
    rec.qa_status = to;

    if let Some(v) = update.content_accuracy {
        rec.content_accuracy = Some(v);
    }
    if let Some(v) = update.difficulty_appropriateness {
        rec.difficulty_appropriateness = Some(v);
    }
    if let Some(v) = update.clarity_rating {
        rec.clarity_rating = Some(v);
    }
    if let Some(v) = update.solution_quality {
        rec.solution_quality = Some(v);
    }
    if let Some(ref n) = update.review_notes {
        rec.review_notes = Some(n.clone());
    }
    if let Some(ref n) = update.revision_notes {
        rec.revision_notes = Some(n.clone());
    }
    if let Some(f) = update.is_flagged {
        rec.is_flagged = f;
    }
    if let Some(ref r) = update.flag_reason {
        rec.flag_reason = Some(r.clone());
    }
    if let Some(p) = update.priority_level {
        rec.priority_level = p;
    }
    if let Some(ref t) = update.qa_tags {
        rec.qa_tags = t.clone();
    }

    rec.overall_rating = mean_rating(&rec);
    rec.updated_at = now.clone();

    db.save_qa(&rec)?;
    if to != from {
        db.insert_qa_history(&QaHistoryEntry {
            id: Uuid::new_v4().to_string(),
            question_id: question_id.to_string(),
            action: "status_change".into(),
            old_value: Some(from.as_str().to_string()),
            new_value: Some(to.as_str().to_string()),
            action_by: rec.reviewer_id.clone(),
            action_reason: update.review_notes.clone(),
            created_at: now,
        })?;
    }
    Ok(Ok(rec))
}
