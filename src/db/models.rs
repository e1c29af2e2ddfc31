use serde::{Deserialize, Serialize};

/// Editorial review state of a question. One QA record per question;
/// the status moves through an explicit machine (see `crate::qa`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QaStatus {
    Pending,
    InReview,
    NeedsRevision,
    Approved,
    Rejected,
    Archived,
}

impl QaStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            QaStatus::Pending => "pending",
            QaStatus::InReview => "in_review",
            QaStatus::NeedsRevision => "needs_revision",
            QaStatus::Approved => "approved",
            QaStatus::Rejected => "rejected",
            QaStatus::Archived => "archived",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(QaStatus::Pending),
            "in_review" => Some(QaStatus::InReview),
            "needs_revision" => Some(QaStatus::NeedsRevision),
            "approved" => Some(QaStatus::Approved),
            "rejected" => Some(QaStatus::Rejected),
            "archived" => Some(QaStatus::Archived),
            _ => None,
        }
    }
}

impl std::fmt::Display for QaStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Medium,
    High,
    Urgent,
}

impl Default for Priority {
    fn default() -> Self {
        Priority::Medium
    }
}

impl Priority {
    pub fn as_str(self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
            Priority::Urgent => "urgent",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "low" => Some(Priority::Low),
            "medium" => Some(Priority::Medium),
            "high" => Some(Priority::High),
            "urgent" => Some(Priority::Urgent),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentType {
    Edit,
    Review,
    Approve,
}

impl Default for AssignmentType {
    fn default() -> Self {
        AssignmentType::Edit
    }
}

impl AssignmentType {
    pub fn as_str(self) -> &'static str {
        match self {
            AssignmentType::Edit => "edit",
            AssignmentType::Review => "review",
            AssignmentType::Approve => "approve",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "edit" => Some(AssignmentType::Edit),
            "review" => Some(AssignmentType::Review),
            "approve" => Some(AssignmentType::Approve),
            _ => None,
        }
    }
}

impl std::fmt::Display for AssignmentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentStatus {
    Assigned,
    InProgress,
    Completed,
    Rejected,
}

impl AssignmentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            AssignmentStatus::Assigned => "assigned",
            AssignmentStatus::InProgress => "in_progress",
            AssignmentStatus::Completed => "completed",
            AssignmentStatus::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "assigned" => Some(AssignmentStatus::Assigned),
            "in_progress" => Some(AssignmentStatus::InProgress),
            "completed" => Some(AssignmentStatus::Completed),
            "rejected" => Some(AssignmentStatus::Rejected),
            _ => None,
        }
    }
}

impl std::fmt::Display for AssignmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A question-bank row. Array-valued attributes (boards, course types,
/// levels, tags) are stored as JSON arrays in TEXT columns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    pub id: String,
    pub human_readable_id: Option<String>,
    pub question_text: String,
    pub question_type: Option<String>,
    pub subject: Option<String>,
    pub section: Option<String>,
    pub grade: Option<String>,
    pub topic: Option<String>,
    pub subtopic: Option<String>,
    pub difficulty: Option<i64>,
    pub relevance: Option<String>,
    pub total_marks: Option<f64>,
    pub boards: Vec<String>,
    pub course_types: Vec<String>,
    pub levels: Vec<String>,
    pub tags: Vec<String>,
    pub is_pyq: bool,
    pub pyq_year: Option<String>,
    pub month: Option<String>,
    pub paper_number: Option<String>,
    pub is_active: bool,
    pub created_at: String,
    pub updated_at: String,
}

/// Data needed to insert a new question (no auto-generated fields).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewQuestion {
    pub human_readable_id: Option<String>,
    pub question_text: String,
    pub question_type: Option<String>,
    pub subject: Option<String>,
    pub section: Option<String>,
    pub grade: Option<String>,
    pub topic: Option<String>,
    pub subtopic: Option<String>,
    pub difficulty: Option<i64>,
    pub relevance: Option<String>,
    pub total_marks: Option<f64>,
    #[serde(default)]
    pub boards: Vec<String>,
    #[serde(default)]
    pub course_types: Vec<String>,
    #[serde(default)]
    pub levels: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub is_pyq: bool,
    pub pyq_year: Option<String>,
    pub month: Option<String>,
    pub paper_number: Option<String>,
}

/// Partial update for a question. `None` fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct QuestionPatch {
    pub human_readable_id: Option<String>,
    pub question_text: Option<String>,
    pub question_type: Option<String>,
    pub subject: Option<String>,
    pub section: Option<String>,
    pub grade: Option<String>,
    pub topic: Option<String>,
    pub subtopic: Option<String>,
    pub difficulty: Option<i64>,
    pub relevance: Option<String>,
    pub total_marks: Option<f64>,
    pub boards: Option<Vec<String>>,
    pub course_types: Option<Vec<String>>,
    pub levels: Option<Vec<String>>,
    pub tags: Option<Vec<String>>,
    pub is_pyq: Option<bool>,
    pub pyq_year: Option<String>,
    pub month: Option<String>,
    pub paper_number: Option<String>,
    /// Optimistic-concurrency precondition: if set, the update only
    /// applies when the stored row still carries this updated_at.
    pub expected_updated_at: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QaRecord {
    pub id: String,
    pub question_id: String,
    pub qa_status: QaStatus,
    pub reviewer_id: Option<String>,
    pub review_date: Option<String>,
    pub review_notes: Option<String>,
    pub content_accuracy: Option<i64>,
    pub difficulty_appropriateness: Option<i64>,
    pub clarity_rating: Option<i64>,
    pub solution_quality: Option<i64>,
    pub overall_rating: Option<f64>,
    pub revision_count: i64,
    pub last_revision_date: Option<String>,
    pub revision_notes: Option<String>,
    pub is_flagged: bool,
    pub flag_reason: Option<String>,
    pub priority_level: Priority,
    pub qa_tags: Vec<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// One QA status transition, kept as an audit trail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QaHistoryEntry {
    pub id: String,
    pub question_id: String,
    pub action: String,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
    pub action_by: Option<String>,
    pub action_reason: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Assignment {
    pub id: String,
    pub question_id: String,
    pub assigned_to: String,
    pub assigned_by: String,
    pub assignment_type: AssignmentType,
    pub priority: Priority,
    pub due_date: Option<String>,
    pub notes: Option<String>,
    pub status: AssignmentStatus,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    pub full_name: String,
    pub email: Option<String>,
    pub role: String,
}

/// Stats returned by `qbank stats`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BankStats {
    pub questions: i64,
    pub active_questions: i64,
    pub qa_records: i64,
    pub assignments: i64,
    pub by_subject: Vec<SubjectCount>,
    pub by_qa_status: Vec<StatusCount>,
    pub db_size_bytes: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubjectCount {
    pub subject: String,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusCount {
    pub status: String,
    pub count: i64,
}

/// Distinct filterable values, served to filter dropdowns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FacetValues {
    pub boards: Vec<String>,
    pub course_types: Vec<String>,
    pub levels: Vec<String>,
    pub subjects: Vec<String>,
    pub topics: Vec<String>,
    pub grades: Vec<String>,
    pub difficulties: Vec<i64>,
    pub question_types: Vec<String>,
    pub qa_statuses: Vec<String>,
    pub priority_levels: Vec<String>,
    pub has_pyq: bool,
    pub has_practice: bool,
}
