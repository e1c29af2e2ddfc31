pub mod advanced;
pub mod search;

use std::collections::HashMap;

use rusqlite::types::ToSql;
use serde::Deserialize;
use thiserror::Error;

pub use advanced::{FilterCondition, Operator};

use search::{classify, escape_like, SearchTerm};

pub type SqlParam = Box<dyn ToSql + Send + Sync>;

/// Difficulty is a 1-10 scale throughout the bank.
pub const DIFFICULTY_MIN: i64 = 1;
pub const DIFFICULTY_MAX: i64 = 10;

#[derive(Debug, Error)]
pub enum FilterError {
    #[error("unknown filter field: {0}")]
    UnknownField(String),
    #[error("operator '{operator}' is not valid for '{field}' ({ty} field)")]
    IncompatibleOperator {
        field: String,
        operator: String,
        ty: &'static str,
    },
    #[error("invalid value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
    #[error("invalid difficulty range: {0}")]
    InvalidRange(String),
}

/// Declared type of a filterable field, used to reject operator/field
/// mismatches before any SQL is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Number,
    Text,
    Boolean,
    Select,
    /// A JSON-array column; equality means containment.
    ArraySelect,
}

impl FieldType {
    pub fn name(self) -> &'static str {
        match self {
            FieldType::Number => "number",
            FieldType::Text => "text",
            FieldType::Boolean => "boolean",
            FieldType::Select => "select",
            FieldType::ArraySelect => "array",
        }
    }
}

pub struct FieldSpec {
    pub name: &'static str,
    /// SQL expression for the field against the enhanced read view.
    pub expr: &'static str,
    pub ty: FieldType,
}

/// Every field the filter compiler knows about. Queries always target
/// `question_bank_enhanced`, so QA columns are addressable directly.
pub const FIELDS: &[FieldSpec] = &[
    FieldSpec { name: "difficulty", expr: "difficulty", ty: FieldType::Number },
    FieldSpec { name: "total_marks", expr: "total_marks", ty: FieldType::Number },
    // Year/paper live in TEXT columns; cast so range operators compare numerically.
    FieldSpec { name: "pyq_year", expr: "CAST(pyq_year AS INTEGER)", ty: FieldType::Number },
    FieldSpec { name: "paper_number", expr: "CAST(paper_number AS INTEGER)", ty: FieldType::Number },
    FieldSpec { name: "subject", expr: "subject", ty: FieldType::Select },
    FieldSpec { name: "section", expr: "section", ty: FieldType::Select },
    FieldSpec { name: "question_type", expr: "question_type", ty: FieldType::Select },
    FieldSpec { name: "relevance", expr: "relevance", ty: FieldType::Select },
    FieldSpec { name: "grade", expr: "grade", ty: FieldType::Select },
    FieldSpec { name: "month", expr: "month", ty: FieldType::Select },
    FieldSpec { name: "qa_status", expr: "qa_status", ty: FieldType::Select },
    FieldSpec { name: "priority_level", expr: "priority_level", ty: FieldType::Select },
    FieldSpec { name: "topic", expr: "topic", ty: FieldType::Text },
    FieldSpec { name: "subtopic", expr: "subtopic", ty: FieldType::Text },
    FieldSpec { name: "question_text", expr: "question_text", ty: FieldType::Text },
    FieldSpec { name: "human_readable_id", expr: "human_readable_id", ty: FieldType::Text },
    FieldSpec { name: "is_pyq", expr: "is_pyq", ty: FieldType::Boolean },
    FieldSpec { name: "is_flagged", expr: "is_flagged", ty: FieldType::Boolean },
    FieldSpec { name: "boards", expr: "boards", ty: FieldType::ArraySelect },
    FieldSpec { name: "course_types", expr: "course_types", ty: FieldType::ArraySelect },
    FieldSpec { name: "levels", expr: "levels", ty: FieldType::ArraySelect },
    FieldSpec { name: "tags", expr: "tags", ty: FieldType::ArraySelect },
];

pub fn field_spec(name: &str) -> Option<&'static FieldSpec> {
    FIELDS.iter().find(|f| f.name == name)
}

/// AND-able WHERE clause fragments plus their bind parameters, built up
/// by the filter compiler and consumed by the query layer.
#[derive(Default)]
pub struct QueryPredicates {
    pub clauses: Vec<String>,
    pub params: Vec<SqlParam>,
}

impl std::fmt::Debug for QueryPredicates {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryPredicates")
            .field("clauses", &self.clauses)
            .field("params", &format_args!("<{} bound values>", self.params.len()))
            .finish()
    }
}

impl QueryPredicates {
    pub fn push(&mut self, clause: impl Into<String>) {
        self.clauses.push(clause.into());
    }

    pub fn push_with<I>(&mut self, clause: impl Into<String>, params: I)
    where
        I: IntoIterator<Item = SqlParam>,
    {
        self.clauses.push(clause.into());
        self.params.extend(params);
    }

    /// Full WHERE clause, or empty string when no conditions apply.
    pub fn where_sql(&self) -> String {
        if self.clauses.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", self.clauses.join(" AND "))
        }
    }

    pub fn param_refs(&self) -> Vec<&dyn ToSql> {
        self.params.iter().map(|p| p.as_ref() as &dyn ToSql).collect()
    }
}

/// The fixed-shape filter map driving dropdown-based filtering. Every
/// value arrives as a string; empty and the sentinel "any" mean "no
/// filter". Multi-value fields are comma-separated.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LegacyFilters {
    pub subject: Option<String>,
    pub section: Option<String>,
    pub grade: Option<String>,
    pub topic: Option<String>,
    pub tags: Option<String>,
    pub boards: Option<String>,
    pub course_types: Option<String>,
    pub levels: Option<String>,
    pub question_type: Option<String>,
    pub relevance: Option<String>,
    pub difficulty: Option<String>,
    pub difficulty_min: Option<String>,
    pub difficulty_max: Option<String>,
    pub is_pyq: Option<String>,
    pub pyq_year: Option<String>,
    pub month: Option<String>,
    pub paper_number: Option<String>,
    pub qa_status: Option<String>,
    pub priority_level: Option<String>,
    pub is_flagged: Option<String>,
    pub search: Option<String>,
}

fn set(v: &Option<String>) -> Option<&str> {
    match v.as_deref().map(str::trim) {
        Some("") | Some("any") | None => None,
        Some(s) => Some(s),
    }
}

fn split_multi(v: &str) -> Vec<String> {
    v.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Containment check against a JSON-array column. A single value is one
/// EXISTS; multiple values OR their per-value checks (the query language
/// has no single 'overlaps any of' primitive for JSON arrays).
pub(crate) fn push_array_contains(out: &mut QueryPredicates, column: &str, values: &[String]) {
    let one = |col: &str| {
        format!("EXISTS (SELECT 1 FROM json_each({col}) WHERE json_each.value = ?)")
    };
    match values {
        [] => {}
        [_] => {
            let clause = one(column);
            out.push_with(clause, [Box::new(values[0].clone()) as SqlParam]);
        }
        _ => {
            let parts: Vec<String> = values.iter().map(|_| one(column)).collect();
            let params: Vec<SqlParam> = values
                .iter()
                .map(|v| Box::new(v.clone()) as SqlParam)
                .collect();
            out.push_with(format!("({})", parts.join(" OR ")), params);
        }
    }
}

fn push_in_list(out: &mut QueryPredicates, column: &str, values: Vec<String>) {
    match values.len() {
        0 => {}
        1 => out.push_with(
            format!("{column} = ?"),
            [Box::new(values.into_iter().next().unwrap()) as SqlParam],
        ),
        n => {
            let placeholders = vec!["?"; n].join(", ");
            let params: Vec<SqlParam> =
                values.into_iter().map(|v| Box::new(v) as SqlParam).collect();
            out.push_with(format!("{column} IN ({placeholders})"), params);
        }
    }
}

fn parse_bool(field: &str, v: &str) -> Result<bool, FilterError> {
    match v {
        "true" => Ok(true),
        "false" => Ok(false),
        other => Err(FilterError::InvalidValue {
            field: field.to_string(),
            reason: format!("expected true or false, got '{other}'"),
        }),
    }
}

fn parse_difficulty(field: &str, v: &str) -> Result<i64, FilterError> {
    v.parse::<i64>().map_err(|_| FilterError::InvalidValue {
        field: field.to_string(),
        reason: format!("expected an integer, got '{v}'"),
    })
}

impl LegacyFilters {
    /// Build from raw query parameters (the HTTP list endpoint).
    pub fn from_query(params: &HashMap<String, String>) -> Self {
        let get = |key: &str| params.get(key).cloned();
        LegacyFilters {
            subject: get("subject"),
            section: get("section"),
            grade: get("grade"),
            topic: get("topic"),
            tags: get("tags"),
            boards: get("boards"),
            course_types: get("course_types"),
            levels: get("levels"),
            question_type: get("question_type"),
            relevance: get("relevance"),
            difficulty: get("difficulty"),
            difficulty_min: get("difficulty_min"),
            difficulty_max: get("difficulty_max"),
            is_pyq: get("is_pyq"),
            pyq_year: get("pyq_year"),
            month: get("month"),
            paper_number: get("paper_number"),
            qa_status: get("qa_status"),
            priority_level: get("priority_level"),
            is_flagged: get("is_flagged"),
            search: get("search"),
        }
    }

    /// Compile into WHERE fragments. Validation failures map to 400s at
    /// the API boundary.
    pub fn conditions(&self) -> Result<QueryPredicates, FilterError> {
        let mut out = QueryPredicates::default();

        if let Some(v) = set(&self.subject) {
            push_in_list(&mut out, "subject", split_multi(v));
        }
        if let Some(v) = set(&self.section) {
            push_in_list(&mut out, "section", split_multi(v));
        }
        if let Some(v) = set(&self.grade) {
            out.push_with("grade = ?", [Box::new(v.to_string()) as SqlParam]);
        }
        if let Some(v) = set(&self.question_type) {
            out.push_with("question_type = ?", [Box::new(v.to_string()) as SqlParam]);
        }
        if let Some(v) = set(&self.relevance) {
            out.push_with("relevance = ?", [Box::new(v.to_string()) as SqlParam]);
        }
        if let Some(v) = set(&self.topic) {
            out.push_with(
                "topic LIKE ? ESCAPE '\\'",
                [Box::new(format!("%{}%", escape_like(v))) as SqlParam],
            );
        }
        if let Some(v) = set(&self.boards) {
            push_array_contains(&mut out, "boards", &split_multi(v));
        }
        if let Some(v) = set(&self.course_types) {
            push_array_contains(&mut out, "course_types", &split_multi(v));
        }
        if let Some(v) = set(&self.levels) {
            push_array_contains(&mut out, "levels", &split_multi(v));
        }
        if let Some(v) = set(&self.tags) {
            push_array_contains(&mut out, "tags", &split_multi(v));
        }

        self.difficulty_conditions(&mut out)?;

        if let Some(v) = set(&self.is_pyq) {
            let b = parse_bool("is_pyq", v)?;
            out.push_with("is_pyq = ?", [Box::new(b as i64) as SqlParam]);
        }
        if let Some(v) = set(&self.pyq_year) {
            out.push_with("pyq_year = ?", [Box::new(v.to_string()) as SqlParam]);
        }
        if let Some(v) = set(&self.month) {
            out.push_with("month = ?", [Box::new(v.to_string()) as SqlParam]);
        }
        if let Some(v) = set(&self.paper_number) {
            out.push_with("paper_number = ?", [Box::new(v.to_string()) as SqlParam]);
        }

        // QA filters hit the denormalized columns on the enhanced view.
        // A question with no QA record yet counts as pending/unflagged.
        if let Some(v) = set(&self.qa_status) {
            if crate::db::models::QaStatus::parse(v).is_none() {
                return Err(FilterError::InvalidValue {
                    field: "qa_status".into(),
                    reason: format!("unknown status '{v}'"),
                });
            }
            if v == "pending" {
                out.push("(qa_status = 'pending' OR qa_status IS NULL)");
            } else {
                out.push_with("qa_status = ?", [Box::new(v.to_string()) as SqlParam]);
            }
        }
        if let Some(v) = set(&self.priority_level) {
            if crate::db::models::Priority::parse(v).is_none() {
                return Err(FilterError::InvalidValue {
                    field: "priority_level".into(),
                    reason: format!("unknown priority '{v}'"),
                });
            }
            out.push_with("priority_level = ?", [Box::new(v.to_string()) as SqlParam]);
        }
        if let Some(v) = set(&self.is_flagged) {
            if parse_bool("is_flagged", v)? {
                out.push("is_flagged = 1");
            } else {
                out.push("(is_flagged = 0 OR is_flagged IS NULL)");
            }
        }

        if let Some(v) = set(&self.search) {
            push_search(&mut out, v);
        }

        Ok(out)
    }

    fn difficulty_conditions(&self, out: &mut QueryPredicates) -> Result<(), FilterError> {
        if let Some(v) = set(&self.difficulty) {
            let d = parse_difficulty("difficulty", v)?;
            out.push_with("difficulty = ?", [Box::new(d) as SqlParam]);
            return Ok(());
        }

        let min = set(&self.difficulty_min)
            .map(|v| parse_difficulty("difficulty_min", v))
            .transpose()?;
        let max = set(&self.difficulty_max)
            .map(|v| parse_difficulty("difficulty_max", v))
            .transpose()?;
        if min.is_none() && max.is_none() {
            return Ok(());
        }

        let min = min.unwrap_or(DIFFICULTY_MIN);
        let max = max.unwrap_or(DIFFICULTY_MAX);
        if !(DIFFICULTY_MIN..=DIFFICULTY_MAX).contains(&min)
            || !(DIFFICULTY_MIN..=DIFFICULTY_MAX).contains(&max)
        {
            return Err(FilterError::InvalidRange(format!(
                "bounds must lie in [{DIFFICULTY_MIN},{DIFFICULTY_MAX}], got [{min},{max}]"
            )));
        }
        if min > max {
            return Err(FilterError::InvalidRange(format!(
                "min {min} exceeds max {max}"
            )));
        }
        out.push_with(
            "difficulty >= ? AND difficulty <= ?",
            [Box::new(min) as SqlParam, Box::new(max) as SqlParam],
        );
        Ok(())
    }
}

fn push_search(out: &mut QueryPredicates, term: &str) {
    match classify(term) {
        SearchTerm::Uuid(id) => {
            out.push_with("id = ?", [Box::new(id) as SqlParam]);
        }
        SearchTerm::HumanId(hid) => {
            out.push_with("human_readable_id = ?", [Box::new(hid) as SqlParam]);
        }
        SearchTerm::Text(text) => {
            let pattern = format!("%{}%", escape_like(&text));
            let cols = ["question_text", "topic", "subtopic", "human_readable_id"];
            let clause = cols
                .iter()
                .map(|c| format!("{c} LIKE ? ESCAPE '\\'"))
                .collect::<Vec<_>>()
                .join(" OR ");
            let params: Vec<SqlParam> = cols
                .iter()
                .map(|_| Box::new(pattern.clone()) as SqlParam)
                .collect();
            out.push_with(format!("({clause})"), params);
        }
    }
}

/// The single predicate-compilation path shared by question listing and
/// bulk assignment preview/commit. Advanced conditions take precedence:
/// when any are present the legacy map is ignored entirely, mirroring
/// the mutual exclusion the filter UI enforces.
pub fn compile_selection(
    legacy: Option<&LegacyFilters>,
    advanced: Option<&[FilterCondition]>,
) -> Result<QueryPredicates, FilterError> {
    let mut out = match advanced {
        Some(conds) if !conds.is_empty() => {
            let mut out = QueryPredicates::default();
            for cond in conds {
                advanced::compile_condition(cond, &mut out)?;
            }
            out
        }
        _ => match legacy {
            Some(f) => f.conditions()?,
            None => QueryPredicates::default(),
        },
    };
    // Selections never see soft-deleted questions.
    out.clauses.insert(0, "is_active = 1".to_string());
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use advanced::Operator;
    use serde_json::json;

    fn filters(f: impl FnOnce(&mut LegacyFilters)) -> LegacyFilters {
        let mut lf = LegacyFilters::default();
        f(&mut lf);
        lf
    }

    #[test]
    fn empty_filters_compile_to_nothing() {
        let p = LegacyFilters::default().conditions().unwrap();
        assert!(p.clauses.is_empty());
        assert_eq!(p.where_sql(), "");
    }

    #[test]
    fn any_sentinel_means_no_filter() {
        let p = filters(|f| {
            f.subject = Some("any".into());
            f.grade = Some("".into());
        })
        .conditions()
        .unwrap();
        assert!(p.clauses.is_empty());
    }

    #[test]
    fn multi_value_subject_becomes_in_list() {
        let p = filters(|f| f.subject = Some("Maths, Physics".into()))
            .conditions()
            .unwrap();
        assert_eq!(p.clauses, vec!["subject IN (?, ?)"]);
        assert_eq!(p.params.len(), 2);
    }

    #[test]
    fn single_board_is_one_containment_check() {
        let p = filters(|f| f.boards = Some("IBDP".into()))
            .conditions()
            .unwrap();
        assert_eq!(p.clauses.len(), 1);
        assert!(p.clauses[0].starts_with("EXISTS (SELECT 1 FROM json_each(boards)"));
    }

    #[test]
    fn multiple_boards_or_their_containment_checks() {
        let p = filters(|f| f.boards = Some("IBDP,CBSE".into()))
            .conditions()
            .unwrap();
        assert_eq!(p.clauses.len(), 1);
        assert!(p.clauses[0].starts_with("(EXISTS"));
        assert!(p.clauses[0].contains(" OR EXISTS"));
        assert_eq!(p.params.len(), 2);
    }

    #[test]
    fn difficulty_range_validates_bounds() {
        let bad = filters(|f| {
            f.difficulty_min = Some("0".into());
            f.difficulty_max = Some("5".into());
        })
        .conditions();
        assert!(matches!(bad, Err(FilterError::InvalidRange(_))));

        let inverted = filters(|f| {
            f.difficulty_min = Some("7".into());
            f.difficulty_max = Some("3".into());
        })
        .conditions();
        assert!(matches!(inverted, Err(FilterError::InvalidRange(_))));

        let ok = filters(|f| {
            f.difficulty_min = Some("4".into());
            f.difficulty_max = Some("6".into());
        })
        .conditions()
        .unwrap();
        assert_eq!(ok.clauses, vec!["difficulty >= ? AND difficulty <= ?"]);
    }

    #[test]
    fn exact_difficulty_wins_over_range() {
        let p = filters(|f| {
            f.difficulty = Some("5".into());
            f.difficulty_min = Some("1".into());
            f.difficulty_max = Some("9".into());
        })
        .conditions()
        .unwrap();
        assert_eq!(p.clauses, vec!["difficulty = ?"]);
    }

    #[test]
    fn pending_qa_status_includes_unreviewed_questions() {
        let p = filters(|f| f.qa_status = Some("pending".into()))
            .conditions()
            .unwrap();
        assert_eq!(p.clauses, vec!["(qa_status = 'pending' OR qa_status IS NULL)"]);
    }

    #[test]
    fn uuid_search_is_exact_id_lookup() {
        let p = filters(|f| f.search = Some("a1b2c3d4-0000-4000-8000-123456789abc".into()))
            .conditions()
            .unwrap();
        assert_eq!(p.clauses, vec!["id = ?"]);
    }

    #[test]
    fn text_search_ors_over_columns_with_escaping() {
        let p = filters(|f| f.search = Some("50%_off".into()))
            .conditions()
            .unwrap();
        assert_eq!(p.clauses.len(), 1);
        assert!(p.clauses[0].contains("question_text LIKE ? ESCAPE"));
        assert_eq!(p.params.len(), 4);
    }

    #[test]
    fn advanced_conditions_shadow_legacy_filters() {
        let legacy = filters(|f| f.subject = Some("Maths".into()));
        let advanced = vec![FilterCondition {
            field: "difficulty".into(),
            operator: Operator::Gte,
            value: json!(4),
        }];
        let p = compile_selection(Some(&legacy), Some(&advanced)).unwrap();
        assert_eq!(p.clauses[0], "is_active = 1");
        assert_eq!(p.clauses[1], "difficulty >= ?");
        assert_eq!(p.clauses.len(), 2);
    }

    #[test]
    fn selection_always_pins_active_rows() {
        let p = compile_selection(None, None).unwrap();
        assert_eq!(p.clauses, vec!["is_active = 1"]);
    }
}
