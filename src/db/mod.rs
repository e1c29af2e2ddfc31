pub mod migrations;
pub mod models;
pub mod schema;

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, Row};
use tracing::info;
use uuid::Uuid;

use crate::filter::QueryPredicates;
use models::*;

pub struct Database {
    pub conn: Connection,
    pub path: PathBuf,
}

/// RFC3339 UTC timestamp, second precision — matches the schema defaults.
pub fn now_timestamp() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

/// Outcome of a guarded question update.
#[derive(Debug)]
pub enum UpdateOutcome {
    NotFound,
    /// The optimistic-concurrency precondition failed: the row changed
    /// since the caller last read it.
    Stale,
    Updated(Question),
}

const QUESTION_COLS: &str = "id, human_readable_id, question_text, question_type, subject, \
     section, grade, topic, subtopic, difficulty, relevance, total_marks, boards, \
     course_types, levels, tags, is_pyq, pyq_year, month, paper_number, is_active, \
     created_at, updated_at";

fn json_vec(raw: String) -> Vec<String> {
    serde_json::from_str(&raw).unwrap_or_default()
}

fn question_from_row(row: &Row) -> rusqlite::Result<Question> {
    Ok(Question {
        id: row.get(0)?,
        human_readable_id: row.get(1)?,
        question_text: row.get(2)?,
        question_type: row.get(3)?,
        subject: row.get(4)?,
        section: row.get(5)?,
        grade: row.get(6)?,
        topic: row.get(7)?,
        subtopic: row.get(8)?,
        difficulty: row.get(9)?,
        relevance: row.get(10)?,
        total_marks: row.get(11)?,
        boards: json_vec(row.get(12)?),
        course_types: json_vec(row.get(13)?),
        levels: json_vec(row.get(14)?),
        tags: json_vec(row.get(15)?),
        is_pyq: row.get(16)?,
        pyq_year: row.get(17)?,
        month: row.get(18)?,
        paper_number: row.get(19)?,
        is_active: row.get(20)?,
        created_at: row.get(21)?,
        updated_at: row.get(22)?,
    })
}

const QA_COLS: &str = "id, question_id, qa_status, reviewer_id, review_date, review_notes, \
     content_accuracy, difficulty_appropriateness, clarity_rating, solution_quality, \
     overall_rating, revision_count, last_revision_date, revision_notes, is_flagged, \
     flag_reason, priority_level, qa_tags, created_at, updated_at";

fn qa_from_row(row: &Row) -> rusqlite::Result<QaRecord> {
    let status: String = row.get(2)?;
    let priority: String = row.get(16)?;
    Ok(QaRecord {
        id: row.get(0)?,
        question_id: row.get(1)?,
        qa_status: QaStatus::parse(&status).unwrap_or(QaStatus::Pending),
        reviewer_id: row.get(3)?,
        review_date: row.get(4)?,
        review_notes: row.get(5)?,
        content_accuracy: row.get(6)?,
        difficulty_appropriateness: row.get(7)?,
        clarity_rating: row.get(8)?,
        solution_quality: row.get(9)?,
        overall_rating: row.get(10)?,
        revision_count: row.get(11)?,
        last_revision_date: row.get(12)?,
        revision_notes: row.get(13)?,
        is_flagged: row.get(14)?,
        flag_reason: row.get(15)?,
        priority_level: Priority::parse(&priority).unwrap_or_default(),
        qa_tags: json_vec(row.get(17)?),
        created_at: row.get(18)?,
        updated_at: row.get(19)?,
    })
}

const ASSIGNMENT_COLS: &str = "id, question_id, assigned_to, assigned_by, assignment_type, \
     priority, due_date, notes, status, created_at, updated_at";

fn assignment_from_row(row: &Row) -> rusqlite::Result<Assignment> {
    let ty: String = row.get(4)?;
    let priority: String = row.get(5)?;
    let status: String = row.get(8)?;
    Ok(Assignment {
        id: row.get(0)?,
        question_id: row.get(1)?,
        assigned_to: row.get(2)?,
        assigned_by: row.get(3)?,
        assignment_type: AssignmentType::parse(&ty).unwrap_or_default(),
        priority: Priority::parse(&priority).unwrap_or_default(),
        due_date: row.get(6)?,
        notes: row.get(7)?,
        status: AssignmentStatus::parse(&status).unwrap_or(AssignmentStatus::Assigned),
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
    })
}

impl Database {
    /// Open (or create) the database at the given path.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }

        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database: {}", path.display()))?;

        // Performance pragmas
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA foreign_keys = ON;
             PRAGMA cache_size = -64000;",
        )?;

        schema::create_schema(&conn)?;
        migrations::run_migrations(&conn)?;

        info!("Opened database: {}", path.display());

        Ok(Database {
            conn,
            path: path.to_path_buf(),
        })
    }

    /// In-memory database with full schema, for tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        schema::create_schema(&conn)?;
        migrations::run_migrations(&conn)?;
        Ok(Database {
            conn,
            path: PathBuf::from(":memory:"),
        })
    }

    /// Default database path: ~/.qbank/qbank.db
    pub fn default_db_path() -> Result<PathBuf> {
        let home = dirs::home_dir().context("Could not determine home directory")?;
        Ok(home.join(".qbank").join("qbank.db"))
    }

    // === Questions ===

    pub fn insert_question(&self, n: &NewQuestion) -> Result<Question> {
        let id = Uuid::new_v4().to_string();
        let now = now_timestamp();
        self.conn.execute(
            "INSERT INTO question_bank (id, human_readable_id, question_text, question_type, \
             subject, section, grade, topic, subtopic, difficulty, relevance, total_marks, \
             boards, course_types, levels, tags, is_pyq, pyq_year, month, paper_number, \
             is_active, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 1, ?, ?)",
            rusqlite::params![
                id,
                n.human_readable_id,
                n.question_text,
                n.question_type,
                n.subject,
                n.section,
                n.grade,
                n.topic,
                n.subtopic,
                n.difficulty,
                n.relevance,
                n.total_marks,
                serde_json::to_string(&n.boards)?,
                serde_json::to_string(&n.course_types)?,
                serde_json::to_string(&n.levels)?,
                serde_json::to_string(&n.tags)?,
                n.is_pyq,
                n.pyq_year,
                n.month,
                n.paper_number,
                now,
                now,
            ],
        )?;
        self.get_question(&id)?
            .context("inserted question not found")
    }

    pub fn get_question(&self, id: &str) -> Result<Option<Question>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {QUESTION_COLS} FROM question_bank WHERE id = ?"
        ))?;
        Ok(stmt.query_row([id], question_from_row).optional()?)
    }

    /// Apply a partial update. When `expected_updated_at` is set on the
    /// patch, the write only lands if the stored row still carries that
    /// timestamp.
    pub fn update_question(&self, id: &str, patch: &QuestionPatch) -> Result<UpdateOutcome> {
        let Some(current) = self.get_question(id)? else {
            return Ok(UpdateOutcome::NotFound);
        };
        if let Some(ref expected) = patch.expected_updated_at {
            if *expected != current.updated_at {
                return Ok(UpdateOutcome::Stale);
            }
        }

        let q = Question {
            human_readable_id: patch
                .human_readable_id
                .clone()
                .or(current.human_readable_id),
            question_text: patch
                .question_text
                .clone()
                .unwrap_or(current.question_text),
            question_type: patch.question_type.clone().or(current.question_type),
            subject: patch.subject.clone().or(current.subject),
            section: patch.section.clone().or(current.section),
            grade: patch.grade.clone().or(current.grade),
            topic: patch.topic.clone().or(current.topic),
            subtopic: patch.subtopic.clone().or(current.subtopic),
            difficulty: patch.difficulty.or(current.difficulty),
            relevance: patch.relevance.clone().or(current.relevance),
            total_marks: patch.total_marks.or(current.total_marks),
            boards: patch.boards.clone().unwrap_or(current.boards),
            course_types: patch.course_types.clone().unwrap_or(current.course_types),
            levels: patch.levels.clone().unwrap_or(current.levels),
            tags: patch.tags.clone().unwrap_or(current.tags),
            is_pyq: patch.is_pyq.unwrap_or(current.is_pyq),
            pyq_year: patch.pyq_year.clone().or(current.pyq_year),
            month: patch.month.clone().or(current.month),
            paper_number: patch.paper_number.clone().or(current.paper_number),
            updated_at: now_timestamp(),
            ..current
        };

        self.conn.execute(
            "UPDATE question_bank SET human_readable_id = ?, question_text = ?, \
             question_type = ?, subject = ?, section = ?, grade = ?, topic = ?, subtopic = ?, \
             difficulty = ?, relevance = ?, total_marks = ?, boards = ?, course_types = ?, \
             levels = ?, tags = ?, is_pyq = ?, pyq_year = ?, month = ?, paper_number = ?, \
             updated_at = ? WHERE id = ?",
            rusqlite::params![
                q.human_readable_id,
                q.question_text,
                q.question_type,
                q.subject,
                q.section,
                q.grade,
                q.topic,
                q.subtopic,
                q.difficulty,
                q.relevance,
                q.total_marks,
                serde_json::to_string(&q.boards)?,
                serde_json::to_string(&q.course_types)?,
                serde_json::to_string(&q.levels)?,
                serde_json::to_string(&q.tags)?,
                q.is_pyq,
                q.pyq_year,
                q.month,
                q.paper_number,
                q.updated_at,
                id,
            ],
        )?;
        Ok(UpdateOutcome::Updated(q))
    }

    /// Soft delete: questions are deactivated, never removed.
    pub fn soft_delete_question(&self, id: &str) -> Result<bool> {
        let n = self.conn.execute(
            "UPDATE question_bank SET is_active = 0, updated_at = ? WHERE id = ? AND is_active = 1",
            rusqlite::params![now_timestamp(), id],
        )?;
        Ok(n > 0)
    }

    /// Count rows on the enhanced view matching the compiled predicates.
    pub fn count_questions(&self, p: &QueryPredicates) -> Result<i64> {
        let sql = format!(
            "SELECT COUNT(*) FROM question_bank_enhanced {}",
            p.where_sql()
        );
        let count = self
            .conn
            .query_row(&sql, p.param_refs().as_slice(), |r| r.get(0))?;
        Ok(count)
    }

    /// Page of questions from the enhanced view, newest first.
    pub fn list_questions(
        &self,
        p: &QueryPredicates,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Question>> {
        let sql = format!(
            "SELECT {QUESTION_COLS} FROM question_bank_enhanced {} \
             ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?",
            p.where_sql()
        );
        let mut stmt = self.conn.prepare(&sql)?;

        let limit = limit as i64;
        let offset = offset as i64;
        let mut params = p.param_refs();
        params.push(&limit);
        params.push(&offset);

        let rows = stmt.query_map(params.as_slice(), question_from_row)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// Total active questions, unfiltered.
    pub fn total_questions(&self) -> Result<i64> {
        Ok(self.conn.query_row(
            "SELECT COUNT(*) FROM question_bank WHERE is_active = 1",
            [],
            |r| r.get(0),
        )?)
    }

    /// IDs of questions matching the predicates, optionally excluding
    /// questions the user already has an assignment of the same type
    /// for, in any status. The exclusion mirrors the
    /// UNIQUE(question_id, assigned_to, assignment_type) constraint so
    /// a bulk commit never trips it. Shared by bulk-assignment preview
    /// and commit.
    pub fn select_question_ids(
        &self,
        p: &QueryPredicates,
        exclude: Option<(&str, AssignmentType)>,
        limit: usize,
    ) -> Result<Vec<String>> {
        let mut where_sql = p.where_sql();
        if exclude.is_some() {
            let exclusion = "id NOT IN (SELECT question_id FROM question_assignments \
                 WHERE assigned_to = ? AND assignment_type = ?)";
            if where_sql.is_empty() {
                where_sql = format!("WHERE {exclusion}");
            } else {
                where_sql = format!("{where_sql} AND {exclusion}");
            }
        }
        let sql = format!(
            "SELECT id FROM question_bank_enhanced {where_sql} \
             ORDER BY created_at DESC, id DESC LIMIT ?"
        );
        let mut stmt = self.conn.prepare(&sql)?;

        let limit = limit as i64;
        let mut params = p.param_refs();
        let excl = exclude.map(|(user, ty)| (user.to_string(), ty.as_str().to_string()));
        if let Some((ref user, ref ty)) = excl {
            params.push(user);
            params.push(ty);
        }
        params.push(&limit);

        let rows = stmt.query_map(params.as_slice(), |r| r.get(0))?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// Distinct filter values across the active bank.
    pub fn facets(&self) -> Result<FacetValues> {
        let mut boards = BTreeSet::new();
        let mut course_types = BTreeSet::new();
        let mut levels = BTreeSet::new();
        let mut subjects = BTreeSet::new();
        let mut topics = BTreeSet::new();
        let mut grades = BTreeSet::new();
        let mut difficulties = BTreeSet::new();
        let mut question_types = BTreeSet::new();
        let mut has_pyq = false;
        let mut has_practice = false;

        let mut stmt = self.conn.prepare(
            "SELECT boards, course_types, levels, subject, topic, grade, difficulty, \
             question_type, is_pyq FROM question_bank WHERE is_active = 1",
        )?;
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            for b in json_vec(row.get(0)?) {
                boards.insert(b);
            }
            for c in json_vec(row.get(1)?) {
                course_types.insert(c);
            }
            for l in json_vec(row.get(2)?) {
                levels.insert(l);
            }
            if let Some(s) = row.get::<_, Option<String>>(3)? {
                subjects.insert(s);
            }
            if let Some(t) = row.get::<_, Option<String>>(4)? {
                topics.insert(t);
            }
            if let Some(g) = row.get::<_, Option<String>>(5)? {
                grades.insert(g);
            }
            if let Some(d) = row.get::<_, Option<i64>>(6)? {
                difficulties.insert(d);
            }
            if let Some(q) = row.get::<_, Option<String>>(7)? {
                question_types.insert(q);
            }
            if row.get::<_, bool>(8)? {
                has_pyq = true;
            } else {
                has_practice = true;
            }
        }

        let mut qa_statuses = BTreeSet::new();
        let mut priority_levels = BTreeSet::new();
        let mut stmt = self
            .conn
            .prepare("SELECT DISTINCT qa_status, priority_level FROM qa_records")?;
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            qa_statuses.insert(row.get::<_, String>(0)?);
            priority_levels.insert(row.get::<_, String>(1)?);
        }

        Ok(FacetValues {
            boards: boards.into_iter().collect(),
            course_types: course_types.into_iter().collect(),
            levels: levels.into_iter().collect(),
            subjects: subjects.into_iter().collect(),
            topics: topics.into_iter().collect(),
            grades: grades.into_iter().collect(),
            difficulties: difficulties.into_iter().collect(),
            question_types: question_types.into_iter().collect(),
            qa_statuses: qa_statuses.into_iter().collect(),
            priority_levels: priority_levels.into_iter().collect(),
            has_pyq,
            has_practice,
        })
    }

    // === QA records ===

    pub fn get_qa(&self, question_id: &str) -> Result<Option<QaRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {QA_COLS} FROM qa_records WHERE question_id = ?"
        ))?;
        Ok(stmt.query_row([question_id], qa_from_row).optional()?)
    }

    /// Idempotent: return the question's QA record, creating a pending
    /// one on first touch.
    pub fn ensure_qa(&self, question_id: &str) -> Result<QaRecord> {
        let now = now_timestamp();
        self.conn.execute(
            "INSERT OR IGNORE INTO qa_records (id, question_id, created_at, updated_at) \
             VALUES (?, ?, ?, ?)",
            rusqlite::params![Uuid::new_v4().to_string(), question_id, now, now],
        )?;
        self.get_qa(question_id)?
            .context("QA record missing after ensure")
    }

    /// Persist the full QA record state (keyed by question_id).
    pub fn save_qa(&self, rec: &QaRecord) -> Result<()> {
        self.conn.execute(
            "UPDATE qa_records SET qa_status = ?, reviewer_id = ?, review_date = ?, \
             review_notes = ?, content_accuracy = ?, difficulty_appropriateness = ?, \
             clarity_rating = ?, solution_quality = ?, overall_rating = ?, revision_count = ?, \
             last_revision_date = ?, revision_notes = ?, is_flagged = ?, flag_reason = ?, \
             priority_level = ?, qa_tags = ?, updated_at = ? WHERE question_id = ?",
            rusqlite::params![
                rec.qa_status.as_str(),
                rec.reviewer_id,
                rec.review_date,
                rec.review_notes,
                rec.content_accuracy,
                rec.difficulty_appropriateness,
                rec.clarity_rating,
                rec.solution_quality,
                rec.overall_rating,
                rec.revision_count,
                rec.last_revision_date,
                rec.revision_notes,
                rec.is_flagged,
                rec.flag_reason,
                rec.priority_level.as_str(),
                serde_json::to_string(&rec.qa_tags)?,
                rec.updated_at,
                rec.question_id,
            ],
        )?;
        Ok(())
    }

    /// QA records filtered for the review dashboard, newest first.
    pub fn list_qa(
        &self,
        status: Option<QaStatus>,
        priority: Option<Priority>,
        flagged: Option<bool>,
        limit: usize,
        offset: usize,
    ) -> Result<(Vec<QaRecord>, i64)> {
        let mut clauses: Vec<String> = Vec::new();
        let mut params: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();
        if let Some(s) = status {
            clauses.push("qa_status = ?".into());
            params.push(Box::new(s.as_str().to_string()));
        }
        if let Some(p) = priority {
            clauses.push("priority_level = ?".into());
            params.push(Box::new(p.as_str().to_string()));
        }
        if let Some(f) = flagged {
            clauses.push("is_flagged = ?".into());
            params.push(Box::new(f as i64));
        }
        let where_sql = if clauses.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", clauses.join(" AND "))
        };

        let count_sql = format!("SELECT COUNT(*) FROM qa_records {where_sql}");
        let refs: Vec<&dyn rusqlite::types::ToSql> =
            params.iter().map(|p| p.as_ref()).collect();
        let total: i64 = self.conn.query_row(&count_sql, refs.as_slice(), |r| r.get(0))?;

        let sql = format!(
            "SELECT {QA_COLS} FROM qa_records {where_sql} \
             ORDER BY updated_at DESC LIMIT ? OFFSET ?"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let limit = limit as i64;
        let offset = offset as i64;
        let mut refs: Vec<&dyn rusqlite::types::ToSql> =
            params.iter().map(|p| p.as_ref()).collect();
        refs.push(&limit);
        refs.push(&offset);
        let rows = stmt.query_map(refs.as_slice(), qa_from_row)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok((out, total))
    }

    pub fn insert_qa_history(&self, entry: &QaHistoryEntry) -> Result<()> {
        self.conn.execute(
            "INSERT INTO qa_history (id, question_id, action, old_value, new_value, \
             action_by, action_reason, created_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            rusqlite::params![
                entry.id,
                entry.question_id,
                entry.action,
                entry.old_value,
                entry.new_value,
                entry.action_by,
                entry.action_reason,
                entry.created_at,
            ],
        )?;
        Ok(())
    }

    /// History entries, newest first, optionally narrowed to one
    /// question and/or one action kind.
    pub fn list_qa_history(
        &self,
        question_id: Option<&str>,
        action: Option<&str>,
    ) -> Result<Vec<QaHistoryEntry>> {
        let mut clauses: Vec<&str> = Vec::new();
        let mut params: Vec<&dyn rusqlite::types::ToSql> = Vec::new();
        if let Some(ref qid) = question_id {
            clauses.push("question_id = ?");
            params.push(qid);
        }
        if let Some(ref a) = action {
            clauses.push("action = ?");
            params.push(a);
        }
        let where_sql = if clauses.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", clauses.join(" AND "))
        };
        let sql = format!(
            "SELECT id, question_id, action, old_value, new_value, action_by, \
             action_reason, created_at FROM qa_history {where_sql} \
             ORDER BY created_at DESC, rowid DESC"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params.as_slice(), |row| {
            Ok(QaHistoryEntry {
                id: row.get(0)?,
                question_id: row.get(1)?,
                action: row.get(2)?,
                old_value: row.get(3)?,
                new_value: row.get(4)?,
                action_by: row.get(5)?,
                action_reason: row.get(6)?,
                created_at: row.get(7)?,
            })
        })?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    // === Assignments ===

    pub fn assignment_exists(
        &self,
        question_id: &str,
        assigned_to: &str,
        ty: AssignmentType,
    ) -> Result<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM question_assignments \
             WHERE question_id = ? AND assigned_to = ? AND assignment_type = ?",
            rusqlite::params![question_id, assigned_to, ty.as_str()],
            |r| r.get(0),
        )?;
        Ok(count > 0)
    }

    /// Insert a batch of assignments in one transaction.
    pub fn insert_assignments(&self, rows: &[Assignment]) -> Result<usize> {
        let tx = self.conn.unchecked_transaction()?;
        for a in rows {
            tx.execute(
                "INSERT INTO question_assignments (id, question_id, assigned_to, assigned_by, \
                 assignment_type, priority, due_date, notes, status, created_at, updated_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                rusqlite::params![
                    a.id,
                    a.question_id,
                    a.assigned_to,
                    a.assigned_by,
                    a.assignment_type.as_str(),
                    a.priority.as_str(),
                    a.due_date,
                    a.notes,
                    a.status.as_str(),
                    a.created_at,
                    a.updated_at,
                ],
            )?;
        }
        tx.commit()?;
        Ok(rows.len())
    }

    pub fn get_assignment(&self, id: &str) -> Result<Option<Assignment>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {ASSIGNMENT_COLS} FROM question_assignments WHERE id = ?"
        ))?;
        Ok(stmt.query_row([id], assignment_from_row).optional()?)
    }

    pub fn list_assignments(
        &self,
        assigned_to: Option<&str>,
        question_id: Option<&str>,
        status: Option<AssignmentStatus>,
        ty: Option<AssignmentType>,
        limit: usize,
        offset: usize,
    ) -> Result<(Vec<Assignment>, i64)> {
        let mut clauses: Vec<String> = Vec::new();
        let mut params: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();
        if let Some(u) = assigned_to {
            clauses.push("assigned_to = ?".into());
            params.push(Box::new(u.to_string()));
        }
        if let Some(q) = question_id {
            clauses.push("question_id = ?".into());
            params.push(Box::new(q.to_string()));
        }
        if let Some(s) = status {
            clauses.push("status = ?".into());
            params.push(Box::new(s.as_str().to_string()));
        }
        if let Some(t) = ty {
            clauses.push("assignment_type = ?".into());
            params.push(Box::new(t.as_str().to_string()));
        }
        let where_sql = if clauses.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", clauses.join(" AND "))
        };

        let refs: Vec<&dyn rusqlite::types::ToSql> =
            params.iter().map(|p| p.as_ref()).collect();
        let total: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM question_assignments {where_sql}"),
            refs.as_slice(),
            |r| r.get(0),
        )?;

        let sql = format!(
            "SELECT {ASSIGNMENT_COLS} FROM question_assignments {where_sql} \
             ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let limit = limit as i64;
        let offset = offset as i64;
        let mut refs: Vec<&dyn rusqlite::types::ToSql> =
            params.iter().map(|p| p.as_ref()).collect();
        refs.push(&limit);
        refs.push(&offset);
        let rows = stmt.query_map(refs.as_slice(), assignment_from_row)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok((out, total))
    }

    pub fn set_assignment_status(
        &self,
        id: &str,
        status: AssignmentStatus,
        notes: Option<&str>,
    ) -> Result<Option<Assignment>> {
        match notes {
            Some(n) => {
                self.conn.execute(
                    "UPDATE question_assignments SET status = ?, notes = ?, updated_at = ? \
                     WHERE id = ?",
                    rusqlite::params![status.as_str(), n, now_timestamp(), id],
                )?;
            }
            None => {
                self.conn.execute(
                    "UPDATE question_assignments SET status = ?, updated_at = ? WHERE id = ?",
                    rusqlite::params![status.as_str(), now_timestamp(), id],
                )?;
            }
        }
        self.get_assignment(id)
    }

    pub fn delete_assignment(&self, id: &str) -> Result<bool> {
        let n = self
            .conn
            .execute("DELETE FROM question_assignments WHERE id = ?", [id])?;
        Ok(n > 0)
    }

    // === Profiles ===

    pub fn upsert_profile(&self, p: &Profile) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO profiles (id, full_name, email, role) VALUES (?, ?, ?, ?)",
            rusqlite::params![p.id, p.full_name, p.email, p.role],
        )?;
        Ok(())
    }

    pub fn get_profile(&self, id: &str) -> Result<Option<Profile>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, full_name, email, role FROM profiles WHERE id = ?")?;
        Ok(stmt
            .query_row([id], |row| {
                Ok(Profile {
                    id: row.get(0)?,
                    full_name: row.get(1)?,
                    email: row.get(2)?,
                    role: row.get(3)?,
                })
            })
            .optional()?)
    }

    pub fn list_profiles(&self, role: Option<&str>) -> Result<Vec<Profile>> {
        let (sql, params): (&str, Vec<&dyn rusqlite::types::ToSql>) = match role {
            Some(ref r) => (
                "SELECT id, full_name, email, role FROM profiles WHERE role = ? ORDER BY full_name",
                vec![r as &dyn rusqlite::types::ToSql],
            ),
            None => (
                "SELECT id, full_name, email, role FROM profiles ORDER BY full_name",
                vec![],
            ),
        };
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map(params.as_slice(), |row| {
            Ok(Profile {
                id: row.get(0)?,
                full_name: row.get(1)?,
                email: row.get(2)?,
                role: row.get(3)?,
            })
        })?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    // === Stats ===

    pub fn stats(&self) -> Result<BankStats> {
        let questions: i64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM question_bank", [], |r| r.get(0))?;
        let active_questions = self.total_questions()?;
        let qa_records: i64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM qa_records", [], |r| r.get(0))?;
        let assignments: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM question_assignments",
            [],
            |r| r.get(0),
        )?;

        let mut stmt = self.conn.prepare(
            "SELECT subject, COUNT(*) FROM question_bank \
             WHERE is_active = 1 AND subject IS NOT NULL GROUP BY subject ORDER BY subject",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(SubjectCount {
                subject: row.get(0)?,
                count: row.get(1)?,
            })
        })?;
        let mut by_subject = Vec::new();
        for row in rows {
            by_subject.push(row?);
        }

        let mut stmt = self.conn.prepare(
            "SELECT qa_status, COUNT(*) FROM qa_records GROUP BY qa_status ORDER BY qa_status",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(StatusCount {
                status: row.get(0)?,
                count: row.get(1)?,
            })
        })?;
        let mut by_qa_status = Vec::new();
        for row in rows {
            by_qa_status.push(row?);
        }

        let db_size_bytes = std::fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0);

        Ok(BankStats {
            questions,
            active_questions,
            qa_records,
            assignments,
            by_subject,
            by_qa_status,
            db_size_bytes,
        })
    }
}
