use anyhow::Result;
use rusqlite::Connection;

pub fn create_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        -- Version tracking
        CREATE TABLE IF NOT EXISTS qbank_meta (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );

        -- Core tables
        CREATE TABLE IF NOT EXISTS question_bank (
            id TEXT PRIMARY KEY,
            human_readable_id TEXT,
            question_text TEXT NOT NULL,
            question_type TEXT,
            subject TEXT,
            section TEXT,
            grade TEXT,
            topic TEXT,
            subtopic TEXT,
            difficulty INTEGER,
            relevance TEXT,
            total_marks REAL,
            boards TEXT NOT NULL DEFAULT '[]',
            course_types TEXT NOT NULL DEFAULT '[]',
            levels TEXT NOT NULL DEFAULT '[]',
            tags TEXT NOT NULL DEFAULT '[]',
            is_pyq INTEGER NOT NULL DEFAULT 0,
            pyq_year TEXT,
            month TEXT,
            paper_number TEXT,
            is_active INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now')),
            updated_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now'))
        );

        -- One QA record per question, carrying the current review
        -- state; qa_history keeps the transition trail.
        CREATE TABLE IF NOT EXISTS qa_records (
            id TEXT PRIMARY KEY,
            question_id TEXT NOT NULL UNIQUE REFERENCES question_bank(id) ON DELETE CASCADE,
            qa_status TEXT NOT NULL DEFAULT 'pending',
            reviewer_id TEXT,
            review_date TEXT,
            review_notes TEXT,
            content_accuracy INTEGER,
            difficulty_appropriateness INTEGER,
            clarity_rating INTEGER,
            solution_quality INTEGER,
            overall_rating REAL,
            revision_count INTEGER NOT NULL DEFAULT 0,
            last_revision_date TEXT,
            revision_notes TEXT,
            is_flagged INTEGER NOT NULL DEFAULT 0,
            flag_reason TEXT,
            priority_level TEXT NOT NULL DEFAULT 'medium',
            qa_tags TEXT NOT NULL DEFAULT '[]',
            created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now')),
            updated_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now'))
        );

        -- Audit trail of QA status changes, one row per transition
        CREATE TABLE IF NOT EXISTS qa_history (
            id TEXT PRIMARY KEY,
            question_id TEXT NOT NULL REFERENCES question_bank(id) ON DELETE CASCADE,
            action TEXT NOT NULL,
            old_value TEXT,
            new_value TEXT,
            action_by TEXT,
            action_reason TEXT,
            created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now'))
        );

        CREATE TABLE IF NOT EXISTS question_assignments (
            id TEXT PRIMARY KEY,
            question_id TEXT NOT NULL REFERENCES question_bank(id) ON DELETE CASCADE,
            assigned_to TEXT NOT NULL,
            assigned_by TEXT NOT NULL,
            assignment_type TEXT NOT NULL DEFAULT 'edit',
            priority TEXT NOT NULL DEFAULT 'medium',
            due_date TEXT,
            notes TEXT,
            status TEXT NOT NULL DEFAULT 'assigned',
            created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now')),
            updated_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now')),
            UNIQUE(question_id, assigned_to, assignment_type)
        );

        CREATE TABLE IF NOT EXISTS profiles (
            id TEXT PRIMARY KEY,
            full_name TEXT NOT NULL,
            email TEXT,
            role TEXT NOT NULL DEFAULT 'viewer'
        );

        -- Indexes for common filters
        CREATE INDEX IF NOT EXISTS idx_questions_subject ON question_bank(subject);
        CREATE INDEX IF NOT EXISTS idx_questions_difficulty ON question_bank(difficulty);
        CREATE INDEX IF NOT EXISTS idx_questions_grade ON question_bank(grade);
        CREATE INDEX IF NOT EXISTS idx_questions_created ON question_bank(created_at);
        CREATE INDEX IF NOT EXISTS idx_questions_hrid ON question_bank(human_readable_id);
        CREATE INDEX IF NOT EXISTS idx_qa_status ON qa_records(qa_status);
        CREATE INDEX IF NOT EXISTS idx_qa_history_question ON qa_history(question_id, created_at);
        CREATE INDEX IF NOT EXISTS idx_assignments_user ON question_assignments(assigned_to, status);
        CREATE INDEX IF NOT EXISTS idx_assignments_question ON question_assignments(question_id);

        -- Denormalized read view: question plus its current QA state.
        -- qa_records is unique per question, so this is exactly the
        -- 'latest QA status' view without any dedup pass.
        CREATE VIEW IF NOT EXISTS question_bank_enhanced AS
        SELECT q.*,
               r.qa_status AS qa_status,
               r.priority_level AS priority_level,
               r.is_flagged AS is_flagged,
               r.overall_rating AS overall_rating
        FROM question_bank q
        LEFT JOIN qa_records r ON r.question_id = q.id;
        ",
    )?;

    // Set schema version
    conn.execute(
        "INSERT OR REPLACE INTO qbank_meta (key, value) VALUES ('schema_version', '1')",
        [],
    )?;

    Ok(())
}
