//! Question import.
//!
//! Accepts JSON files holding either a single question object or an
//! array of them, plus directories and glob patterns of such files.

use anyhow::{bail, Context, Result};
use serde_json::Value;
use std::path::Path;
use tracing::info;

use crate::db::models::NewQuestion;
use crate::db::Database;

/// Import one or more paths (files, directories, or glob patterns).
/// Returns the number of questions imported.
pub fn import_paths(db: &Database, paths: &[String], dry_run: bool) -> Result<usize> {
    let mut count = 0;

    for path_str in paths {
        let path = Path::new(path_str);
        if path.is_dir() {
            count += import_directory(db, path, dry_run)?;
        } else if path.is_file() {
            count += import_file(db, path, dry_run)?;
        } else {
            let matches: Vec<_> = glob::glob(path_str)
                .with_context(|| format!("Invalid path or glob pattern: {path_str}"))?
                .filter_map(|r| r.ok())
                .collect();

            if matches.is_empty() {
                bail!("No files found matching: {path_str}");
            }

            for entry in matches {
                if entry.is_file() {
                    count += import_file(db, &entry, dry_run)?;
                }
            }
        }
    }

    Ok(count)
}

fn import_directory(db: &Database, dir: &Path, dry_run: bool) -> Result<usize> {
    let mut count = 0;

    let mut entries: Vec<_> = std::fs::read_dir(dir)?.filter_map(|e| e.ok()).collect();
    entries.sort_by_key(|e| e.path());

    for entry in entries {
        let path = entry.path();
        if path.is_dir() {
            count += import_directory(db, &path, dry_run)?;
        } else if path.extension().and_then(|e| e.to_str()) == Some("json") {
            count += import_file(db, &path, dry_run)?;
        }
    }

    Ok(count)
}

fn import_file(db: &Database, path: &Path, dry_run: bool) -> Result<usize> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read: {}", path.display()))?;
    let questions = parse_questions(&content)
        .with_context(|| format!("Failed to parse: {}", path.display()))?;

    if dry_run {
        for q in &questions {
            let text: String = q.question_text.chars().take(60).collect();
            println!("  [dry-run] Would import: {text}");
        }
        return Ok(questions.len());
    }

    let mut count = 0;
    for q in &questions {
        db.insert_question(q)?;
        count += 1;
    }
    info!("Imported {} question(s) from {}", count, path.display());
    Ok(count)
}

/// A file may hold a single question object or an array of them.
pub fn parse_questions(content: &str) -> Result<Vec<NewQuestion>> {
    let value: Value = serde_json::from_str(content).context("not valid JSON")?;
    let raw = match value {
        Value::Array(items) => items,
        obj @ Value::Object(_) => vec![obj],
        _ => bail!("expected a JSON object or array of objects"),
    };

    let mut out = Vec::with_capacity(raw.len());
    for (i, item) in raw.into_iter().enumerate() {
        let q: NewQuestion = serde_json::from_value(item)
            .with_context(|| format!("question #{}", i + 1))?;
        if q.question_text.trim().is_empty() {
            bail!("question #{} has empty question_text", i + 1);
        }
        out.push(q);
    }
    Ok(out)
}
