use unicode_width::UnicodeWidthStr;

use crate::db::models::*;

/// Truncate a string to fit within max_width (respecting unicode width).
fn truncate(s: &str, max_width: usize) -> String {
    if UnicodeWidthStr::width(s) <= max_width {
        return s.to_string();
    }
    let mut result = String::new();
    let mut width = 0;
    for ch in s.chars() {
        let cw = unicode_width::UnicodeWidthChar::width(ch).unwrap_or(0);
        if width + cw + 3 > max_width {
            result.push_str("...");
            break;
        }
        result.push(ch);
        width += cw;
    }
    result
}

fn dash(v: &Option<String>) -> &str {
    v.as_deref().unwrap_or("-")
}

/// Format a page of questions as a table.
pub fn print_question_list(questions: &[Question], total: i64) {
    if questions.is_empty() {
        println!("No questions found");
        return;
    }

    println!(
        "{} of {} question{}:\n",
        questions.len(),
        total,
        if total == 1 { "" } else { "s" }
    );

    println!(
        "  {:<50} {:<12} {:<14} {:<4}",
        "QUESTION", "SUBJECT", "TOPIC", "DIFF"
    );
    println!("  {}", "-".repeat(84));

    for q in questions {
        let text = q.question_text.replace('\n', " ");
        println!(
            "  {:<50} {:<12} {:<14} {:<4}",
            truncate(&text, 48),
            truncate(dash(&q.subject), 10),
            truncate(dash(&q.topic), 12),
            q.difficulty.map(|d| d.to_string()).unwrap_or_else(|| "-".into()),
        );
        println!("  id: {}\n", q.id);
    }
}

/// Format one question in full.
pub fn print_question_detail(q: &Question, qa: Option<&QaRecord>) {
    println!("id:          {}", q.id);
    if let Some(ref hid) = q.human_readable_id {
        println!("readable id: {hid}");
    }
    println!("subject:     {}", dash(&q.subject));
    println!("topic:       {} / {}", dash(&q.topic), dash(&q.subtopic));
    println!("grade:       {}", dash(&q.grade));
    if let Some(d) = q.difficulty {
        println!("difficulty:  {d}/10");
    }
    if !q.boards.is_empty() {
        println!("boards:      {}", q.boards.join(", "));
    }
    if !q.tags.is_empty() {
        println!("tags:        {}", q.tags.join(", "));
    }
    if q.is_pyq {
        println!(
            "pyq:         {} {} paper {}",
            dash(&q.pyq_year),
            dash(&q.month),
            dash(&q.paper_number)
        );
    }
    match qa {
        Some(rec) => {
            print!("qa status:   {}", rec.qa_status);
            if let Some(r) = rec.overall_rating {
                print!(" (rating {r:.1})");
            }
            println!();
        }
        None => println!("qa status:   pending (no record)"),
    }
    println!("updated:     {}", q.updated_at);
    println!("\n{}", q.question_text);
}

/// Format bank statistics.
pub fn print_stats(stats: &BankStats) {
    println!("Questions:     {} ({} active)", stats.questions, stats.active_questions);
    println!("QA records:    {}", stats.qa_records);
    println!("Assignments:   {}", stats.assignments);
    println!(
        "Database size: {:.1} MB",
        stats.db_size_bytes as f64 / 1_048_576.0
    );

    if !stats.by_subject.is_empty() {
        println!("\nBy subject:");
        for s in &stats.by_subject {
            println!("  {:<20} {}", truncate(&s.subject, 18), s.count);
        }
    }
    if !stats.by_qa_status.is_empty() {
        println!("\nBy QA status:");
        for s in &stats.by_qa_status {
            println!("  {:<20} {}", s.status, s.count);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_respects_width() {
        assert_eq!(truncate("short", 10), "short");
        let long = truncate("a very long question text here", 12);
        assert!(long.ends_with("..."));
        assert!(UnicodeWidthStr::width(long.as_str()) <= 12);
    }
}
