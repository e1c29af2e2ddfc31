use std::sync::LazyLock;

use regex::Regex;

static UUID_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?i)[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}$").unwrap()
});

// Human-readable IDs look like MATH_algebra_quadratics_0042.
static HUMAN_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?i)[A-Z]+_[a-z]+_[a-z]+_\d+$").unwrap());

/// How a free-text search term should be interpreted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchTerm {
    /// UUID-shaped: exact primary-key lookup, never a substring match.
    Uuid(String),
    /// Human-readable ID shaped: exact lookup on human_readable_id.
    HumanId(String),
    /// Anything else: multi-field case-insensitive substring search.
    Text(String),
}

pub fn classify(term: &str) -> SearchTerm {
    let term = term.trim();
    if UUID_RE.is_match(term) {
        SearchTerm::Uuid(term.to_ascii_lowercase())
    } else if HUMAN_ID_RE.is_match(term) {
        SearchTerm::HumanId(term.to_string())
    } else {
        SearchTerm::Text(term.to_string())
    }
}

/// Escape SQL LIKE wildcards so user input never acts as a pattern.
/// Callers must append `ESCAPE '\'` to the LIKE clause.
pub fn escape_like(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        if ch == '\\' || ch == '%' || ch == '_' {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}
