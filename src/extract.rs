//! Context Extractor
//!
//! Finds self-introductions ("my name is ...", "I work at ...") in a message.
//! Pure; the router persists whatever comes back.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::text::title_case;

/// Introduction patterns, tried in order. Group 1 is the name.
static NAME_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)\bmy name is\s+([\p{L}'-]+(?:\s+[\p{L}'-]+){0,2})",
        r"(?i)\byou can call me\s+([\p{L}'-]+(?:\s+[\p{L}'-]+){0,2})",
        r"(?i)\bcall me\s+([\p{L}'-]+)",
        r"(?i)\bi'?m\s+([\p{L}'-]+)",
        r"(?i)\bi am\s+([\p{L}'-]+)",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

/// Cheap pre-check before running the company pattern
static COMPANY_HINTS: &[&str] = &["work at", "work for", "company", "from the team at"];

static COMPANY_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(?:i work at|i work for|my company is|company called|company|from the team at)\s+([\p{L}\p{N}&.'-]+(?:\s+[\p{L}\p{N}&.'-]+){0,3})",
    )
    .unwrap()
});

// Words that follow "I'm" without being a name
static NOT_NAMES: &[&str] = &[
    "a", "an", "the", "not", "just", "fine", "good", "great", "ok", "okay", "well", "busy",
    "here", "back", "sorry", "glad", "happy", "sure", "interested", "looking", "trying",
    "working", "calling", "writing", "from", "new", "still", "also", "very", "so", "in", "on",
    "at", "with", "going", "doing", "having", "available", "free", "tired", "late", "done",
    "ready", "curious", "about",
];

// Trailing words that end a captured name/company
static STOP_WORDS: &[&str] = &["and", "but", "i", "from", "at", "in", "here", "please", "e"];

/// What an introduction revealed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extracted {
    pub name: Option<String>,
    pub company: Option<String>,
}

impl Extracted {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.company.is_none()
    }
}

pub fn extract(text: &str) -> Extracted {
    Extracted {
        name: extract_name(text),
        company: extract_company(text),
    }
}

fn extract_name(text: &str) -> Option<String> {
    NAME_PATTERNS.iter().find_map(|pattern| {
        let captured = pattern.captures(text)?.get(1)?.as_str();
        let name = trim_at_stop_word(captured);
        let first = name.split_whitespace().next()?.to_lowercase();
        if NOT_NAMES.contains(&first.as_str()) {
            return None;
        }
        Some(title_case(&name))
    })
}

fn extract_company(text: &str) -> Option<String> {
    let lower = text.to_lowercase();
    if !COMPANY_HINTS.iter().any(|hint| lower.contains(hint)) {
        return None;
    }

    let captured = COMPANY_PATTERN.captures(text)?.get(1)?.as_str();
    let company = trim_at_stop_word(captured);
    let company = company.trim_end_matches(|c| c == '.' || c == ',');
    if company.is_empty() {
        None
    } else {
        Some(company.to_string())
    }
}

/// Keep leading words up to the first stop word
fn trim_at_stop_word(captured: &str) -> String {
    captured
        .split_whitespace()
        .take_while(|word| !STOP_WORDS.contains(&word.to_lowercase().as_str()))
        .collect::<Vec<_>>()
        .join(" ")
}
