//! Intent Classifiers
//!
//! Pure keyword/regex matching over normalized text. Every table here is
//! ordered: the first entry that matches wins.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::text::normalize;

/// Greeting only counts this early in a conversation (prior stored turns)
pub const GREETING_MAX_PRIOR_TURNS: usize = 2;

/// Words a greeting starts with
static GREETING_WORDS: &[&str] = &[
    "good morning",
    "good afternoon",
    "good evening",
    "hello",
    "hey",
    "hi",
    "howdy",
    "olá",
    "ola",
    "oi",
];

/// Markers that close a conversation, anywhere in the text
static FAREWELL_MARKERS: &[&str] = &[
    "goodbye",
    "bye",
    "thank you",
    "thanks",
    "see you",
    "talk later",
    "take care",
    "cheers",
];

/// Keyword -> topic label; order is the tie-break
pub static NETWORKING_TOPICS: &[(&str, &str)] = &[
    ("campaign", "campaign analytics with Python"),
    ("data", "data-driven solutions"),
    ("automation", "process automation"),
    ("website", "full stack development"),
    ("marketing", "traffic optimization"),
];

/// Keywords that get forwarded to the owner
static URGENCY_MARKERS: &[&str] = &["urgent", "urgente", "emergency", "asap"];

/// Canned answers available while the owner is in work mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkShortcut {
    Pricing,
    Meeting,
    Services,
    Contact,
}

/// Keyword -> shortcut; order is the tie-break
pub static WORK_SHORTCUTS: &[(&str, WorkShortcut)] = &[
    ("price", WorkShortcut::Pricing),
    ("quote", WorkShortcut::Pricing),
    ("budget", WorkShortcut::Pricing),
    ("meeting", WorkShortcut::Meeting),
    ("schedule", WorkShortcut::Meeting),
    ("call", WorkShortcut::Meeting),
    ("service", WorkShortcut::Services),
    ("email", WorkShortcut::Contact),
    ("contact", WorkShortcut::Contact),
];

static GREETING_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"^(?:{})\b", alternation(GREETING_WORDS))).unwrap()
});

static FAREWELL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"\b(?:{})\b", alternation(FAREWELL_MARKERS))).unwrap()
});

static URGENCY_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"\b(?:{})\b", alternation(URGENCY_MARKERS))).unwrap()
});

// Prefix match on the keyword so "campaigns", "automations" still hit
static TOPIC_PATTERNS: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    NETWORKING_TOPICS
        .iter()
        .map(|(keyword, label)| {
            (Regex::new(&format!(r"\b{}", regex::escape(keyword))).unwrap(), *label)
        })
        .collect()
});

static SHORTCUT_PATTERNS: Lazy<Vec<(Regex, WorkShortcut)>> = Lazy::new(|| {
    WORK_SHORTCUTS
        .iter()
        .map(|(keyword, shortcut)| {
            (Regex::new(&format!(r"\b{}", regex::escape(keyword))).unwrap(), *shortcut)
        })
        .collect()
});

fn alternation(words: &[&str]) -> String {
    words
        .iter()
        .map(|w| regex::escape(w))
        .collect::<Vec<_>>()
        .join("|")
}

/// Template-worthy intent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    Greeting,
    Farewell,
    Networking(&'static str),
}

/// Classifier kinds in the order they are tried
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntentKind {
    Greeting,
    Farewell,
    Networking,
}

pub const INTENT_PRIORITY: [IntentKind; 3] =
    [IntentKind::Greeting, IntentKind::Farewell, IntentKind::Networking];

pub fn is_greeting(text: &str) -> bool {
    GREETING_PATTERN.is_match(&normalize(text))
}

pub fn is_farewell(text: &str) -> bool {
    FAREWELL_PATTERN.is_match(&normalize(text))
}

/// Label of the first networking topic mentioned
pub fn networking_topic(text: &str) -> Option<&'static str> {
    let text = normalize(text);
    TOPIC_PATTERNS
        .iter()
        .find(|(pattern, _)| pattern.is_match(&text))
        .map(|(_, label)| *label)
}

pub fn is_command(text: &str, prefix: char) -> bool {
    text.trim().starts_with(prefix)
}

pub fn is_urgent(text: &str) -> bool {
    URGENCY_PATTERN.is_match(&normalize(text))
}

pub fn work_shortcut(text: &str) -> Option<WorkShortcut> {
    let text = normalize(text);
    SHORTCUT_PATTERNS
        .iter()
        .find(|(pattern, _)| pattern.is_match(&text))
        .map(|(_, shortcut)| *shortcut)
}

/// Run the classifiers in priority order.
///
/// `prior_turns` is the number of stored turns before this message; greeting
/// is skipped once the conversation is under way.
pub fn classify(text: &str, prior_turns: usize) -> Option<Intent> {
    INTENT_PRIORITY.iter().find_map(|kind| match kind {
        IntentKind::Greeting => {
            (prior_turns <= GREETING_MAX_PRIOR_TURNS && is_greeting(text)).then_some(Intent::Greeting)
        }
        IntentKind::Farewell => is_farewell(text).then_some(Intent::Farewell),
        IntentKind::Networking => networking_topic(text).map(Intent::Networking),
    })
}
