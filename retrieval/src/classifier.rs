//! Query classification.
//!
//! Decides whether a question asks about the breadth of a room's history
//! (`Comprehensive`) or about something specific (`Targeted`). The two
//! strategies differ only in how wide retrieval casts its net.

use serde::{Deserialize, Serialize};

/// Retrieval strategy selected for a question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetrievalStrategy {
    /// Broad questions: summaries, overviews, lists.
    Comprehensive,

    /// Specific questions about one topic, person or moment.
    Targeted,
}

impl RetrievalStrategy {
    /// Stable lowercase name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Comprehensive => "comprehensive",
            Self::Targeted => "targeted",
        }
    }
}

impl std::fmt::Display for RetrievalStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Assigns a retrieval strategy to a question.
///
/// Implementations must be total: every input, including the empty string,
/// maps to exactly one strategy.
pub trait QueryClassifier: Send + Sync {
    /// Classify a question.
    fn classify(&self, query: &str) -> RetrievalStrategy;
}

/// Terms that imply the question is about breadth rather than a detail.
const DEFAULT_KEYWORDS: &[&str] = &[
    "summarize",
    "summarise",
    "summary",
    "overview",
    "all",
    "every",
    "everything",
    "decisions",
    "decided",
    "action items",
    "history",
    "recent",
    "recently",
    "recap",
    "highlights",
    "key points",
    "trends",
    "progress",
    "so far",
    "topics",
];

/// Leading question phrases that ask for an enumeration.
const DEFAULT_LEADING_PHRASES: &[&str] = &[
    "what are",
    "what were",
    "what have",
    "what has",
    "how many",
    "how much",
    "list",
    "show",
    "tell me about",
    "give me",
];

/// Classifier matching whole words and leading phrases, case-insensitively.
#[derive(Debug, Clone)]
pub struct KeywordClassifier {
    keywords: Vec<String>,
    leading_phrases: Vec<String>,
}

impl KeywordClassifier {
    /// Create a classifier with custom keyword and leading-phrase lists.
    pub fn new<K, P>(keywords: K, leading_phrases: P) -> Self
    where
        K: IntoIterator,
        K::Item: AsRef<str>,
        P: IntoIterator,
        P::Item: AsRef<str>,
    {
        Self {
            keywords: keywords.into_iter().map(|k| normalize(k.as_ref())).collect(),
            leading_phrases: leading_phrases
                .into_iter()
                .map(|p| normalize(p.as_ref()))
                .collect(),
        }
    }

    /// Whether the normalized query contains one of the keywords as whole words.
    fn has_keyword(&self, padded: &str) -> bool {
        self.keywords
            .iter()
            .filter(|k| !k.is_empty())
            .any(|k| padded.contains(&format!(" {k} ")))
    }

    /// Whether the normalized query starts with one of the leading phrases.
    fn has_leading_phrase(&self, padded: &str) -> bool {
        self.leading_phrases
            .iter()
            .filter(|p| !p.is_empty())
            .any(|p| padded.starts_with(&format!(" {p} ")))
    }
}

impl Default for KeywordClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_KEYWORDS, DEFAULT_LEADING_PHRASES)
    }
}

impl QueryClassifier for KeywordClassifier {
    fn classify(&self, query: &str) -> RetrievalStrategy {
        let padded = format!(" {} ", normalize(query));
        if self.has_keyword(&padded) || self.has_leading_phrase(&padded) {
            RetrievalStrategy::Comprehensive
        } else {
            RetrievalStrategy::Targeted
        }
    }
}

/// Lowercase, turn punctuation into spaces and collapse runs of whitespace.
fn normalize(text: &str) -> String {
    text.to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
