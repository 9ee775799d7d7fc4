//! Live transcript parsing.
//!
//! The in-progress transcript arrives as plain text, one `speaker: text`
//! utterance per line. Lines that do not have that shape are expected noise
//! (partial captions, system notices) and are dropped.

use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::trace;

/// One utterance of transcript context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextLine {
    /// Who spoke.
    pub speaker: String,

    /// What was said.
    pub text: String,

    /// When it was said.
    pub timestamp: DateTime<Utc>,
}

/// A live transcript line that does not have the `speaker: text` shape.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid transcript line: {line:?}")]
pub struct InvalidTranscriptLine {
    /// The offending line.
    pub line: String,
}

/// Speaker names: 1-64 chars up to the first colon, containing a letter.
static LINE_PATTERN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^\s*([^:\n]{1,64}?)\s*:\s*(\S.*?)\s*$").ok());

/// Parse one live transcript line.
pub fn parse_line(
    line: &str,
    timestamp: DateTime<Utc>,
) -> Result<ContextLine, InvalidTranscriptLine> {
    let invalid = || InvalidTranscriptLine {
        line: line.to_string(),
    };

    let re = LINE_PATTERN.as_ref().ok_or_else(invalid)?;
    let caps = re.captures(line).ok_or_else(invalid)?;

    let speaker = caps.get(1).map(|m| m.as_str().trim()).unwrap_or_default();
    let text = caps.get(2).map(|m| m.as_str().trim()).unwrap_or_default();

    if speaker.is_empty() || text.is_empty() || !speaker.chars().any(char::is_alphabetic) {
        return Err(invalid());
    }

    Ok(ContextLine {
        speaker: speaker.to_string(),
        text: text.to_string(),
        timestamp,
    })
}

/// Parse a live transcript block, keeping well-formed lines in order.
///
/// Every line is stamped with `now`; the live transcript carries no
/// per-line timing.
pub fn parse_live_transcript(text: &str, now: DateTime<Utc>) -> Vec<ContextLine> {
    text.lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| match parse_line(line, now) {
            Ok(parsed) => Some(parsed),
            Err(err) => {
                trace!("Dropping live line: {err}");
                None
            }
        })
        .collect()
}
