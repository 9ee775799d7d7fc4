//! Context block assembly and room statistics.
//!
//! Turns a [`RetrievalResult`] into the flat text block handed to the
//! answering model, and summarizes a room's history from metadata alone.

use std::collections::{BTreeSet, HashMap};

use parley_store::MeetingMetadata;
use serde::{Deserialize, Serialize};

use crate::result::{Degradation, RankedContextLine, RetrievalResult};
use crate::session::{ConversationTurn, Role};

/// Number of participants reported in [`RoomStats::frequent_participants`].
pub const FREQUENT_PARTICIPANTS: usize = 5;

const CURRENT_MEETING: &str = "CURRENT MEETING:";
const HISTORICAL_CONTEXT: &str = "RELEVANT HISTORICAL CONTEXT:";
const RECENT_CONVERSATION: &str = "RECENT CONVERSATION:";

/// Aggregate statistics for a room, computed from meeting metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomStats {
    /// Meetings with at least one transcript line or a summary.
    pub total_meetings: usize,

    /// Transcript lines across those meetings.
    pub total_transcripts: usize,

    /// Distinct meeting types, sorted.
    pub meeting_types: Vec<String>,

    /// Up to five most frequent participants, most frequent first.
    pub frequent_participants: Vec<String>,
}

/// Compute statistics over the meetings that have content.
///
/// Participants tied on frequency keep the order they were first seen in.
pub fn compute_room_stats(meetings: &[MeetingMetadata]) -> RoomStats {
    let mut stats = RoomStats::default();
    let mut types = BTreeSet::new();
    let mut counts: HashMap<&str, (usize, usize)> = HashMap::new();

    for meeting in meetings.iter().filter(|m| m.has_content()) {
        stats.total_meetings += 1;
        stats.total_transcripts += meeting.transcript_count;
        types.insert(meeting.meeting_type.clone());

        for name in &meeting.participant_names {
            let first_seen = counts.len();
            counts.entry(name.as_str()).or_insert((0, first_seen)).0 += 1;
        }
    }

    let mut ranked: Vec<(&str, usize, usize)> = counts
        .into_iter()
        .map(|(name, (count, first_seen))| (name, count, first_seen))
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.2.cmp(&b.2)));

    stats.meeting_types = types.into_iter().collect();
    stats.frequent_participants = ranked
        .into_iter()
        .take(FREQUENT_PARTICIPANTS)
        .map(|(name, _, _)| name.to_string())
        .collect();
    stats
}

/// Formats retrieval results for the answering model.
#[derive(Debug, Clone, Default)]
pub struct ContextAssembler;

impl ContextAssembler {
    /// Create an assembler.
    pub fn new() -> Self {
        Self
    }

    /// Render live and historical context as a text block.
    pub fn format(&self, result: &RetrievalResult) -> String {
        let mut sections = Vec::new();

        if !result.live_context.is_empty() {
            let mut section = String::from(CURRENT_MEETING);
            for line in &result.live_context {
                section.push('\n');
                section.push_str(&format!("{}: {}", line.speaker, line.text));
            }
            sections.push(section);
        }

        if !result.historical_context.is_empty() {
            let mut section = String::from(HISTORICAL_CONTEXT);
            for line in &result.historical_context {
                section.push('\n');
                section.push_str(&historical_line(line));
            }
            sections.push(section);
        }

        if sections.is_empty() {
            return explain_missing_context(&result.degradations);
        }
        sections.join("\n\n")
    }

    /// Render the context block followed by recent conversation turns.
    pub fn format_with_history(
        &self,
        result: &RetrievalResult,
        turns: &[ConversationTurn],
    ) -> String {
        let block = self.format(result);
        if turns.is_empty() {
            return block;
        }

        let mut section = String::from(RECENT_CONVERSATION);
        for turn in turns {
            let who = match turn.role {
                Role::User => "User",
                Role::Assistant => "Assistant",
            };
            section.push('\n');
            section.push_str(&format!("{who}: {}", turn.text));
        }
        format!("{block}\n\n{section}")
    }
}

fn historical_line(line: &RankedContextLine) -> String {
    format!(
        "[{}, {}% match] {}: {}",
        line.source_label(),
        line.match_percent(),
        line.speaker,
        line.text
    )
}

fn explain_missing_context(degradations: &[Degradation]) -> String {
    if degradations.contains(&Degradation::RoomNotFound) {
        return "No meeting context is available: this room has no recorded meetings.".to_string();
    }

    let history_note = if degradations.iter().any(|d| {
        matches!(
            d,
            Degradation::EmbeddingUnavailable { .. } | Degradation::StoreUnavailable { .. }
        )
    }) {
        "Past meeting history could not be searched right now."
    } else if degradations.contains(&Degradation::NoEmbeddedMeetings) {
        "Past meetings in this room have not been processed for search yet."
    } else {
        "No past discussion relevant to this question was found."
    };

    format!("No live transcript is available. {history_note}")
}
