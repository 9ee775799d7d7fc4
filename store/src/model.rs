//! Record types for the three storage tiers.
//!
//! Meeting metadata is small and always loaded. Transcript entries are loaded
//! on demand for a single meeting. Transcript embeddings carry the vector
//! payload and live in their own tier so metadata and transcript reads never
//! pay for loading vectors.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A meeting room as resolved by the room registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeetingRoom {
    /// Internal room id, used as `MeetingMetadata::room_id`.
    pub id: String,

    /// Human-readable identifier callers address the room by (e.g. "standup-alpha").
    pub identifier: String,

    /// Display name.
    pub name: String,

    /// Ids of the meeting sessions held in this room.
    #[serde(default)]
    pub meeting_ids: Vec<String>,
}

impl MeetingRoom {
    /// Create a room with a generated id.
    pub fn new(identifier: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            identifier: identifier.into(),
            name: name.into(),
            meeting_ids: Vec::new(),
        }
    }
}

/// Metadata for one meeting session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeetingMetadata {
    /// Unique meeting id.
    pub id: String,

    /// Room the meeting was held in.
    pub room_id: String,

    /// Free-text meeting type label (e.g. "Daily Standup").
    #[serde(rename = "type")]
    pub meeting_type: String,

    /// Optional title given by the organiser.
    #[serde(default)]
    pub title: Option<String>,

    /// When the session started.
    pub started_at: DateTime<Utc>,

    /// When the session ended, if it has.
    #[serde(default)]
    pub ended_at: Option<DateTime<Utc>>,

    /// Participant display names in join order.
    #[serde(default)]
    pub participant_names: Vec<String>,

    /// Number of transcript entries recorded for the meeting.
    #[serde(default)]
    pub transcript_count: usize,

    /// Whether the embedding tier holds a complete batch for this meeting.
    #[serde(default)]
    pub has_embeddings: bool,

    /// Post-meeting summary, when one has been generated.
    #[serde(default)]
    pub summary: Option<String>,
}

impl MeetingMetadata {
    /// Create metadata for a meeting starting at `started_at`.
    pub fn new(
        room_id: impl Into<String>,
        meeting_type: impl Into<String>,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            room_id: room_id.into(),
            meeting_type: meeting_type.into(),
            title: None,
            started_at,
            ended_at: None,
            participant_names: Vec::new(),
            transcript_count: 0,
            has_embeddings: false,
            summary: None,
        }
    }

    /// Use a caller-supplied id.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Set the participant list.
    pub fn with_participants<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.participant_names = names.into_iter().map(Into::into).collect();
        self
    }

    /// Set the summary.
    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }

    /// Mark the meeting as ended.
    pub fn with_ended_at(mut self, ended_at: DateTime<Utc>) -> Self {
        self.ended_at = Some(ended_at);
        self
    }

    /// Whether the meeting has any transcript or summary content.
    pub fn has_content(&self) -> bool {
        self.transcript_count > 0
            || self
                .summary
                .as_deref()
                .is_some_and(|s| !s.trim().is_empty())
    }
}

/// One line of a meeting transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptEntry {
    /// Who spoke.
    pub speaker: String,

    /// What was said.
    pub text: String,

    /// When it was said.
    pub timestamp: DateTime<Utc>,

    /// Diarization confidence in `[0, 1]`, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speaker_confidence: Option<f32>,
}

impl TranscriptEntry {
    /// Create a transcript entry.
    pub fn new(
        speaker: impl Into<String>,
        text: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            speaker: speaker.into(),
            text: text.into(),
            timestamp,
            speaker_confidence: None,
        }
    }

    /// Attach a diarization confidence, clamped to `[0, 1]`.
    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.speaker_confidence = Some(confidence.clamp(0.0, 1.0));
        self
    }
}

/// The vector form of one transcript line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptEmbedding {
    /// Meeting the line belongs to.
    pub meeting_id: String,

    /// Position of the line in the meeting's transcript; unique per meeting.
    pub transcript_index: usize,

    /// Who spoke.
    pub speaker: String,

    /// What was said.
    pub text: String,

    /// When it was said.
    pub timestamp: DateTime<Utc>,

    /// Embedding of `text`.
    pub vector: Vec<f32>,
}

impl TranscriptEmbedding {
    /// Build the embedding row for the transcript entry at `index`.
    pub fn from_entry(
        meeting_id: impl Into<String>,
        index: usize,
        entry: &TranscriptEntry,
        vector: Vec<f32>,
    ) -> Self {
        Self {
            meeting_id: meeting_id.into(),
            transcript_index: index,
            speaker: entry.speaker.clone(),
            text: entry.text.clone(),
            timestamp: entry.timestamp,
            vector,
        }
    }
}
