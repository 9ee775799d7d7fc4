//! Storage traits.
//!
//! [`TieredStore`] owns the three tiers. [`RoomRegistry`] resolves
//! human-readable room identifiers. Both are async so that backends can sit
//! behind a network hop; callers apply their own deadlines.

use std::collections::HashSet;

use async_trait::async_trait;

use crate::error::{Result, StoreError};
use crate::model::{MeetingMetadata, MeetingRoom, TranscriptEmbedding, TranscriptEntry};

/// Storage for meeting metadata, transcripts and transcript embeddings.
#[async_trait]
pub trait TieredStore: Send + Sync {
    /// Insert or replace a meeting's metadata.
    async fn upsert_meeting(&self, meeting: MeetingMetadata) -> Result<()>;

    /// Look up a single meeting.
    async fn meeting(&self, meeting_id: &str) -> Result<Option<MeetingMetadata>>;

    /// Up to `limit` meetings for a room, most recently started first.
    async fn recent_meetings(&self, room_id: &str, limit: usize) -> Result<Vec<MeetingMetadata>>;

    /// Every meeting for a room, most recently started first.
    async fn meetings_for_room(&self, room_id: &str) -> Result<Vec<MeetingMetadata>>;

    /// Append a line to a meeting's transcript, bumping `transcript_count`.
    async fn append_transcript(&self, meeting_id: &str, entry: TranscriptEntry) -> Result<()>;

    /// A meeting's transcript in recording order.
    async fn transcript(&self, meeting_id: &str) -> Result<Vec<TranscriptEntry>>;

    /// A meeting's embedding rows ordered by `transcript_index`.
    ///
    /// Returns an empty list when the meeting has no embeddings.
    async fn embeddings_for_meeting(&self, meeting_id: &str) -> Result<Vec<TranscriptEmbedding>>;

    /// Replace a meeting's embedding rows with `rows` as one operation.
    ///
    /// Readers observe either the previous complete batch or the new one.
    /// On success `has_embeddings` is true; on any failure it is false and no
    /// rows remain for the meeting.
    async fn replace_embeddings(&self, meeting_id: &str, rows: Vec<TranscriptEmbedding>)
    -> Result<()>;

    /// Drop a meeting's embedding rows and clear `has_embeddings`.
    async fn clear_embeddings(&self, meeting_id: &str) -> Result<()>;

    /// Delete a meeting together with its transcript and embeddings.
    async fn delete_meeting(&self, meeting_id: &str) -> Result<()>;
}

/// Resolves room identifiers to room records.
#[async_trait]
pub trait RoomRegistry: Send + Sync {
    /// Find a room by its human-readable identifier.
    async fn resolve_room(&self, identifier: &str) -> Result<Option<MeetingRoom>>;

    /// Register or replace a room.
    async fn register_room(&self, room: MeetingRoom) -> Result<()>;
}

/// Check that `rows` is a complete embedding batch for `meeting`.
pub fn validate_embedding_batch(
    meeting: &MeetingMetadata,
    rows: &[TranscriptEmbedding],
) -> Result<()> {
    let invalid = |reason: String| StoreError::InvalidEmbeddingBatch {
        meeting_id: meeting.id.clone(),
        reason,
    };

    if rows.len() != meeting.transcript_count {
        return Err(invalid(format!(
            "expected {} rows to match transcript count, got {}",
            meeting.transcript_count,
            rows.len()
        )));
    }

    let mut seen = HashSet::with_capacity(rows.len());
    for row in rows {
        if row.meeting_id != meeting.id {
            return Err(invalid(format!(
                "row {} belongs to meeting {}",
                row.transcript_index, row.meeting_id
            )));
        }
        if row.transcript_index >= meeting.transcript_count {
            return Err(invalid(format!(
                "transcript index {} out of range for {} lines",
                row.transcript_index, meeting.transcript_count
            )));
        }
        if !seen.insert(row.transcript_index) {
            return Err(invalid(format!(
                "duplicate transcript index {}",
                row.transcript_index
            )));
        }
    }

    Ok(())
}

/// Merge an incoming metadata record with the stored one.
///
/// `transcript_count` and `has_embeddings` are owned by the store once a
/// meeting exists: they only change through `append_transcript` and the
/// embedding write path. A new meeting never starts with embeddings.
pub(crate) fn merge_upsert(
    existing: Option<&MeetingMetadata>,
    mut incoming: MeetingMetadata,
) -> MeetingMetadata {
    match existing {
        Some(stored) => {
            incoming.transcript_count = stored.transcript_count;
            incoming.has_embeddings = stored.has_embeddings;
        }
        None => incoming.has_embeddings = false,
    }
    incoming
}

/// Order meetings most recently started first.
pub(crate) fn sort_recent_first(meetings: &mut [MeetingMetadata]) {
    meetings.sort_by(|a, b| b.started_at.cmp(&a.started_at).then_with(|| a.id.cmp(&b.id)));
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use pretty_assertions::assert_eq;

    fn meeting_with_count(count: usize) -> MeetingMetadata {
        let mut meeting = MeetingMetadata::new("room", "Sync", Utc::now()).with_id("m-1");
        meeting.transcript_count = count;
        meeting
    }

    fn row(meeting_id: &str, index: usize) -> TranscriptEmbedding {
        let entry = TranscriptEntry::new("Alice", "hello", Utc::now());
        TranscriptEmbedding::from_entry(meeting_id, index, &entry, vec![1.0, 0.0])
    }

    #[test]
    fn test_merge_upsert_keeps_store_owned_fields() {
        let mut stored = meeting_with_count(4);
        stored.has_embeddings = true;

        let mut incoming = meeting_with_count(0).with_summary("Wrapped up Q3 planning");
        incoming.has_embeddings = false;

        let merged = merge_upsert(Some(&stored), incoming);
        assert_eq!(merged.transcript_count, 4);
        assert!(merged.has_embeddings);
        assert_eq!(merged.summary.as_deref(), Some("Wrapped up Q3 planning"));

        let mut fresh = meeting_with_count(2);
        fresh.has_embeddings = true;
        let merged = merge_upsert(None, fresh);
        assert_eq!(merged.transcript_count, 2);
        assert!(!merged.has_embeddings);
    }

    #[test]
    fn test_valid_batch() {
        let meeting = meeting_with_count(2);
        assert!(validate_embedding_batch(&meeting, &[row("m-1", 0), row("m-1", 1)]).is_ok());
    }

    #[test]
    fn test_count_mismatch_rejected() {
        let meeting = meeting_with_count(3);
        let err = validate_embedding_batch(&meeting, &[row("m-1", 0)]).unwrap_err();
        assert!(matches!(err, StoreError::InvalidEmbeddingBatch { .. }));
    }

    #[test]
    fn test_duplicate_index_rejected() {
        let meeting = meeting_with_count(2);
        assert!(validate_embedding_batch(&meeting, &[row("m-1", 0), row("m-1", 0)]).is_err());
    }

    #[test]
    fn test_out_of_range_index_rejected() {
        let meeting = meeting_with_count(2);
        let err = validate_embedding_batch(&meeting, &[row("m-1", 7), row("m-1", 42)]).unwrap_err();
        assert!(matches!(err, StoreError::InvalidEmbeddingBatch { .. }));

        let err = validate_embedding_batch(&meeting, &[row("m-1", 0), row("m-1", 2)]).unwrap_err();
        assert!(err.to_string().contains("out of range"));
    }

    #[test]
    fn test_foreign_row_rejected() {
        let meeting = meeting_with_count(1);
        assert!(validate_embedding_batch(&meeting, &[row("m-2", 0)]).is_err());
    }
}
