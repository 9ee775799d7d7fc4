//! In-memory tiered store.
//!
//! Each tier sits behind its own lock. Writers that touch more than one tier
//! take the locks in a fixed order: meetings, transcripts, embeddings.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::{Result, StoreError};
use crate::model::{MeetingMetadata, MeetingRoom, TranscriptEmbedding, TranscriptEntry};
use crate::store::{
    RoomRegistry, TieredStore, merge_upsert, sort_recent_first, validate_embedding_batch,
};

/// A [`TieredStore`] and [`RoomRegistry`] held entirely in memory.
#[derive(Default)]
pub struct MemoryStore {
    meetings: RwLock<HashMap<String, MeetingMetadata>>,
    transcripts: RwLock<HashMap<String, Vec<TranscriptEntry>>>,
    embeddings: RwLock<HashMap<String, Vec<TranscriptEmbedding>>>,
    rooms: RwLock<HashMap<String, MeetingRoom>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of embedding rows held for a meeting.
    pub async fn embedding_count(&self, meeting_id: &str) -> usize {
        self.embeddings
            .read()
            .await
            .get(meeting_id)
            .map_or(0, Vec::len)
    }

    async fn link_meeting_to_room(&self, meeting: &MeetingMetadata) {
        let mut rooms = self.rooms.write().await;
        if let Some(room) = rooms.values_mut().find(|r| r.id == meeting.room_id) {
            if !room.meeting_ids.contains(&meeting.id) {
                room.meeting_ids.push(meeting.id.clone());
            }
        }
    }
}

#[async_trait]
impl TieredStore for MemoryStore {
    async fn upsert_meeting(&self, meeting: MeetingMetadata) -> Result<()> {
        let mut meetings = self.meetings.write().await;
        let merged = merge_upsert(meetings.get(&meeting.id), meeting);
        meetings.insert(merged.id.clone(), merged.clone());
        drop(meetings);

        self.link_meeting_to_room(&merged).await;
        Ok(())
    }

    async fn meeting(&self, meeting_id: &str) -> Result<Option<MeetingMetadata>> {
        Ok(self.meetings.read().await.get(meeting_id).cloned())
    }

    async fn recent_meetings(&self, room_id: &str, limit: usize) -> Result<Vec<MeetingMetadata>> {
        let mut meetings = self.meetings_for_room(room_id).await?;
        meetings.truncate(limit);
        Ok(meetings)
    }

    async fn meetings_for_room(&self, room_id: &str) -> Result<Vec<MeetingMetadata>> {
        let mut meetings: Vec<MeetingMetadata> = self
            .meetings
            .read()
            .await
            .values()
            .filter(|m| m.room_id == room_id)
            .cloned()
            .collect();
        sort_recent_first(&mut meetings);
        Ok(meetings)
    }

    async fn append_transcript(&self, meeting_id: &str, entry: TranscriptEntry) -> Result<()> {
        let mut meetings = self.meetings.write().await;
        let meeting = meetings
            .get_mut(meeting_id)
            .ok_or_else(|| StoreError::MeetingNotFound(meeting_id.to_string()))?;

        let mut transcripts = self.transcripts.write().await;
        let lines = transcripts.entry(meeting_id.to_string()).or_default();
        lines.push(entry);
        meeting.transcript_count = lines.len();

        if meeting.has_embeddings {
            // The batch no longer covers the whole transcript.
            meeting.has_embeddings = false;
            self.embeddings.write().await.remove(meeting_id);
            debug!("Invalidated embeddings for meeting {meeting_id} after transcript append");
        }
        Ok(())
    }

    async fn transcript(&self, meeting_id: &str) -> Result<Vec<TranscriptEntry>> {
        Ok(self
            .transcripts
            .read()
            .await
            .get(meeting_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn embeddings_for_meeting(&self, meeting_id: &str) -> Result<Vec<TranscriptEmbedding>> {
        let mut rows = self
            .embeddings
            .read()
            .await
            .get(meeting_id)
            .cloned()
            .unwrap_or_default();
        rows.sort_by_key(|r| r.transcript_index);
        Ok(rows)
    }

    async fn replace_embeddings(
        &self,
        meeting_id: &str,
        rows: Vec<TranscriptEmbedding>,
    ) -> Result<()> {
        let mut meetings = self.meetings.write().await;
        let meeting = meetings
            .get_mut(meeting_id)
            .ok_or_else(|| StoreError::MeetingNotFound(meeting_id.to_string()))?;

        let mut embeddings = self.embeddings.write().await;
        embeddings.remove(meeting_id);
        meeting.has_embeddings = false;

        validate_embedding_batch(meeting, &rows)?;

        let count = rows.len();
        embeddings.insert(meeting_id.to_string(), rows);
        meeting.has_embeddings = true;

        debug!("Stored {count} embeddings for meeting {meeting_id}");
        Ok(())
    }

    async fn clear_embeddings(&self, meeting_id: &str) -> Result<()> {
        let mut meetings = self.meetings.write().await;
        if let Some(meeting) = meetings.get_mut(meeting_id) {
            meeting.has_embeddings = false;
        }
        self.embeddings.write().await.remove(meeting_id);
        Ok(())
    }

    async fn delete_meeting(&self, meeting_id: &str) -> Result<()> {
        let mut meetings = self.meetings.write().await;
        let removed = meetings
            .remove(meeting_id)
            .ok_or_else(|| StoreError::MeetingNotFound(meeting_id.to_string()))?;
        self.transcripts.write().await.remove(meeting_id);
        self.embeddings.write().await.remove(meeting_id);
        drop(meetings);

        let mut rooms = self.rooms.write().await;
        if let Some(room) = rooms.values_mut().find(|r| r.id == removed.room_id) {
            room.meeting_ids.retain(|id| id != meeting_id);
        }
        Ok(())
    }
}

#[async_trait]
impl RoomRegistry for MemoryStore {
    async fn resolve_room(&self, identifier: &str) -> Result<Option<MeetingRoom>> {
        Ok(self.rooms.read().await.get(identifier).cloned())
    }

    async fn register_room(&self, room: MeetingRoom) -> Result<()> {
        self.rooms
            .write()
            .await
            .insert(room.identifier.clone(), room);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use pretty_assertions::assert_eq;

    async fn seeded() -> (MemoryStore, MeetingMetadata) {
        let store = MemoryStore::new();
        let room = MeetingRoom::new("standup-alpha", "Standup Alpha");
        let room_id = room.id.clone();
        store.register_room(room).await.unwrap();

        let started = Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap();
        let meeting = MeetingMetadata::new(&room_id, "Daily Standup", started).with_id("m-1");
        store.upsert_meeting(meeting.clone()).await.unwrap();
        for i in 0..3 {
            let entry =
                TranscriptEntry::new("Alice", format!("line {i}"), started + Duration::minutes(i));
            store.append_transcript("m-1", entry).await.unwrap();
        }
        (store, meeting)
    }

    fn rows_for(entries: &[TranscriptEntry]) -> Vec<TranscriptEmbedding> {
        entries
            .iter()
            .enumerate()
            .map(|(i, e)| TranscriptEmbedding::from_entry("m-1", i, e, vec![i as f32, 1.0]))
            .collect()
    }

    #[tokio::test]
    async fn test_registry_links_meetings() {
        let (store, _) = seeded().await;
        let room = store.resolve_room("standup-alpha").await.unwrap().unwrap();
        assert_eq!(room.meeting_ids, vec!["m-1".to_string()]);
        assert!(store.resolve_room("nonexistent").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_replace_embeddings_sets_flag() {
        let (store, _) = seeded().await;
        let transcript = store.transcript("m-1").await.unwrap();
        store
            .replace_embeddings("m-1", rows_for(&transcript))
            .await
            .unwrap();

        let meeting = store.meeting("m-1").await.unwrap().unwrap();
        assert!(meeting.has_embeddings);
        assert_eq!(store.embedding_count("m-1").await, meeting.transcript_count);

        // Regeneration replaces rather than duplicates.
        store
            .replace_embeddings("m-1", rows_for(&transcript))
            .await
            .unwrap();
        assert_eq!(store.embedding_count("m-1").await, 3);
    }

    #[tokio::test]
    async fn test_failed_replace_leaves_no_rows() {
        let (store, _) = seeded().await;
        let transcript = store.transcript("m-1").await.unwrap();
        store
            .replace_embeddings("m-1", rows_for(&transcript))
            .await
            .unwrap();

        let short = rows_for(&transcript[..1]);
        assert!(store.replace_embeddings("m-1", short).await.is_err());

        let meeting = store.meeting("m-1").await.unwrap().unwrap();
        assert!(!meeting.has_embeddings);
        assert_eq!(store.embedding_count("m-1").await, 0);
    }

    #[tokio::test]
    async fn test_replace_for_unknown_meeting_fails() {
        let store = MemoryStore::new();
        let err = store.replace_embeddings("ghost", Vec::new()).await.unwrap_err();
        assert!(matches!(err, StoreError::MeetingNotFound(_)));
    }

    #[tokio::test]
    async fn test_append_invalidates_embeddings() {
        let (store, _) = seeded().await;
        let transcript = store.transcript("m-1").await.unwrap();
        store
            .replace_embeddings("m-1", rows_for(&transcript))
            .await
            .unwrap();

        store
            .append_transcript("m-1", TranscriptEntry::new("Bob", "late note", Utc::now()))
            .await
            .unwrap();

        let meeting = store.meeting("m-1").await.unwrap().unwrap();
        assert_eq!(meeting.transcript_count, 4);
        assert!(!meeting.has_embeddings);
        assert!(store.embeddings_for_meeting("m-1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_recent_meetings_order_and_limit() {
        let (store, meeting) = seeded().await;
        let next_day = meeting.started_at + Duration::days(1);
        let later = MeetingMetadata::new(&meeting.room_id, "Retro", next_day).with_id("m-2");
        store.upsert_meeting(later).await.unwrap();

        let recent = store.recent_meetings(&meeting.room_id, 1).await.unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].id, "m-2");

        let all = store.meetings_for_room(&meeting.room_id).await.unwrap();
        let ids: Vec<_> = all.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["m-2", "m-1"]);
    }

    #[tokio::test]
    async fn test_delete_cascades() {
        let (store, meeting) = seeded().await;
        let transcript = store.transcript("m-1").await.unwrap();
        store
            .replace_embeddings("m-1", rows_for(&transcript))
            .await
            .unwrap();

        store.delete_meeting("m-1").await.unwrap();
        assert!(store.meeting("m-1").await.unwrap().is_none());
        assert!(store.transcript("m-1").await.unwrap().is_empty());
        assert_eq!(store.embedding_count("m-1").await, 0);

        let room = store.resolve_room("standup-alpha").await.unwrap().unwrap();
        assert!(room.meeting_ids.is_empty());
        assert_eq!(room.id, meeting.room_id);
    }
}
