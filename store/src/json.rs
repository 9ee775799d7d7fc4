//! JSON-on-disk tiered store.
//!
//! Layout under the root directory:
//!
//! ```text
//! rooms.json                 room registry
//! meetings/<id>.json         metadata tier, loaded into memory at open
//! transcripts/<id>.json      transcript tier, read on demand
//! embeddings/<id>.json       embedding tier, read on demand
//! ```
//!
//! Every write goes to a `.tmp` sibling and is renamed into place, so a
//! reader sees either the old file or the new one.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::error::{Result, StorageError, StoreError};
use crate::model::{MeetingMetadata, MeetingRoom, TranscriptEmbedding, TranscriptEntry};
use crate::store::{
    RoomRegistry, TieredStore, merge_upsert, sort_recent_first, validate_embedding_batch,
};

const MEETINGS_DIR: &str = "meetings";
const TRANSCRIPTS_DIR: &str = "transcripts";
const EMBEDDINGS_DIR: &str = "embeddings";
const ROOMS_FILE: &str = "rooms.json";

/// A [`TieredStore`] and [`RoomRegistry`] persisted as JSON files.
pub struct JsonStore {
    /// Root directory for storage.
    root: PathBuf,

    /// Metadata tier, always resident.
    meetings: RwLock<HashMap<String, MeetingMetadata>>,

    /// Rooms keyed by identifier.
    rooms: RwLock<HashMap<String, MeetingRoom>>,
}

impl JsonStore {
    /// Open a store at the given root directory.
    ///
    /// This will create the directory layout if it doesn't exist.
    pub async fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();

        for dir in [MEETINGS_DIR, TRANSCRIPTS_DIR, EMBEDDINGS_DIR] {
            let path = root.join(dir);
            fs::create_dir_all(&path)
                .await
                .map_err(|e| StorageError::CreateDirectory(format!("{}: {e}", path.display())))?;
        }

        let store = Self {
            root,
            meetings: RwLock::new(HashMap::new()),
            rooms: RwLock::new(HashMap::new()),
        };

        store.load_meetings().await?;
        store.load_rooms().await?;

        Ok(store)
    }

    /// Root directory of the store.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn record_path(&self, dir: &str, id: &str) -> Result<PathBuf> {
        if id.is_empty() || id.contains(['/', '\\']) || id.starts_with('.') {
            return Err(StoreError::InvalidId(id.to_string()));
        }
        Ok(self.root.join(dir).join(format!("{id}.json")))
    }

    async fn load_meetings(&self) -> Result<()> {
        let dir = self.root.join(MEETINGS_DIR);
        let mut entries = fs::read_dir(&dir)
            .await
            .map_err(|e| StorageError::ReadFile(format!("{}: {e}", dir.display())))?;

        let mut meetings = self.meetings.write().await;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| StorageError::ReadFile(format!("{e}")))?
        {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                match read_json::<MeetingMetadata>(&path).await {
                    Ok(meeting) => {
                        meetings.insert(meeting.id.clone(), meeting);
                    }
                    Err(e) => {
                        warn!("Failed to load meeting {}: {e}", path.display());
                    }
                }
            }
        }

        info!("Loaded {} meetings", meetings.len());
        Ok(())
    }

    async fn load_rooms(&self) -> Result<()> {
        let path = self.root.join(ROOMS_FILE);
        if !fs::try_exists(&path).await? {
            return Ok(());
        }

        let rooms: Vec<MeetingRoom> = read_json(&path).await?;
        let mut cache = self.rooms.write().await;
        for room in rooms {
            cache.insert(room.identifier.clone(), room);
        }
        debug!("Loaded {} rooms", cache.len());
        Ok(())
    }

    async fn save_rooms(&self, rooms: &HashMap<String, MeetingRoom>) -> Result<()> {
        let mut all: Vec<&MeetingRoom> = rooms.values().collect();
        all.sort_by(|a, b| a.identifier.cmp(&b.identifier));
        write_json_atomic(&self.root.join(ROOMS_FILE), &all).await
    }

    async fn save_meeting(&self, meeting: &MeetingMetadata) -> Result<()> {
        let path = self.record_path(MEETINGS_DIR, &meeting.id)?;
        write_json_atomic(&path, meeting).await
    }

    async fn remove_record(&self, dir: &str, id: &str) -> Result<()> {
        let path = self.record_path(dir, id)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::DeleteFile(format!("{}: {e}", path.display())).into()),
        }
    }

    async fn read_transcript(&self, meeting_id: &str) -> Result<Vec<TranscriptEntry>> {
        let path = self.record_path(TRANSCRIPTS_DIR, meeting_id)?;
        read_json_or_default(&path).await
    }

    async fn update_room_links(&self, room_id: &str, meeting_id: &str, linked: bool) -> Result<()> {
        let mut rooms = self.rooms.write().await;
        let Some(room) = rooms.values_mut().find(|r| r.id == room_id) else {
            return Ok(());
        };

        let present = room.meeting_ids.iter().any(|id| id == meeting_id);
        match (linked, present) {
            (true, false) => room.meeting_ids.push(meeting_id.to_string()),
            (false, true) => room.meeting_ids.retain(|id| id != meeting_id),
            _ => return Ok(()),
        }
        self.save_rooms(&rooms).await
    }
}

#[async_trait]
impl TieredStore for JsonStore {
    async fn upsert_meeting(&self, meeting: MeetingMetadata) -> Result<()> {
        let mut meetings = self.meetings.write().await;
        let merged = merge_upsert(meetings.get(&meeting.id), meeting);
        self.save_meeting(&merged).await?;

        let (room_id, meeting_id) = (merged.room_id.clone(), merged.id.clone());
        meetings.insert(merged.id.clone(), merged);
        drop(meetings);

        self.update_room_links(&room_id, &meeting_id, true).await
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
        let Some(meeting) = meetings.get(meeting_id) else {
            return Err(StoreError::MeetingNotFound(meeting_id.to_string()));
        };
        let mut updated = meeting.clone();

        let mut lines = self.read_transcript(meeting_id).await?;
        lines.push(entry);
        let path = self.record_path(TRANSCRIPTS_DIR, meeting_id)?;
        write_json_atomic(&path, &lines).await?;

        updated.transcript_count = lines.len();
        if updated.has_embeddings {
            updated.has_embeddings = false;
            self.remove_record(EMBEDDINGS_DIR, meeting_id).await?;
            debug!("Invalidated embeddings for meeting {meeting_id} after transcript append");
        }

        self.save_meeting(&updated).await?;
        meetings.insert(meeting_id.to_string(), updated);
        Ok(())
    }

    async fn transcript(&self, meeting_id: &str) -> Result<Vec<TranscriptEntry>> {
        self.read_transcript(meeting_id).await
    }

    async fn embeddings_for_meeting(&self, meeting_id: &str) -> Result<Vec<TranscriptEmbedding>> {
        let path = self.record_path(EMBEDDINGS_DIR, meeting_id)?;
        let mut rows: Vec<TranscriptEmbedding> = read_json_or_default(&path).await?;
        rows.sort_by_key(|r| r.transcript_index);
        Ok(rows)
    }

    async fn replace_embeddings(
        &self,
        meeting_id: &str,
        rows: Vec<TranscriptEmbedding>,
    ) -> Result<()> {
        let mut meetings = self.meetings.write().await;
        let Some(meeting) = meetings.get_mut(meeting_id) else {
            return Err(StoreError::MeetingNotFound(meeting_id.to_string()));
        };

        // Readers skip the embedding tier while the flag is down.
        meeting.has_embeddings = false;
        let snapshot = meeting.clone();
        self.save_meeting(&snapshot).await?;

        if let Err(e) = validate_embedding_batch(&snapshot, &rows) {
            self.remove_record(EMBEDDINGS_DIR, meeting_id).await?;
            return Err(e);
        }

        let path = self.record_path(EMBEDDINGS_DIR, meeting_id)?;
        if let Err(e) = write_json_atomic(&path, &rows).await {
            warn!("Failed to write embeddings for meeting {meeting_id}: {e}");
            self.remove_record(EMBEDDINGS_DIR, meeting_id).await?;
            return Err(e);
        }

        let mut completed = snapshot;
        completed.has_embeddings = true;
        if let Err(e) = self.save_meeting(&completed).await {
            warn!("Failed to publish embeddings for meeting {meeting_id}: {e}");
            self.remove_record(EMBEDDINGS_DIR, meeting_id).await?;
            return Err(e);
        }

        debug!("Stored {} embeddings for meeting {meeting_id}", rows.len());
        meetings.insert(meeting_id.to_string(), completed);
        Ok(())
    }

    async fn clear_embeddings(&self, meeting_id: &str) -> Result<()> {
        let mut meetings = self.meetings.write().await;
        if let Some(meeting) = meetings.get_mut(meeting_id) {
            if meeting.has_embeddings {
                meeting.has_embeddings = false;
                let snapshot = meeting.clone();
                self.save_meeting(&snapshot).await?;
            }
        }
        self.remove_record(EMBEDDINGS_DIR, meeting_id).await
    }

    async fn delete_meeting(&self, meeting_id: &str) -> Result<()> {
        let mut meetings = self.meetings.write().await;
        let Some(removed) = meetings.remove(meeting_id) else {
            return Err(StoreError::MeetingNotFound(meeting_id.to_string()));
        };

        self.remove_record(EMBEDDINGS_DIR, meeting_id).await?;
        self.remove_record(TRANSCRIPTS_DIR, meeting_id).await?;
        self.remove_record(MEETINGS_DIR, meeting_id).await?;
        drop(meetings);

        info!("Deleted meeting: {meeting_id}");
        self.update_room_links(&removed.room_id, meeting_id, false).await
    }
}

#[async_trait]
impl RoomRegistry for JsonStore {
    async fn resolve_room(&self, identifier: &str) -> Result<Option<MeetingRoom>> {
        Ok(self.rooms.read().await.get(identifier).cloned())
    }

    async fn register_room(&self, room: MeetingRoom) -> Result<()> {
        let mut rooms = self.rooms.write().await;
        rooms.insert(room.identifier.clone(), room);
        self.save_rooms(&rooms).await
    }
}

async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = fs::read_to_string(path)
        .await
        .map_err(|e| StorageError::ReadFile(format!("{}: {e}", path.display())))?;
    Ok(serde_json::from_str(&content)?)
}

async fn read_json_or_default<T: DeserializeOwned + Default>(path: &Path) -> Result<T> {
    match fs::read_to_string(path).await {
        Ok(content) => Ok(serde_json::from_str(&content)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(T::default()),
        Err(e) => Err(StorageError::ReadFile(format!("{}: {e}", path.display())).into()),
    }
}

async fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let content = serde_json::to_string_pretty(value)?;

    let temp_path = path.with_extension("json.tmp");
    fs::write(&temp_path, &content)
        .await
        .map_err(|e| StorageError::WriteFile(format!("{}: {e}", temp_path.display())))?;

    fs::rename(&temp_path, path)
        .await
        .map_err(|e| StorageError::WriteFile(format!("{}: {e}", path.display())))?;

    Ok(())
}
