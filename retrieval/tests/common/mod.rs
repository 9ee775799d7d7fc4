//! Shared fixtures for retrieval integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use parley_embeddings::{
    EmbeddingError, EmbeddingGateway, EmbeddingProvider, EmbeddingRequest, EmbeddingResponse,
};
use parley_retrieval::{ContextRetriever, RetrievalConfig};
use parley_store::{
    MeetingMetadata, MeetingRoom, MemoryStore, RoomRegistry, StoreError, TieredStore,
    TranscriptEmbedding, TranscriptEntry,
};

/// Embeds known texts to fixed vectors and everything else to `[1, 0, 0]`.
#[derive(Default)]
pub struct TableProvider {
    table: HashMap<String, Vec<f32>>,
    calls: AtomicUsize,
}

impl TableProvider {
    pub fn with(mut self, text: &str, vector: Vec<f32>) -> Self {
        self.table.insert(text.to_string(), vector);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EmbeddingProvider for TableProvider {
    fn name(&self) -> &str {
        "table"
    }

    fn default_model(&self) -> &str {
        "table-v1"
    }

    async fn embed(
        &self,
        request: EmbeddingRequest,
    ) -> parley_embeddings::Result<EmbeddingResponse> {
        let embedding = self
            .table
            .get(&request.text)
            .cloned()
            .unwrap_or_else(|| vec![1.0, 0.0, 0.0]);
        Ok(EmbeddingResponse {
            dimension: embedding.len(),
            embedding,
            model: "table-v1".to_string(),
            tokens_used: None,
        })
    }

    async fn embed_batch(
        &self,
        requests: Vec<EmbeddingRequest>,
    ) -> parley_embeddings::Result<Vec<EmbeddingResponse>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut responses = Vec::with_capacity(requests.len());
        for request in requests {
            responses.push(self.embed(request).await?);
        }
        Ok(responses)
    }

    fn is_available(&self) -> bool {
        true
    }
}

/// Provider that always fails.
pub struct DownProvider;

#[async_trait]
impl EmbeddingProvider for DownProvider {
    fn name(&self) -> &str {
        "down"
    }

    fn default_model(&self) -> &str {
        "down-v1"
    }

    async fn embed(
        &self,
        _request: EmbeddingRequest,
    ) -> parley_embeddings::Result<EmbeddingResponse> {
        Err(EmbeddingError::RateLimited {
            retry_after_secs: 30,
        })
    }

    fn is_available(&self) -> bool {
        false
    }
}

/// Store wrapper that injects failures and delays.
pub struct FaultyStore {
    pub inner: Arc<MemoryStore>,
    pub failing_meetings: HashSet<String>,
    pub fail_recent: bool,
    pub delay: Option<Duration>,
}

impl FaultyStore {
    pub fn new(inner: Arc<MemoryStore>) -> Self {
        Self {
            inner,
            failing_meetings: HashSet::new(),
            fail_recent: false,
            delay: None,
        }
    }

    async fn pause(&self) {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl TieredStore for FaultyStore {
    async fn upsert_meeting(&self, meeting: MeetingMetadata) -> parley_store::Result<()> {
        self.inner.upsert_meeting(meeting).await
    }

    async fn meeting(&self, meeting_id: &str) -> parley_store::Result<Option<MeetingMetadata>> {
        self.inner.meeting(meeting_id).await
    }

    async fn recent_meetings(
        &self,
        room_id: &str,
        limit: usize,
    ) -> parley_store::Result<Vec<MeetingMetadata>> {
        self.pause().await;
        if self.fail_recent {
            return Err(StoreError::Unavailable("metadata replica down".to_string()));
        }
        self.inner.recent_meetings(room_id, limit).await
    }

    async fn meetings_for_room(&self, room_id: &str) -> parley_store::Result<Vec<MeetingMetadata>> {
        self.pause().await;
        self.inner.meetings_for_room(room_id).await
    }

    async fn append_transcript(
        &self,
        meeting_id: &str,
        entry: TranscriptEntry,
    ) -> parley_store::Result<()> {
        self.inner.append_transcript(meeting_id, entry).await
    }

    async fn transcript(&self, meeting_id: &str) -> parley_store::Result<Vec<TranscriptEntry>> {
        self.inner.transcript(meeting_id).await
    }

    async fn embeddings_for_meeting(
        &self,
        meeting_id: &str,
    ) -> parley_store::Result<Vec<TranscriptEmbedding>> {
        if self.failing_meetings.contains(meeting_id) {
            return Err(StoreError::Unavailable(format!("shard for {meeting_id} down")));
        }
        self.inner.embeddings_for_meeting(meeting_id).await
    }

    async fn replace_embeddings(
        &self,
        meeting_id: &str,
        rows: Vec<TranscriptEmbedding>,
    ) -> parley_store::Result<()> {
        self.inner.replace_embeddings(meeting_id, rows).await
    }

    async fn clear_embeddings(&self, meeting_id: &str) -> parley_store::Result<()> {
        self.inner.clear_embeddings(meeting_id).await
    }

    async fn delete_meeting(&self, meeting_id: &str) -> parley_store::Result<()> {
        self.inner.delete_meeting(meeting_id).await
    }
}

/// Registry that answers only after a delay.
pub struct SlowRegistry {
    pub inner: Arc<MemoryStore>,
    pub delay: Duration,
}

#[async_trait]
impl RoomRegistry for SlowRegistry {
    async fn resolve_room(&self, identifier: &str) -> parley_store::Result<Option<MeetingRoom>> {
        tokio::time::sleep(self.delay).await;
        self.inner.resolve_room(identifier).await
    }

    async fn register_room(&self, room: MeetingRoom) -> parley_store::Result<()> {
        self.inner.register_room(room).await
    }
}

pub fn day(d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, d, 9, 0, 0).unwrap()
}

/// Register a room whose internal id is `room-<identifier>`.
pub async fn register_room(store: &MemoryStore, identifier: &str) -> String {
    let mut room = MeetingRoom::new(identifier, identifier);
    room.id = format!("room-{identifier}");
    let id = room.id.clone();
    store.register_room(room).await.unwrap();
    id
}

/// Store an ended meeting with the given lines, one minute apart, and
/// embed line `i` as `vectors[i]`. Pass no vectors to leave it unprocessed.
pub async fn seed_meeting(
    store: &MemoryStore,
    room_id: &str,
    meeting_id: &str,
    meeting_type: &str,
    started: DateTime<Utc>,
    lines: &[(&str, &str)],
    vectors: Vec<Vec<f32>>,
) {
    let mut speakers: Vec<&str> = Vec::new();
    for (speaker, _) in lines {
        if !speakers.contains(speaker) {
            speakers.push(*speaker);
        }
    }
    let meeting = MeetingMetadata::new(room_id, meeting_type, started)
        .with_id(meeting_id)
        .with_participants(speakers)
        .with_ended_at(started + chrono::Duration::hours(1));
    store.upsert_meeting(meeting).await.unwrap();

    for (i, (speaker, text)) in lines.iter().enumerate() {
        let at = started + chrono::Duration::minutes(i as i64);
        store
            .append_transcript(meeting_id, TranscriptEntry::new(*speaker, *text, at))
            .await
            .unwrap();
    }

    if vectors.is_empty() {
        return;
    }
    let rows = store
        .transcript(meeting_id)
        .await
        .unwrap()
        .iter()
        .zip(vectors)
        .enumerate()
        .map(|(i, (entry, vector))| TranscriptEmbedding::from_entry(meeting_id, i, entry, vector))
        .collect();
    store.replace_embeddings(meeting_id, rows).await.unwrap();
}

/// Five-line standup in room "standup-alpha". Line `i` scores
/// `0.1 * i / sqrt(1 + 0.01 * i^2)` against `[1, 0, 0]`: only the last line
/// clears 0.3 and none clears 0.5.
pub async fn standup_alpha() -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    let room_id = register_room(&store, "standup-alpha").await;
    let lines = [
        ("Alice", "morning everyone"),
        ("Bob", "still on the invoices"),
        ("Carol", "reviewing the design doc"),
        ("Alice", "blocked on the VPN"),
        ("Bob", "lunch at noon?"),
    ];
    let vectors = (0..5).map(|i| vec![0.1 * i as f32, 1.0, 0.0]).collect();
    seed_meeting(&store, &room_id, "su-1", "Daily Standup", day(1), &lines, vectors).await;
    store
}

pub fn retriever_with(
    store: Arc<dyn TieredStore>,
    rooms: Arc<dyn RoomRegistry>,
    provider: Arc<dyn EmbeddingProvider>,
    config: RetrievalConfig,
) -> ContextRetriever {
    ContextRetriever::builder()
        .with_config(config)
        .with_store(store)
        .with_rooms(rooms)
        .with_gateway(EmbeddingGateway::new(provider))
        .build()
        .unwrap()
}

pub fn retriever(
    store: Arc<MemoryStore>,
    provider: Arc<dyn EmbeddingProvider>,
) -> ContextRetriever {
    retriever_with(store.clone(), store, provider, RetrievalConfig::default())
}
