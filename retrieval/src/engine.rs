//! Context retrieval engine implementation.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use tracing::{debug, info, warn};

use parley_embeddings::{EmbeddingGateway, Ranked, above_threshold, rank};
use parley_store::{MeetingMetadata, RoomRegistry, TieredStore, TranscriptEmbedding};

use crate::assembler::{RoomStats, compute_room_stats};
use crate::classifier::{KeywordClassifier, QueryClassifier, RetrievalStrategy};
use crate::config::RetrievalConfig;
use crate::error::{Result, RetrievalError};
use crate::live::parse_live_transcript;
use crate::result::{Degradation, RankedContextLine, RetrievalResult};

/// Retrieval engine answering "what context is relevant to this question".
///
/// The engine coordinates:
/// - Room resolution through the room registry
/// - Live transcript parsing
/// - Query classification into a retrieval strategy
/// - Candidate selection from the tiered store
/// - Similarity ranking with the strategy's threshold and recency fallback
///
/// Collaborator failures never escape [`retrieve_context`](Self::retrieve_context);
/// they are recorded as [`Degradation`]s on the returned result.
pub struct ContextRetriever {
    /// Configuration.
    config: RetrievalConfig,

    /// Meeting metadata, transcripts and embeddings.
    store: Arc<dyn TieredStore>,

    /// Room identifier resolution.
    rooms: Arc<dyn RoomRegistry>,

    /// Query embedding.
    gateway: EmbeddingGateway,

    /// Strategy selection.
    classifier: Arc<dyn QueryClassifier>,
}

impl ContextRetriever {
    /// Create a new retriever builder.
    pub fn builder() -> ContextRetrieverBuilder {
        ContextRetrieverBuilder::new()
    }

    /// The active configuration.
    pub fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    /// Gather live and historical context for a question asked in a room.
    ///
    /// `live_transcript` is only consulted when `is_live` is set.
    pub async fn retrieve_context(
        &self,
        room_identifier: &str,
        query: &str,
        live_transcript: Option<&str>,
        is_live: bool,
    ) -> RetrievalResult {
        let now = Utc::now();
        let mut degradations = Vec::new();

        let room = match self
            .store_call("resolve_room", self.rooms.resolve_room(room_identifier))
            .await
        {
            Ok(Some(room)) => Some(room),
            Ok(None) => {
                debug!("Room {room_identifier} not found, returning empty context");
                return RetrievalResult::room_not_found();
            }
            Err(err) => {
                warn!("Resolving room {room_identifier} failed: {err}");
                degradations.push(Degradation::from(&err));
                None
            }
        };

        let live_context = match live_transcript {
            Some(text) if is_live => parse_live_transcript(text, now),
            _ => Vec::new(),
        };

        let strategy = self.classifier.classify(query);
        debug!("Classified query as {strategy}");

        let historical_context = match room {
            Some(room) => {
                self.historical_context(&room.id, query, strategy, &mut degradations)
                    .await
            }
            None => Vec::new(),
        };

        let result = RetrievalResult::new(live_context, historical_context, strategy, degradations);
        if result.is_degraded() {
            warn!(
                "Retrieval for room {room_identifier} degraded: {:?}",
                result.degradations
            );
        }
        info!(
            "Retrieved {} live and {} historical lines for room {room_identifier} ({strategy})",
            result.live_context.len(),
            result.historical_context.len()
        );
        result
    }

    /// Aggregate statistics for a room, from metadata only.
    ///
    /// An unknown room or a store failure yields empty statistics.
    pub async fn room_stats(&self, room_identifier: &str) -> RoomStats {
        let room = match self
            .store_call("resolve_room", self.rooms.resolve_room(room_identifier))
            .await
        {
            Ok(Some(room)) => room,
            Ok(None) => {
                debug!("Room {room_identifier} not found, returning empty statistics");
                return RoomStats::default();
            }
            Err(err) => {
                warn!("Resolving room {room_identifier} for statistics failed: {err}");
                return RoomStats::default();
            }
        };

        match self
            .store_call("meetings_for_room", self.store.meetings_for_room(&room.id))
            .await
        {
            Ok(meetings) => compute_room_stats(&meetings),
            Err(err) => {
                warn!("Loading meetings for room {room_identifier} failed: {err}");
                RoomStats::default()
            }
        }
    }

    /// Rank past transcript lines of a room against the question.
    async fn historical_context(
        &self,
        room_id: &str,
        query: &str,
        strategy: RetrievalStrategy,
        degradations: &mut Vec<Degradation>,
    ) -> Vec<RankedContextLine> {
        let tunables = self.config.strategy(strategy);

        // The query vector does not depend on the candidates, so fetch both at once.
        let (meetings, query_vector) = tokio::join!(
            self.store_call(
                "recent_meetings",
                self.store.recent_meetings(room_id, tunables.max_meetings)
            ),
            self.gateway.embed(query),
        );

        let meetings = match meetings {
            Ok(meetings) => meetings,
            Err(err) => {
                warn!("Loading candidate meetings for room {room_id} failed: {err}");
                degradations.push(Degradation::from(&err));
                return Vec::new();
            }
        };

        let embedded: Vec<&MeetingMetadata> =
            meetings.iter().filter(|m| m.has_embeddings).collect();
        if embedded.is_empty() {
            if !meetings.is_empty() {
                debug!("No processed meetings among {} candidates", meetings.len());
                degradations.push(Degradation::NoEmbeddedMeetings);
            }
            return Vec::new();
        }

        let candidates = self.candidate_lines(&embedded, degradations).await;
        if candidates.is_empty() {
            return Vec::new();
        }

        let query_vector = match query_vector {
            Ok(vector) => vector,
            Err(err) => {
                warn!("Embedding query failed, skipping historical context: {err}");
                degradations.push(Degradation::from(&RetrievalError::from(err)));
                return Vec::new();
            }
        };

        let ranked: Vec<Ranked<RankedContextLine>> = rank(&query_vector, candidates)
            .into_iter()
            .map(|mut r| {
                r.item.similarity = r.similarity;
                r
            })
            .collect();

        match strategy {
            RetrievalStrategy::Targeted => above_threshold(
                &ranked,
                tunables.similarity_threshold,
                tunables.max_results,
            )
            .into_iter()
            .map(|r| r.item.clone())
            .collect(),
            RetrievalStrategy::Comprehensive => self.merge_with_recent(&ranked),
        }
    }

    /// Fetch embedding rows for every processed meeting concurrently.
    ///
    /// Candidates are ordered by meeting recency, then transcript position,
    /// which fixes the tie order for ranking.
    async fn candidate_lines(
        &self,
        meetings: &[&MeetingMetadata],
        degradations: &mut Vec<Degradation>,
    ) -> Vec<(Vec<f32>, RankedContextLine)> {
        let fetches = meetings.iter().map(|meeting| async move {
            let rows = self
                .store_call(
                    "embeddings_for_meeting",
                    self.store.embeddings_for_meeting(&meeting.id),
                )
                .await;
            (*meeting, rows)
        });

        let mut candidates = Vec::new();
        for (meeting, rows) in join_all(fetches).await {
            match rows {
                Ok(rows) => {
                    candidates.extend(rows.into_iter().map(|row| candidate(meeting, row)));
                }
                Err(err) => {
                    warn!("Loading embeddings for meeting {} failed: {err}", meeting.id);
                    degradations.push(Degradation::from(&err));
                }
            }
        }
        debug!(
            "Ranking {} lines from {} meetings",
            candidates.len(),
            meetings.len()
        );
        candidates
    }

    /// Similarity pass for comprehensive questions, topped up with the most
    /// recent lines when it comes back thin.
    fn merge_with_recent(&self, ranked: &[Ranked<RankedContextLine>]) -> Vec<RankedContextLine> {
        let tunables = &self.config.comprehensive;
        let fallback = &self.config.fallback;

        let mut seen: HashSet<(&str, DateTime<Utc>)> = HashSet::new();
        let mut merged: Vec<RankedContextLine> = Vec::new();

        for r in above_threshold(ranked, tunables.similarity_threshold, tunables.max_results) {
            if seen.insert(r.item.dedup_key()) {
                merged.push(r.item.clone());
            }
        }

        if !fallback.enabled || merged.len() >= fallback.trigger_below {
            return merged;
        }

        let mut by_recency: Vec<&Ranked<RankedContextLine>> = ranked.iter().collect();
        by_recency.sort_by(|a, b| b.item.timestamp.cmp(&a.item.timestamp));

        let before = merged.len();
        for r in by_recency.into_iter().take(fallback.recent_lines) {
            if merged.len() >= fallback.max_total {
                break;
            }
            if seen.insert(r.item.dedup_key()) {
                merged.push(r.item.clone());
            }
        }
        merged.truncate(fallback.max_total);

        debug!(
            "Recency fallback added {} lines to {before} ranked lines",
            merged.len().saturating_sub(before)
        );
        merged
    }

    /// Run a store or registry call under the store deadline.
    async fn store_call<T>(
        &self,
        operation: &str,
        call: impl Future<Output = parley_store::Result<T>>,
    ) -> Result<T> {
        match tokio::time::timeout(self.config.timeouts.store(), call).await {
            Ok(result) => result.map_err(RetrievalError::from),
            Err(_) => Err(RetrievalError::StoreUnavailable(format!(
                "{operation} timed out after {}ms",
                self.config.timeouts.store_ms
            ))),
        }
    }
}

fn candidate(meeting: &MeetingMetadata, row: TranscriptEmbedding) -> (Vec<f32>, RankedContextLine) {
    let line = RankedContextLine {
        speaker: row.speaker,
        text: row.text,
        timestamp: row.timestamp,
        meeting_id: row.meeting_id,
        meeting_type: meeting.meeting_type.clone(),
        meeting_date: meeting.started_at,
        similarity: 0.0,
    };
    (row.vector, line)
}

/// Builder for [`ContextRetriever`].
pub struct ContextRetrieverBuilder {
    config: RetrievalConfig,
    store: Option<Arc<dyn TieredStore>>,
    rooms: Option<Arc<dyn RoomRegistry>>,
    gateway: Option<EmbeddingGateway>,
    classifier: Option<Arc<dyn QueryClassifier>>,
}

impl ContextRetrieverBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self {
            config: RetrievalConfig::default(),
            store: None,
            rooms: None,
            gateway: None,
            classifier: None,
        }
    }

    /// Set the configuration.
    pub fn with_config(mut self, config: RetrievalConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the tiered store.
    pub fn with_store(mut self, store: Arc<dyn TieredStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Set the room registry.
    pub fn with_rooms(mut self, rooms: Arc<dyn RoomRegistry>) -> Self {
        self.rooms = Some(rooms);
        self
    }

    /// Set the embedding gateway.
    pub fn with_gateway(mut self, gateway: EmbeddingGateway) -> Self {
        self.gateway = Some(gateway);
        self
    }

    /// Replace the default keyword classifier.
    pub fn with_classifier(mut self, classifier: Arc<dyn QueryClassifier>) -> Self {
        self.classifier = Some(classifier);
        self
    }

    /// Build the retriever.
    ///
    /// The gateway takes its deadline, and its model when one is configured,
    /// from the configuration.
    pub fn build(self) -> Result<ContextRetriever> {
        self.config.validate()?;

        let store = self
            .store
            .ok_or_else(|| RetrievalError::Config("a tiered store is required".to_string()))?;
        let rooms = self
            .rooms
            .ok_or_else(|| RetrievalError::Config("a room registry is required".to_string()))?;
        let mut gateway = self
            .gateway
            .ok_or_else(|| RetrievalError::Config("an embedding gateway is required".to_string()))?
            .with_timeout(self.config.timeouts.embedding());
        if let Some(model) = &self.config.embedding.model {
            gateway = gateway.with_model(model.clone());
        }

        let classifier = self
            .classifier
            .unwrap_or_else(|| Arc::new(KeywordClassifier::default()));

        info!(
            "Context retriever ready with embedding provider {}",
            gateway.provider_name()
        );
        Ok(ContextRetriever {
            config: self.config,
            store,
            rooms,
            gateway,
            classifier,
        })
    }
}

impl Default for ContextRetrieverBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{Duration, TimeZone};
    use parley_embeddings::{
        EmbeddingError, EmbeddingProvider, EmbeddingRequest, EmbeddingResponse,
    };
    use parley_store::{MeetingRoom, MemoryStore, TranscriptEntry};
    use pretty_assertions::assert_eq;
    use tracing_test::traced_test;

    /// Embeds every text as `[1, 0]` except those starting with "off", which
    /// become `[0, 1]`.
    struct AxisProvider;

    #[async_trait]
    impl EmbeddingProvider for AxisProvider {
        fn name(&self) -> &str {
            "axis"
        }

        fn default_model(&self) -> &str {
            "axis-v1"
        }

        async fn embed(
            &self,
            request: EmbeddingRequest,
        ) -> parley_embeddings::Result<EmbeddingResponse> {
            let embedding = if request.text.starts_with("off") {
                vec![0.0, 1.0]
            } else {
                vec![1.0, 0.0]
            };
            Ok(EmbeddingResponse {
                embedding,
                model: "axis-v1".to_string(),
                dimension: 2,
                tokens_used: None,
            })
        }

        fn is_available(&self) -> bool {
            true
        }
    }

    struct DownProvider;

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
            Err(EmbeddingError::ApiRequest("connection refused".to_string()))
        }

        fn is_available(&self) -> bool {
            false
        }
    }

    /// Room "weekly" with one embedded meeting whose two lines share a timestamp.
    async fn seeded_store() -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        let mut room = MeetingRoom::new("weekly", "Weekly Sync");
        room.id = "room-w".to_string();
        store.register_room(room).await.unwrap();

        let started = Utc.with_ymd_and_hms(2024, 4, 2, 10, 0, 0).unwrap();
        let meeting = MeetingMetadata::new("room-w", "Weekly Sync", started).with_id("w-1");
        store.upsert_meeting(meeting).await.unwrap();

        let said_at = started + Duration::minutes(3);
        for text in ["off topic aside", "off topic repeat"] {
            store
                .append_transcript("w-1", TranscriptEntry::new("Eve", text, said_at))
                .await
                .unwrap();
        }

        let rows = store
            .transcript("w-1")
            .await
            .unwrap()
            .iter()
            .enumerate()
            .map(|(i, e)| TranscriptEmbedding::from_entry("w-1", i, e, vec![0.0, 1.0]))
            .collect();
        store.replace_embeddings("w-1", rows).await.unwrap();
        store
    }

    fn retriever(
        store: Arc<MemoryStore>,
        provider: Arc<dyn EmbeddingProvider>,
    ) -> ContextRetriever {
        ContextRetriever::builder()
            .with_store(store.clone())
            .with_rooms(store)
            .with_gateway(EmbeddingGateway::new(provider))
            .build()
            .unwrap()
    }

    #[tokio::test]
    #[traced_test]
    async fn test_embedding_failure_degrades() {
        let engine = retriever(seeded_store().await, Arc::new(DownProvider));

        let result = engine
            .retrieve_context("weekly", "summarize everything", Some("Ann: hi"), true)
            .await;

        assert!(result.historical_context.is_empty());
        assert_eq!(result.live_context.len(), 1);
        assert!(result.used_context);
        assert!(matches!(
            result.degradations.as_slice(),
            [Degradation::EmbeddingUnavailable { .. }]
        ));
        assert!(logs_contain("Embedding query failed"));
    }

    #[tokio::test]
    async fn test_comprehensive_merge_dedups_same_timestamp() {
        let engine = retriever(seeded_store().await, Arc::new(AxisProvider));

        let result = engine
            .retrieve_context("weekly", "give me the highlights", None, false)
            .await;

        assert_eq!(result.strategy, Some(RetrievalStrategy::Comprehensive));
        assert_eq!(result.historical_context.len(), 1);
        assert_eq!(result.historical_context[0].text, "off topic aside");
        assert_eq!(result.historical_context[0].similarity, 0.0);
    }

    #[tokio::test]
    async fn test_live_text_ignored_when_not_live() {
        let engine = retriever(seeded_store().await, Arc::new(AxisProvider));

        let result = engine
            .retrieve_context("weekly", "who owns billing", Some("Ann: hi"), false)
            .await;

        assert!(result.live_context.is_empty());
        assert!(!result.used_context);
        assert_eq!(result.total_count, 0);
    }

    #[tokio::test]
    async fn test_room_stats() {
        let engine = retriever(seeded_store().await, Arc::new(AxisProvider));

        let stats = engine.room_stats("weekly").await;
        assert_eq!(stats.total_meetings, 1);
        assert_eq!(stats.total_transcripts, 2);
        assert_eq!(stats.meeting_types, vec!["Weekly Sync"]);

        assert_eq!(engine.room_stats("nonexistent").await, RoomStats::default());
    }

    #[test]
    fn test_builder_requires_collaborators() {
        let err = ContextRetriever::builder().build().err();
        assert!(matches!(err, Some(RetrievalError::Config(_))));
    }

    #[test]
    fn test_builder_rejects_invalid_config() {
        let store = Arc::new(MemoryStore::new());
        let mut config = RetrievalConfig::default();
        config.targeted.similarity_threshold = 2.0;

        let err = ContextRetriever::builder()
            .with_config(config)
            .with_store(store.clone())
            .with_rooms(store)
            .with_gateway(EmbeddingGateway::new(Arc::new(AxisProvider)))
            .build()
            .err();
        assert!(matches!(err, Some(RetrievalError::Config(_))));
    }
}
