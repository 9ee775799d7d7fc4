//! Embedding generation for finished meetings.

use std::sync::Arc;

use tracing::{debug, info, warn};

use parley_embeddings::EmbeddingGateway;
use parley_store::{StoreError, TieredStore, TranscriptEmbedding};

use crate::config::RetrievalConfig;
use crate::error::{Result, RetrievalError};

/// Default number of transcript lines sent per provider call.
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Writes the embedding tier for meetings once their transcript is final.
///
/// A meeting's batch is replaced as a whole: readers see either the old
/// complete batch, no batch, or the new complete batch.
pub struct EmbeddingIndexer {
    store: Arc<dyn TieredStore>,
    gateway: EmbeddingGateway,
    batch_size: usize,
}

impl EmbeddingIndexer {
    /// Create an indexer writing to `store` through `gateway`.
    pub fn new(store: Arc<dyn TieredStore>, gateway: EmbeddingGateway) -> Self {
        Self {
            store,
            gateway,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    /// Create an indexer using the configured batch size, deadline and model.
    pub fn from_config(
        store: Arc<dyn TieredStore>,
        gateway: EmbeddingGateway,
        config: &RetrievalConfig,
    ) -> Self {
        let mut gateway = gateway.with_timeout(config.timeouts.embedding());
        if let Some(model) = &config.embedding.model {
            gateway = gateway.with_model(model.clone());
        }
        Self::new(store, gateway).with_batch_size(config.embedding.batch_size)
    }

    /// Set how many lines are embedded per provider call. Zero is treated as one.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Embed a meeting's transcript and replace its embedding rows.
    ///
    /// Returns the number of rows written. An unknown meeting or one that
    /// has not ended is a caller error. If embedding fails the meeting is
    /// left without embeddings.
    pub async fn index_meeting(&self, meeting_id: &str) -> Result<usize> {
        let meeting = self
            .store
            .meeting(meeting_id)
            .await?
            .ok_or_else(|| StoreError::MeetingNotFound(meeting_id.to_string()))?;
        if meeting.ended_at.is_none() {
            return Err(RetrievalError::MeetingInProgress(meeting_id.to_string()));
        }

        let transcript = self.store.transcript(&meeting.id).await?;
        let mut vectors = Vec::with_capacity(transcript.len());

        for chunk in transcript.chunks(self.batch_size) {
            let texts: Vec<String> = chunk.iter().map(|entry| entry.text.clone()).collect();
            match self.gateway.embed_batch(&texts).await {
                Ok(batch) => vectors.extend(batch),
                Err(err) => {
                    warn!("Embedding meeting {meeting_id} failed: {err}");
                    if let Err(clear_err) = self.store.clear_embeddings(meeting_id).await {
                        warn!("Clearing embeddings for meeting {meeting_id} failed: {clear_err}");
                    }
                    return Err(err.into());
                }
            }
            debug!("Embedded {}/{} lines of meeting {meeting_id}", vectors.len(), transcript.len());
        }

        let rows: Vec<TranscriptEmbedding> = transcript
            .iter()
            .zip(vectors)
            .enumerate()
            .map(|(index, (entry, vector))| {
                TranscriptEmbedding::from_entry(meeting_id, index, entry, vector)
            })
            .collect();
        let written = rows.len();

        self.store.replace_embeddings(meeting_id, rows).await?;
        info!("Indexed {written} transcript lines for meeting {meeting_id}");
        Ok(written)
    }

    /// Index every ended meeting in a room that has no embeddings yet.
    ///
    /// Returns the ids of the meetings indexed. Stops at the first failure.
    pub async fn index_pending(&self, room_id: &str) -> Result<Vec<String>> {
        let pending: Vec<String> = self
            .store
            .meetings_for_room(room_id)
            .await?
            .into_iter()
            .filter(|m| m.ended_at.is_some() && !m.has_embeddings)
            .map(|m| m.id)
            .collect();

        for meeting_id in &pending {
            self.index_meeting(meeting_id).await?;
        }
        Ok(pending)
    }
}
