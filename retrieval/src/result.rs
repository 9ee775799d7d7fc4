//! The context returned for one question.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::classifier::RetrievalStrategy;
use crate::error::RetrievalError;
use crate::live::ContextLine;

/// A historical transcript line with its similarity to the question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedContextLine {
    /// Who spoke.
    pub speaker: String,

    /// What was said.
    pub text: String,

    /// When it was said.
    pub timestamp: DateTime<Utc>,

    /// Meeting the line came from.
    pub meeting_id: String,

    /// Type label of that meeting.
    pub meeting_type: String,

    /// When that meeting started.
    pub meeting_date: DateTime<Utc>,

    /// Cosine similarity to the question.
    pub similarity: f32,
}

impl RankedContextLine {
    /// Key used to deduplicate lines across retrieval passes.
    pub fn dedup_key(&self) -> (&str, DateTime<Utc>) {
        (&self.meeting_id, self.timestamp)
    }

    /// Source citation: meeting type and start date.
    pub fn source_label(&self) -> String {
        format!(
            "{}, {}",
            self.meeting_type,
            self.meeting_date.format("%Y-%m-%d")
        )
    }

    /// Similarity as a whole percentage, clamped to `[0, 100]`.
    pub fn match_percent(&self) -> u8 {
        let pct = (self.similarity * 100.0).round().clamp(0.0, 100.0);
        pct as u8
    }
}

/// A reason retrieval returned less context than it might have.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Degradation {
    /// The room identifier did not resolve.
    RoomNotFound,

    /// None of the candidate meetings has processed embeddings yet.
    NoEmbeddedMeetings,

    /// The embedding provider failed or timed out.
    EmbeddingUnavailable {
        /// Provider error message.
        reason: String,
    },

    /// A store or registry call failed or timed out.
    StoreUnavailable {
        /// Store error message.
        reason: String,
    },
}

impl From<&RetrievalError> for Degradation {
    fn from(err: &RetrievalError) -> Self {
        match err {
            RetrievalError::EmbeddingUnavailable(e) => Self::EmbeddingUnavailable {
                reason: e.to_string(),
            },
            RetrievalError::StoreUnavailable(reason) => Self::StoreUnavailable {
                reason: reason.clone(),
            },
            other => Self::StoreUnavailable {
                reason: other.to_string(),
            },
        }
    }
}

/// Live and historical context assembled for one question.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetrievalResult {
    /// Lines from the meeting in progress, in spoken order.
    pub live_context: Vec<ContextLine>,

    /// Lines from past meetings, most relevant first.
    pub historical_context: Vec<RankedContextLine>,

    /// Whether any context was found.
    pub used_context: bool,

    /// `live_context.len() + historical_context.len()`.
    pub total_count: usize,

    /// Strategy the question was classified under; unset when the room
    /// did not resolve.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy: Option<RetrievalStrategy>,

    /// Why context is missing or partial.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub degradations: Vec<Degradation>,
}

impl RetrievalResult {
    /// Result for a question whose room could not be resolved.
    pub fn room_not_found() -> Self {
        Self {
            degradations: vec![Degradation::RoomNotFound],
            ..Self::default()
        }
    }

    /// Build a result, deriving `used_context` and `total_count`.
    pub fn new(
        live_context: Vec<ContextLine>,
        historical_context: Vec<RankedContextLine>,
        strategy: RetrievalStrategy,
        degradations: Vec<Degradation>,
    ) -> Self {
        let total_count = live_context.len() + historical_context.len();
        Self {
            used_context: total_count > 0,
            total_count,
            live_context,
            historical_context,
            strategy: Some(strategy),
            degradations,
        }
    }

    /// Whether retrieval ran in a reduced mode.
    pub fn is_degraded(&self) -> bool {
        !self.degradations.is_empty()
    }
}
