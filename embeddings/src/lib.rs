//! # Embeddings
//!
//! Embedding generation and similarity ranking for meeting transcript
//! retrieval.
//!
//! ## Features
//!
//! - **Providers**: Convert text to dense vectors through an external service
//! - **Gateway**: Deadline-bounded calls with a single degradation signal
//! - **Ranking**: Cosine similarity with deterministic, stable ordering
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    Embeddings System                            │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  EmbeddingProvider ──► EmbeddingGateway ──► Embedding          │
//! │       │                                        │                │
//! │       ▼                                        ▼                │
//! │  OpenAI-compatible API                 rank / cosine_similarity │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod error;
pub mod gateway;
pub mod provider;
pub mod similarity;

pub use error::{EmbeddingError, Result};
pub use gateway::EmbeddingGateway;
pub use provider::{EmbeddingProvider, EmbeddingRequest, EmbeddingResponse, OpenAIProvider};
pub use similarity::{Ranked, above_threshold, cosine_similarity, rank};

/// A dense vector embedding.
pub type Embedding = Vec<f32>;
