//! # Context Retrieval
//!
//! Decides which live and past meeting conversation is relevant to a
//! question and assembles it into a bounded context block for an answering
//! model.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    Context Retrieval Engine                     │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                                                                 │
//! │  question ──► QueryClassifier ──► targeted | comprehensive      │
//! │                                          │                      │
//! │  RoomRegistry ──► TieredStore ───────────┤                      │
//! │                   (metadata, embeddings) │                      │
//! │                                          ▼                      │
//! │  EmbeddingGateway ──► query vector ──► rank / threshold         │
//! │                                          │  + recency fallback  │
//! │                                          ▼                      │
//! │  live transcript ──────────────────► RetrievalResult            │
//! │                                          │                      │
//! │                                          ▼                      │
//! │                                  ContextAssembler ──► text      │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use parley_retrieval::{ContextAssembler, ContextRetriever};
//!
//! let retriever = ContextRetriever::builder()
//!     .with_store(store.clone())
//!     .with_rooms(store)
//!     .with_gateway(gateway)
//!     .build()?;
//!
//! let result = retriever
//!     .retrieve_context("standup-alpha", "what did we decide?", Some(live), true)
//!     .await;
//! let block = ContextAssembler::new().format(&result);
//! ```

pub mod assembler;
pub mod classifier;
pub mod config;
pub mod engine;
pub mod error;
pub mod indexer;
pub mod live;
pub mod result;
pub mod session;

pub use assembler::{ContextAssembler, RoomStats, compute_room_stats};
pub use classifier::{KeywordClassifier, QueryClassifier, RetrievalStrategy};
pub use config::RetrievalConfig;
pub use engine::{ContextRetriever, ContextRetrieverBuilder};
pub use error::{Result, RetrievalError};
pub use indexer::EmbeddingIndexer;
pub use live::{ContextLine, InvalidTranscriptLine, parse_live_transcript};
pub use result::{Degradation, RankedContextLine, RetrievalResult};
pub use session::{ConversationSessionStore, ConversationTurn, Role};

// Re-export from dependencies for convenience
pub use parley_embeddings::{EmbeddingGateway, EmbeddingProvider};
pub use parley_store::{MeetingMetadata, RoomRegistry, TieredStore};
