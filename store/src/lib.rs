//! # Tiered Store
//!
//! Storage for meeting sessions, split into three tiers so that common reads
//! never load vector payloads:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        Tiered Store                             │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  MeetingMetadata      always resident, indexed by room + start  │
//! │  TranscriptEntry      per meeting, loaded on demand             │
//! │  TranscriptEmbedding  per meeting, loaded only for ranking      │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Embedding rows for a meeting exist exactly when its metadata says
//! `has_embeddings`, and then number exactly `transcript_count`. Backends
//! enforce this on every write.

pub mod error;
pub mod json;
pub mod memory;
pub mod model;
pub mod store;

pub use error::{Result, StorageError, StoreError};
pub use json::JsonStore;
pub use memory::MemoryStore;
pub use model::{MeetingMetadata, MeetingRoom, TranscriptEmbedding, TranscriptEntry};
pub use store::{RoomRegistry, TieredStore, validate_embedding_batch};
