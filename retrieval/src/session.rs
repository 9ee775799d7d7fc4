//! Per-room conversation history.
//!
//! Keeps the last few question/answer turns for each room so the caller can
//! hand recent dialogue to the answering model. History is bounded and lives
//! only in memory.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};

use crate::config::RetrievalConfig;

/// Default number of turns kept per room.
pub const DEFAULT_MAX_TURNS: usize = 20;

/// Who produced a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The person asking.
    User,

    /// The answering model.
    Assistant,
}

/// One turn of dialogue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    /// Who spoke.
    pub role: Role,

    /// What was said.
    pub text: String,

    /// When the turn was recorded.
    pub timestamp: DateTime<Utc>,
}

impl ConversationTurn {
    /// A user turn stamped now.
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
            timestamp: Utc::now(),
        }
    }

    /// An assistant turn stamped now.
    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            text: text.into(),
            timestamp: Utc::now(),
        }
    }
}

type History = Arc<Mutex<VecDeque<ConversationTurn>>>;

/// Bounded conversation history per room.
///
/// Appends to the same room are serialized by that room's mutex; different
/// rooms never wait on each other once their history exists.
#[derive(Debug)]
pub struct ConversationSessionStore {
    capacity: usize,
    rooms: RwLock<HashMap<String, History>>,
}

impl ConversationSessionStore {
    /// Create a store keeping at most `capacity` turns per room.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            rooms: RwLock::new(HashMap::new()),
        }
    }

    /// Create a store capped at the configured `session.max_turns`.
    pub fn from_config(config: &RetrievalConfig) -> Self {
        Self::new(config.session.max_turns)
    }

    /// Maximum turns kept per room.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    async fn history(&self, room_id: &str) -> History {
        if let Some(history) = self.rooms.read().await.get(room_id) {
            return Arc::clone(history);
        }

        let mut rooms = self.rooms.write().await;
        Arc::clone(
            rooms
                .entry(room_id.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(VecDeque::with_capacity(self.capacity)))),
        )
    }

    /// Append a turn, dropping the oldest once the room is at capacity.
    pub async fn append(&self, room_id: &str, turn: ConversationTurn) {
        if self.capacity == 0 {
            return;
        }

        let history = self.history(room_id).await;
        let mut turns = history.lock().await;
        while turns.len() >= self.capacity {
            turns.pop_front();
        }
        turns.push_back(turn);
    }

    /// Turns for a room, oldest first.
    pub async fn recent(&self, room_id: &str) -> Vec<ConversationTurn> {
        let history = self.rooms.read().await.get(room_id).cloned();
        match history {
            Some(history) => history.lock().await.iter().cloned().collect(),
            None => Vec::new(),
        }
    }

    /// Number of turns held for a room.
    pub async fn len(&self, room_id: &str) -> usize {
        let history = self.rooms.read().await.get(room_id).cloned();
        match history {
            Some(history) => history.lock().await.len(),
            None => 0,
        }
    }

    /// Whether a room has no turns.
    pub async fn is_empty(&self, room_id: &str) -> bool {
        self.len(room_id).await == 0
    }

    /// Forget a room's history.
    pub async fn clear(&self, room_id: &str) {
        let removed = self.rooms.write().await.remove(room_id);
        if let Some(history) = removed {
            history.lock().await.clear();
        }
    }

    /// Number of rooms currently holding history.
    pub async fn room_count(&self) -> usize {
        self.rooms.read().await.len()
    }
}

impl Default for ConversationSessionStore {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_TURNS)
    }
}
