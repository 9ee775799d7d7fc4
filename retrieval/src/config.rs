//! Configuration for the context retrieval engine.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::classifier::RetrievalStrategy;
use crate::error::{Result, RetrievalError};

/// Configuration for the context retrieval engine.
///
/// Every section may be omitted. Within `[fallback]`, `[timeouts]`,
/// `[embedding]` and `[session]` only the overridden keys are needed; a
/// strategy section replaces all three of its tunables:
///
/// ```toml
/// [targeted]
/// max_meetings = 10
/// similarity_threshold = 0.55
/// max_results = 8
///
/// [timeouts]
/// embedding_ms = 5000
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Tunables for targeted questions.
    pub targeted: StrategyConfig,

    /// Tunables for comprehensive questions.
    pub comprehensive: StrategyConfig,

    /// Recency fallback applied to comprehensive questions.
    pub fallback: FallbackConfig,

    /// Deadlines for collaborator calls.
    pub timeouts: TimeoutConfig,

    /// Embedding provider configuration.
    pub embedding: EmbeddingConfig,

    /// Conversation history configuration.
    pub session: SessionConfig,
}

impl RetrievalConfig {
    /// Parse a configuration from a TOML document.
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(source).map_err(|e| RetrievalError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration from a TOML file.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let source = tokio::fs::read_to_string(path.as_ref()).await?;
        Self::from_toml_str(&source)
    }

    /// Tunables for the given strategy.
    pub fn strategy(&self, strategy: RetrievalStrategy) -> &StrategyConfig {
        match strategy {
            RetrievalStrategy::Targeted => &self.targeted,
            RetrievalStrategy::Comprehensive => &self.comprehensive,
        }
    }

    /// Set the targeted strategy tunables.
    pub fn with_targeted(mut self, config: StrategyConfig) -> Self {
        self.targeted = config;
        self
    }

    /// Set the comprehensive strategy tunables.
    pub fn with_comprehensive(mut self, config: StrategyConfig) -> Self {
        self.comprehensive = config;
        self
    }

    /// Set the timeout configuration.
    pub fn with_timeouts(mut self, config: TimeoutConfig) -> Self {
        self.timeouts = config;
        self
    }

    /// Check that thresholds and limits are usable.
    pub fn validate(&self) -> Result<()> {
        let strategies = [
            ("targeted", &self.targeted),
            ("comprehensive", &self.comprehensive),
        ];
        for (name, strategy) in strategies {
            if !(-1.0..=1.0).contains(&strategy.similarity_threshold) {
                return Err(RetrievalError::Config(format!(
                    "{name}.similarity_threshold must be within [-1, 1], got {}",
                    strategy.similarity_threshold
                )));
            }
        }
        if self.embedding.batch_size == 0 {
            return Err(RetrievalError::Config(
                "embedding.batch_size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            targeted: StrategyConfig {
                max_meetings: 10,
                similarity_threshold: 0.5,
                max_results: 8,
            },
            comprehensive: StrategyConfig {
                max_meetings: 20,
                similarity_threshold: 0.3,
                max_results: 25,
            },
            fallback: FallbackConfig::default(),
            timeouts: TimeoutConfig::default(),
            embedding: EmbeddingConfig::default(),
            session: SessionConfig::default(),
        }
    }
}

/// Per-strategy retrieval tunables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyConfig {
    /// Maximum number of recent meetings considered as candidates.
    pub max_meetings: usize,

    /// Minimum cosine similarity for a line to be included.
    pub similarity_threshold: f32,

    /// Maximum number of ranked lines returned from the similarity pass.
    pub max_results: usize,
}

/// Recency fallback for comprehensive questions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FallbackConfig {
    /// Whether the fallback runs at all.
    pub enabled: bool,

    /// The fallback runs when the similarity pass yields fewer lines than this.
    pub trigger_below: usize,

    /// How many of the most recent lines are considered for merging.
    pub recent_lines: usize,

    /// Upper bound on historical lines after merging.
    pub max_total: usize,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            trigger_below: 15,
            recent_lines: 20,
            max_total: 25,
        }
    }
}

/// Deadlines for collaborator calls, in milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Deadline for each store or registry call.
    pub store_ms: u64,

    /// Deadline for each embedding provider call.
    pub embedding_ms: u64,
}

impl TimeoutConfig {
    /// Store deadline as a `Duration`.
    pub fn store(&self) -> Duration {
        Duration::from_millis(self.store_ms)
    }

    /// Embedding deadline as a `Duration`.
    pub fn embedding(&self) -> Duration {
        Duration::from_millis(self.embedding_ms)
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            store_ms: 5_000,
            embedding_ms: 10_000,
        }
    }
}

/// Configuration for the embedding provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Model to request; the provider default when unset.
    pub model: Option<String>,

    /// Number of transcript lines sent per provider call when indexing.
    pub batch_size: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: None,
            batch_size: 100,
        }
    }
}

/// Configuration for per-room conversation history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Number of turns kept per room before the oldest is dropped.
    pub max_turns: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_turns: crate::session::DEFAULT_MAX_TURNS,
        }
    }
}
