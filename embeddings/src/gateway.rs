//! Embedding gateway.
//!
//! Thin adapter around an [`EmbeddingProvider`] that applies a deadline to
//! every call and folds every provider failure into
//! [`EmbeddingError::Unavailable`], so callers have one signal to degrade on.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::Embedding;
use crate::error::{EmbeddingError, Result};
use crate::provider::{EmbeddingProvider, EmbeddingRequest};

/// Default deadline for a single provider call.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Gateway converting text to vectors through an external provider.
#[derive(Clone)]
pub struct EmbeddingGateway {
    provider: Arc<dyn EmbeddingProvider>,
    model: Option<String>,
    timeout: Duration,
}

impl EmbeddingGateway {
    /// Create a gateway around the given provider.
    pub fn new(provider: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            provider,
            model: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Override the provider's default model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Set the per-call deadline.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Name of the wrapped provider.
    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    fn request(&self, text: impl Into<String>) -> EmbeddingRequest {
        let request = EmbeddingRequest::new(text);
        match &self.model {
            Some(model) => request.with_model(model.clone()),
            None => request,
        }
    }

    /// Embed a single text.
    pub async fn embed(&self, text: &str) -> Result<Embedding> {
        let call = self.provider.embed(self.request(text));
        let response = self.with_deadline(call).await?;

        if response.embedding.is_empty() {
            return Err(EmbeddingError::Unavailable(
                "provider returned an empty embedding".to_string(),
            ));
        }

        Ok(response.embedding)
    }

    /// Embed several texts in one provider call, preserving input order.
    pub async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let requests = texts.iter().map(|t| self.request(t.as_str())).collect();
        let responses = self.with_deadline(self.provider.embed_batch(requests)).await?;

        if responses.len() != texts.len() {
            return Err(EmbeddingError::Unavailable(format!(
                "provider returned {} embeddings for {} texts",
                responses.len(),
                texts.len()
            )));
        }

        debug!(
            "Embedded batch of {} texts via {}",
            texts.len(),
            self.provider.name()
        );
        Ok(responses.into_iter().map(|r| r.embedding).collect())
    }

    async fn with_deadline<T>(&self, call: impl Future<Output = Result<T>>) -> Result<T> {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) => {
                warn!("Embedding provider {} failed: {err}", self.provider.name());
                Err(EmbeddingError::Unavailable(err.to_string()))
            }
            Err(_) => {
                let timeout_ms = u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX);
                warn!(
                    "Embedding provider {} timed out after {timeout_ms}ms",
                    self.provider.name()
                );
                Err(EmbeddingError::Unavailable(
                    EmbeddingError::Timeout { timeout_ms }.to_string(),
                ))
            }
        }
    }
}

impl std::fmt::Debug for EmbeddingGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddingGateway")
            .field("provider", &self.provider.name())
            .field("model", &self.model)
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::EmbeddingResponse;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;

    struct LengthProvider;

    #[async_trait]
    impl EmbeddingProvider for LengthProvider {
        fn name(&self) -> &str {
            "length"
        }

        fn default_model(&self) -> &str {
            "length-v1"
        }

        async fn embed(&self, request: EmbeddingRequest) -> Result<EmbeddingResponse> {
            Ok(EmbeddingResponse {
                embedding: vec![request.text.len() as f32, 1.0],
                model: request.model.unwrap_or_else(|| "length-v1".to_string()),
                dimension: 2,
                tokens_used: None,
            })
        }

        fn is_available(&self) -> bool {
            true
        }
    }

    struct BrokenProvider;

    #[async_trait]
    impl EmbeddingProvider for BrokenProvider {
        fn name(&self) -> &str {
            "broken"
        }

        fn default_model(&self) -> &str {
            "broken-v1"
        }

        async fn embed(&self, _request: EmbeddingRequest) -> Result<EmbeddingResponse> {
            Err(EmbeddingError::ApiRequest("503 service unavailable".to_string()))
        }

        fn is_available(&self) -> bool {
            false
        }
    }

    struct SlowProvider;

    #[async_trait]
    impl EmbeddingProvider for SlowProvider {
        fn name(&self) -> &str {
            "slow"
        }

        fn default_model(&self) -> &str {
            "slow-v1"
        }

        async fn embed(&self, _request: EmbeddingRequest) -> Result<EmbeddingResponse> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Err(EmbeddingError::InvalidResponse("unreachable".to_string()))
        }

        fn is_available(&self) -> bool {
            true
        }
    }

    #[tokio::test]
    async fn test_embed_and_batch_preserve_order() {
        let gateway = EmbeddingGateway::new(Arc::new(LengthProvider));

        assert_eq!(gateway.embed("abc").await.unwrap(), vec![3.0, 1.0]);

        let batch = gateway
            .embed_batch(&["a".to_string(), "abcd".to_string()])
            .await
            .unwrap();
        assert_eq!(batch, vec![vec![1.0, 1.0], vec![4.0, 1.0]]);
        assert!(gateway.embed_batch(&[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_provider_error_becomes_unavailable() {
        let gateway = EmbeddingGateway::new(Arc::new(BrokenProvider));
        let err = gateway.embed("anything").await.unwrap_err();
        assert!(matches!(err, EmbeddingError::Unavailable(_)));
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_timeout_becomes_unavailable() {
        let gateway = EmbeddingGateway::new(Arc::new(SlowProvider))
            .with_timeout(Duration::from_millis(50));

        let err = gateway.embed("anything").await.unwrap_err();
        match err {
            EmbeddingError::Unavailable(reason) => assert!(reason.contains("timed out")),
            other => panic!("unexpected error: {other}"),
        }
    }
}
