//! Embedding adapter used by the cache engine

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::domain::embedding::{EmbeddingProvider, EmbeddingRequest};
use crate::domain::semantic_cache::SemanticCacheConfig;
use crate::domain::CacheError;

/// Wraps an `EmbeddingProvider` with input validation and a bounded wait.
#[derive(Debug, Clone)]
pub struct EmbeddingGenerator {
    provider: Arc<dyn EmbeddingProvider>,
    model: String,
    timeout: Duration,
}

impl EmbeddingGenerator {
    pub fn new(provider: Arc<dyn EmbeddingProvider>, model: impl Into<String>, timeout: Duration) -> Self {
        Self {
            provider,
            model: model.into(),
            timeout,
        }
    }

    /// Use the model and timeout from the cache configuration
    pub fn from_config(provider: Arc<dyn EmbeddingProvider>, config: &SemanticCacheConfig) -> Self {
        Self::new(provider, config.embedding_model.clone(), config.embedding_timeout())
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn provider_name(&self) -> &'static str {
        self.provider.provider_name()
    }

    /// Embed a single text
    pub async fn generate(&self, text: &str) -> Result<Vec<f32>, CacheError> {
        if text.trim().is_empty() {
            return Err(CacheError::invalid_argument("text cannot be blank"));
        }

        let request = EmbeddingRequest::single(self.model.clone(), text);
        let mut vectors = self.embed(request).await?.into_iter();

        match vectors.next() {
            Some(vector) if !vector.is_empty() => Ok(vector),
            _ => Err(CacheError::provider(
                self.provider.provider_name(),
                "provider returned no embedding",
            )),
        }
    }

    /// Embed several texts, preserving input order
    pub async fn generate_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, CacheError> {
        if texts.is_empty() {
            return Err(CacheError::invalid_argument("texts cannot be empty"));
        }
        if let Some(index) = texts.iter().position(|t| t.trim().is_empty()) {
            return Err(CacheError::invalid_argument(format!(
                "text at index {} cannot be blank",
                index
            )));
        }

        let request = EmbeddingRequest::batch(self.model.clone(), texts.to_vec());
        let vectors = self.embed(request).await?;

        if vectors.len() != texts.len() || vectors.iter().any(Vec::is_empty) {
            return Err(CacheError::provider(
                self.provider.provider_name(),
                format!(
                    "expected {} embeddings, provider returned {}",
                    texts.len(),
                    vectors.len()
                ),
            ));
        }

        Ok(vectors)
    }

    async fn embed(&self, request: EmbeddingRequest) -> Result<Vec<Vec<f32>>, CacheError> {
        let inputs = request.expected_vectors();
        let response = tokio::time::timeout(self.timeout, self.provider.embed(request))
            .await
            .map_err(|_| CacheError::timed_out("embedding", self.timeout))??;

        debug!(
            provider = self.provider.provider_name(),
            model = %self.model,
            inputs,
            "Generated embeddings"
        );

        Ok(response.into_ordered_vectors())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::embedding::MockEmbeddingProvider;

    fn generator(provider: MockEmbeddingProvider) -> (EmbeddingGenerator, Arc<MockEmbeddingProvider>) {
        let provider = Arc::new(provider);
        let generator = EmbeddingGenerator::new(
            provider.clone(),
            "mock-embedding",
            Duration::from_secs(5),
        );
        (generator, provider)
    }

    #[tokio::test]
    async fn test_generate_returns_vector() {
        let (generator, provider) =
            generator(MockEmbeddingProvider::new("mock", 3).with_vector("hello", vec![1.0, 0.0, 0.0]));

        let vector = generator.generate("hello").await.unwrap();

        assert_eq!(vector, vec![1.0, 0.0, 0.0]);
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn test_generate_blank_text_is_rejected_without_call() {
        let (generator, provider) = generator(MockEmbeddingProvider::new("mock", 3));

        for text in ["", "   ", "\n\t"] {
            let result = generator.generate(text).await;
            assert!(matches!(result, Err(CacheError::InvalidArgument { .. })));
        }

        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn test_generate_batch_preserves_order() {
        let (generator, _) = generator(
            MockEmbeddingProvider::new("mock", 2)
                .with_vector("a", vec![1.0, 0.0])
                .with_vector("b", vec![0.0, 1.0]),
        );

        let vectors = generator
            .generate_batch(&["a".to_string(), "b".to_string()])
            .await
            .unwrap();

        assert_eq!(vectors, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
    }

    #[tokio::test]
    async fn test_generate_batch_rejects_empty_and_blank() {
        let (generator, provider) = generator(MockEmbeddingProvider::new("mock", 2));

        let empty = generator.generate_batch(&[]).await;
        assert!(matches!(empty, Err(CacheError::InvalidArgument { .. })));

        let blank = generator
            .generate_batch(&["ok".to_string(), " ".to_string()])
            .await;
        match blank {
            Err(CacheError::InvalidArgument { message }) => assert!(message.contains("index 1")),
            other => panic!("expected invalid argument, got {:?}", other),
        }

        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn test_generate_times_out() {
        let provider = Arc::new(
            MockEmbeddingProvider::new("slow", 2).with_delay(Duration::from_millis(200)),
        );
        let generator = EmbeddingGenerator::new(provider, "mock-embedding", Duration::from_millis(20));

        let result = generator.generate("hello").await;

        match result {
            Err(CacheError::TimedOut { operation, timeout }) => {
                assert_eq!(operation, "embedding");
                assert_eq!(timeout, Duration::from_millis(20));
            }
            other => panic!("expected timeout, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_generate_propagates_provider_error() {
        let (generator, _) = generator(MockEmbeddingProvider::new("broken", 2).with_error("rate limited"));

        let result = generator.generate("hello").await;

        match result {
            Err(CacheError::Provider { provider, message }) => {
                assert_eq!(provider, "broken");
                assert_eq!(message, "rate limited");
            }
            other => panic!("expected provider error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_generate_empty_vector_is_provider_error() {
        let (generator, _) = generator(MockEmbeddingProvider::new("mock", 0));

        let result = generator.generate("hello").await;

        assert!(matches!(result, Err(CacheError::Provider { .. })));
    }

    #[test]
    fn test_from_config() {
        let config = SemanticCacheConfig::default()
            .with_embedding_model("text-embedding-3-large")
            .with_embedding_timeout(Duration::from_secs(7));
        let generator = EmbeddingGenerator::from_config(
            Arc::new(MockEmbeddingProvider::new("mock", 2)),
            &config,
        );

        assert_eq!(generator.model(), "text-embedding-3-large");
        assert_eq!(generator.timeout(), Duration::from_secs(7));
        assert_eq!(generator.provider_name(), "mock");
    }
}
