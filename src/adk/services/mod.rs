// SPDX-License-Identifier: MIT

//! Collaborator services used by pipeline steps
//!
//! Each concern is a trait so steps receive implementations by injection:
//! - [similarity] - near-duplicate detection over embeddings
//! - [quality] - SEO/quality scoring
//! - [image] - illustrative image lookup
//! - [cache] - key-value store with expiry

pub mod cache;
pub mod image;
pub mod quality;
pub mod similarity;

use crate::adk::error::CollaboratorError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub use cache::{Cache, MemoryCache, RedisCache};
pub use image::{NoImages, UnsplashImages};
pub use quality::{KeywordScorer, LlmScorer};
pub use similarity::{Embedder, EmbeddingIndex, NoSimilarity, OpenAIEmbedder, CORPUS_KEY};

/// Closest previously seen content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarMatch {
    pub match_id: String,
    /// Similarity in [0, 1]
    pub score: f32,
}

/// Result of quality scoring
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityReport {
    /// Score in [0, 100]
    pub score: f32,
    #[serde(default)]
    pub suggestions: Vec<String>,
}

#[async_trait]
pub trait SimilarityService: Send + Sync {
    /// Best match at or above `threshold`, if any
    async fn find_similar(
        &self,
        content: &str,
        threshold: f32,
    ) -> Result<Option<SimilarMatch>, CollaboratorError>;

    /// Record accepted content so later drafts are compared against it
    async fn remember(&self, _id: &str, _content: &str) -> Result<(), CollaboratorError> {
        Ok(())
    }
}

#[async_trait]
pub trait QualityScorer: Send + Sync {
    async fn score(
        &self,
        content: &str,
        keywords: &[String],
    ) -> Result<QualityReport, CollaboratorError>;
}

#[async_trait]
pub trait ImageService: Send + Sync {
    /// URL or data URI of an image matching `query`
    async fn get_image(&self, query: &str) -> Result<Option<String>, CollaboratorError>;
}

/// Bound a collaborator call; an elapsed timer becomes a recoverable error
pub async fn with_timeout<T, F>(
    service: &str,
    after: Duration,
    call: F,
) -> Result<T, CollaboratorError>
where
    F: std::future::Future<Output = Result<T, CollaboratorError>>,
{
    match tokio::time::timeout(after, call).await {
        Ok(result) => result,
        Err(_) => Err(CollaboratorError::Timeout {
            service: service.to_string(),
            after,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_with_timeout_passes_result_through() {
        let value = with_timeout("fast", Duration::from_secs(1), async { Ok(7) })
            .await
            .unwrap();
        assert_eq!(value, 7);
    }

    #[tokio::test]
    async fn test_with_timeout_elapses() {
        let result: Result<(), _> = with_timeout("slow", Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;
        assert!(matches!(result, Err(CollaboratorError::Timeout { .. })));
    }

    #[test]
    fn test_quality_report_suggestions_default() {
        let report: QualityReport = serde_json::from_str(r#"{"score": 72.5}"#).unwrap();
        assert_eq!(report.score, 72.5);
        assert!(report.suggestions.is_empty());
    }
}
