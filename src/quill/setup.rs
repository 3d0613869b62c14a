// SPDX-License-Identifier: MIT

//! Builds collaborators from configuration and the environment
//!
//! Optional services degrade instead of failing: no Unsplash key means no
//! images, no OpenAI key means no similarity corpus, no Redis URL means an
//! in-memory cache. The similarity corpus is stored in the same cache as the
//! drafts.

use crate::adk::error::QuillError;
use crate::adk::model::anthropic::AnthropicModel;
use crate::adk::model::openai::OpenAIModel;
use crate::adk::model::Model;
use crate::adk::services::{
    Cache, EmbeddingIndex, ImageService, KeywordScorer, LlmScorer, MemoryCache, NoImages,
    NoSimilarity, OpenAIEmbedder, QualityScorer, RedisCache, SimilarityService, UnsplashImages,
    CORPUS_KEY,
};
use crate::quill::config::{PipelineConfig, Provider, ScorerKind};
use crate::quill::pipelines::content::ContentCollaborators;
use std::env;
use std::sync::Arc;

/// Text generation model selected by the config
pub fn build_model(config: &PipelineConfig) -> Result<Arc<dyn Model>, QuillError> {
    let name = config.model.name.clone();
    let provider = config.model.provider();
    log::info!("Using provider: {:?} with model: {}", provider, name);

    let model: Arc<dyn Model> = match provider {
        Provider::OpenAI => Arc::new(OpenAIModel::new(name, config.timeout())?),
        Provider::Anthropic => Arc::new(AnthropicModel::new(name, config.timeout())?),
    };
    Ok(model)
}

pub fn build_scorer(config: &PipelineConfig, model: Arc<dyn Model>) -> Arc<dyn QualityScorer> {
    match config.seo.scorer {
        ScorerKind::Keyword => Arc::new(KeywordScorer::new(config.seo.min_words)),
        ScorerKind::Llm => Arc::new(LlmScorer::new(model)),
    }
}

/// Embedding index whose corpus is kept in `cache`, so it lasts as long as the
/// cache does
pub fn build_similarity(
    config: &PipelineConfig,
    cache: Arc<dyn Cache>,
) -> Arc<dyn SimilarityService> {
    match OpenAIEmbedder::new(config.model.embedding_model.clone(), config.timeout()) {
        Ok(embedder) => Arc::new(
            EmbeddingIndex::new(Arc::new(embedder))
                .with_store(cache, CORPUS_KEY, config.corpus_ttl())
                .with_max_entries(config.uniqueness.max_corpus),
        ),
        Err(e) => {
            log::warn!("Uniqueness checks disabled: {}", e);
            Arc::new(NoSimilarity)
        }
    }
}

pub fn build_images(config: &PipelineConfig) -> Arc<dyn ImageService> {
    match UnsplashImages::new(config.timeout()) {
        Ok(images) => Arc::new(images),
        Err(e) => {
            log::warn!("Image lookup disabled: {}", e);
            Arc::new(NoImages)
        }
    }
}

/// Redis when a URL is configured (or set in `REDIS_URL`), memory otherwise
pub async fn build_cache(config: &PipelineConfig) -> Result<Arc<dyn Cache>, QuillError> {
    let url = config
        .cache
        .redis_url
        .clone()
        .or_else(|| env::var("REDIS_URL").ok());

    match url {
        Some(url) => {
            let cache = RedisCache::connect(&url, config.cache.prefix.clone()).await?;
            log::info!("Caching drafts and the similarity corpus in Redis");
            Ok(Arc::new(cache))
        }
        None => {
            log::warn!(
                "No Redis configured; drafts and the similarity corpus last only for this process"
            );
            Ok(Arc::new(MemoryCache::new()))
        }
    }
}

/// Everything the content pipeline needs
pub async fn content_collaborators(
    config: &PipelineConfig,
) -> Result<ContentCollaborators, QuillError> {
    let model = build_model(config)?;
    let cache = build_cache(config).await?;
    Ok(ContentCollaborators {
        scorer: build_scorer(config, model.clone()),
        similarity: build_similarity(config, cache.clone()),
        images: build_images(config),
        cache,
        model,
    })
}
