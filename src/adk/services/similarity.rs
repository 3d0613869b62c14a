// SPDX-License-Identifier: MIT

//! Near-duplicate detection over text embeddings

use super::{Cache, SimilarMatch, SimilarityService};
use crate::adk::error::{CollaboratorError, QuillError};
use crate::adk::model::endpoint;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::env;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

const PROVIDER: &str = "openai-embeddings";

/// Turns text into a dense vector
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, CollaboratorError>;
}

/// OpenAI `/embeddings` client
pub struct OpenAIEmbedder {
    client: Client,
    api_key: String,
    model_name: String,
    base_url: String,
}

impl OpenAIEmbedder {
    /// Requires `OPENAI_API_KEY`; honours `OPENAI_BASE_URL`.
    pub fn new(model_name: String, timeout: Duration) -> Result<Self, QuillError> {
        let api_key = env::var("OPENAI_API_KEY")
            .map_err(|_| QuillError::config("OPENAI_API_KEY must be set"))?;
        let base_url =
            env::var("OPENAI_BASE_URL").unwrap_or_else(|_| "https://api.openai.com/v1".to_string());

        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
            api_key,
            model_name,
            base_url: endpoint(&base_url)?,
        })
    }

    fn parse_embedding(response: &serde_json::Value) -> Result<Vec<f32>, CollaboratorError> {
        let values = response["data"][0]["embedding"]
            .as_array()
            .ok_or_else(|| CollaboratorError::permanent(PROVIDER, "No embedding in response"))?;

        values
            .iter()
            .map(|v| {
                v.as_f64()
                    .map(|f| f as f32)
                    .ok_or_else(|| CollaboratorError::permanent(PROVIDER, "Non-numeric embedding"))
            })
            .collect()
    }
}

#[async_trait]
impl Embedder for OpenAIEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, CollaboratorError> {
        let resp = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&json!({ "model": self.model_name, "input": text }))
            .send()
            .await
            .map_err(|e| CollaboratorError::from_reqwest(PROVIDER, e))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(CollaboratorError::from_status(
                PROVIDER,
                status.as_u16(),
                &body,
            ));
        }

        let body: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| CollaboratorError::permanent(PROVIDER, e.to_string()))?;
        Self::parse_embedding(&body)
    }
}

/// Similarity service with an empty corpus; every draft is unique
#[derive(Debug, Default, Clone, Copy)]
pub struct NoSimilarity;

#[async_trait]
impl SimilarityService for NoSimilarity {
    async fn find_similar(
        &self,
        _content: &str,
        _threshold: f32,
    ) -> Result<Option<SimilarMatch>, CollaboratorError> {
        Ok(None)
    }
}

/// Key the corpus is stored under when the index has a backing cache
pub const CORPUS_KEY: &str = "similarity:corpus";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct CorpusEntry {
    id: String,
    vector: Vec<f32>,
}

struct CorpusStore {
    cache: Arc<dyn Cache>,
    key: String,
    ttl: Duration,
}

/// Corpus of embedded documents compared by cosine similarity.
///
/// Without a store the corpus lives only as long as the index. With one, every
/// read reloads the stored corpus and every write saves it back, so indexes in
/// separate processes sharing a cache see each other's articles. Once the
/// corpus holds `max_entries` documents the oldest is dropped per insert.
pub struct EmbeddingIndex {
    embedder: Arc<dyn Embedder>,
    entries: RwLock<Vec<CorpusEntry>>,
    store: Option<CorpusStore>,
    max_entries: usize,
}

impl EmbeddingIndex {
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self {
            embedder,
            entries: RwLock::new(Vec::new()),
            store: None,
            max_entries: 500,
        }
    }

    /// Persist the corpus in `cache` under `key`
    pub fn with_store(
        mut self,
        cache: Arc<dyn Cache>,
        key: impl Into<String>,
        ttl: Duration,
    ) -> Self {
        self.store = Some(CorpusStore {
            cache,
            key: key.into(),
            ttl,
        });
        self
    }

    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = max_entries.max(1);
        self
    }

    pub async fn len(&self) -> usize {
        self.snapshot().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.snapshot().await.is_empty()
    }

    /// Stored corpus, or `None` when there is no store or it could not be read
    async fn load(&self) -> Option<Vec<CorpusEntry>> {
        let store = self.store.as_ref()?;
        match store.cache.get(&store.key).await {
            Ok(Some(raw)) => match serde_json::from_str(&raw) {
                Ok(entries) => Some(entries),
                Err(e) => {
                    log::warn!("Ignoring unreadable similarity corpus: {}", e);
                    None
                }
            },
            Ok(None) => Some(Vec::new()),
            Err(e) => {
                log::warn!("Similarity corpus unavailable, using local copy: {}", e);
                None
            }
        }
    }

    async fn save(&self, entries: &[CorpusEntry]) {
        let Some(store) = &self.store else {
            return;
        };
        let raw = match serde_json::to_string(entries) {
            Ok(raw) => raw,
            Err(e) => {
                log::warn!("Could not encode similarity corpus: {}", e);
                return;
            }
        };
        if let Err(e) = store.cache.set(&store.key, &raw, store.ttl).await {
            log::warn!("Could not save similarity corpus: {}", e);
        }
    }

    async fn snapshot(&self) -> Vec<CorpusEntry> {
        match self.load().await {
            Some(stored) => {
                *self.entries.write().await = stored.clone();
                stored
            }
            None => self.entries.read().await.clone(),
        }
    }
}

#[async_trait]
impl SimilarityService for EmbeddingIndex {
    async fn find_similar(
        &self,
        content: &str,
        threshold: f32,
    ) -> Result<Option<SimilarMatch>, CollaboratorError> {
        let entries = self.snapshot().await;
        if entries.is_empty() {
            return Ok(None);
        }

        let query = self.embedder.embed(content).await?;
        let best = entries
            .iter()
            .map(|entry| (&entry.id, cosine_similarity(&query, &entry.vector)))
            .filter(|(_, score)| *score >= threshold)
            .max_by(|a, b| a.1.total_cmp(&b.1));

        Ok(best.map(|(id, score)| SimilarMatch {
            match_id: id.clone(),
            score,
        }))
    }

    async fn remember(&self, id: &str, content: &str) -> Result<(), CollaboratorError> {
        let vector = self.embedder.embed(content).await?;
        let stored = self.load().await;

        let mut entries = self.entries.write().await;
        if let Some(stored) = stored {
            *entries = stored;
        }
        entries.retain(|entry| entry.id != id);
        entries.push(CorpusEntry {
            id: id.to_string(),
            vector,
        });
        if entries.len() > self.max_entries {
            let excess = entries.len() - self.max_entries;
            entries.drain(..excess);
            log::debug!("Similarity corpus full, dropped {} oldest", excess);
        }
        self.save(&entries).await;
        Ok(())
    }
}

/// Cosine similarity clamped to [0, 1]; mismatched or zero vectors score 0
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    (dot / (norm_a * norm_b)).clamp(0.0, 1.0)
}
