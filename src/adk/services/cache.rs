// SPDX-License-Identifier: MIT

//! Key-value cache with expiry
//!
//! Steps use the cache only to skip recomputation; a cache failure is never
//! a reason to fail a step.

use crate::adk::error::{CollaboratorError, QuillError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redis::AsyncCommands;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;

#[async_trait]
pub trait Cache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, CollaboratorError>;

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CollaboratorError>;
}

/// Process-local cache
#[derive(Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<String, (String, DateTime<Utc>)>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop expired entries, returning how many were removed
    pub async fn purge_expired(&self) -> usize {
        let now = Utc::now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, (_, expires_at)| *expires_at > now);
        before - entries.len()
    }
}

#[async_trait]
impl Cache for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CollaboratorError> {
        let entries = self.entries.read().await;
        Ok(entries
            .get(key)
            .filter(|(_, expires_at)| *expires_at > Utc::now())
            .map(|(value, _)| value.clone()))
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CollaboratorError> {
        let ttl = chrono::Duration::from_std(ttl)
            .map_err(|e| CollaboratorError::permanent("memory-cache", e.to_string()))?;
        let mut entries = self.entries.write().await;
        entries.insert(key.to_string(), (value.to_string(), Utc::now() + ttl));
        Ok(())
    }
}

/// Redis-backed cache
pub struct RedisCache {
    conn: redis::aio::MultiplexedConnection,
    prefix: String,
}

impl RedisCache {
    pub async fn connect(url: &str, prefix: impl Into<String>) -> Result<Self, QuillError> {
        let client = redis::Client::open(url)?;
        let conn = client.get_multiplexed_async_connection().await?;
        log::info!("Connected to redis cache");
        Ok(Self {
            conn,
            prefix: prefix.into(),
        })
    }

    fn key(&self, key: &str) -> String {
        format!("{}:{}", self.prefix, key)
    }
}

#[async_trait]
impl Cache for RedisCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CollaboratorError> {
        let mut conn = self.conn.clone();
        let value: Option<String> = conn.get(self.key(key)).await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CollaboratorError> {
        let mut conn = self.conn.clone();
        let seconds = ttl.as_secs().max(1);
        conn.set_ex::<_, _, ()>(self.key(key), value, seconds).await?;
        Ok(())
    }
}

/// Cache key for a prompt-like input, stable across processes and builds
pub fn cache_key(namespace: &str, parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part.as_bytes());
        hasher.update([0x1f]);
    }
    format!("{}:{:x}", namespace, hasher.finalize())
}
