// SPDX-License-Identifier: MIT

//! Illustrative image lookup

use super::ImageService;
use crate::adk::error::{CollaboratorError, QuillError};
use crate::adk::model::endpoint;
use async_trait::async_trait;
use reqwest::Client;
use std::env;
use std::time::Duration;

const PROVIDER: &str = "unsplash";

/// Unsplash photo search
pub struct UnsplashImages {
    client: Client,
    access_key: String,
    base_url: String,
}

impl UnsplashImages {
    /// Requires `UNSPLASH_ACCESS_KEY`.
    pub fn new(timeout: Duration) -> Result<Self, QuillError> {
        let access_key = env::var("UNSPLASH_ACCESS_KEY")
            .map_err(|_| QuillError::config("UNSPLASH_ACCESS_KEY must be set"))?;
        let base_url = env::var("UNSPLASH_BASE_URL")
            .unwrap_or_else(|_| "https://api.unsplash.com".to_string());

        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
            access_key,
            base_url: endpoint(&base_url)?,
        })
    }

    fn first_result_url(body: &serde_json::Value) -> Option<String> {
        body["results"]
            .as_array()?
            .first()?
            .get("urls")?
            .get("regular")?
            .as_str()
            .map(String::from)
    }
}

#[async_trait]
impl ImageService for UnsplashImages {
    async fn get_image(&self, query: &str) -> Result<Option<String>, CollaboratorError> {
        let resp = self
            .client
            .get(format!("{}/search/photos", self.base_url))
            .header("Authorization", format!("Client-ID {}", self.access_key))
            .query(&[("query", query), ("per_page", "1")])
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
        Ok(Self::first_result_url(&body))
    }
}

/// Image service that never finds anything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoImages;

#[async_trait]
impl ImageService for NoImages {
    async fn get_image(&self, _query: &str) -> Result<Option<String>, CollaboratorError> {
        Ok(None)
    }
}
