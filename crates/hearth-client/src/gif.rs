//! GIF search API client.
//!
//! Two endpoints: `featured` (trending) and `search`.  Each returns a list of
//! results exposing a full-resolution URL and a smaller preview.  Results
//! without a full-resolution URL are skipped; results without a preview fall
//! back to the full-resolution URL.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::config::ClientConfig;

#[derive(Error, Debug)]
pub enum GifError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("GIF service responded {0}")]
    Status(u16),

    #[error("GIF search is not configured")]
    MissingApiKey,
}

/// A selectable GIF.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Gif {
    pub id: String,
    /// Full-resolution URL, sent as message content.
    pub url: String,
    /// Thumbnail URL for the picker grid.
    pub preview_url: String,
}

/// Source of GIF results.
#[async_trait]
pub trait GifSource: Send + Sync {
    async fn featured(&self) -> Result<Vec<Gif>, GifError>;
    async fn search(&self, query: &str) -> Result<Vec<Gif>, GifError>;
}

// Response shape of the search API.

#[derive(Debug, Default, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<RawResult>,
}

#[derive(Debug, Deserialize)]
struct RawResult {
    #[serde(default)]
    id: String,
    #[serde(default)]
    media_formats: MediaFormats,
}

#[derive(Debug, Default, Deserialize)]
struct MediaFormats {
    gif: Option<Media>,
    tinygif: Option<Media>,
}

#[derive(Debug, Deserialize)]
struct Media {
    #[serde(default)]
    url: String,
}

fn non_empty(media: Option<Media>) -> Option<String> {
    media.map(|m| m.url).filter(|url| !url.trim().is_empty())
}

fn into_gifs(response: SearchResponse) -> Vec<Gif> {
    response
        .results
        .into_iter()
        .filter_map(|raw| {
            let url = non_empty(raw.media_formats.gif)?;
            let preview_url = non_empty(raw.media_formats.tinygif).unwrap_or_else(|| url.clone());
            Some(Gif {
                id: raw.id,
                url,
                preview_url,
            })
        })
        .collect()
}

/// HTTP [`GifSource`].
#[derive(Debug, Clone)]
pub struct GifClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    client_key: String,
    limit: u32,
}

impl GifClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        client_key: impl Into<String>,
        limit: u32,
    ) -> Result<Self, GifError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            client_key: client_key.into(),
            limit,
        })
    }

    /// Build a client from the configuration, failing with
    /// [`GifError::MissingApiKey`] when no API key is set.
    pub fn from_config(config: &ClientConfig) -> Result<Self, GifError> {
        let key = config
            .gif_api_key
            .as_deref()
            .filter(|key| !key.trim().is_empty())
            .ok_or(GifError::MissingApiKey)?;
        Self::new(
            config.gif_base_url.as_str(),
            key,
            config.gif_client_key.as_str(),
            config.gif_limit,
        )
    }

    fn endpoint(&self, name: &str) -> String {
        format!("{}/{}", self.base_url, name)
    }

    fn common_params(&self) -> Vec<(&'static str, String)> {
        vec![
            ("key", self.api_key.clone()),
            ("client_key", self.client_key.clone()),
            ("limit", self.limit.to_string()),
        ]
    }

    async fn fetch(
        &self,
        endpoint: &str,
        params: Vec<(&'static str, String)>,
    ) -> Result<Vec<Gif>, GifError> {
        let resp = self
            .http
            .get(self.endpoint(endpoint))
            .query(&params)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(GifError::Status(status.as_u16()));
        }

        let body: SearchResponse = resp.json().await?;
        let gifs = into_gifs(body);
        debug!(endpoint, count = gifs.len(), "GIF results fetched");
        Ok(gifs)
    }
}

#[async_trait]
impl GifSource for GifClient {
    async fn featured(&self) -> Result<Vec<Gif>, GifError> {
        self.fetch("featured", self.common_params()).await
    }

    async fn search(&self, query: &str) -> Result<Vec<Gif>, GifError> {
        let mut params = vec![("q", query.to_string())];
        params.extend(self.common_params());
        self.fetch("search", params).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(body: &str) -> Vec<Gif> {
        into_gifs(serde_json::from_str(body).unwrap())
    }

    #[test]
    fn parses_full_and_preview_urls() {
        let gifs = parse(
            r#"{"results":[{"id":"1","media_formats":{
                "gif":{"url":"https://media.example/1.gif"},
                "tinygif":{"url":"https://media.example/1-tiny.gif"}}}],
               "next":"20"}"#,
        );
        assert_eq!(
            gifs,
            vec![Gif {
                id: "1".into(),
                url: "https://media.example/1.gif".into(),
                preview_url: "https://media.example/1-tiny.gif".into(),
            }]
        );
    }

    #[test]
    fn missing_full_url_is_skipped_and_missing_preview_falls_back() {
        let gifs = parse(
            r#"{"results":[
                {"id":"a","media_formats":{"tinygif":{"url":"https://media.example/a-tiny.gif"}}},
                {"id":"b","media_formats":{"gif":{"url":""}}},
                {"id":"c","media_formats":{"gif":{"url":"https://media.example/c.gif"}}},
                {"id":"d"}
            ]}"#,
        );
        assert_eq!(gifs.len(), 1);
        assert_eq!(gifs[0].id, "c");
        assert_eq!(gifs[0].preview_url, "https://media.example/c.gif");
    }

    #[test]
    fn empty_body_yields_nothing() {
        assert!(parse("{}").is_empty());
    }

    #[test]
    fn from_config_requires_api_key() {
        let config = ClientConfig::default();
        assert!(matches!(
            GifClient::from_config(&config),
            Err(GifError::MissingApiKey)
        ));

        let config = ClientConfig {
            gif_api_key: Some("k".into()),
            gif_base_url: "https://gifs.example/v2/".into(),
            ..ClientConfig::default()
        };
        let client = GifClient::from_config(&config).unwrap();
        assert_eq!(client.endpoint("featured"), "https://gifs.example/v2/featured");
        assert_eq!(client.common_params()[2], ("limit", "20".to_string()));
    }
}
