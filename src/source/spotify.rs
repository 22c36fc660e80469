//! HTTP client for the streaming service Web API.

use super::{CatalogSource, PageRequest, SourceError, SourcePage, SourceResult};
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{header, StatusCode};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

/// Environment variable holding the bearer access token.
pub const ACCESS_TOKEN_ENV: &str = "SPOTIFY_ACCESS_TOKEN";

pub struct SpotifyClient {
    client: reqwest::Client,
    base_url: String,
    access_token: String,
    market: String,
    timeout: Duration,
}

impl SpotifyClient {
    /// Create a new client.
    ///
    /// # Arguments
    /// * `base_url` - API root (e.g., "https://api.spotify.com/v1")
    /// * `access_token` - Bearer token sent with every request
    /// * `market` - Market used to filter artist albums
    /// * `timeout` - Request timeout
    pub fn new(
        base_url: &str,
        access_token: String,
        market: String,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            access_token,
            market,
            timeout,
        })
    }

    /// Create a client reading the access token from the environment.
    pub fn from_env(base_url: &str, market: String, timeout: Duration) -> Result<Self> {
        let access_token = std::env::var(ACCESS_TOKEN_ENV)
            .with_context(|| format!("{} is not set", ACCESS_TOKEN_ENV))?;
        Self::new(base_url, access_token, market, timeout)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get_json(&self, path: &str, query: &[(&str, String)]) -> SourceResult<Value> {
        let url = format!("{}{}", self.base_url, path);
        debug!("GET {} {:?}", url, query);

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.access_token)
            .query(query)
            .send()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        let status = response.status();
        if status.is_success() {
            return response
                .json::<Value>()
                .await
                .map_err(|e| SourceError::Parse(e.to_string()));
        }

        match status {
            StatusCode::NOT_FOUND => Err(SourceError::NotFound),
            StatusCode::TOO_MANY_REQUESTS => {
                let retry_after = response
                    .headers()
                    .get(header::RETRY_AFTER)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.trim().parse::<u64>().ok())
                    .map(Duration::from_secs);
                Err(SourceError::RateLimited { retry_after })
            }
            s if s.is_server_error() => Err(SourceError::Server { status: s.as_u16() }),
            s => {
                let message = response.text().await.unwrap_or_default();
                Err(SourceError::Client {
                    status: s.as_u16(),
                    message,
                })
            }
        }
    }

    fn map_transport_error(&self, err: reqwest::Error) -> SourceError {
        if err.is_timeout() {
            SourceError::Timeout(self.timeout)
        } else {
            SourceError::Connection(err.to_string())
        }
    }

    async fn get_page(&self, path: &str, query: &[(&str, String)]) -> SourceResult<SourcePage> {
        let body = self.get_json(path, query).await?;
        page_from_body(&body)
    }
}

/// Split a paging object into its items and continuation flag.
fn page_from_body(body: &Value) -> SourceResult<SourcePage> {
    let items = body
        .get("items")
        .and_then(Value::as_array)
        .cloned()
        .ok_or_else(|| SourceError::Parse("Response has no items list".to_string()))?;
    let has_more = body.get("next").map(|next| next.is_string()).unwrap_or(false);
    Ok(SourcePage { items, has_more })
}

#[async_trait]
impl CatalogSource for SpotifyClient {
    async fn search_artists(&self, name: &str, limit: u32) -> SourceResult<Vec<Value>> {
        let query = [
            ("q", format!("artist: {}", name)),
            ("type", "artist".to_string()),
            ("limit", limit.to_string()),
        ];
        let body = self.get_json("/search", &query).await?;
        let artists = body
            .get("artists")
            .ok_or_else(|| SourceError::Parse("Search response has no artists".to_string()))?;
        Ok(page_from_body(artists)?.items)
    }

    async fn artist_albums(&self, artist_id: &str, page: PageRequest) -> SourceResult<SourcePage> {
        let path = format!("/artists/{}/albums", urlencoding::encode(artist_id));
        let query = [
            ("market", self.market.clone()),
            ("limit", page.limit.to_string()),
            ("offset", page.offset.to_string()),
        ];
        self.get_page(&path, &query).await
    }

    async fn album_tracks(&self, album_id: &str, page: PageRequest) -> SourceResult<SourcePage> {
        let path = format!("/albums/{}/tracks", urlencoding::encode(album_id));
        let query = [
            ("limit", page.limit.to_string()),
            ("offset", page.offset.to_string()),
        ];
        self.get_page(&path, &query).await
    }

    async fn audio_features(&self, track_id: &str) -> SourceResult<Option<Value>> {
        let query = [("ids", track_id.to_string())];
        let body = self.get_json("/audio-features", &query).await?;
        let features = body
            .get("audio_features")
            .and_then(Value::as_array)
            .ok_or_else(|| SourceError::Parse("Response has no audio_features list".to_string()))?;
        Ok(features.first().filter(|f| f.is_object()).cloned())
    }
}
