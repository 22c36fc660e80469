//! Upstream catalog source.
//!
//! The pipeline only talks to [`CatalogSource`]; the HTTP client and the
//! retrying wrapper are two implementations of it.

mod retry_policy;
mod spotify;

pub use retry_policy::{RetryPolicy, RetryingSource};
pub use spotify::SpotifyClient;

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Errors returned by an upstream call.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Rate limited (retry after {retry_after:?})")]
    RateLimited { retry_after: Option<Duration> },

    #[error("Upstream server error: status {status}")]
    Server { status: u16 },

    #[error("Not found")]
    NotFound,

    #[error("Request rejected with status {status}: {message}")]
    Client { status: u16, message: String },

    #[error("Failed to parse response: {0}")]
    Parse(String),
}

impl SourceError {
    /// Returns true if the call may succeed when repeated.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SourceError::Connection(_)
                | SourceError::Timeout(_)
                | SourceError::RateLimited { .. }
                | SourceError::Server { .. }
        )
    }
}

pub type SourceResult<T> = Result<T, SourceError>;

/// One page of a paginated list endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub limit: u32,
    pub offset: u32,
}

#[derive(Debug, Clone, Default)]
pub struct SourcePage {
    pub items: Vec<Value>,
    /// Whether the upstream reports a following page.
    pub has_more: bool,
}

#[async_trait]
pub trait CatalogSource: Send + Sync {
    /// Free-text artist search, best match first.
    async fn search_artists(&self, name: &str, limit: u32) -> SourceResult<Vec<Value>>;

    async fn artist_albums(&self, artist_id: &str, page: PageRequest) -> SourceResult<SourcePage>;

    async fn album_tracks(&self, album_id: &str, page: PageRequest) -> SourceResult<SourcePage>;

    /// Audio features of one track, `None` when the upstream has none.
    async fn audio_features(&self, track_id: &str) -> SourceResult<Option<Value>>;
}

#[async_trait]
impl<S: CatalogSource + ?Sized> CatalogSource for Arc<S> {
    async fn search_artists(&self, name: &str, limit: u32) -> SourceResult<Vec<Value>> {
        (**self).search_artists(name, limit).await
    }

    async fn artist_albums(&self, artist_id: &str, page: PageRequest) -> SourceResult<SourcePage> {
        (**self).artist_albums(artist_id, page).await
    }

    async fn album_tracks(&self, album_id: &str, page: PageRequest) -> SourceResult<SourcePage> {
        (**self).album_tracks(album_id, page).await
    }

    async fn audio_features(&self, track_id: &str) -> SourceResult<Option<Value>> {
        (**self).audio_features(track_id).await
    }
}
