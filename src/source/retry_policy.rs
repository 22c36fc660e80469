//! Retry policy for upstream calls.
//!
//! Implements exponential backoff with a hard per-call timeout.

use super::{CatalogSource, PageRequest, SourceError, SourcePage, SourceResult};
use crate::config::RetrySettings;
use async_trait::async_trait;
use serde_json::Value;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Retry policy implementing exponential backoff.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of retries before giving up.
    pub max_retries: u32,
    pub initial_backoff: Duration,
    /// Cap for exponential growth, also applied to upstream `Retry-After` hints.
    pub max_backoff: Duration,
    /// Multiplier applied to backoff after each retry.
    pub backoff_multiplier: f64,
}

impl RetryPolicy {
    pub fn new(config: &RetrySettings) -> Self {
        Self {
            max_retries: config.max_retries,
            initial_backoff: Duration::from_millis(config.initial_backoff_ms),
            max_backoff: Duration::from_millis(config.max_backoff_ms),
            backoff_multiplier: config.backoff_multiplier,
        }
    }

    /// Backoff before retry number `retry_count + 1`.
    ///
    /// `initial_backoff * multiplier^retry_count`, capped at `max_backoff`.
    pub fn backoff(&self, retry_count: u32) -> Duration {
        let exponent = i32::try_from(retry_count).unwrap_or(i32::MAX);
        let backoff_ms =
            self.initial_backoff.as_millis() as f64 * self.backoff_multiplier.powi(exponent);
        let capped_ms = backoff_ms.min(self.max_backoff.as_millis() as f64);
        Duration::from_millis(capped_ms as u64)
    }

    /// Wait before retrying after `error`. Rate limiting hints win over the
    /// computed backoff.
    pub fn delay_for(&self, error: &SourceError, retry_count: u32) -> Duration {
        match error {
            SourceError::RateLimited {
                retry_after: Some(retry_after),
            } => (*retry_after).min(self.max_backoff),
            _ => self.backoff(retry_count),
        }
    }

    pub fn should_retry(&self, error: &SourceError, retry_count: u32) -> bool {
        error.is_retryable() && retry_count < self.max_retries
    }

    /// Run `call` until it succeeds, fails permanently or runs out of retries.
    /// Every attempt is bounded by `call_timeout`.
    pub async fn run<T, F, Fut>(
        &self,
        operation: &str,
        call_timeout: Duration,
        mut call: F,
    ) -> SourceResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = SourceResult<T>>,
    {
        let mut retry_count = 0;
        loop {
            let result = match tokio::time::timeout(call_timeout, call()).await {
                Ok(result) => result,
                Err(_) => Err(SourceError::Timeout(call_timeout)),
            };
            match result {
                Ok(value) => return Ok(value),
                Err(err) if self.should_retry(&err, retry_count) => {
                    let delay = self.delay_for(&err, retry_count);
                    retry_count += 1;
                    warn!(
                        "{} failed: {}. Retry {}/{} in {:?}",
                        operation, err, retry_count, self.max_retries, delay
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(&RetrySettings::default())
    }
}

/// A [`CatalogSource`] that applies a [`RetryPolicy`] and a per-call timeout
/// to every call of the wrapped source.
pub struct RetryingSource<S> {
    inner: S,
    policy: RetryPolicy,
    call_timeout: Duration,
}

impl<S: CatalogSource> RetryingSource<S> {
    pub fn new(inner: S, policy: RetryPolicy, call_timeout: Duration) -> Self {
        Self {
            inner,
            policy,
            call_timeout,
        }
    }
}

#[async_trait]
impl<S: CatalogSource> CatalogSource for RetryingSource<S> {
    async fn search_artists(&self, name: &str, limit: u32) -> SourceResult<Vec<Value>> {
        let inner = &self.inner;
        let operation = format!("Artist search '{}'", name);
        self.policy
            .run(&operation, self.call_timeout, move || {
                inner.search_artists(name, limit)
            })
            .await
    }

    async fn artist_albums(&self, artist_id: &str, page: PageRequest) -> SourceResult<SourcePage> {
        let inner = &self.inner;
        let operation = format!("Album listing for artist {}", artist_id);
        self.policy
            .run(&operation, self.call_timeout, move || {
                inner.artist_albums(artist_id, page)
            })
            .await
    }

    async fn album_tracks(&self, album_id: &str, page: PageRequest) -> SourceResult<SourcePage> {
        let inner = &self.inner;
        let operation = format!("Track listing for album {}", album_id);
        self.policy
            .run(&operation, self.call_timeout, move || {
                inner.album_tracks(album_id, page)
            })
            .await
    }

    async fn audio_features(&self, track_id: &str) -> SourceResult<Option<Value>> {
        let inner = &self.inner;
        let operation = format!("Audio features for track {}", track_id);
        self.policy
            .run(&operation, self.call_timeout, move || {
                inner.audio_features(track_id)
            })
            .await
    }
}
