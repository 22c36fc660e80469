//! Common test infrastructure
//!
//! Tests should only import from this module, not from internal submodules.
//!
//! # Example
//!
//! ```no_run
//! mod common;
//! use common::{create_test_catalog, test_client, FakeApiServer, TEWS_QUERY};
//! use catalog_etl::CatalogSource;
//!
//! #[tokio::test]
//! async fn test_search() {
//!     let server = FakeApiServer::spawn(create_test_catalog()).await;
//!     let client = test_client(&server);
//!
//!     let artists = client.search_artists(TEWS_QUERY, 1).await.unwrap();
//!     assert_eq!(artists.len(), 1);
//! }
//! ```

mod constants;
mod fixtures;
mod server;

// Public API - this is what tests import
pub use constants::*;
#[allow(unused_imports)]
pub use fixtures::{album_json, create_test_catalog, test_artist_names, track_json, FakeCatalog};
pub use server::FakeApiServer;

use catalog_etl::config::SourceSettings;
use catalog_etl::{CatalogSource, Extractor, RetryPolicy, RetryingSource, SpotifyClient};
use std::sync::Arc;
use std::time::Duration;

/// Client for the fake API, without retries.
pub fn test_client(server: &FakeApiServer) -> SpotifyClient {
    SpotifyClient::new(
        &server.base_url,
        TEST_TOKEN.to_string(),
        TEST_MARKET.to_string(),
        Duration::from_secs(5),
    )
    .expect("Failed to build client")
}

/// Retry policy with millisecond backoffs.
pub fn fast_retry_policy(max_retries: u32) -> RetryPolicy {
    RetryPolicy {
        max_retries,
        initial_backoff: Duration::from_millis(1),
        max_backoff: Duration::from_millis(10),
        backoff_multiplier: 2.0,
    }
}

/// Extractor over the fake API with the default paging settings.
#[allow(dead_code)]
pub fn test_extractor(server: &FakeApiServer, max_retries: u32) -> Extractor {
    let source = RetryingSource::new(
        test_client(server),
        fast_retry_policy(max_retries),
        Duration::from_secs(5),
    );
    let source: Arc<dyn CatalogSource> = Arc::new(source);
    Extractor::new(source, &SourceSettings::default())
}
