//! Shared constants for end-to-end tests
//!
//! When the fake catalog changes, update only this file and fixtures.rs.

// ============================================================================
// Fake API
// ============================================================================

/// Bearer token the fake API accepts
pub const TEST_TOKEN: &str = "test-token";

/// Market the fake API expects on album listings
pub const TEST_MARKET: &str = "US";

// ============================================================================
// Fake Catalog IDs
// ============================================================================

/// Search name resolving to Jacob Tews (performer, instrumental, no genre)
pub const TEWS_QUERY: &str = "jacob tews";
pub const TEWS_ID: &str = "ar-tews";

/// Search name resolving to Chris Thile (vocal, has a genre)
pub const THILE_QUERY: &str = "chris thile";
pub const THILE_ID: &str = "ar-thile";

/// Search name with no results
pub const UNKNOWN_QUERY: &str = "nobody at all";

/// Regular album by Jacob Tews
pub const TEWS_ALBUM_ID: &str = "al-tews-1";

/// Album by Jacob Tews above the outlier threshold
pub const TEWS_BOX_SET_ID: &str = "al-tews-box";

/// Regular album by Chris Thile
pub const THILE_ALBUM_ID: &str = "al-thile-1";

/// Tews track with null instrumentalness
pub const TEWS_TRACK_1_ID: &str = "tr-tews-1";

/// Tews track with a measured instrumentalness
pub const TEWS_TRACK_2_ID: &str = "tr-tews-2";

/// Only track listed on the box set
pub const BOX_SET_TRACK_ID: &str = "tr-box-1";

/// Thile track with null instrumentalness
pub const THILE_TRACK_1_ID: &str = "tr-thile-1";

/// Thile track without audio features
pub const THILE_TRACK_2_ID: &str = "tr-thile-2";

/// Measured instrumentalness of TEWS_TRACK_2_ID
pub const TEWS_TRACK_2_INSTRUMENTALNESS: f64 = 0.88;

// ============================================================================
// Timeouts
// ============================================================================

/// Maximum time to wait for the fake API to accept connections
pub const SERVER_READY_TIMEOUT_MS: u64 = 5000;

/// Interval between readiness checks
pub const SERVER_READY_POLL_INTERVAL_MS: u64 = 10;
