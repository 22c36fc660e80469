//! Fake catalog content
//!
//! Builds the upstream JSON the fake API serves, shaped like the real
//! responses: artists with genres and images, albums with release dates of
//! mixed precision, tracks and audio feature objects.

use super::constants::*;
use serde_json::{json, Value};
use std::collections::HashMap;

/// Upstream records of the fake API.
#[derive(Debug, Clone, Default)]
pub struct FakeCatalog {
    /// Search name (lowercase) to search results.
    pub search: HashMap<String, Vec<Value>>,
    /// Artist id to albums.
    pub albums: HashMap<String, Vec<Value>>,
    /// Album id to tracks.
    pub tracks: HashMap<String, Vec<Value>>,
    /// Track id to audio features.
    pub features: HashMap<String, Value>,
}

fn artist_json(id: &str, name: &str, genres: &[&str], followers: i64) -> Value {
    json!({
        "id": id,
        "name": name,
        "genres": genres,
        "external_urls": {"spotify": format!("https://open.example.com/artist/{}", id)},
        "images": [{"url": format!("https://img.example.com/{}.jpg", id), "width": 640}],
        "followers": {"href": null, "total": followers},
        "popularity": 40,
        "type": "artist",
        "uri": format!("spotify:artist:{}", id),
    })
}

pub fn album_json(id: &str, name: &str, release_date: &str, total_tracks: i64) -> Value {
    json!({
        "id": id,
        "name": name,
        "external_urls": {"spotify": format!("https://open.example.com/album/{}", id)},
        "images": [{"url": format!("https://img.example.com/{}.jpg", id)}],
        "release_date": release_date,
        "total_tracks": total_tracks,
        "type": "album",
        "uri": format!("spotify:album:{}", id),
    })
}

pub fn track_json(id: &str, name: &str, duration_ms: i64) -> Value {
    json!({
        "id": id,
        "name": name,
        "external_urls": {"spotify": format!("https://open.example.com/track/{}", id)},
        "duration_ms": duration_ms,
        "explicit": false,
        "disc_number": 1,
        "type": "track",
        "uri": format!("spotify:track:{}", id),
    })
}

fn features_json(id: &str, danceability: f64, instrumentalness: Option<f64>) -> Value {
    json!({
        "id": id,
        "danceability": danceability,
        "energy": 0.41,
        "instrumentalness": instrumentalness,
        "liveness": 0.11,
        "loudness": -12.5,
        "speechiness": 0.04,
        "tempo": 96.0,
        "type": "audio_features",
        "valence": 0.32,
        "uri": format!("spotify:track:{}", id),
    })
}

/// Two resolvable artists, one outlier album, and a mix of missing
/// and measured instrumentalness.
pub fn create_test_catalog() -> FakeCatalog {
    let mut catalog = FakeCatalog::default();

    catalog.search.insert(
        TEWS_QUERY.to_string(),
        vec![artist_json(TEWS_ID, "Jacob Tews", &[], 310)],
    );
    catalog.search.insert(
        THILE_QUERY.to_string(),
        vec![
            artist_json(THILE_ID, "Chris Thile", &["progressive bluegrass"], 120_000),
            artist_json("ar-punch", "Punch Brothers", &["bluegrass"], 200_000),
        ],
    );

    catalog.albums.insert(
        TEWS_ID.to_string(),
        vec![
            album_json(TEWS_ALBUM_ID, "Preludes", "2019-05", 2),
            album_json(TEWS_BOX_SET_ID, "Complete Recordings", "2020", 75),
        ],
    );
    catalog.albums.insert(
        THILE_ID.to_string(),
        vec![album_json(THILE_ALBUM_ID, "Laysongs", "2021-03-05", 2)],
    );

    catalog.tracks.insert(
        TEWS_ALBUM_ID.to_string(),
        vec![
            track_json(TEWS_TRACK_1_ID, "Prelude in C", 180_000),
            track_json(TEWS_TRACK_2_ID, "Prelude in G", 240_000),
        ],
    );
    catalog.tracks.insert(
        TEWS_BOX_SET_ID.to_string(),
        vec![track_json(BOX_SET_TRACK_ID, "Etude No. 1", 200_000)],
    );
    catalog.tracks.insert(
        THILE_ALBUM_ID.to_string(),
        vec![
            track_json(THILE_TRACK_1_ID, "Laysongs", 300_000),
            track_json(THILE_TRACK_2_ID, "Salt (in the Wounds) of the Earth", 360_000),
        ],
    );

    catalog.features.insert(
        TEWS_TRACK_1_ID.to_string(),
        features_json(TEWS_TRACK_1_ID, 0.21, None),
    );
    catalog.features.insert(
        TEWS_TRACK_2_ID.to_string(),
        features_json(TEWS_TRACK_2_ID, 0.25, Some(TEWS_TRACK_2_INSTRUMENTALNESS)),
    );
    catalog.features.insert(
        BOX_SET_TRACK_ID.to_string(),
        features_json(BOX_SET_TRACK_ID, 0.3, Some(0.5)),
    );
    catalog.features.insert(
        THILE_TRACK_1_ID.to_string(),
        features_json(THILE_TRACK_1_ID, 0.45, None),
    );

    catalog
}

/// Artist names the pipeline tests ingest.
pub fn test_artist_names() -> Vec<String> {
    vec![
        TEWS_QUERY.to_string(),
        THILE_QUERY.to_string(),
        UNKNOWN_QUERY.to_string(),
    ]
}
