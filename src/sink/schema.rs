//! Sink table definitions.
//!
//! Column order mirrors each record's field layout. Dates are stored as
//! `YYYY-MM-DD` text and booleans as 0/1 integers.

use crate::sqlite_column;
use crate::sqlite_persistence::{Column, SqlType, Table};

pub const ARTIST_TABLE: Table = Table {
    name: "artist",
    columns: &[
        sqlite_column!("artist_id", &SqlType::Text, non_null = true),
        sqlite_column!("artist_name", &SqlType::Text),
        sqlite_column!("genre", &SqlType::Text),
        sqlite_column!("external_url", &SqlType::Text),
        sqlite_column!("image_url", &SqlType::Text),
        sqlite_column!("followers", &SqlType::Integer),
        sqlite_column!("popularity", &SqlType::Integer),
        sqlite_column!("type", &SqlType::Text),
        sqlite_column!("artist_uri", &SqlType::Text),
    ],
    indices: &[("idx_artist_id", "artist_id")],
};

pub const ALBUM_TABLE: Table = Table {
    name: "album",
    columns: &[
        sqlite_column!("album_id", &SqlType::Text, non_null = true),
        sqlite_column!("album_name", &SqlType::Text),
        sqlite_column!("external_url", &SqlType::Text),
        sqlite_column!("image_url", &SqlType::Text),
        sqlite_column!("release_date", &SqlType::Text),
        sqlite_column!("total_tracks", &SqlType::Integer),
        sqlite_column!("type", &SqlType::Text),
        sqlite_column!("album_uri", &SqlType::Text),
        sqlite_column!("artist_id", &SqlType::Text, non_null = true),
    ],
    indices: &[
        ("idx_album_id", "album_id"),
        ("idx_album_artist", "artist_id"),
    ],
};

pub const TRACK_TABLE: Table = Table {
    name: "track",
    columns: &[
        sqlite_column!("track_id", &SqlType::Text, non_null = true),
        sqlite_column!("song_name", &SqlType::Text),
        sqlite_column!("external_url", &SqlType::Text),
        sqlite_column!("duration_ms", &SqlType::Integer),
        sqlite_column!("explicit", &SqlType::Integer),
        sqlite_column!("disc_number", &SqlType::Integer),
        sqlite_column!("type", &SqlType::Text),
        sqlite_column!("song_uri", &SqlType::Text),
        sqlite_column!("album_id", &SqlType::Text, non_null = true),
    ],
    indices: &[
        ("idx_track_id", "track_id"),
        ("idx_track_album", "album_id"),
    ],
};

pub const TRACK_FEATURES_TABLE: Table = Table {
    name: "track_features",
    columns: &[
        sqlite_column!("track_id", &SqlType::Text, non_null = true),
        sqlite_column!("danceability", &SqlType::Real),
        sqlite_column!("energy", &SqlType::Real),
        sqlite_column!("instrumentalness", &SqlType::Real),
        sqlite_column!("liveness", &SqlType::Real),
        sqlite_column!("loudness", &SqlType::Real),
        sqlite_column!("speechiness", &SqlType::Real),
        sqlite_column!("tempo", &SqlType::Real),
        sqlite_column!("type", &SqlType::Text),
        sqlite_column!("valence", &SqlType::Real),
        sqlite_column!("song_uri", &SqlType::Text),
    ],
    indices: &[("idx_track_features_id", "track_id")],
};

pub const SINK_TABLES: &[&Table] = &[
    &ARTIST_TABLE,
    &ALBUM_TABLE,
    &TRACK_TABLE,
    &TRACK_FEATURES_TABLE,
];
