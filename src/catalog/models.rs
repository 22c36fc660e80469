//! Typed catalog records.
//!
//! One struct per entity, each with named optional fields. The column layout
//! of every record is its `FIELDS` table, which is also what drives
//! validation of raw upstream records.

use super::fields::{FieldKind, FieldSource, FieldSpec, FieldValue, PathSegment, Row, RowError};
use crate::field_spec;
use chrono::NaiveDate;
use std::collections::BTreeMap;

/// Records of one entity keyed by primary key.
///
/// A `BTreeMap` keeps iteration, and so the parent keys of the next stage,
/// in primary-key order.
pub type KeyedTable<T> = BTreeMap<String, T>;

/// Common shape of every catalog record.
pub trait Record: Clone + Send + Sync + 'static {
    /// Entity name used in logs and errors.
    const ENTITY: &'static str;

    /// Ordered column layout.
    const FIELDS: &'static [FieldSpec];

    fn key(&self) -> &str;

    /// Values aligned with `FIELDS`.
    fn to_values(&self) -> Vec<FieldValue>;

    fn from_row(row: Row) -> Result<Self, RowError>;
}

const ID: &[PathSegment] = &[PathSegment::Key("id")];
const NAME: &[PathSegment] = &[PathSegment::Key("name")];
const URI: &[PathSegment] = &[PathSegment::Key("uri")];
const TYPE: &[PathSegment] = &[PathSegment::Key("type")];
const EXTERNAL_URL: &[PathSegment] = &[PathSegment::Key("external_urls"), PathSegment::Key("spotify")];
const FIRST_IMAGE_URL: &[PathSegment] = &[
    PathSegment::Key("images"),
    PathSegment::First,
    PathSegment::Key("url"),
];

// =============================================================================
// Artist
// =============================================================================

#[derive(Clone, Debug, PartialEq)]
pub struct Artist {
    pub artist_id: String,
    pub artist_name: Option<String>,
    /// Primary genre; the first one when the source reports several.
    pub genre: Option<String>,
    pub external_url: Option<String>,
    pub image_url: Option<String>,
    pub followers: Option<i64>,
    pub popularity: Option<i64>,
    pub record_type: Option<String>,
    pub artist_uri: Option<String>,
}

impl Record for Artist {
    const ENTITY: &'static str = "artist";

    const FIELDS: &'static [FieldSpec] = &[
        field_spec!("artist_id", FieldKind::Text, FieldSource::Path(ID), required = true),
        field_spec!("artist_name", FieldKind::Text, FieldSource::Path(NAME)),
        field_spec!(
            "genre",
            FieldKind::Text,
            FieldSource::Path(&[PathSegment::Key("genres"), PathSegment::First])
        ),
        field_spec!("external_url", FieldKind::Text, FieldSource::Path(EXTERNAL_URL)),
        field_spec!("image_url", FieldKind::Text, FieldSource::Path(FIRST_IMAGE_URL)),
        field_spec!(
            "followers",
            FieldKind::Integer,
            FieldSource::Path(&[PathSegment::Key("followers"), PathSegment::Key("total")])
        ),
        field_spec!(
            "popularity",
            FieldKind::Integer,
            FieldSource::Path(&[PathSegment::Key("popularity")])
        ),
        field_spec!("type", FieldKind::Text, FieldSource::Constant("artist")),
        field_spec!("artist_uri", FieldKind::Text, FieldSource::Path(URI)),
    ];

    fn key(&self) -> &str {
        &self.artist_id
    }

    fn to_values(&self) -> Vec<FieldValue> {
        vec![
            self.artist_id.clone().into(),
            self.artist_name.clone().into(),
            self.genre.clone().into(),
            self.external_url.clone().into(),
            self.image_url.clone().into(),
            self.followers.into(),
            self.popularity.into(),
            self.record_type.clone().into(),
            self.artist_uri.clone().into(),
        ]
    }

    fn from_row(mut row: Row) -> Result<Self, RowError> {
        Ok(Self {
            artist_id: row.take_key("artist_id")?,
            artist_name: row.take_text("artist_name"),
            genre: row.take_text("genre"),
            external_url: row.take_text("external_url"),
            image_url: row.take_text("image_url"),
            followers: row.take_integer("followers"),
            popularity: row.take_integer("popularity"),
            record_type: row.take_text("type"),
            artist_uri: row.take_text("artist_uri"),
        })
    }
}

// =============================================================================
// Album
// =============================================================================

#[derive(Clone, Debug, PartialEq)]
pub struct Album {
    pub album_id: String,
    pub album_name: Option<String>,
    pub external_url: Option<String>,
    pub image_url: Option<String>,
    pub release_date: Option<NaiveDate>,
    pub total_tracks: Option<i64>,
    pub album_type: Option<String>,
    pub album_uri: Option<String>,
    pub artist_id: String,
}

impl Record for Album {
    const ENTITY: &'static str = "album";

    const FIELDS: &'static [FieldSpec] = &[
        field_spec!("album_id", FieldKind::Text, FieldSource::Path(ID), required = true),
        field_spec!("album_name", FieldKind::Text, FieldSource::Path(NAME)),
        field_spec!("external_url", FieldKind::Text, FieldSource::Path(EXTERNAL_URL)),
        field_spec!("image_url", FieldKind::Text, FieldSource::Path(FIRST_IMAGE_URL)),
        field_spec!(
            "release_date",
            FieldKind::Date,
            FieldSource::Path(&[PathSegment::Key("release_date")])
        ),
        field_spec!(
            "total_tracks",
            FieldKind::Integer,
            FieldSource::Path(&[PathSegment::Key("total_tracks")])
        ),
        field_spec!(
            "type",
            FieldKind::Text,
            FieldSource::Path(&[PathSegment::Key("album_type")])
        ),
        field_spec!("album_uri", FieldKind::Text, FieldSource::Path(URI)),
        field_spec!("artist_id", FieldKind::Text, FieldSource::Parent, required = true),
    ];

    fn key(&self) -> &str {
        &self.album_id
    }

    fn to_values(&self) -> Vec<FieldValue> {
        vec![
            self.album_id.clone().into(),
            self.album_name.clone().into(),
            self.external_url.clone().into(),
            self.image_url.clone().into(),
            self.release_date.into(),
            self.total_tracks.into(),
            self.album_type.clone().into(),
            self.album_uri.clone().into(),
            self.artist_id.clone().into(),
        ]
    }

    fn from_row(mut row: Row) -> Result<Self, RowError> {
        Ok(Self {
            album_id: row.take_key("album_id")?,
            album_name: row.take_text("album_name"),
            external_url: row.take_text("external_url"),
            image_url: row.take_text("image_url"),
            release_date: row.take_date("release_date"),
            total_tracks: row.take_integer("total_tracks"),
            album_type: row.take_text("type"),
            album_uri: row.take_text("album_uri"),
            artist_id: row.take_key("artist_id")?,
        })
    }
}

// =============================================================================
// Track
// =============================================================================

#[derive(Clone, Debug, PartialEq)]
pub struct Track {
    pub track_id: String,
    pub song_name: Option<String>,
    pub external_url: Option<String>,
    pub duration_ms: Option<i64>,
    pub explicit: Option<bool>,
    pub disc_number: Option<i64>,
    pub track_type: Option<String>,
    pub song_uri: Option<String>,
    pub album_id: String,
}

impl Record for Track {
    const ENTITY: &'static str = "track";

    const FIELDS: &'static [FieldSpec] = &[
        field_spec!("track_id", FieldKind::Text, FieldSource::Path(ID), required = true),
        field_spec!("song_name", FieldKind::Text, FieldSource::Path(NAME)),
        field_spec!("external_url", FieldKind::Text, FieldSource::Path(EXTERNAL_URL)),
        field_spec!(
            "duration_ms",
            FieldKind::Integer,
            FieldSource::Path(&[PathSegment::Key("duration_ms")])
        ),
        field_spec!(
            "explicit",
            FieldKind::Boolean,
            FieldSource::Path(&[PathSegment::Key("explicit")])
        ),
        field_spec!(
            "disc_number",
            FieldKind::Integer,
            FieldSource::Path(&[PathSegment::Key("disc_number")])
        ),
        field_spec!("type", FieldKind::Text, FieldSource::Path(TYPE)),
        field_spec!("song_uri", FieldKind::Text, FieldSource::Path(URI)),
        field_spec!("album_id", FieldKind::Text, FieldSource::Parent, required = true),
    ];

    fn key(&self) -> &str {
        &self.track_id
    }

    fn to_values(&self) -> Vec<FieldValue> {
        vec![
            self.track_id.clone().into(),
            self.song_name.clone().into(),
            self.external_url.clone().into(),
            self.duration_ms.into(),
            self.explicit.into(),
            self.disc_number.into(),
            self.track_type.clone().into(),
            self.song_uri.clone().into(),
            self.album_id.clone().into(),
        ]
    }

    fn from_row(mut row: Row) -> Result<Self, RowError> {
        Ok(Self {
            track_id: row.take_key("track_id")?,
            song_name: row.take_text("song_name"),
            external_url: row.take_text("external_url"),
            duration_ms: row.take_integer("duration_ms"),
            explicit: row.take_boolean("explicit"),
            disc_number: row.take_integer("disc_number"),
            track_type: row.take_text("type"),
            song_uri: row.take_text("song_uri"),
            album_id: row.take_key("album_id")?,
        })
    }
}

// =============================================================================
// Track audio features
// =============================================================================

/// Audio descriptors for one track. Zero or one per track.
#[derive(Clone, Debug, PartialEq)]
pub struct TrackFeature {
    pub track_id: String,
    pub danceability: Option<f64>,
    pub energy: Option<f64>,
    pub instrumentalness: Option<f64>,
    pub liveness: Option<f64>,
    pub loudness: Option<f64>,
    pub speechiness: Option<f64>,
    pub tempo: Option<f64>,
    pub feature_type: Option<String>,
    pub valence: Option<f64>,
    pub song_uri: Option<String>,
}

impl Record for TrackFeature {
    const ENTITY: &'static str = "track_feature";

    const FIELDS: &'static [FieldSpec] = &[
        field_spec!("track_id", FieldKind::Text, FieldSource::Path(ID), required = true),
        field_spec!(
            "danceability",
            FieldKind::Float,
            FieldSource::Path(&[PathSegment::Key("danceability")])
        ),
        field_spec!(
            "energy",
            FieldKind::Float,
            FieldSource::Path(&[PathSegment::Key("energy")])
        ),
        field_spec!(
            "instrumentalness",
            FieldKind::Float,
            FieldSource::Path(&[PathSegment::Key("instrumentalness")])
        ),
        field_spec!(
            "liveness",
            FieldKind::Float,
            FieldSource::Path(&[PathSegment::Key("liveness")])
        ),
        field_spec!(
            "loudness",
            FieldKind::Float,
            FieldSource::Path(&[PathSegment::Key("loudness")])
        ),
        field_spec!(
            "speechiness",
            FieldKind::Float,
            FieldSource::Path(&[PathSegment::Key("speechiness")])
        ),
        field_spec!(
            "tempo",
            FieldKind::Float,
            FieldSource::Path(&[PathSegment::Key("tempo")])
        ),
        field_spec!("type", FieldKind::Text, FieldSource::Path(TYPE)),
        field_spec!(
            "valence",
            FieldKind::Float,
            FieldSource::Path(&[PathSegment::Key("valence")])
        ),
        field_spec!("song_uri", FieldKind::Text, FieldSource::Path(URI)),
    ];

    fn key(&self) -> &str {
        &self.track_id
    }

    fn to_values(&self) -> Vec<FieldValue> {
        vec![
            self.track_id.clone().into(),
            self.danceability.into(),
            self.energy.into(),
            self.instrumentalness.into(),
            self.liveness.into(),
            self.loudness.into(),
            self.speechiness.into(),
            self.tempo.into(),
            self.feature_type.clone().into(),
            self.valence.into(),
            self.song_uri.clone().into(),
        ]
    }

    fn from_row(mut row: Row) -> Result<Self, RowError> {
        Ok(Self {
            track_id: row.take_key("track_id")?,
            danceability: row.take_float("danceability"),
            energy: row.take_float("energy"),
            instrumentalness: row.take_float("instrumentalness"),
            liveness: row.take_float("liveness"),
            loudness: row.take_float("loudness"),
            speechiness: row.take_float("speechiness"),
            tempo: row.take_float("tempo"),
            feature_type: row.take_text("type"),
            valence: row.take_float("valence"),
            song_uri: row.take_text("song_uri"),
        })
    }
}
