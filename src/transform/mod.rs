//! Cleaning and imputation of the raw ingested tables.
//!
//! Stages run strictly in order: artists, albums, tracks, track features.
//! Each stage hands the ids it removed (or classified) to the next one, so a
//! removed album takes its tracks and their features with it.

pub mod rules;

use crate::catalog::{Album, Artist, KeyedTable, Track, TrackFeature};
use rand::Rng;
use rand_distr::{Distribution, Uniform};
use rules::{CleaningRules, Voice, INSTRUMENTAL_RANGE, VOCAL_RANGE};
use std::collections::BTreeSet;
use thiserror::Error;
use tracing::{debug, info};

pub type IdSet = BTreeSet<String>;

#[derive(Debug, Error)]
pub enum TransformError {
    #[error("Invalid imputation range [{low}, {high}]: {reason}")]
    InvalidRange { low: f64, high: f64, reason: String },
}

/// The four tables produced by ingestion.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTables {
    pub artists: KeyedTable<Artist>,
    pub albums: KeyedTable<Album>,
    pub tracks: KeyedTable<Track>,
    pub features: KeyedTable<TrackFeature>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CleanedTables {
    pub artists: KeyedTable<Artist>,
    pub albums: KeyedTable<Album>,
    pub tracks: KeyedTable<Track>,
    pub features: KeyedTable<TrackFeature>,
}

/// Ids split by whether their artist is classified as instrumental or vocal.
/// Ids of unclassified artists are in neither set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VoicePartition {
    pub instrumental: IdSet,
    pub vocal: IdSet,
}

impl VoicePartition {
    fn insert(&mut self, voice: Voice, id: String) {
        match voice {
            Voice::Instrumental => self.instrumental.insert(id),
            Voice::Vocal => self.vocal.insert(id),
        };
    }

    pub fn voice_of(&self, id: &str) -> Option<Voice> {
        if self.instrumental.contains(id) {
            Some(Voice::Instrumental)
        } else if self.vocal.contains(id) {
            Some(Voice::Vocal)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ArtistCleaning {
    pub artists: KeyedTable<Artist>,
    pub artist_voices: VoicePartition,
    pub genres_assigned: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AlbumCleaning {
    pub albums: KeyedTable<Album>,
    /// Outlier albums.
    pub removed: IdSet,
    pub album_voices: VoicePartition,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrackCleaning {
    pub tracks: KeyedTable<Track>,
    pub removed: IdSet,
    pub track_voices: VoicePartition,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FeatureCleaning {
    pub features: KeyedTable<TrackFeature>,
    pub removed: IdSet,
    pub imputed: usize,
}

/// Fill missing genres from the name lists and classify every artist.
pub fn clean_artists(artists: &KeyedTable<Artist>, rules: &CleaningRules) -> ArtistCleaning {
    let mut cleaned = KeyedTable::new();
    let mut artist_voices = VoicePartition::default();
    let mut genres_assigned = 0;

    for (artist_id, artist) in artists {
        let mut artist = artist.clone();
        if let Some(name) = artist.artist_name.as_deref() {
            if artist.genre.is_none() {
                if let Some(genre) = rules.genre_for(name) {
                    artist.genre = Some(genre.to_string());
                    genres_assigned += 1;
                }
            }
            if let Some(voice) = rules.voice_for(name) {
                artist_voices.insert(voice, artist_id.clone());
            }
        }
        cleaned.insert(artist_id.clone(), artist);
    }

    ArtistCleaning {
        artists: cleaned,
        artist_voices,
        genres_assigned,
    }
}

/// Drop albums above the outlier threshold and classify the survivors by
/// their artist.
pub fn clean_albums(
    albums: &KeyedTable<Album>,
    artist_voices: &VoicePartition,
    outlier_threshold: i64,
) -> AlbumCleaning {
    let mut cleaned = KeyedTable::new();
    let mut removed = IdSet::new();
    let mut album_voices = VoicePartition::default();

    for (album_id, album) in albums {
        if album.total_tracks.is_some_and(|n| n > outlier_threshold) {
            debug!(
                "Removing album {} with {:?} tracks",
                album_id, album.total_tracks
            );
            removed.insert(album_id.clone());
            continue;
        }
        if let Some(voice) = artist_voices.voice_of(&album.artist_id) {
            album_voices.insert(voice, album_id.clone());
        }
        cleaned.insert(album_id.clone(), album.clone());
    }

    AlbumCleaning {
        albums: cleaned,
        removed,
        album_voices,
    }
}

/// Drop tracks of removed albums and classify the survivors by their album.
pub fn clean_tracks(
    tracks: &KeyedTable<Track>,
    removed_albums: &IdSet,
    album_voices: &VoicePartition,
) -> TrackCleaning {
    let mut cleaned = KeyedTable::new();
    let mut removed = IdSet::new();
    let mut track_voices = VoicePartition::default();

    for (track_id, track) in tracks {
        if removed_albums.contains(&track.album_id) {
            removed.insert(track_id.clone());
            continue;
        }
        if let Some(voice) = album_voices.voice_of(&track.album_id) {
            track_voices.insert(voice, track_id.clone());
        }
        cleaned.insert(track_id.clone(), track.clone());
    }

    TrackCleaning {
        tracks: cleaned,
        removed,
        track_voices,
    }
}

fn closed_range((low, high): (f64, f64)) -> Result<Uniform<f64>, TransformError> {
    Uniform::new_inclusive(low, high).map_err(|e| TransformError::InvalidRange {
        low,
        high,
        reason: e.to_string(),
    })
}

/// Drop features of removed tracks and impute missing instrumentalness from
/// the track's classification. Unclassified tracks keep a null value.
pub fn clean_track_features<R: Rng + ?Sized>(
    features: &KeyedTable<TrackFeature>,
    removed_tracks: &IdSet,
    track_voices: &VoicePartition,
    rng: &mut R,
) -> Result<FeatureCleaning, TransformError> {
    let instrumental = closed_range(INSTRUMENTAL_RANGE)?;
    let vocal = closed_range(VOCAL_RANGE)?;

    let mut cleaned = KeyedTable::new();
    let mut removed = IdSet::new();
    let mut imputed = 0;

    for (track_id, feature) in features {
        if removed_tracks.contains(track_id) {
            removed.insert(track_id.clone());
            continue;
        }
        let mut feature = feature.clone();
        if feature.instrumentalness.is_none() {
            feature.instrumentalness = match track_voices.voice_of(track_id) {
                Some(Voice::Instrumental) => Some(instrumental.sample(rng)),
                Some(Voice::Vocal) => Some(vocal.sample(rng)),
                None => None,
            };
            if feature.instrumentalness.is_some() {
                imputed += 1;
            }
        }
        cleaned.insert(track_id.clone(), feature);
    }

    Ok(FeatureCleaning {
        features: cleaned,
        removed,
        imputed,
    })
}

/// Result of a full transform, with the id sets threaded between stages.
#[derive(Debug, Clone)]
pub struct TransformOutcome {
    pub tables: CleanedTables,
    pub removed_albums: IdSet,
    pub removed_tracks: IdSet,
    pub removed_features: IdSet,
    pub genres_assigned: usize,
    pub imputed: usize,
}

pub fn transform<R: Rng + ?Sized>(
    raw: &RawTables,
    rules: &CleaningRules,
    rng: &mut R,
) -> Result<TransformOutcome, TransformError> {
    let artists = clean_artists(&raw.artists, rules);
    let albums = clean_albums(&raw.albums, &artists.artist_voices, rules.outlier_threshold);
    let tracks = clean_tracks(&raw.tracks, &albums.removed, &albums.album_voices);
    let features =
        clean_track_features(&raw.features, &tracks.removed, &tracks.track_voices, rng)?;

    info!(
        "Transform: {} genres assigned, {} outlier albums removed, {} tracks and {} feature rows dropped with them, {} instrumentalness values imputed",
        artists.genres_assigned,
        albums.removed.len(),
        tracks.removed.len(),
        features.removed.len(),
        features.imputed
    );

    Ok(TransformOutcome {
        tables: CleanedTables {
            artists: artists.artists,
            albums: albums.albums,
            tracks: tracks.tracks,
            features: features.features,
        },
        removed_albums: albums.removed,
        removed_tracks: tracks.removed,
        removed_features: features.removed,
        genres_assigned: artists.genres_assigned,
        imputed: features.imputed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn artist(id: &str, name: &str, genre: Option<&str>) -> Artist {
        Artist {
            artist_id: id.to_string(),
            artist_name: Some(name.to_string()),
            genre: genre.map(str::to_string),
            external_url: None,
            image_url: None,
            followers: None,
            popularity: None,
            record_type: Some("artist".to_string()),
            artist_uri: None,
        }
    }

    fn album(id: &str, artist_id: &str, total_tracks: Option<i64>) -> Album {
        Album {
            album_id: id.to_string(),
            album_name: None,
            external_url: None,
            image_url: None,
            release_date: None,
            total_tracks,
            album_type: Some("album".to_string()),
            album_uri: None,
            artist_id: artist_id.to_string(),
        }
    }

    fn track(id: &str, album_id: &str) -> Track {
        Track {
            track_id: id.to_string(),
            song_name: None,
            external_url: None,
            duration_ms: Some(200_000),
            explicit: Some(false),
            disc_number: Some(1),
            track_type: Some("track".to_string()),
            song_uri: None,
            album_id: album_id.to_string(),
        }
    }

    fn feature(id: &str, instrumentalness: Option<f64>) -> TrackFeature {
        TrackFeature {
            track_id: id.to_string(),
            danceability: Some(0.4),
            energy: None,
            instrumentalness,
            liveness: None,
            loudness: None,
            speechiness: None,
            tempo: None,
            feature_type: Some("audio_features".to_string()),
            valence: None,
            song_uri: None,
        }
    }

    fn keyed<T: crate::catalog::Record>(records: Vec<T>) -> KeyedTable<T> {
        records
            .into_iter()
            .map(|r| (r.key().to_string(), r))
            .collect()
    }

    fn ids(values: &[&str]) -> IdSet {
        values.iter().map(|s| s.to_string()).collect()
    }

    /// Hilary Hahn (instrumental) with a normal and an outlier album, Ben
    /// Folds (vocal) with one album, and an unclassified artist.
    fn raw_fixture() -> RawTables {
        RawTables {
            artists: keyed(vec![
                artist("ar_hahn", "Hilary Hahn", Some("classical")),
                artist("ar_folds", "Ben Folds", Some("piano rock")),
                artist("ar_tews", "Jacob Tews", None),
                artist("ar_other", "Somebody Else", None),
            ]),
            albums: keyed(vec![
                album("al_hahn", "ar_hahn", Some(12)),
                album("al_box", "ar_hahn", Some(75)),
                album("al_folds", "ar_folds", Some(10)),
                album("al_other", "ar_other", None),
            ]),
            tracks: keyed(vec![
                track("t_hahn", "al_hahn"),
                track("t_box_1", "al_box"),
                track("t_box_2", "al_box"),
                track("t_folds", "al_folds"),
                track("t_other", "al_other"),
            ]),
            features: keyed(vec![
                feature("t_hahn", None),
                feature("t_box_1", None),
                feature("t_folds", None),
                feature("t_other", None),
            ]),
        }
    }

    #[test]
    fn test_performer_gets_genre() {
        let raw = raw_fixture();
        let cleaned = clean_artists(&raw.artists, &CleaningRules::default());

        assert_eq!(
            cleaned.artists["ar_tews"].genre.as_deref(),
            Some("classical performance")
        );
        assert_eq!(cleaned.artists["ar_other"].genre, None);
        // existing genres are kept
        assert_eq!(
            cleaned.artists["ar_hahn"].genre.as_deref(),
            Some("classical")
        );
        assert_eq!(cleaned.genres_assigned, 1);
    }

    #[test]
    fn test_artist_partition_is_disjoint() {
        let raw = raw_fixture();
        let cleaned = clean_artists(&raw.artists, &CleaningRules::default());
        let voices = cleaned.artist_voices;

        assert_eq!(voices.instrumental, ids(&["ar_hahn", "ar_tews"]));
        assert_eq!(voices.vocal, ids(&["ar_folds"]));
        assert!(voices.instrumental.is_disjoint(&voices.vocal));
    }

    #[test]
    fn test_outlier_album_removed() {
        let raw = raw_fixture();
        let artists = clean_artists(&raw.artists, &CleaningRules::default());
        let albums = clean_albums(&raw.albums, &artists.artist_voices, 60);

        assert_eq!(albums.removed, ids(&["al_box"]));
        assert!(!albums.albums.contains_key("al_box"));
        // null total_tracks is not an outlier
        assert!(albums.albums.contains_key("al_other"));
        assert_eq!(albums.album_voices.instrumental, ids(&["al_hahn"]));
        assert_eq!(albums.album_voices.vocal, ids(&["al_folds"]));
    }

    #[test]
    fn test_threshold_is_exclusive() {
        let albums = keyed(vec![album("a60", "x", Some(60)), album("a61", "x", Some(61))]);
        let cleaned = clean_albums(&albums, &VoicePartition::default(), 60);
        assert_eq!(cleaned.removed, ids(&["a61"]));
    }

    #[test]
    fn test_album_cleaning_is_idempotent() {
        let raw = raw_fixture();
        let artists = clean_artists(&raw.artists, &CleaningRules::default());
        let once = clean_albums(&raw.albums, &artists.artist_voices, 60);
        let twice = clean_albums(&once.albums, &artists.artist_voices, 60);

        assert!(twice.removed.is_empty());
        assert_eq!(twice.albums, once.albums);
        assert_eq!(twice.album_voices, once.album_voices);
    }

    #[test]
    fn test_deletion_propagates_to_tracks() {
        let raw = raw_fixture();
        let artists = clean_artists(&raw.artists, &CleaningRules::default());
        let albums = clean_albums(&raw.albums, &artists.artist_voices, 60);
        let tracks = clean_tracks(&raw.tracks, &albums.removed, &albums.album_voices);

        assert_eq!(tracks.removed, ids(&["t_box_1", "t_box_2"]));
        for track in tracks.tracks.values() {
            assert!(!albums.removed.contains(&track.album_id));
        }
        assert_eq!(tracks.track_voices.instrumental, ids(&["t_hahn"]));
        assert_eq!(tracks.track_voices.vocal, ids(&["t_folds"]));
    }

    #[test]
    fn test_imputation_ranges() {
        let raw = raw_fixture();
        let mut rng = StdRng::seed_from_u64(7);
        let outcome = transform(&raw, &CleaningRules::default(), &mut rng).unwrap();
        let features = &outcome.tables.features;

        let hahn = features["t_hahn"].instrumentalness.unwrap();
        assert!((0.70..=0.9959).contains(&hahn));

        let folds = features["t_folds"].instrumentalness.unwrap();
        assert!((0.0001..=0.30).contains(&folds));

        assert_eq!(features["t_other"].instrumentalness, None);
        assert!(!features.contains_key("t_box_1"));
        assert_eq!(outcome.removed_features, ids(&["t_box_1"]));
        assert_eq!(outcome.imputed, 2);
    }

    #[test]
    fn test_imputation_ranges_hold_across_seeds() {
        let features = keyed((0..200).map(|i| feature(&format!("t{i}"), None)).collect());
        let voices = VoicePartition {
            instrumental: (0..100).map(|i| format!("t{i}")).collect(),
            vocal: (100..200).map(|i| format!("t{i}")).collect(),
        };

        for seed in 0..5 {
            let mut rng = StdRng::seed_from_u64(seed);
            let cleaned =
                clean_track_features(&features, &IdSet::new(), &voices, &mut rng).unwrap();
            for (id, f) in &cleaned.features {
                let value = f.instrumentalness.unwrap();
                if voices.instrumental.contains(id) {
                    assert!((0.70..=0.9959).contains(&value), "{id}: {value}");
                } else {
                    assert!((0.0001..=0.30).contains(&value), "{id}: {value}");
                }
            }
        }
    }

    #[test]
    fn test_existing_instrumentalness_is_kept() {
        let features = keyed(vec![feature("t1", Some(0.5))]);
        let voices = VoicePartition {
            instrumental: ids(&["t1"]),
            vocal: IdSet::new(),
        };
        let mut rng = StdRng::seed_from_u64(1);
        let cleaned = clean_track_features(&features, &IdSet::new(), &voices, &mut rng).unwrap();

        assert_eq!(cleaned.features["t1"].instrumentalness, Some(0.5));
        assert_eq!(cleaned.imputed, 0);
    }

    #[test]
    fn test_seeded_transform_is_reproducible() {
        let raw = raw_fixture();
        let rules = CleaningRules::default();
        let first = transform(&raw, &rules, &mut StdRng::seed_from_u64(11)).unwrap();
        let second = transform(&raw, &rules, &mut StdRng::seed_from_u64(11)).unwrap();
        assert_eq!(first.tables, second.tables);
    }

    #[test]
    fn test_empty_tables() {
        let mut rng = StdRng::seed_from_u64(3);
        let outcome = transform(&RawTables::default(), &CleaningRules::default(), &mut rng).unwrap();
        assert_eq!(outcome.tables, CleanedTables::default());
        assert!(outcome.removed_albums.is_empty());
    }
}
