//! Entity extraction.
//!
//! Every extractor is the same routine: call the source for one parent key,
//! validate each returned record against the entity's field table, and key
//! the result by primary key. Zero results are not an error.

use crate::catalog::{
    validate_record, Album, Artist, KeyedTable, Record, Track, TrackFeature, ValidationError,
};
use crate::config::SourceSettings;
use crate::source::{CatalogSource, PageRequest, SourceError, SourcePage, SourceResult};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("Invalid {entity} data for '{parent}': {source}")]
    Validation {
        entity: &'static str,
        parent: String,
        #[source]
        source: ValidationError,
    },

    #[error("Failed to fetch {entity} data for '{parent}': {source}")]
    Source {
        entity: &'static str,
        parent: String,
        #[source]
        source: SourceError,
    },
}

pub type ExtractResult<T> = Result<T, ExtractError>;

/// Outcome of a feature lookup for one track.
#[derive(Debug, Clone, PartialEq)]
pub enum FeatureLookup {
    Found(TrackFeature),
    NoFeatures,
}

#[derive(Debug, Clone, Copy)]
enum ListEndpoint {
    ArtistAlbums,
    AlbumTracks,
}

pub struct Extractor {
    source: Arc<dyn CatalogSource>,
    page_size: u32,
    max_pages: u32,
}

impl Extractor {
    pub fn new(source: Arc<dyn CatalogSource>, settings: &SourceSettings) -> Self {
        Self {
            source,
            page_size: settings.page_size,
            max_pages: settings.max_pages,
        }
    }

    /// Resolve an artist name to the first search result.
    ///
    /// Returns `None` when the search has no results.
    pub async fn resolve_artist(&self, name: &str) -> ExtractResult<Option<Artist>> {
        let results = self
            .source
            .search_artists(name, 1)
            .await
            .map_err(|source| ExtractError::Source {
                entity: Artist::ENTITY,
                parent: name.to_string(),
                source,
            })?;

        let Some(first) = results.first() else {
            warn!("No artist found for '{}'", name);
            return Ok(None);
        };
        let artist = validate_record::<Artist>(first, None).map_err(|source| {
            ExtractError::Validation {
                entity: Artist::ENTITY,
                parent: name.to_string(),
                source,
            }
        })?;
        debug!("Resolved '{}' to artist {}", name, artist.artist_id);
        Ok(Some(artist))
    }

    pub async fn extract_albums(&self, artist_id: &str) -> ExtractResult<KeyedTable<Album>> {
        self.extract_paged(ListEndpoint::ArtistAlbums, artist_id)
            .await
    }

    pub async fn extract_tracks(&self, album_id: &str) -> ExtractResult<KeyedTable<Track>> {
        self.extract_paged(ListEndpoint::AlbumTracks, album_id)
            .await
    }

    pub async fn extract_track_feature(&self, track_id: &str) -> ExtractResult<FeatureLookup> {
        let raw = match self.source.audio_features(track_id).await {
            Ok(raw) => raw,
            Err(SourceError::NotFound) => None,
            Err(source) => {
                return Err(ExtractError::Source {
                    entity: TrackFeature::ENTITY,
                    parent: track_id.to_string(),
                    source,
                })
            }
        };

        match raw {
            None => {
                debug!("No audio features for track {}", track_id);
                Ok(FeatureLookup::NoFeatures)
            }
            Some(raw) => validate_record::<TrackFeature>(&raw, None)
                .map(FeatureLookup::Found)
                .map_err(|source| ExtractError::Validation {
                    entity: TrackFeature::ENTITY,
                    parent: track_id.to_string(),
                    source,
                }),
        }
    }

    async fn fetch_page(
        &self,
        endpoint: ListEndpoint,
        parent: &str,
        page: PageRequest,
    ) -> SourceResult<SourcePage> {
        match endpoint {
            ListEndpoint::ArtistAlbums => self.source.artist_albums(parent, page).await,
            ListEndpoint::AlbumTracks => self.source.album_tracks(parent, page).await,
        }
    }

    async fn extract_paged<T: Record>(
        &self,
        endpoint: ListEndpoint,
        parent: &str,
    ) -> ExtractResult<KeyedTable<T>> {
        let mut records = KeyedTable::new();
        let mut pages_fetched: u32 = 0;

        loop {
            let Some(offset) = pages_fetched.checked_mul(self.page_size) else {
                warn!(
                    "Stopping {} extraction for {}: page offset out of range after {} page(s)",
                    T::ENTITY,
                    parent,
                    pages_fetched
                );
                break;
            };
            let request = PageRequest {
                limit: self.page_size,
                offset,
            };
            let page = match self.fetch_page(endpoint, parent, request).await {
                Ok(page) => page,
                Err(SourceError::NotFound) => SourcePage::default(),
                Err(source) => {
                    return Err(ExtractError::Source {
                        entity: T::ENTITY,
                        parent: parent.to_string(),
                        source,
                    })
                }
            };
            pages_fetched += 1;

            for raw in &page.items {
                let record = validate_record::<T>(raw, Some(parent)).map_err(|source| {
                    ExtractError::Validation {
                        entity: T::ENTITY,
                        parent: parent.to_string(),
                        source,
                    }
                })?;
                records.insert(record.key().to_string(), record);
            }

            let page_limit_reached = self.max_pages != 0 && pages_fetched >= self.max_pages;
            if page.items.is_empty() || !page.has_more || page_limit_reached {
                if page.has_more && page_limit_reached {
                    debug!(
                        "Stopping {} extraction for {} after {} page(s)",
                        T::ENTITY,
                        parent,
                        pages_fetched
                    );
                }
                break;
            }
        }

        if records.is_empty() {
            debug!("No {} records for {}", T::ENTITY, parent);
        }
        Ok(records)
    }
}
