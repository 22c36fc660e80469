//! Fixed name lists used to fill in missing genres and to classify artists
//! for instrumentalness imputation.

use crate::config::CleaningSettings;
use std::collections::{HashMap, HashSet};

/// Albums with more tracks than this are treated as anomalous.
pub const DEFAULT_OUTLIER_THRESHOLD: i64 = 60;

pub const PERFORMER_GENRE: &str = "classical performance";
pub const COMPOSER_GENRE: &str = "21st century classical";

pub const DEFAULT_PERFORMERS: &[&str] =
    &["Erik Rohde", "Korey Konkol", "Jacob Tews", "Clare Longendyke"];

pub const DEFAULT_COMPOSERS: &[&str] = &[
    "Christopher Walczak",
    "Michael-Thomas Foumai",
    "Elliott Miles McKinley",
];

/// Artists with a fixed genre of their own.
pub const SPECIAL_CASE_GENRES: &[(&str, &str)] = &[
    ("Deborah Klemme", "christian music"),
    ("7 Days A Cappella", "college a cappella"),
];

pub const DEFAULT_INSTRUMENTAL: &[&str] = &[
    "Hilary Hahn",
    "Jim Brickman",
    "Béla Fleck",
    "Elliott Carter",
    "Michael-Thomas Foumai",
    "Augusta Read Thomas",
    "Elliott Miles McKinley",
    "Jacob Tews",
    "Christopher Walczak",
    "Korey Konkol",
    "Clare Longendyke",
    "Erik Rohde",
];

pub const DEFAULT_VOCAL: &[&str] = &[
    "Ben Folds",
    "Earth, Wind & Fire",
    "Chicago",
    "Chris Thile",
    "Fernando Ortega",
    "Jacob Collier",
    "Deborah Klemme",
    "7 Days A Cappella",
];

/// Closed range instrumentalness is drawn from for instrumental tracks.
pub const INSTRUMENTAL_RANGE: (f64, f64) = (0.70, 0.9959);
/// Closed range instrumentalness is drawn from for vocal tracks.
pub const VOCAL_RANGE: (f64, f64) = (0.0001, 0.30);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Voice {
    Instrumental,
    Vocal,
}

/// Name lookups, matched on trimmed, case-folded artist names.
#[derive(Debug, Clone)]
pub struct CleaningRules {
    pub outlier_threshold: i64,
    genres: HashMap<String, String>,
    instrumental: HashSet<String>,
    vocal: HashSet<String>,
}

fn normalize(name: &str) -> String {
    name.trim().to_lowercase()
}

impl CleaningRules {
    pub fn new(settings: &CleaningSettings) -> Self {
        // First list a name appears on wins: performers, composers, special cases.
        let mut genres = HashMap::new();
        let performers = settings.performers.iter().map(|n| (n.as_str(), PERFORMER_GENRE));
        let composers = settings.composers.iter().map(|n| (n.as_str(), COMPOSER_GENRE));
        let special = SPECIAL_CASE_GENRES.iter().map(|&(n, g)| (n, g));
        for (name, genre) in performers.chain(composers).chain(special) {
            genres
                .entry(normalize(name))
                .or_insert_with(|| genre.to_string());
        }

        Self {
            outlier_threshold: settings.outlier_threshold,
            genres,
            instrumental: settings.instrumental.iter().map(|n| normalize(n)).collect(),
            vocal: settings.vocal.iter().map(|n| normalize(n)).collect(),
        }
    }

    /// Genre to assign to an artist the source reported none for.
    pub fn genre_for(&self, artist_name: &str) -> Option<&str> {
        self.genres.get(&normalize(artist_name)).map(String::as_str)
    }

    /// Instrumental wins when a name is on both lists.
    pub fn voice_for(&self, artist_name: &str) -> Option<Voice> {
        let name = normalize(artist_name);
        if self.instrumental.contains(&name) {
            Some(Voice::Instrumental)
        } else if self.vocal.contains(&name) {
            Some(Voice::Vocal)
        } else {
            None
        }
    }
}

impl Default for CleaningRules {
    fn default() -> Self {
        Self::new(&CleaningSettings::default())
    }
}
