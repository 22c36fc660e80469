mod file_config;

pub use file_config::{CleaningConfig, FileConfig, RetryConfig, SourceConfig};

use crate::transform::rules::{
    DEFAULT_COMPOSERS, DEFAULT_INSTRUMENTAL, DEFAULT_OUTLIER_THRESHOLD, DEFAULT_PERFORMERS,
    DEFAULT_VOCAL,
};
use anyhow::{bail, Result};
use std::path::PathBuf;

pub const DEFAULT_API_BASE_URL: &str = "https://api.spotify.com/v1";

/// Artists ingested when none are given.
pub const DEFAULT_ARTISTS: &[&str] = &[
    "hilary hahn",
    "ben folds",
    "jim brickman",
    "earth, wind, and fire",
    "chicago",
    "chris thile",
    "bela fleck",
    "fernando ortega",
    "elliott carter",
    "jacob collier",
    "deborah klemme",
    "michael thomas foumai",
    "augusta read thomas",
    "elliott miles mckinley",
    "jacob tews",
    "christopher walczak",
    "korey konkol",
    "clare longendyke",
    "erik rohde",
    "7 days a cappella",
];

/// CLI arguments that can be used for config resolution.
/// This struct mirrors the CLI arguments that can be overridden by TOML config.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub data_dir: Option<PathBuf>,
    pub db_path: Option<PathBuf>,
    pub api_base_url: Option<String>,
    pub concurrency: usize,
    pub resume: bool,
    pub seed: Option<u64>,
    pub artists: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    pub db_path: PathBuf,
    /// Upstream calls in flight per ingest stage.
    pub concurrency: usize,
    /// Load raw snapshots of completed stages instead of querying again.
    pub resume: bool,
    pub artists: Vec<String>,

    pub source: SourceSettings,
    pub retry: RetrySettings,
    pub cleaning: CleaningSettings,
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        let data_dir = file
            .data_dir
            .map(PathBuf::from)
            .or_else(|| cli.data_dir.clone())
            .unwrap_or_else(|| PathBuf::from("data"));

        if data_dir.exists() && !data_dir.is_dir() {
            bail!("data_dir is not a directory: {:?}", data_dir);
        }

        let db_path = file
            .db_path
            .map(PathBuf::from)
            .or_else(|| cli.db_path.clone())
            .unwrap_or_else(|| data_dir.join("database").join("music_data.sqlite"));

        let concurrency = file.concurrency.unwrap_or(cli.concurrency);
        if concurrency == 0 {
            bail!("concurrency must be at least 1");
        }

        let resume = file.resume.unwrap_or(cli.resume);

        let artists = match file.artists {
            Some(artists) => artists,
            None if !cli.artists.is_empty() => cli.artists.clone(),
            None => owned(DEFAULT_ARTISTS),
        };

        let source_file = file.source.unwrap_or_default();
        let source = SourceSettings {
            api_base_url: source_file
                .api_base_url
                .or_else(|| cli.api_base_url.clone())
                .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string()),
            page_size: source_file.page_size.unwrap_or(50),
            max_pages: source_file.max_pages.unwrap_or(1),
            market: source_file.market.unwrap_or_else(|| "US".to_string()),
            request_timeout_secs: source_file.request_timeout_secs.unwrap_or(30),
        };
        if source.page_size == 0 || source.page_size > 50 {
            bail!("page_size must be between 1 and 50, got {}", source.page_size);
        }

        let retry_file = file.retry.unwrap_or_default();
        let retry_defaults = RetrySettings::default();
        let retry = RetrySettings {
            max_retries: retry_file.max_retries.unwrap_or(retry_defaults.max_retries),
            initial_backoff_ms: retry_file
                .initial_backoff_ms
                .unwrap_or(retry_defaults.initial_backoff_ms),
            max_backoff_ms: retry_file
                .max_backoff_ms
                .unwrap_or(retry_defaults.max_backoff_ms),
            backoff_multiplier: retry_file
                .backoff_multiplier
                .unwrap_or(retry_defaults.backoff_multiplier),
        };

        let cleaning_file = file.cleaning.unwrap_or_default();
        let cleaning_defaults = CleaningSettings::default();
        let cleaning = CleaningSettings {
            outlier_threshold: cleaning_file
                .outlier_threshold
                .unwrap_or(cleaning_defaults.outlier_threshold),
            seed: cleaning_file.seed.or(cli.seed),
            performers: cleaning_file
                .performers
                .unwrap_or(cleaning_defaults.performers),
            composers: cleaning_file
                .composers
                .unwrap_or(cleaning_defaults.composers),
            instrumental: cleaning_file
                .instrumental
                .unwrap_or(cleaning_defaults.instrumental),
            vocal: cleaning_file.vocal.unwrap_or(cleaning_defaults.vocal),
        };

        Ok(Self {
            data_dir,
            db_path,
            concurrency,
            resume,
            artists,
            source,
            retry,
            cleaning,
        })
    }

    pub fn raw_data_dir(&self) -> PathBuf {
        self.data_dir.join("raw_data")
    }

    pub fn cleaned_data_dir(&self) -> PathBuf {
        self.data_dir.join("cleaned_data")
    }
}

#[derive(Debug, Clone)]
pub struct SourceSettings {
    pub api_base_url: String,
    pub page_size: u32,
    /// 0 means every page is fetched.
    pub max_pages: u32,
    pub market: String,
    pub request_timeout_secs: u64,
}

impl Default for SourceSettings {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            page_size: 50,
            max_pages: 1,
            market: "US".to_string(),
            request_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RetrySettings {
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub backoff_multiplier: f64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: 4,
            initial_backoff_ms: 500,
            max_backoff_ms: 30_000,
            backoff_multiplier: 2.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CleaningSettings {
    pub outlier_threshold: i64,
    /// Seed for imputation draws; a fresh entropy seed is used when unset.
    pub seed: Option<u64>,
    pub performers: Vec<String>,
    pub composers: Vec<String>,
    pub instrumental: Vec<String>,
    pub vocal: Vec<String>,
}

impl Default for CleaningSettings {
    fn default() -> Self {
        Self {
            outlier_threshold: DEFAULT_OUTLIER_THRESHOLD,
            seed: None,
            performers: owned(DEFAULT_PERFORMERS),
            composers: owned(DEFAULT_COMPOSERS),
            instrumental: owned(DEFAULT_INSTRUMENTAL),
            vocal: owned(DEFAULT_VOCAL),
        }
    }
}

fn owned(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}
