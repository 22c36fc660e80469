use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct FileConfig {
    // Core settings (can override CLI)
    pub data_dir: Option<String>,
    pub db_path: Option<String>,
    pub concurrency: Option<usize>,
    pub resume: Option<bool>,
    pub artists: Option<Vec<String>>,

    // Sections
    pub source: Option<SourceConfig>,
    pub retry: Option<RetryConfig>,
    pub cleaning: Option<CleaningConfig>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct SourceConfig {
    pub api_base_url: Option<String>,
    pub page_size: Option<u32>,
    /// Pages fetched per parent key, 0 for no limit.
    pub max_pages: Option<u32>,
    pub market: Option<String>,
    pub request_timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct RetryConfig {
    pub max_retries: Option<u32>,
    pub initial_backoff_ms: Option<u64>,
    pub max_backoff_ms: Option<u64>,
    pub backoff_multiplier: Option<f64>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct CleaningConfig {
    pub outlier_threshold: Option<i64>,
    pub seed: Option<u64>,
    pub performers: Option<Vec<String>>,
    pub composers: Option<Vec<String>>,
    pub instrumental: Option<Vec<String>>,
    pub vocal: Option<Vec<String>>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }
}
