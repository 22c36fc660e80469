use anyhow::{Context, Result};
use catalog_etl::config::{AppConfig, CliConfig, FileConfig};
use catalog_etl::pipeline::{
    read_cleaned_tables, read_raw_tables, run_ingest, run_load, run_transform, seeded_rng,
    IngestOptions,
};
use catalog_etl::sink::SqliteSink;
use catalog_etl::transform::rules::CleaningRules;
use catalog_etl::{
    run_etl, CatalogSource, Extractor, RetryPolicy, RetryingSource, RunReport, SnapshotStore,
    SpotifyClient,
};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, level_filters::LevelFilter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn parse_path(s: &str) -> Result<PathBuf, String> {
    let original_path = PathBuf::from(s);
    if original_path.is_absolute() {
        return Ok(original_path);
    }
    let cwd = std::env::current_dir().map_err(|e| format!("Failed to get current dir: {}", e))?;
    Ok(cwd.join(original_path))
}

#[derive(Parser, Debug)]
struct CliArgs {
    /// Path to TOML configuration file. Values in the file override CLI arguments.
    #[clap(long, global = true, value_parser = parse_path)]
    pub config: Option<PathBuf>,

    /// Directory holding the raw_data and cleaned_data snapshots.
    #[clap(long, global = true, value_parser = parse_path)]
    pub data_dir: Option<PathBuf>,

    /// Path to the SQLite sink database.
    /// Defaults to <data-dir>/database/music_data.sqlite.
    #[clap(long, global = true, value_parser = parse_path)]
    pub db_path: Option<PathBuf>,

    /// Base URL of the catalog API.
    #[clap(long, global = true)]
    pub api_base_url: Option<String>,

    /// Number of upstream requests in flight per ingest stage.
    #[clap(long, global = true, default_value_t = 8)]
    pub concurrency: usize,

    /// Reuse raw snapshots of ingest stages that already completed.
    #[clap(long, global = true)]
    pub resume: bool,

    /// Seed for instrumentalness imputation.
    #[clap(long, global = true)]
    pub seed: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Ingest, transform and load in one run.
    Run {
        /// Artist names to ingest. Defaults to the built-in roster.
        artists: Vec<String>,
    },

    /// Ingest only, writing the raw snapshots.
    Ingest {
        /// Artist names to ingest. Defaults to the built-in roster.
        artists: Vec<String>,
    },

    /// Clean the raw snapshots into the cleaned snapshots.
    Transform,

    /// Load the cleaned snapshots into the sink database.
    Load,

    /// Print row counts and averages of the loaded sink.
    Summary,
}

impl From<&CliArgs> for CliConfig {
    fn from(args: &CliArgs) -> Self {
        let artists = match &args.command {
            Command::Run { artists } | Command::Ingest { artists } => artists.clone(),
            _ => Vec::new(),
        };
        CliConfig {
            data_dir: args.data_dir.clone(),
            db_path: args.db_path.clone(),
            api_base_url: args.api_base_url.clone(),
            concurrency: args.concurrency,
            resume: args.resume,
            seed: args.seed,
            artists,
        }
    }
}

fn build_extractor(app_config: &AppConfig) -> Result<Extractor> {
    let timeout = Duration::from_secs(app_config.source.request_timeout_secs);
    let client = SpotifyClient::from_env(
        &app_config.source.api_base_url,
        app_config.source.market.clone(),
        timeout,
    )?;
    let source = RetryingSource::new(client, RetryPolicy::new(&app_config.retry), timeout);
    let source: Arc<dyn CatalogSource> = Arc::new(source);
    Ok(Extractor::new(source, &app_config.source))
}

fn cancel_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let signal_token = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl+C, stopping after the current stage");
            signal_token.cancel();
        }
    });
    token
}

fn print_summary(sink: &SqliteSink) -> Result<()> {
    let summary = sink.summary()?;
    println!("artists:        {}", summary.artists);
    println!("albums:         {}", summary.albums);
    println!("tracks:         {}", summary.tracks);
    println!("track features: {}", summary.track_features);
    if let Some(minutes) = summary.mean_duration_minutes {
        println!("mean duration:  {:.2} min", minutes);
    }
    if let Some(danceability) = summary.mean_danceability {
        println!("danceability:   {:.3}", danceability);
    }
    for artist in &summary.per_artist {
        println!(
            "  {:<32} {:>5} tracks  {:>6} min  {:>6} dance",
            artist.artist_name.as_deref().unwrap_or("?"),
            artist.tracks,
            artist
                .mean_duration_minutes
                .map(|m| format!("{:.2}", m))
                .unwrap_or_else(|| "-".to_string()),
            artist
                .mean_danceability
                .map(|d| format!("{:.3}", d))
                .unwrap_or_else(|| "-".to_string()),
        );
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()
        .context("Failed to initialize logging")?;

    // Load TOML config if provided
    let file_config = match &cli_args.config {
        Some(path) => {
            info!("Loading configuration from {:?}", path);
            Some(FileConfig::load(path)?)
        }
        None => None,
    };

    // Resolve final configuration (TOML overrides CLI)
    let cli_config: CliConfig = (&cli_args).into();
    let app_config = AppConfig::resolve(&cli_config, file_config)?;

    info!("Configuration loaded:");
    info!("  raw snapshots: {:?}", app_config.raw_data_dir());
    info!("  cleaned snapshots: {:?}", app_config.cleaned_data_dir());
    info!("  sink: {:?}", app_config.db_path);
    info!("  api: {}", app_config.source.api_base_url);

    let store = SnapshotStore::new(&app_config.data_dir);
    let options = IngestOptions {
        concurrency: app_config.concurrency,
        resume: app_config.resume,
    };
    let rules = CleaningRules::new(&app_config.cleaning);
    let cancel = cancel_on_ctrl_c();

    match cli_args.command {
        Command::Run { .. } => {
            let extractor = build_extractor(&app_config)?;
            let mut rng = seeded_rng(app_config.cleaning.seed);
            run_etl(
                &extractor,
                &store,
                &app_config.artists,
                &options,
                &rules,
                &mut rng,
                &app_config.db_path,
                &cancel,
            )
            .await?;
            print_summary(&SqliteSink::open(&app_config.db_path)?)?;
        }
        Command::Ingest { .. } => {
            let extractor = build_extractor(&app_config)?;
            let mut report = RunReport::new();
            run_ingest(
                &extractor,
                &store,
                &app_config.artists,
                &options,
                &cancel,
                &mut report,
            )
            .await?;
        }
        Command::Transform => {
            let raw = read_raw_tables(&store).context("Raw snapshots missing, run ingest first")?;
            let mut rng = seeded_rng(app_config.cleaning.seed);
            run_transform(&store, &raw, &rules, &mut rng, &cancel, &mut RunReport::new())?;
        }
        Command::Load => {
            let cleaned = read_cleaned_tables(&store)
                .context("Cleaned snapshots missing, run transform first")?;
            run_load(&cleaned, &app_config.db_path, &cancel, &mut RunReport::new())?;
        }
        Command::Summary => {
            print_summary(&SqliteSink::open(&app_config.db_path)?)?;
        }
    }

    Ok(())
}
