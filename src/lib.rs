pub mod clients;
pub mod config;
pub mod models;
pub mod services;
pub mod storage;

use anyhow::Context;
use clap::{Parser, Subcommand};
use clients::anilist::AniListHttpClient;
use clients::plex::PlexHttpClient;
use services::{MappingEngine, SyncOrchestrator, WatchStatusClassifier};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

pub use config::Config;

#[derive(Parser)]
#[command(name = "plex-anilist-sync", version, about = "Reconciles a Plex TV library with AniList")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run one sync pass over the given (or, if none given, every
    /// `show`-type) Plex library.
    Sync {
        #[arg(long = "library")]
        libraries: Vec<String>,
    },
    /// Write a default config.toml if one doesn't already exist.
    Init,
}

pub async fn run() -> anyhow::Result<()> {
    let config = Config::load()?;
    run_with_config(config).await
}

pub async fn run_with_config(config: Config) -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Init) => {
            Config::create_default_if_missing()?;
            println!("Config file created. Edit config.toml and run again.");
            Ok(())
        }
        Some(Commands::Sync { libraries }) => run_sync(config, libraries).await,
        None => run_sync(config, Vec::new()).await,
    }
}

async fn run_sync(config: Config, requested_libraries: Vec<String>) -> anyhow::Result<()> {
    config.validate()?;

    let _prometheus_handle = init_prometheus(&config)?;
    init_logging(&config)?;

    info!("plex-anilist-sync v{} starting", env!("CARGO_PKG_VERSION"));

    let plex = Arc::new(PlexHttpClient::new(&config.plex.base_url, &config.plex.token));
    let anilist =
        Arc::new(AniListHttpClient::new(&config.anilist.token, config.anilist.requests_per_minute));

    let engine = Arc::new(MappingEngine::new(anilist, config.sync.max_detail_fetches_per_series));
    let watch_status = WatchStatusClassifier::new(
        i64::from(config.sync.days_until_paused),
        i64::from(config.sync.days_until_dropped),
    );
    let orchestrator = SyncOrchestrator::new(plex, engine, watch_status, config.sync.concurrency);

    let library_keys = if requested_libraries.is_empty() {
        orchestrator.discover_show_libraries().await.context("failed to list Plex libraries")?
    } else {
        requested_libraries
    };

    if library_keys.is_empty() {
        info!("no show libraries to sync");
        return Ok(());
    }

    let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs() as i64;
    let results = orchestrator.sync_libraries(&library_keys, now).await;

    let (ok, failed): (Vec<_>, Vec<_>) = results.into_iter().partition(Result::is_ok);
    info!("sync complete: {} series mapped, {} failed", ok.len(), failed.len());
    for failure in failed {
        if let Err(e) = failure {
            error!("{e}");
        }
    }

    Ok(())
}

fn init_prometheus(
    config: &Config,
) -> anyhow::Result<Option<metrics_exporter_prometheus::PrometheusHandle>> {
    if config.observability.metrics_enabled {
        use metrics_exporter_prometheus::PrometheusBuilder;
        let builder = PrometheusBuilder::new();
        let handle = builder.install_recorder().context("Failed to install Prometheus recorder")?;
        info!("Prometheus metrics recorder initialized");
        Ok(Some(handle))
    } else {
        Ok(None)
    }
}

fn init_logging(config: &Config) -> anyhow::Result<()> {
    let mut log_level = config.general.log_level.clone();
    if config.general.suppress_connection_errors {
        log_level.push_str(",reqwest::retry=off,hyper_util=off");
    }

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log_level));

    let registry = tracing_subscriber::registry().with(env_filter);

    let use_json =
        config.observability.loki_enabled || std::env::var("LOG_FORMAT").unwrap_or_default() == "json";

    if use_json {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .json()
            .flatten_event(true)
            .with_current_span(true)
            .with_span_list(false);

        if config.observability.loki_enabled {
            let url = url::Url::parse(&config.observability.loki_url).context("Invalid Loki URL")?;

            let (loki_layer, task) = tracing_loki::builder()
                .label("app", "plex-anilist-sync")?
                .extra_field("env", "production")?
                .extra_field("version", env!("CARGO_PKG_VERSION"))?
                .build_url(url)?;

            tokio::spawn(task);
            registry.with(fmt_layer).with(loki_layer).init();
            info!("Loki logging initialized at {}", config.observability.loki_url);
        } else {
            registry.with(fmt_layer).init();
        }
    } else {
        let fmt_layer = tracing_subscriber::fmt::layer().pretty();
        registry.with(fmt_layer).init();
    }
    Ok(())
}
