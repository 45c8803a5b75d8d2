//! Application entry point for the `hydrosense-monitor` service.
//!
//! Startup sequence:
//! - Loading configuration from environment variables or `.env`
//! - Initializing structured logging/tracing
//! - Opening the settings store (PostgreSQL when `DATABASE_URL` is set)
//! - Connecting to the realtime store and subscribing the dashboard
//! - Binding the Axum HTTP server and serving requests
//!
//! # Environment Variables
//! See [`hydrosense_monitor::config::load_from_env`] for the service
//! settings. Logging is controlled separately:
//! - `HYDRO_LOG_LEVEL` (optional) – log verbosity (default: `debug`)
//! - `HYDRO_SPAN_EVENTS` (optional) – span event mode for tracing
use std::{env, net::SocketAddr, sync::Arc, time::Duration};

use anyhow::{anyhow, Result};
use dotenvy::dotenv;
use is_terminal::IsTerminal;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;

use hydrosense_monitor::analytics::ThresholdSet;
use hydrosense_monitor::config::{self, Config, StoreBackend};
use hydrosense_monitor::settings::{
    KeyValueStore, MemoryKeyValueStore, PgKeyValueStore, SettingsService,
};
use hydrosense_monitor::store::{DevicePaths, FirebaseStore, MemoryStore, RealtimeStore};
use hydrosense_monitor::{schema, App, AppOptions};

// ---

#[tokio::main]
async fn main() -> Result<()> {
    // ---
    dotenv().ok();
    init_tracing();

    let cfg = config::load_from_env()?;
    cfg.log_config();

    let paths = DevicePaths::new(&cfg.device_code)
        .ok_or_else(|| anyhow!("Invalid DEVICE_CODE '{}'", cfg.device_code))?;

    let thresholds = match &cfg.thresholds_file {
        Some(path) => ThresholdSet::from_json_file(path)?,
        None => ThresholdSet::default(),
    };

    let settings = Arc::new(SettingsService::load(settings_store(&cfg).await?).await?);
    let store = realtime_store(&cfg);

    let app = App::start(
        store,
        settings,
        paths,
        AppOptions {
            thresholds,
            max_daily_transfers: cfg.max_daily_transfers,
            history_days: cfg.history_days,
        },
    )
    .await;

    let addr = SocketAddr::from(([0, 0, 0, 0], cfg.bind_port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.router.clone()).await?;

    app.shutdown();
    Ok(())
}

// ---

/// Settings persistence: PostgreSQL when configured, memory otherwise.
async fn settings_store(cfg: &Config) -> Result<Arc<dyn KeyValueStore>> {
    // ---
    let Some(db_url) = &cfg.db_url else {
        tracing::warn!("DATABASE_URL not set, settings will not survive a restart");
        return Ok(Arc::new(MemoryKeyValueStore::default()));
    };

    tracing::info!("Attempting to connect to settings database");

    let pool = PgPoolOptions::new()
        .max_connections(cfg.db_pool_max)
        .connect(db_url)
        .await
        .map_err(|e| anyhow!("Failed to connect to settings database: {}", e))?;

    tracing::info!("Successfully connected to database");

    schema::create_schema(&pool).await?;
    Ok(Arc::new(PgKeyValueStore::new(pool)))
}

fn realtime_store(cfg: &Config) -> Arc<dyn RealtimeStore> {
    // ---
    match cfg.store_backend {
        StoreBackend::Memory => {
            tracing::warn!("Using the in-memory store, no device data will arrive");
            Arc::new(MemoryStore::new())
        }
        StoreBackend::Firebase => {
            let mut store = FirebaseStore::new(&cfg.firebase_db_url)
                .with_retry_delay(Duration::from_secs(cfg.stream_retry_secs.into()));
            if let Some(token) = &cfg.firebase_auth_token {
                store = store.with_token(token.clone());
            } else if let Some(api_key) = &cfg.firebase_api_key {
                store = store.with_anonymous_auth(api_key.clone());
            }
            Arc::new(store)
        }
    }
}

/// Initialize the global tracing subscriber for structured logging.
///
/// This function configures the [`tracing_subscriber`] with:
/// - Log target, file, and line number output enabled
/// - Color output controlled by TTY detection and `FORCE_COLOR` env var:
///   - `FORCE_COLOR=1|true|yes`: force colors on
///   - `FORCE_COLOR=0|false|no`: force colors off
///   - unset or other values: auto-detect TTY
/// - Span event emission mode controlled by the `HYDRO_SPAN_EVENTS` env var:
///   - `"full"`       : emit ENTER, EXIT, and CLOSE events with timing
///   - `"enter_exit"` : emit ENTER and EXIT only
///   - unset or other values: emit CLOSE events only (default)
/// - Log level from `RUST_LOG`, or else the `HYDRO_LOG_LEVEL` env var
///
/// Call once at startup before any logging.
fn init_tracing() {
    // ---
    let span_events = match env::var("HYDRO_SPAN_EVENTS").as_deref() {
        Ok("full") => FmtSpan::FULL,
        Ok("enter_exit") => FmtSpan::ENTER | FmtSpan::EXIT,
        _ => FmtSpan::CLOSE,
    };

    let use_color = match env::var("FORCE_COLOR").as_deref() {
        Ok("1") | Ok("true") | Ok("yes") => true,
        Ok("0") | Ok("false") | Ok("no") => false,
        _ => std::io::stdout().is_terminal(),
    };

    let env_filter = if env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        let level = match env::var("HYDRO_LOG_LEVEL").ok().as_deref() {
            Some("trace") => "trace",
            Some("debug") => "debug",
            Some("info") => "info",
            Some("warn") => "warn",
            Some("error") => "error",
            _ => "debug",
        };
        EnvFilter::new(format!("{level},sqlx::query=warn,hyper=info,reqwest=info"))
    };

    tracing_subscriber::fmt()
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_span_events(span_events)
        .with_env_filter(env_filter)
        .with_ansi(use_color)
        .compact()
        .init();
}
