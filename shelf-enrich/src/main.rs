//! shelf-enrich - Book metadata resolution service
//!
//! Resolves shelf-photo book candidates against Perplexity, Google Books and
//! Open Library, persists them to a SQLite catalog and reports which photos of
//! a location still need scanning.

use anyhow::{Context, Result};
use clap::Parser;
use shelf_common::config::{
    load_toml_config, resolve_api_key, resolve_root_folder, GOOGLE_BOOKS_KEY_ENV,
    PERPLEXITY_KEY_ENV,
};
use shelf_common::events::EventBus;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use shelf_enrich::services::{EnrichmentPipeline, ImageStore};
use shelf_enrich::sources::{
    GenerativeSearchSource, GoogleBooksSource, OpenLibrarySource, ReqwestTransport,
};
use shelf_enrich::utils::RetryPolicy;
use shelf_enrich::AppState;

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(name = "shelf-enrich")]
#[command(about = "Book metadata resolution service")]
#[command(version)]
struct Args {
    /// HTTP port to listen on
    #[arg(short, long, default_value = "5731", env = "SHELF_PORT")]
    port: u16,

    /// Root folder holding the catalog database and image store
    #[arg(short, long, env = "SHELF_ROOT_FOLDER")]
    root_folder: Option<PathBuf>,

    /// TOML configuration file
    #[arg(short, long, env = "SHELF_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let toml_config =
        load_toml_config(args.config.as_deref()).context("Failed to load configuration")?;

    // RUST_LOG wins over the configured level
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("shelf_enrich={0},shelf_common={0},tower_http=info", toml_config.logging.level)
                    .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting shelf-enrich on port {}", args.port);
    info!(
        "Version: {} ({}, {} build, built {})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_PROFILE"),
        env!("BUILD_TIMESTAMP")
    );

    // Root folder: CLI → ENV → TOML → OS default
    let root_folder = resolve_root_folder(args.root_folder.as_deref(), &toml_config);
    std::fs::create_dir_all(&root_folder).with_context(|| {
        format!("Failed to create root folder {}", root_folder.display())
    })?;
    info!("Root folder: {}", root_folder.display());

    let library_folder = toml_config
        .library_folder
        .clone()
        .unwrap_or_else(|| root_folder.join("library"));
    info!("Library folder: {}", library_folder.display());

    let db_path = root_folder.join(shelf_enrich::db::DATABASE_FILE);
    let db_pool = shelf_enrich::db::init_database_pool(&db_path)
        .await
        .context("Failed to open catalog database")?;
    info!("Database: {}", db_path.display());

    let image_store = ImageStore::new(&root_folder);
    image_store
        .ensure_dir()
        .await
        .context("Failed to create image store")?;

    let pipeline = Arc::new(build_pipeline(&toml_config)?);

    let event_bus = EventBus::new(100);
    let state = AppState::new(db_pool, event_bus, pipeline, image_store, library_folder);

    let app = shelf_enrich::build_router(state).layer(TraceLayer::new_for_http());

    let addr = SocketAddr::from(([127, 0, 0, 1], args.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;
    info!("Listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Wire the three source adapters from configuration
fn build_pipeline(config: &shelf_common::config::TomlConfig) -> Result<EnrichmentPipeline> {
    let sources = &config.sources;

    let transport = Arc::new(
        ReqwestTransport::new(Duration::from_secs(sources.request_timeout_secs))
            .context("Failed to build HTTP client")?,
    );

    let perplexity_key = resolve_api_key(
        "Perplexity",
        PERPLEXITY_KEY_ENV,
        config.perplexity_api_key.as_deref(),
    );
    if perplexity_key.is_none() {
        warn!(
            "No Perplexity API key configured (set {}); generative search disabled",
            PERPLEXITY_KEY_ENV
        );
    }

    let google_key = resolve_api_key(
        "Google Books",
        GOOGLE_BOOKS_KEY_ENV,
        config.google_books_api_key.as_deref(),
    );
    if google_key.is_none() {
        info!("No Google Books API key configured; using anonymous quota");
    }

    let catalog_retry =
        RetryPolicy::from_millis(sources.catalog_max_attempts, sources.catalog_retry_delay_ms);

    let generative = GenerativeSearchSource::new(
        transport.clone(),
        perplexity_key,
        RetryPolicy::from_millis(
            sources.generative_max_attempts,
            sources.generative_retry_delay_ms,
        ),
        sources.generative_min_interval_ms,
    );
    let catalog = GoogleBooksSource::new(
        transport.clone(),
        google_key,
        catalog_retry,
        sources.catalog_min_interval_ms,
    );
    let open_catalog =
        OpenLibrarySource::new(transport, catalog_retry, sources.open_catalog_min_interval_ms);

    Ok(EnrichmentPipeline::new(
        Arc::new(generative),
        Arc::new(catalog),
        Arc::new(open_catalog),
    ))
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
