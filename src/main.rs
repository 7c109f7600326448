use flarestats::analytics::{Aggregator, SiteDirectory};
use flarestats::api::AppState;
use flarestats::cache::SnapshotCache;
use flarestats::cloudflare::CloudflareClient;
use flarestats::config::Config;
use flarestats::server;
use flarestats::service::AnalyticsService;
use flarestats::settings::SettingsStore;
use std::sync::Arc;

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "flarestats=info,tower_http=info".into()),
        )
        .init();

    // Load configuration
    let config_path = std::env::args().nth(1);
    let config = Config::load(config_path.as_deref().map(std::path::Path::new));

    tracing::info!(
        host = %config.host,
        port = config.port,
        data_dir = %config.data_dir.display(),
        api_base_url = %config.api_base_url,
        max_concurrent_fetches = config.max_concurrent_fetches,
        "Starting FlareStats"
    );
    if config.max_concurrent_fetches == 0 {
        tracing::warn!("max_concurrent_fetches is 0; site fetches are unbounded");
    }

    std::fs::create_dir_all(&config.data_dir).expect("Failed to create data directory");

    let client = Arc::new(
        CloudflareClient::new(&config.api_base_url, config.fetch_timeout())
            .expect("Failed to build HTTP client"),
    );
    let directory: Arc<dyn SiteDirectory> = client.clone();
    let settings = SettingsStore::new(&config.data_dir);
    let service = Arc::new(AnalyticsService::new(
        directory,
        Aggregator::new(client, config.max_concurrent_fetches),
        settings,
        SnapshotCache::new(config.cache_ttl_secs),
    ));

    let state = Arc::new(AppState::new(
        Arc::clone(&service),
        config.background_refresh,
    ));

    if config.background_refresh {
        match service.settings_store().load() {
            Ok(settings) => state
                .refresh
                .restart(Arc::clone(&service), settings.refresh_interval.duration()),
            Err(e) => tracing::warn!(error = %e, "Could not load settings; background refresh not started"),
        }
    }

    let app = server::build_router(state);
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .unwrap_or_else(|e| panic!("Failed to bind to {addr}: {e}"));

    tracing::info!(addr = %addr, "Listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}
