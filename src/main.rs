mod api;
mod config;
mod error;
mod metrics;
mod model;
mod persist;
mod poller;
mod routes;
mod select;
mod server;
mod store;
mod tuning;

use clap::Parser;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use api::ApiClient;
use config::{CliArgs, DashboardConfig};
use persist::SqliteStorage;
use server::AppContext;
use store::{SharedStore, Store};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();
    let config = DashboardConfig::from_args(args);

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "qa_dashboard=info,tower_http=info".into());
    // The appender guard must outlive the runtime so buffered lines flush.
    let _log_guard = match &config.log_file {
        Some(path) => {
            let dir = path.parent().unwrap_or(Path::new("."));
            let file = path
                .file_name()
                .map(|f| f.to_os_string())
                .unwrap_or_else(|| "qa-dashboard.log".into());
            let (writer, guard) = tracing_appender::non_blocking(
                tracing_appender::rolling::never(dir, file),
            );
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(writer)
                .with_ansi(false)
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::fmt().with_env_filter(filter).init();
            None
        }
    };

    info!("Starting qa-dashboard v{}", env!("CARGO_PKG_VERSION"));
    info!("Backend: {}", config.backend_url);
    info!("Data dir: {:?}", config.data_dir);

    let storage = Arc::new(SqliteStorage::open(&config.persist_db_path())?);
    let initial = persist::hydrate(storage.as_ref());
    let store: SharedStore = Arc::new(Store::new(initial));
    let client = Arc::new(ApiClient::new(config.backend_url.clone()));

    let persist_handle = persist::spawn_persistence(store.clone(), storage);
    let poller_handle =
        poller::spawn_commit_poller(store.clone(), client.clone(), config.poll_interval_secs);

    // Warm the project catalog without delaying startup.
    {
        let store = store.clone();
        let client = client.clone();
        tokio::spawn(async move {
            poller::refresh_projects(&store, &client).await;
        });
    }

    let port = config.port;
    let ctx = Arc::new(AppContext {
        config,
        store: store.clone(),
        client,
    });
    let router = server::build_router(ctx);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;
    info!("Dashboard listening on http://0.0.0.0:{}", port);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Dashboard shutting down");
    store.teardown();
    let _ = persist_handle.await;
    let _ = poller_handle.await;

    Ok(())
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install Ctrl+C handler");
    info!("Received shutdown signal");
}
