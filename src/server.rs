use axum::Router;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::info;

use filtersync::api::{self, state::AppState};
use filtersync::commit::CommitManager;
use filtersync::config::Config;
use filtersync::fetcher::{Fetcher, HttpTransport};
use filtersync::observability::Metrics;
use filtersync::proxy::{DetachedController, ProxyController};
use filtersync::registry::Registry;
use filtersync::scheduler::Scheduler;
use filtersync::storage::FilterStore;

type AnyError = Box<dyn std::error::Error + Send + Sync + 'static>;

pub async fn run(config_path: Option<PathBuf>, address: Option<SocketAddr>) -> Result<(), AnyError> {
    info!("Loading configuration");
    let config = match config_path {
        Some(path) => Config::load_from_path(path)?,
        None => Config::load()?,
    };

    let store = FilterStore::new(&config.sync.filter_dir, config.sync.extension.clone());
    store.ensure_dir().await?;
    info!(path = %store.dir().display(), "Using filter directory");

    let transport = HttpTransport::new(&config.http.to_http_config())?;
    let fetcher = Arc::new(Fetcher::new(Arc::new(transport)));
    let registry = Arc::new(Registry::new(fetcher, store, config.sync.period_delta()));
    registry.load(&config.filters).await;

    let metrics = Arc::new(Metrics::new());
    let controller: Arc<dyn ProxyController> = Arc::new(DetachedController::new());
    let commit = CommitManager::new(registry.clone(), controller, metrics.clone());
    let scheduler = Scheduler::new(
        registry.clone(),
        commit,
        metrics.clone(),
        config.sync.enabled,
        config.sync.period(),
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let scheduler_handle = scheduler.spawn(shutdown_rx);

    let app: Router = api::router(AppState::new(registry, metrics, config.sync.enabled));
    let address = address.unwrap_or(config.server.bind_addr);
    let listener = TcpListener::bind(address).await?;
    info!(%address, "filtersync status server listening");

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    let _ = shutdown_tx.send(true);
    scheduler_handle.await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        let mut sigterm = signal(SignalKind::terminate())
            .expect("failed to install signal handler");
        sigterm.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}
