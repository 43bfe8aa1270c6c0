//! API server entry point.

use std::sync::Arc;

use api::config::Config;
use document_store::{DocumentStore, InMemoryDocumentStore, PostgresDocumentStore};
use metrics_exporter_prometheus::PrometheusHandle;
use tokio::signal;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use view_engine::ViewDefinition;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

/// Builds the engine over `store`, rebuilds every view once, and serves until shutdown.
async fn serve<S: DocumentStore + 'static>(
    store: S,
    config: &Config,
    views: Vec<ViewDefinition>,
    metrics_handle: PrometheusHandle,
) {
    let engine_config = config.engine_config().expect("invalid engine configuration");
    let state = api::create_state(store, engine_config, views).expect("invalid view definitions");

    // Bring every cache up to date before accepting triggers
    let report = state.engine.rebuild_all().await;
    let failed: Vec<_> = report
        .views
        .iter()
        .filter(|(_, r)| r.is_error())
        .map(|(name, _)| name.as_str())
        .collect();
    if failed.is_empty() {
        tracing::info!(views = report.view_names.len(), "startup rebuild complete");
    } else {
        tracing::warn!(?failed, "startup rebuild finished with failures");
    }

    let app = api::create_app(state, metrics_handle);

    let addr = config.addr();
    tracing::info!(%addr, "starting API server");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind address");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");

    tracing::info!("server shut down gracefully");
}

#[tokio::main]
async fn main() {
    let config = Config::from_env();

    // 1. Initialize tracing
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level)))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // 2. Install Prometheus metrics recorder
    let prometheus_builder = metrics_exporter_prometheus::PrometheusBuilder::new();
    let metrics_handle = prometheus_builder
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    // 3. Load view definitions
    let views = match &config.views_path {
        Some(path) => view_engine::load_definitions(path).expect("failed to load view definitions"),
        None => {
            tracing::info!("VIEWS_PATH not set, using bundled sample views");
            api::sample_views().expect("bundled sample views are invalid")
        }
    };

    // 4. Pick the document store and serve
    match &config.database_url {
        Some(url) => {
            let store = PostgresDocumentStore::connect(url)
                .await
                .expect("failed to connect to PostgreSQL");
            store.run_migrations().await.expect("migrations failed");
            serve(Arc::new(store), &config, views, metrics_handle).await;
        }
        None => {
            tracing::info!("DATABASE_URL not set, using the in-memory document store");
            serve(Arc::new(InMemoryDocumentStore::new()), &config, views, metrics_handle).await;
        }
    }
}
