//! HTTP surface with observability for the view cache engine.
//!
//! Provides the trigger webhook, document write endpoints, administrative
//! rebuild endpoints, and cache reads, with structured logging (tracing)
//! and Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post, put};
use document_store::DocumentStore;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use view_engine::{EngineConfig, ViewDefinition, ViewEngine};

use routes::AppState;

/// View definitions bundled with the server, used when no definition file is configured.
pub const SAMPLE_VIEWS: &str = include_str!("../../../config/views.json");

/// Parses the bundled sample view definitions.
pub fn sample_views() -> view_engine::Result<Vec<ViewDefinition>> {
    view_engine::parse_definitions(SAMPLE_VIEWS)
}

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: DocumentStore + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check::<S>))
        .route("/admin/rebuild", post(routes::admin::rebuild_all::<S>))
        .route("/admin/views", get(routes::admin::list::<S>))
        .route("/admin/views/{name}/rebuild", post(routes::admin::rebuild_view::<S>))
        .route("/admin/views/{name}/status", get(routes::admin::status::<S>))
        .route("/triggers/{collection}", post(routes::triggers::handle::<S>))
        .route("/documents/{collection}", post(routes::documents::create::<S>))
        .route(
            "/documents/{collection}/{id}",
            put(routes::documents::put::<S>)
                .get(routes::documents::get::<S>)
                .delete(routes::documents::delete::<S>),
        )
        .route("/views/{name}/summary", get(routes::views::summary::<S>))
        .route("/views/{name}/pages/{n}", get(routes::views::page::<S>))
        .route("/views/{name}/items/{id}", get(routes::views::item::<S>))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Builds the engine over `store` and wraps it in shared application state.
pub fn create_state<S: DocumentStore + 'static>(
    store: S,
    config: EngineConfig,
    views: Vec<ViewDefinition>,
) -> view_engine::Result<Arc<AppState<S>>> {
    let engine = ViewEngine::new(store, config, views)?;
    Ok(Arc::new(AppState { engine }))
}
