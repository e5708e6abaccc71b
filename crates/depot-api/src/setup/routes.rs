//! Route configuration and setup

use crate::handlers;
use crate::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use depot_core::Config;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

/// Setup all application routes
pub fn setup_routes(config: &Config, state: Arc<AppState>) -> Router {
    tracing::info!(
        request_timeout_secs = config.request_timeout().as_secs(),
        "Routes configured"
    );
    router(state, config.request_timeout())
}

/// Router without configuration lookup; `request_timeout` bounds the time to a response head.
pub fn router(state: Arc<AppState>, request_timeout: Duration) -> Router {
    let file_routes = Router::new()
        .route("/file/{category}", post(handlers::files::upload_file))
        .route(
            "/file/{category}/{filename}",
            get(handlers::files::download_file).delete(handlers::files::delete_file),
        )
        .route(
            "/file/{category}/{filename}/exist",
            get(handlers::files::file_exists),
        )
        .route(
            "/file/{category}/{filename}/commit",
            post(handlers::files::commit_file),
        )
        .route(
            "/file/{category}/{filename}/rollback",
            post(handlers::files::rollback_file),
        );

    Router::new()
        .route("/health", get(handlers::health::health_check))
        .merge(file_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(TimeoutLayer::new(request_timeout)),
        )
        .with_state(state)
}
