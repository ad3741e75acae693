//! Route configuration.

use crate::auth::require_basic_auth;
use crate::handlers;
use crate::metrics::metrics_handler;
use crate::state::AppState;
use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::middleware;
use axum::routing::{delete, get, post};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

/// Create the application router.
pub fn create_router(state: AppState) -> Router {
    // Every mutation and listing route requires Basic credentials.
    let api_routes = Router::new()
        .route(
            "/api/unstable/{repo}/package",
            post(handlers::upload_package),
        )
        .route(
            "/api/unstable/{repo}/package/{file_name}",
            delete(handlers::remove_package),
        )
        .route(
            "/api/unstable/{repo}/packages",
            get(handlers::list_packages),
        )
        .layer(DefaultBodyLimit::max(state.config.server.max_upload_bytes))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_basic_auth,
        ));

    let mut router = Router::new()
        .merge(api_routes)
        .route("/health", get(handlers::health_check));

    // Committed artifacts are served read-only straight from each root.
    for repo in state.registry.iter() {
        router = router.nest_service(
            &format!("/repo/{}", repo.name()),
            ServeDir::new(repo.root()),
        );
    }

    // Unauthenticated when enabled; see crate::metrics.
    if state.config.server.metrics_enabled {
        router = router.route("/metrics", get(metrics_handler));
    }

    router.layer(TraceLayer::new_for_http()).with_state(state)
}
