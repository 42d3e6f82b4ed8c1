//! API routes.

use std::sync::Arc;

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::limit::RequestBodyLimitLayer;

use crate::handlers::{fetch_file, get_status, health, ready, submit_download};
use crate::metrics::metrics_middleware;
use crate::middleware::{
    cors_layer, rate_limit_middleware, request_id, request_logging, security_headers,
    RateLimiterCache,
};
use crate::state::AppState;

/// Create the API router.
pub fn create_router(state: AppState, metrics_handle: Option<PrometheusHandle>) -> Router {
    let rate_limiter = Arc::new(
        RateLimiterCache::new(state.config.rate_limit_rps, state.config.rate_limit_burst)
            .with_proxy_headers(state.config.trust_proxy_headers),
    );

    // Submissions spawn a tool process each, so they are the rate limited route
    let submit_routes = Router::new()
        .route("/download", post(submit_download))
        .layer(middleware::from_fn_with_state(rate_limiter, rate_limit_middleware));

    // Ids and file names are single segments; anything with more segments
    // (e.g. `..` traversal) falls through to 404
    let job_routes = Router::new()
        .route("/status/:download_id", get(get_status))
        .route("/downloads/:download_id/:filename", get(fetch_file));

    let health_routes = Router::new()
        .route("/health", get(health))
        .route("/ready", get(ready));

    let metrics_routes = if let Some(handle) = metrics_handle {
        Router::new().route("/metrics", get(move || async move { handle.render() }))
    } else {
        Router::new()
    };

    Router::new()
        .merge(submit_routes)
        .merge(job_routes)
        .merge(health_routes)
        .merge(metrics_routes)
        .layer(RequestBodyLimitLayer::new(state.config.max_body_size))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(middleware::from_fn(security_headers))
        .layer(middleware::from_fn(request_logging))
        .layer(middleware::from_fn(request_id))
        .layer(cors_layer(&state.config.cors_origins))
        .with_state(state)
}
