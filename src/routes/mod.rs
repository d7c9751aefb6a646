//! HTTP routes for keypool
//!
//! This module defines all HTTP endpoints exposed by the service.

pub mod credentials;
pub mod generate;
pub mod health;
pub mod metrics;

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::AppState;

/// Create the main application router
pub fn create_router(state: Arc<AppState>) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new().route("/v1/generate", post(generate::generate));

    let admin_routes = Router::new()
        .route(
            "/v1/credentials",
            get(credentials::list_credentials).post(credentials::create_credential),
        )
        .route(
            "/v1/credentials/:id/disable",
            post(credentials::disable_credential),
        )
        .route(
            "/v1/providers/:provider/summary",
            get(credentials::provider_summary),
        );

    // Public routes (health checks, metrics)
    let public_routes = Router::new()
        .route("/health", get(health::health_check))
        .route("/health/ready", get(health::readiness_check))
        .route("/health/live", get(health::liveness_check))
        .route("/metrics", get(metrics::prometheus_metrics));

    let mut router = Router::new().merge(public_routes).merge(api_routes);
    if state.config.admin_enabled {
        router = router.merge(admin_routes);
    }

    // Global middleware (applied to all routes)
    let middleware = ServiceBuilder::new()
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(state.config.request_timeout()))
        .layer(cors);

    router.layer(middleware).with_state(state)
}
