//! HTTP API server with observability for the room booking saga.
//!
//! Serves the booking endpoints backed by the orchestrator and the ledger
//! and catalog endpoints that a remote orchestrator calls, with structured
//! logging (tracing) and Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;
pub mod state;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use state::{AppState, StartupError, build_state, seed_demo_data};

/// Creates the Axum application router with all routes and shared state.
pub fn create_app(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::render))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route(
            "/bookings",
            post(routes::bookings::create).get(routes::bookings::list),
        )
        .route(
            "/bookings/{id}",
            get(routes::bookings::get).delete(routes::bookings::delete),
        )
        .route("/users/me/bookings", get(routes::bookings::mine))
        .route(
            "/rooms",
            get(routes::rooms::list).post(routes::rooms::add),
        )
        .route("/rooms/recommend", get(routes::rooms::recommend))
        .route("/rooms/{id}", get(routes::rooms::get))
        .route("/rooms/{id}/claims", get(routes::rooms::claims))
        .route(
            "/rooms/{id}/confirm-availability",
            post(routes::rooms::confirm_availability),
        )
        .route("/rooms/{id}/release", post(routes::rooms::release))
        .route(
            "/hotels",
            get(routes::rooms::list_hotels).post(routes::rooms::add_hotel),
        )
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
