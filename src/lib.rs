pub mod api;
pub mod config;
pub mod services;
pub mod utils;

use std::sync::Arc;

use axum::{
    Router,
    http::{Method, header},
    middleware::from_fn,
    routing::{get, post},
};
use tower_http::cors::{Any, CorsLayer};

use crate::config::AppConfig;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
}

pub fn create_app(state: AppState) -> Router {
    let max_upload_size = state.config.max_upload_size;

    Router::new()
        .route("/health", get(api::handlers::health::health_check))
        .route("/process", post(api::handlers::process::process))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
                .allow_headers(Any)
                .expose_headers([header::CONTENT_DISPOSITION]),
        )
        .layer(axum::extract::DefaultBodyLimit::max(max_upload_size))
        // outermost: preflights never reach the router or the CORS layer
        .layer(from_fn(api::middleware::preflight::preflight_middleware))
        .with_state(state)
}
