//! aeth-cal library interface
//!
//! Topic decomposition and calibration service. Exposed as a library so the
//! integration tests can build the router around a scripted completion client.

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod services;
pub mod utils;

pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::services::CalibrationPipeline;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<CalibrationPipeline>,
    /// Caller signature secret; 0 disables signature checking
    pub shared_secret: i64,
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(pipeline: Arc<CalibrationPipeline>, shared_secret: i64) -> Self {
        Self {
            pipeline,
            shared_secret,
            startup_time: Utc::now(),
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::health_routes())
        .merge(api::architect_routes())
        .merge(api::probe_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
