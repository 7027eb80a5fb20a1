//! Read-only status surface
//!
//! Exposes the registry snapshot and refresh counters. Adding and removing
//! filters stays an in-process operation.

mod error;
pub mod models;
pub mod services;
pub mod state;

pub use error::ApiError;

use axum::{Router, routing::get};

use services::{get_filter, health, list_filters, stats};
use state::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/filters", get(list_filters))
        .route("/filters/{id}", get(get_filter))
        .route("/stats", get(stats))
        .with_state(state)
}
