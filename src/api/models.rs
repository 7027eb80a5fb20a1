use serde::Serialize;

use crate::registry::FilterEntry;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub updates_enabled: bool,
    pub filters: usize,
    pub pending_commit: usize,
}

#[derive(Debug, Serialize)]
pub struct FilterListResponse {
    pub filters: Vec<FilterEntry>,
}
