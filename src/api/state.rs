use std::sync::Arc;

use crate::observability::Metrics;
use crate::registry::Registry;

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<Registry>,
    pub metrics: Arc<Metrics>,
    pub updates_enabled: bool,
}

impl AppState {
    pub fn new(registry: Arc<Registry>, metrics: Arc<Metrics>, updates_enabled: bool) -> Self {
        Self {
            registry,
            metrics,
            updates_enabled,
        }
    }
}
