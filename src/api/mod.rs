pub mod analytics;
pub mod errors;
pub mod settings;

use crate::refresh::RefreshTask;
use crate::service::AnalyticsService;
use std::sync::Arc;

/// Shared state for every HTTP handler.
pub struct AppState {
    pub service: Arc<AnalyticsService>,
    pub refresh: RefreshTask,
    /// Whether saving settings (re)starts the background refresh loop.
    pub background_refresh: bool,
}

impl AppState {
    pub fn new(service: Arc<AnalyticsService>, background_refresh: bool) -> Self {
        Self {
            service,
            refresh: RefreshTask::new(),
            background_refresh,
        }
    }
}
