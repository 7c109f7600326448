use crate::analytics::{Period, SiteAnalytics};
use crate::api::errors::ApiError;
use crate::api::AppState;
use crate::service::CurrentAnalytics;
use axum::extract::State;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

/// Body of `GET /api/analytics`.
#[derive(Debug, Serialize)]
pub struct AnalyticsResponse {
    pub sites: Vec<SiteAnalytics>,
    pub period: Period,
    pub fetched_at: DateTime<Utc>,
    /// True when the latest refresh failed and older data is shown.
    pub stale: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<CurrentAnalytics> for AnalyticsResponse {
    fn from(current: CurrentAnalytics) -> Self {
        Self {
            sites: current.snapshot.sites.clone(),
            period: current.snapshot.period,
            fetched_at: current.snapshot.fetched_at,
            stale: current.stale_reason.is_some(),
            error: current.stale_reason,
        }
    }
}

/// GET /api/analytics: Per-site analytics, served from cache while fresh.
pub async fn get_analytics(
    State(state): State<Arc<AppState>>,
) -> Result<Json<AnalyticsResponse>, ApiError> {
    let current = state.service.current(false).await?;
    Ok(Json(current.into()))
}

/// POST /api/analytics/refresh: Refetch regardless of cache age.
pub async fn refresh_analytics(
    State(state): State<Arc<AppState>>,
) -> Result<Json<AnalyticsResponse>, ApiError> {
    let current = state.service.current(true).await?;
    Ok(Json(current.into()))
}
