use crate::api::errors::ApiError;
use crate::api::AppState;
use crate::settings::Settings;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use std::sync::Arc;

/// Upper bound on credential lengths accepted from the panel.
const MAX_FIELD_LEN: usize = 512;

/// GET /api/settings: Current settings, defaults if none were saved.
pub async fn get_settings(State(state): State<Arc<AppState>>) -> Result<Json<Settings>, ApiError> {
    let settings = state.service.settings_store().load()?;
    Ok(Json(settings))
}

/// PUT /api/settings: Persist settings and restart the refresh loop.
///
/// Empty credentials are accepted so the panel can clear them; analytics
/// requests then fail with 400 until they are filled in again.
pub async fn put_settings(
    State(state): State<Arc<AppState>>,
    Json(settings): Json<Settings>,
) -> Result<StatusCode, ApiError> {
    if settings.token.len() > MAX_FIELD_LEN || settings.account_id.len() > MAX_FIELD_LEN {
        return Err(ApiError::BadRequest(format!(
            "token and account_id must be at most {MAX_FIELD_LEN} characters"
        )));
    }
    let settings = Settings {
        token: settings.token.trim().to_string(),
        account_id: settings.account_id.trim().to_string(),
        ..settings
    };

    state.service.settings_store().save(&settings)?;
    state.service.cache().invalidate();
    tracing::info!(
        period = %settings.period,
        exclude_bots = settings.exclude_bots,
        "Settings saved"
    );

    if state.background_refresh {
        state.refresh.restart(
            Arc::clone(&state.service),
            settings.refresh_interval.duration(),
        );
    }
    Ok(StatusCode::NO_CONTENT)
}
