//! Storefront button settings for the embedded admin.

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
};
use serde::Serialize;
use tracing::instrument;
use vton_core::{ButtonSettings, ButtonSettingsUpdate};

use crate::db::ButtonSettingsRepository;
use crate::error::AppError;
use crate::middleware::ShopContext;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct SaveResponse {
    pub success: bool,
    #[serde(flatten)]
    pub settings: ButtonSettings,
}

/// GET /api/button-settings - Current settings, or defaults if never saved.
pub async fn show(
    State(state): State<AppState>,
    ctx: ShopContext,
) -> Result<Json<ButtonSettings>, AppError> {
    let settings = ButtonSettingsRepository::new(state.pool())
        .get(&ctx.shop)
        .await?
        .unwrap_or_default();

    Ok(Json(settings))
}

/// POST /api/button-settings - Merge a partial update and save it.
#[instrument(skip(state, ctx, body), fields(shop = %ctx.shop))]
pub async fn save(
    State(state): State<AppState>,
    ctx: ShopContext,
    body: Result<Json<ButtonSettingsUpdate>, JsonRejection>,
) -> Result<Json<SaveResponse>, AppError> {
    let Json(update) = body.map_err(|e| AppError::BadRequest(e.body_text()))?;

    let repo = ButtonSettingsRepository::new(state.pool());
    let current = repo.get(&ctx.shop).await?.unwrap_or_default();
    let settings = update.apply_to(current);
    repo.upsert(&ctx.shop, &settings).await?;

    tracing::info!(enabled = settings.is_enabled, position = %settings.button_position, "Saved button settings");
    Ok(Json(SaveResponse {
        success: true,
        settings,
    }))
}
