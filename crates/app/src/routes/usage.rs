//! Usage metering and reporting.
//!
//! `POST /api/usage-tracker` is called from the storefront button script, so
//! it is public and guarded by CORS and a per-IP rate limit instead of a
//! session token.

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
};
use serde::Deserialize;
use tracing::instrument;
use vton_core::ShopDomain;

use crate::error::AppError;
use crate::middleware::ShopContext;
use crate::services::usage::{self, TrackUsageResponse, UsageDashboard, UsageStats};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackRequest {
    pub product_id: Option<String>,
    pub shop: Option<String>,
}

/// POST /api/usage-tracker - Record one try-on and consume a credit.
#[instrument(skip(state, body))]
pub async fn track(
    State(state): State<AppState>,
    body: Result<Json<TrackRequest>, JsonRejection>,
) -> Result<Json<TrackUsageResponse>, AppError> {
    let Json(request) = body.map_err(|e| AppError::BadRequest(e.body_text()))?;

    let (Some(product_id), Some(shop)) = (
        request.product_id.filter(|p| !p.is_empty()),
        request.shop.filter(|s| !s.is_empty()),
    ) else {
        return Err(AppError::BadRequest("Missing productId or shop".to_string()));
    };

    let shop = ShopDomain::parse_with_custom(&shop, state.config().shopify.custom_shop_domain.as_deref())
        .map_err(|_| AppError::BadRequest("Invalid shop domain".to_string()))?;

    Ok(Json(usage::track_usage(state.pool(), &shop, &product_id).await?))
}

/// OPTIONS /api/usage-tracker
///
/// Preflights are answered by the CORS layer; this answers plain `OPTIONS` requests.
pub async fn preflight() -> StatusCode {
    StatusCode::NO_CONTENT
}

/// GET /api/usage-tracker - Monthly usage of the calling shop.
pub async fn stats(
    State(state): State<AppState>,
    ctx: ShopContext,
) -> Result<Json<UsageStats>, AppError> {
    Ok(Json(usage::usage_stats(&state, &ctx).await?))
}

/// GET /api/usage - Usage dashboard of the calling shop.
pub async fn dashboard(
    State(state): State<AppState>,
    ctx: ShopContext,
) -> Result<Json<UsageDashboard>, AppError> {
    Ok(Json(usage::usage_dashboard(&state, &ctx).await?))
}
