//! Subscription status for the embedded admin.

use axum::{Json, extract::State};

use crate::error::AppError;
use crate::middleware::ShopContext;
use crate::services::billing::{self, SubscriptionStatusResponse};
use crate::state::AppState;

/// GET /api/subscription-status
pub async fn show(
    State(state): State<AppState>,
    ctx: ShopContext,
) -> Result<Json<SubscriptionStatusResponse>, AppError> {
    Ok(Json(billing::subscription_status(&state, &ctx).await?))
}
