//! Storefront endpoints reached through the Shopify App Proxy.
//!
//! The theme extension calls `/apps/tryon/{settings,run,status}` on the shop's
//! own domain and Shopify forwards them here with a signed query string.

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
};
use serde::{Deserialize, Serialize};
use tracing::instrument;
use vton_core::{ButtonSettings, GarmentCategory};

use crate::db::ButtonSettingsRepository;
use crate::error::AppError;
use crate::middleware::AppProxyContext;
use crate::services::usage;
use crate::state::AppState;
use crate::tryon::{TryOnClient, TryOnRunRequest, TryOnStatus};

/// `user_id` sent to the vendor for visitors who are not logged in.
const ANONYMOUS_USER: &str = "anonymous";

/// Product id recorded when the storefront does not send one.
const UNKNOWN_PRODUCT: &str = "unknown";

fn tryon_client(state: &AppState) -> Result<&TryOnClient, AppError> {
    state
        .tryon()
        .ok_or_else(|| AppError::ServiceUnavailable("Try-on service is not configured".to_string()))
}

/// GET /proxy/tryon/settings
pub async fn settings(
    State(state): State<AppState>,
    ctx: AppProxyContext,
) -> Result<Json<ButtonSettings>, AppError> {
    let settings = ButtonSettingsRepository::new(state.pool())
        .get(&ctx.shop)
        .await?
        .unwrap_or_default();

    Ok(Json(settings))
}

#[derive(Debug, Deserialize)]
pub struct RunRequest {
    pub model_image: String,
    pub garment_image: String,
    #[serde(default)]
    pub category: Option<GarmentCategory>,
    #[serde(default)]
    pub body_part: Option<String>,
    #[serde(default)]
    pub product_id: Option<String>,
}

impl RunRequest {
    fn category(&self) -> GarmentCategory {
        self.category.unwrap_or_else(|| {
            self.body_part
                .as_deref()
                .map_or_else(GarmentCategory::default, GarmentCategory::from_body_part)
        })
    }
}

#[derive(Debug, Serialize)]
pub struct RunResponse {
    pub process_id: String,
    pub credits_remaining: i32,
}

/// POST /proxy/tryon/run - Consume a credit and start a vendor run.
///
/// The credit is given back if the vendor rejects the run.
#[instrument(skip(state, ctx, body), fields(shop = %ctx.shop))]
pub async fn run(
    State(state): State<AppState>,
    ctx: AppProxyContext,
    body: Result<Json<RunRequest>, JsonRejection>,
) -> Result<Json<RunResponse>, AppError> {
    let client = tryon_client(&state)?;
    let Json(request) = body.map_err(|e| AppError::BadRequest(e.body_text()))?;

    let product_id = request.product_id.as_deref().unwrap_or(UNKNOWN_PRODUCT);
    let tracked = usage::track_usage(state.pool(), &ctx.shop, product_id).await?;

    let run = match client
        .run(&TryOnRunRequest::new(
            ctx.logged_in_customer_id.as_deref().unwrap_or(ANONYMOUS_USER),
            &request.model_image,
            &request.garment_image,
            request.category(),
        ))
        .await
    {
        Ok(run) => run,
        Err(e) => {
            tracing::warn!(error = %e, "Try-on run failed, refunding credit");
            if let Err(refund_err) =
                usage::refund_usage(state.pool(), &ctx.shop, tracked.usage_id).await
            {
                tracing::error!(error = %refund_err, "Failed to refund try-on credit");
            }
            return Err(e.into());
        }
    };

    tracing::info!(process_id = %run.process_id, "Started try-on run");
    Ok(Json(RunResponse {
        process_id: run.process_id,
        credits_remaining: tracked.credits_remaining,
    }))
}

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub process_id: String,
}

/// POST /proxy/tryon/status - Poll a vendor run.
pub async fn status(
    State(state): State<AppState>,
    _ctx: AppProxyContext,
    body: Result<Json<StatusRequest>, JsonRejection>,
) -> Result<Json<TryOnStatus>, AppError> {
    let client = tryon_client(&state)?;
    let Json(request) = body.map_err(|e| AppError::BadRequest(e.body_text()))?;

    Ok(Json(client.status(&request.process_id).await?))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn request(body: &str) -> RunRequest {
        serde_json::from_str(body).unwrap()
    }

    #[test]
    fn test_category_explicit_wins() {
        let req = request(
            r#"{"model_image":"m","garment_image":"g","category":"dress","body_part":"lower_body"}"#,
        );
        assert_eq!(req.category(), GarmentCategory::Dress);
    }

    #[test]
    fn test_category_from_body_part() {
        let req = request(r#"{"model_image":"m","garment_image":"g","body_part":"lower_body"}"#);
        assert_eq!(req.category(), GarmentCategory::Pants);
    }

    #[test]
    fn test_category_default() {
        let req = request(r#"{"model_image":"m","garment_image":"g"}"#);
        assert_eq!(req.category(), GarmentCategory::Tshirt);
        assert!(req.product_id.is_none());
    }
}
