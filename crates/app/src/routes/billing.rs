//! Billing route handlers.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Json,
    extract::{Query, State},
    response::{IntoResponse, Redirect, Response},
};
use serde::{Deserialize, Serialize};
use tracing::instrument;
use vton_core::{Plan, ShopDomain};

use crate::error::AppError;
use crate::middleware::ShopContext;
use crate::services::billing::{self, PlanView};
use crate::state::AppState;

/// Page shown in the popup after the merchant approves or declines a charge.
#[derive(Template, WebTemplate)]
#[template(path = "billing/callback.html")]
pub struct BillingCallbackTemplate {
    pub success: bool,
    pub plan_name: String,
    pub status: String,
}

/// GET /api/billing/plans
pub async fn plans() -> Json<Vec<PlanView>> {
    Json(billing::plan_catalog())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscribeRequest {
    pub plan_index: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscribeResponse {
    pub confirmation_url: String,
}

/// POST /api/billing/subscribe - Create a charge and return its approval URL.
#[instrument(skip(state, ctx, request), fields(shop = %ctx.shop))]
pub async fn subscribe(
    State(state): State<AppState>,
    ctx: ShopContext,
    Json(request): Json<SubscribeRequest>,
) -> Result<Json<SubscribeResponse>, AppError> {
    let plan = Plan::from_index(request.plan_index)
        .ok_or_else(|| AppError::BadRequest("Unknown plan".to_string()))?;

    let admin = state.shopify().admin(&ctx.shop, &ctx.session.access_token);
    let confirmation_url = billing::create_subscription(&admin, plan, state.config()).await?;

    Ok(Json(SubscribeResponse { confirmation_url }))
}

#[derive(Debug, Deserialize)]
pub struct CallbackParams {
    pub shop: Option<String>,
    pub charge_id: Option<String>,
}

/// GET /app/billing/callback - Return URL of the charge approval page.
#[instrument(skip(state, params))]
pub async fn callback(
    State(state): State<AppState>,
    Query(params): Query<CallbackParams>,
) -> Result<Response, AppError> {
    let (Some(shop), Some(charge_id)) = (
        params.shop.filter(|s| !s.is_empty()),
        params.charge_id.filter(|c| !c.is_empty()),
    ) else {
        return Err(AppError::BadRequest("Missing charge_id or shop".to_string()));
    };

    let shop = ShopDomain::parse_with_custom(&shop, state.config().shopify.custom_shop_domain.as_deref())
        .map_err(|_| AppError::BadRequest("Invalid shop domain".to_string()))?;

    match billing::handle_billing_callback(&state, &shop, &charge_id).await {
        Ok(outcome) => Ok(BillingCallbackTemplate {
            success: outcome.status.is_active(),
            plan_name: outcome.plan.name().to_string(),
            status: outcome.status.to_string(),
        }
        .into_response()),
        Err(AppError::Unauthorized(_)) => {
            tracing::info!(shop = %shop, "No session for billing callback, reinstalling");
            Ok(Redirect::to(&reinstall_url(&shop, &charge_id)).into_response())
        }
        Err(e) => Err(e),
    }
}

fn reinstall_url(shop: &ShopDomain, charge_id: &str) -> String {
    format!(
        "/auth?shop={}&charge_id={}",
        urlencoding::encode(shop.as_str()),
        urlencoding::encode(charge_id)
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_callback_template_success() {
        let html = BillingCallbackTemplate {
            success: true,
            plan_name: "Runway".to_string(),
            status: "ACTIVE".to_string(),
        }
        .render()
        .unwrap();

        assert!(html.contains("Your Runway plan is active"));
        assert!(html.contains("var success = true;"));
        assert!(html.contains("subscription-activated"));
        assert!(html.contains("window.close()"));
    }

    #[test]
    fn test_callback_template_declined() {
        let html = BillingCallbackTemplate {
            success: false,
            plan_name: "Trend".to_string(),
            status: "DECLINED".to_string(),
        }
        .render()
        .unwrap();

        assert!(html.contains("Status: DECLINED"));
        assert!(html.contains("var success = false;"));
    }

    #[test]
    fn test_reinstall_url() {
        let shop = ShopDomain::parse("demo.myshopify.com").unwrap();
        assert_eq!(
            reinstall_url(&shop, "123"),
            "/auth?shop=demo.myshopify.com&charge_id=123"
        );
    }
}
