//! Shopify webhook endpoint.

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
};
use secrecy::ExposeSecret;
use vton_core::ShopDomain;

use crate::services::webhooks::{WebhookTopic, handle_webhook};
use crate::shopify::verify::{WEBHOOK_HMAC_HEADER, verify_webhook};
use crate::state::AppState;

const TOPIC_HEADER: &str = "x-shopify-topic";
const SHOP_HEADER: &str = "x-shopify-shop-domain";

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// POST /webhooks
///
/// Returns 401 for a bad signature and 500 when handling fails so that
/// Shopify retries the delivery.
pub async fn receive(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> StatusCode {
    let signature = header(&headers, WEBHOOK_HMAC_HEADER).unwrap_or_default();
    if !verify_webhook(&body, signature, state.shopify().api_secret().expose_secret()) {
        tracing::warn!("Invalid webhook HMAC");
        return StatusCode::UNAUTHORIZED;
    }

    let (Some(topic), Some(shop)) = (header(&headers, TOPIC_HEADER), header(&headers, SHOP_HEADER))
    else {
        tracing::warn!("Webhook missing topic or shop header");
        return StatusCode::BAD_REQUEST;
    };

    let Ok(shop) = ShopDomain::parse_with_custom(shop, state.config().shopify.custom_shop_domain.as_deref())
    else {
        tracing::warn!(shop, "Webhook for invalid shop domain");
        return StatusCode::BAD_REQUEST;
    };

    let topic = WebhookTopic::parse(topic);
    match handle_webhook(&state, &topic, &shop, &body).await {
        Ok(()) => StatusCode::OK,
        Err(e) => {
            tracing::error!(error = %e, topic = %topic, shop = %shop, "Webhook handling failed");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}
