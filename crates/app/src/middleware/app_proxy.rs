//! App Proxy authentication for storefront requests.
//!
//! Shopify forwards `https://{shop}/apps/tryon/*` to `/proxy/tryon/*` and
//! signs the query string with the app's API secret. A signed query is only
//! accepted within [`MAX_PROXY_AGE_SECS`] of its `timestamp`.

use axum::{
    extract::{FromRequestParts, Query},
    http::request::Parts,
};
use secrecy::ExposeSecret;
use serde::Deserialize;
use vton_core::ShopDomain;

use crate::error::AppError;
use crate::shopify::verify::verify_app_proxy;
use crate::state::AppState;

/// How far a proxied request's `timestamp` may be from the current time.
pub const MAX_PROXY_AGE_SECS: i64 = 300;

/// Whether a request signed at `timestamp` is still acceptable at `now`.
/// Both are Unix seconds.
#[must_use]
pub const fn is_fresh(timestamp: i64, now: i64) -> bool {
    now.abs_diff(timestamp) <= MAX_PROXY_AGE_SECS.unsigned_abs()
}

/// A storefront request Shopify proxied to the app.
#[derive(Debug, Clone)]
pub struct AppProxyContext {
    pub shop: ShopDomain,
    /// Set when the visitor is logged in to the storefront.
    pub logged_in_customer_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProxyParams {
    shop: String,
    #[serde(default)]
    logged_in_customer_id: Option<String>,
    #[serde(default)]
    timestamp: Option<i64>,
}

impl FromRequestParts<AppState> for AppProxyContext {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let query = parts.uri.query().unwrap_or_default();

        if !verify_app_proxy(query, state.shopify().api_secret().expose_secret()) {
            tracing::warn!("Invalid App Proxy signature");
            return Err(AppError::Unauthorized("Invalid signature".to_string()));
        }

        let Query(params) = Query::<ProxyParams>::try_from_uri(&parts.uri)
            .map_err(|e| AppError::BadRequest(e.body_text()))?;

        let now = chrono::Utc::now().timestamp();
        if !params.timestamp.is_some_and(|ts| is_fresh(ts, now)) {
            tracing::warn!(timestamp = ?params.timestamp, "Stale App Proxy request");
            return Err(AppError::Unauthorized("Request expired".to_string()));
        }

        let shop = ShopDomain::parse_with_custom(
            &params.shop,
            state.config().shopify.custom_shop_domain.as_deref(),
        )
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

        Ok(Self {
            shop,
            logged_in_customer_id: params.logged_in_customer_id.filter(|id| !id.is_empty()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: i64 = 1_767_225_600;

    #[test]
    fn test_is_fresh_within_window() {
        assert!(is_fresh(NOW, NOW));
        assert!(is_fresh(NOW - MAX_PROXY_AGE_SECS, NOW));
        assert!(is_fresh(NOW + 30, NOW));
    }

    #[test]
    fn test_is_fresh_rejects_old_and_future() {
        assert!(!is_fresh(NOW - MAX_PROXY_AGE_SECS - 1, NOW));
        assert!(!is_fresh(1, NOW));
        assert!(!is_fresh(NOW + MAX_PROXY_AGE_SECS + 1, NOW));
    }
}
