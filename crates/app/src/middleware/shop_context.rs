//! Session token authentication for embedded admin requests.

use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use vton_core::ShopDomain;

use crate::db::{SessionRepository, StoredSession};
use crate::error::{AppError, set_sentry_shop};
use crate::shopify::SessionTokenVerifier;
use crate::state::AppState;

/// Message returned for every session token failure.
pub const INVALID_TOKEN_MESSAGE: &str = "Missing or invalid authorization token";

/// The authenticated shop behind an embedded admin request.
///
/// Requires `Authorization: Bearer <session token>` and a stored offline
/// session for the token's shop.
///
/// # Example
///
/// ```rust,ignore
/// async fn handler(ctx: ShopContext) -> impl IntoResponse {
///     format!("Hello, {}!", ctx.shop)
/// }
/// ```
#[derive(Debug, Clone)]
pub struct ShopContext {
    pub shop: ShopDomain,
    pub session: StoredSession,
}

impl FromRequestParts<AppState> for ShopContext {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok());

        let shop = SessionTokenVerifier::extract_bearer_token(header)
            .and_then(|token| state.session_tokens().verify(token))
            .map_err(|e| {
                tracing::debug!(error = %e, "Rejected session token");
                AppError::Unauthorized(INVALID_TOKEN_MESSAGE.to_string())
            })?;

        let session = SessionRepository::new(state.pool())
            .find_by_shop(&shop)
            .await?
            .ok_or_else(|| {
                tracing::info!(shop = %shop, "No offline session for shop");
                AppError::Unauthorized("Shop is not installed".to_string())
            })?;

        set_sentry_shop(shop.as_str());
        Ok(Self { shop, session })
    }
}
