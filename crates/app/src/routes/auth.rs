//! Shopify OAuth install flow.
//!
//! `/auth` stores a random `state` in the cookie session and sends the
//! merchant to Shopify's consent screen; `/auth/callback` verifies the HMAC
//! and `state`, exchanges the code and stores the offline session.

use axum::{
    extract::{Query, RawQuery, State},
    response::{IntoResponse, Redirect, Response},
};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::instrument;
use vton_core::ShopDomain;

use crate::db::SessionRepository;
use crate::error::AppError;
use crate::shopify::verify::verify_oauth_query;
use crate::state::AppState;

const OAUTH_STATE_KEY: &str = "shopify_oauth_state";

/// Where to go once the install completes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct PendingRedirect {
    return_to: Option<String>,
    charge_id: Option<String>,
}

/// Stored under [`OAUTH_STATE_KEY`].
#[derive(Debug, Clone, Serialize, Deserialize)]
struct OAuthState {
    state: String,
    shop: String,
    #[serde(default)]
    pending: PendingRedirect,
}

#[derive(Debug, Deserialize)]
pub struct BeginParams {
    pub shop: Option<String>,
    pub return_to: Option<String>,
    pub charge_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub shop: Option<String>,
}

fn parse_shop(state: &AppState, shop: Option<&str>) -> Result<ShopDomain, AppError> {
    let shop = shop.ok_or_else(|| AppError::BadRequest("Missing shop parameter".to_string()))?;
    ShopDomain::parse_with_custom(shop, state.config().shopify.custom_shop_domain.as_deref())
        .map_err(|_| AppError::BadRequest("Invalid shop domain".to_string()))
}

/// Only same-origin paths are accepted as post-install targets.
///
/// Browsers treat `\` as `/` and drop tabs and newlines, so a path holding
/// either is rejected before it is resolved against `app_url`.
fn sanitize_return_to(app_url: &str, return_to: Option<String>) -> Option<String> {
    let path = return_to?;
    if !path.starts_with('/')
        || path.starts_with("//")
        || path.contains('\\')
        || path.chars().any(char::is_control)
    {
        return None;
    }

    let base = url::Url::parse(app_url).ok()?;
    let resolved = base.join(&path).ok()?;
    (resolved.origin() == base.origin()).then_some(path)
}

/// GET /auth - Start the OAuth install flow.
#[instrument(skip(state, session, params))]
pub async fn begin(
    State(state): State<AppState>,
    session: Session,
    Query(params): Query<BeginParams>,
) -> Result<Response, AppError> {
    let shop = parse_shop(&state, params.shop.as_deref())?;

    let oauth_state = OAuthState {
        state: uuid::Uuid::new_v4().to_string(),
        shop: shop.to_string(),
        pending: PendingRedirect {
            return_to: sanitize_return_to(&state.config().app_url, params.return_to),
            charge_id: params.charge_id.filter(|id| !id.is_empty()),
        },
    };

    session
        .insert(OAUTH_STATE_KEY, &oauth_state)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to store OAuth state: {e}")))?;

    let auth_url = state.shopify().authorization_url(
        &shop,
        &state.config().oauth_redirect_uri(),
        &oauth_state.state,
    );

    tracing::info!(shop = %shop, "Redirecting to Shopify OAuth");
    Ok(Redirect::to(&auth_url).into_response())
}

/// GET /auth/callback - Complete the OAuth install flow.
#[instrument(skip(state, session, raw_query, params))]
pub async fn callback(
    State(state): State<AppState>,
    session: Session,
    RawQuery(raw_query): RawQuery,
    Query(params): Query<CallbackParams>,
) -> Result<Response, AppError> {
    let raw_query = raw_query.unwrap_or_default();
    if !verify_oauth_query(&raw_query, state.shopify().api_secret().expose_secret()) {
        tracing::warn!("Invalid HMAC signature in OAuth callback");
        return Err(AppError::Unauthorized("Invalid signature".to_string()));
    }

    let shop = parse_shop(&state, params.shop.as_deref())?;
    let code = params
        .code
        .ok_or_else(|| AppError::BadRequest("Missing authorization code".to_string()))?;

    let stored: Option<OAuthState> = session.get(OAUTH_STATE_KEY).await.ok().flatten();
    let Some(stored) = stored.filter(|s| Some(&s.state) == params.state.as_ref() && s.shop == shop.as_str())
    else {
        tracing::warn!(shop = %shop, "OAuth state mismatch");
        return Err(AppError::Unauthorized("Invalid OAuth state".to_string()));
    };
    if let Err(e) = session.remove::<OAuthState>(OAUTH_STATE_KEY).await {
        tracing::warn!(error = %e, "Failed to clear OAuth state");
    }

    let token = state.shopify().exchange_code(&shop, &code).await?;
    SessionRepository::new(state.pool())
        .store(&shop, token.access_token.expose_secret(), &token.scopes)
        .await?;
    state.invalidate_subscription(&shop).await;

    tracing::info!(shop = %shop, "Shop installed");
    Ok(Redirect::to(&post_install_redirect(&state, &shop, stored.pending)).into_response())
}

fn post_install_redirect(state: &AppState, shop: &ShopDomain, pending: PendingRedirect) -> String {
    if let Some(charge_id) = pending.charge_id {
        return format!(
            "/app/billing/callback?shop={}&charge_id={}",
            urlencoding::encode(shop.as_str()),
            urlencoding::encode(&charge_id)
        );
    }
    pending.return_to.unwrap_or_else(|| {
        format!("{}/apps/{}", shop.admin_url(), state.shopify().api_key())
    })
}
