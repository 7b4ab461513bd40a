//! HTTP route handlers.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                  - Liveness check
//! GET  /health/ready            - Readiness check (database ping)
//!
//! # Install
//! GET  /auth                    - Redirect to Shopify OAuth
//! GET  /auth/callback           - Handle OAuth callback
//!
//! # Billing
//! GET  /api/billing/plans       - Plan catalog
//! POST /api/billing/subscribe   - Create a charge (session token)
//! GET  /app/billing/callback    - Charge approval return URL (HTML)
//! GET  /api/subscription-status - Subscription status (session token)
//!
//! # Usage
//! POST /api/usage-tracker       - Track a try-on (public, CORS, rate limited)
//! GET  /api/usage-tracker       - Monthly usage stats (session token)
//! GET  /api/usage               - Usage dashboard (session token)
//!
//! # Settings
//! GET  /api/button-settings     - Button settings (session token)
//! POST /api/button-settings     - Save button settings (session token)
//!
//! # Webhooks
//! POST /webhooks                - Shopify webhooks (HMAC)
//!
//! # App Proxy (signed by Shopify)
//! GET  /proxy/tryon/settings    - Button settings for the storefront
//! POST /proxy/tryon/run         - Start a try-on (rate limited)
//! POST /proxy/tryon/status      - Poll a try-on
//! ```

pub mod auth;
pub mod billing;
pub mod button_settings;
pub mod health;
pub mod proxy;
pub mod subscription_status;
pub mod usage;
pub mod webhooks;

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post},
};
use tower_http::trace::{DefaultOnResponse, OnResponse, TraceLayer};
use tracing::Span;

use crate::config::AppConfig;
use crate::middleware::{
    create_session_layer, public_rate_limiter, request_id_middleware, storefront_cors,
};
use crate::state::AppState;

/// Create the install routes router.
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(auth::begin))
        .route("/callback", get(auth::callback))
}

/// Create the JSON API routes router.
///
/// The tracker's POST is layered before its GET is added, so CORS and the
/// rate limit cover the storefront call only.
pub fn api_routes(config: &AppConfig) -> Router<AppState> {
    Router::new()
        .route("/billing/plans", get(billing::plans))
        .route("/billing/subscribe", post(billing::subscribe))
        .route("/subscription-status", get(subscription_status::show))
        .route(
            "/usage-tracker",
            post(usage::track)
                .layer(public_rate_limiter())
                .options(usage::preflight)
                .layer(storefront_cors(&config.storefront_allowed_origins))
                .get(usage::stats),
        )
        .route("/usage", get(usage::dashboard))
        .route(
            "/button-settings",
            get(button_settings::show).post(button_settings::save),
        )
}

/// Create the App Proxy routes router.
pub fn proxy_routes() -> Router<AppState> {
    Router::new()
        .route("/settings", get(proxy::settings))
        .route("/run", post(proxy::run).layer(public_rate_limiter()))
        .route("/status", post(proxy::status))
}

/// Create all routes for the app.
pub fn routes(config: &AppConfig) -> Router<AppState> {
    Router::new()
        // Health checks
        .route("/health", get(health::health))
        .route("/health/ready", get(health::readiness))
        // Install
        .nest("/auth", auth_routes())
        // Embedded admin API
        .nest("/api", api_routes(config))
        .route("/app/billing/callback", get(billing::callback))
        // Shopify webhooks
        .route("/webhooks", post(webhooks::receive))
        // Storefront via App Proxy
        .nest("/proxy/tryon", proxy_routes())
}

/// Build the application router with its middleware stack.
///
/// Sentry layers are added by the binary.
pub fn build_router(state: AppState) -> Router {
    let session_layer = create_session_layer(state.pool(), state.config());

    routes(state.config())
        .layer(session_layer)
        .layer(axum_middleware::from_fn(request_id_middleware))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &axum::http::Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        uri = %request.uri().path(),
                        request_id = tracing::field::Empty,
                        status = tracing::field::Empty,
                        latency_ms = tracing::field::Empty,
                    )
                })
                .on_response(
                    |response: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     span: &Span| {
                        span.record("status", response.status().as_u16());
                        span.record(
                            "latency_ms",
                            u64::try_from(latency.as_millis()).unwrap_or(u64::MAX),
                        );
                        DefaultOnResponse::default().on_response(response, latency, span);
                    },
                ),
        )
        .with_state(state)
}
