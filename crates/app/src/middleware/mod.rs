//! HTTP middleware stack.
//!
//! # Middleware Order (bottom to top in Router)
//!
//! 1. Sentry layer (capture errors)
//! 2. `TraceLayer` (request tracing)
//! 3. Request ID (add unique ID to each request)
//! 4. Session layer (tower-sessions with `PostgreSQL` store, OAuth state only)
//! 5. Storefront CORS and rate limiting (public endpoints only)
//!
//! Embedded admin endpoints authenticate per handler with [`ShopContext`];
//! App Proxy endpoints with [`AppProxyContext`].

pub mod app_proxy;
pub mod cors;
pub mod rate_limit;
pub mod request_id;
pub mod session;
pub mod shop_context;

pub use app_proxy::AppProxyContext;
pub use cors::storefront_cors;
pub use rate_limit::public_rate_limiter;
pub use request_id::request_id_middleware;
pub use session::create_session_layer;
pub use shop_context::ShopContext;
