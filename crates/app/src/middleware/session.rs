//! Session middleware configuration.
//!
//! Cookie sessions only carry the OAuth `state` between `/auth` and
//! `/auth/callback`; embedded requests authenticate with session tokens.

use sqlx::PgPool;
use tower_sessions::{Expiry, SessionManagerLayer};
use tower_sessions_sqlx_store::PostgresStore;

use crate::config::AppConfig;

/// Session cookie name.
pub const SESSION_COOKIE_NAME: &str = "vton_oauth";

/// Session expiry time in seconds (10 minutes).
const SESSION_EXPIRY_SECONDS: i64 = 10 * 60;

/// Create the session layer with `PostgreSQL` store.
///
/// The store uses `vton.oauth_session`, created by the embedded migrations.
///
/// # Panics
///
/// Panics if the schema or table name is rejected by the store. Both are
/// compile-time constants made of lowercase letters and underscores.
#[must_use]
pub fn create_session_layer(pool: &PgPool, config: &AppConfig) -> SessionManagerLayer<PostgresStore> {
    let store = PostgresStore::new(pool.clone())
        .with_schema_name("vton")
        .expect("valid schema name")
        .with_table_name("oauth_session")
        .expect("valid table name");

    SessionManagerLayer::new(store)
        .with_name(SESSION_COOKIE_NAME)
        .with_expiry(Expiry::OnInactivity(
            tower_sessions::cookie::time::Duration::seconds(SESSION_EXPIRY_SECONDS),
        ))
        .with_secure(config.is_secure())
        .with_same_site(tower_sessions::cookie::SameSite::Lax)
        .with_http_only(true)
        .with_path("/")
}
