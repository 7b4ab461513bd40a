//! Database operations for the app's `PostgreSQL` schema.
//!
//! # Schema: `vton`
//!
//! ## Tables
//!
//! - `session` - Offline Admin API sessions, one per installed shop
//! - `oauth_session` - tower-sessions store for OAuth state
//! - `subscription` - App subscriptions keyed by Shopify charge id
//! - `subscription_event` - Audit trail of subscription webhooks
//! - `usage_limit` - Monthly try-on limit derived from the shop's plan
//! - `credits` - Remaining try-ons for the current billing period
//! - `try_on_usage` - One row per metered try-on
//! - `button_settings` - Storefront button configuration
//!
//! # Migrations
//!
//! Migrations are stored in `crates/app/migrations/`, embedded at compile
//! time and applied on startup unless `DATABASE_RUN_MIGRATIONS=false`.

pub mod button_settings;
pub mod entitlements;
pub mod events;
pub mod sessions;
pub mod shop_data;
pub mod subscriptions;
pub mod usage;

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

pub use button_settings::ButtonSettingsRepository;
pub use entitlements::{CreditsRepository, UsageLimit, UsageLimitRepository};
pub use events::{SubscriptionEvent, SubscriptionEventRepository};
pub use sessions::{SessionRepository, StoredSession};
pub use shop_data::ShopDataRepository;
pub use subscriptions::{
    NewSubscription, Subscription, SubscriptionRepository, UpsertedSubscription,
};
pub use usage::{DailyUsage, TryOnReceipt, UsageRecord, UsageRepository};

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

/// Apply the embedded migrations.
///
/// # Errors
///
/// Returns `MigrateError` if a migration fails or the history is inconsistent.
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}
