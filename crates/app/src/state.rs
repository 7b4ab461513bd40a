//! Application state shared across handlers.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use sqlx::PgPool;
use vton_core::ShopDomain;

use crate::config::AppConfig;
use crate::shopify::{AppSubscription, SessionTokenVerifier, ShopifyApp, ShopifyError};
use crate::tryon::{TryOnClient, TryOnError};

/// How long a shop's active subscription is served from memory.
const SUBSCRIPTION_CACHE_TTL: Duration = Duration::from_secs(60);

/// Maximum number of shops held in the subscription cache.
const SUBSCRIPTION_CACHE_CAPACITY: u64 = 10_000;

/// Error building the application state.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("shopify client: {0}")]
    Shopify(#[from] ShopifyError),
    #[error("try-on client: {0}")]
    TryOn(#[from] TryOnError),
}

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like database connections and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: AppConfig,
    pool: PgPool,
    shopify: ShopifyApp,
    session_tokens: SessionTokenVerifier,
    tryon: Option<TryOnClient>,
    subscription_cache: Cache<ShopDomain, Option<AppSubscription>>,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Errors
    ///
    /// Returns an error if an HTTP client cannot be built.
    pub fn new(config: AppConfig, pool: PgPool) -> Result<Self, StateError> {
        let shopify = ShopifyApp::new(&config.shopify)?;
        Self::with_shopify(config, pool, shopify)
    }

    /// Create the state around an already-built [`ShopifyApp`].
    ///
    /// # Errors
    ///
    /// Returns an error if the try-on HTTP client cannot be built.
    pub fn with_shopify(
        config: AppConfig,
        pool: PgPool,
        shopify: ShopifyApp,
    ) -> Result<Self, StateError> {
        let session_tokens = SessionTokenVerifier::new(
            &config.shopify.api_key,
            &config.shopify.api_secret,
            config.shopify.custom_shop_domain.clone(),
        );
        let tryon = config.tryon.as_ref().map(TryOnClient::new).transpose()?;

        let subscription_cache = Cache::builder()
            .max_capacity(SUBSCRIPTION_CACHE_CAPACITY)
            .time_to_live(SUBSCRIPTION_CACHE_TTL)
            .build();

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                shopify,
                session_tokens,
                tryon,
                subscription_cache,
            }),
        })
    }

    /// Get a reference to the application configuration.
    #[must_use]
    pub fn config(&self) -> &AppConfig {
        &self.inner.config
    }

    /// Get a reference to the database connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    /// Get a reference to the Shopify app client.
    #[must_use]
    pub fn shopify(&self) -> &ShopifyApp {
        &self.inner.shopify
    }

    /// Get a reference to the session token verifier.
    #[must_use]
    pub fn session_tokens(&self) -> &SessionTokenVerifier {
        &self.inner.session_tokens
    }

    /// The try-on API client, if configured.
    #[must_use]
    pub fn tryon(&self) -> Option<&TryOnClient> {
        self.inner.tryon.as_ref()
    }

    /// Active Shopify subscription per shop (`None` when the shop has none).
    #[must_use]
    pub fn subscription_cache(&self) -> &Cache<ShopDomain, Option<AppSubscription>> {
        &self.inner.subscription_cache
    }

    /// Drop the cached subscription of a shop.
    pub async fn invalidate_subscription(&self, shop: &ShopDomain) {
        self.inner.subscription_cache.invalidate(shop).await;
    }
}
