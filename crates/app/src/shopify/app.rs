//! App-level Shopify credentials and the OAuth install flow.

use std::sync::Arc;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::instrument;
use vton_core::ShopDomain;

use crate::config::ShopifyAppConfig;

use super::{AdminClient, ShopifyError};

/// Offline access token returned by the OAuth code exchange.
///
/// Implements `Debug` manually to redact the access token.
#[derive(Clone)]
pub struct OAuthToken {
    pub shop: ShopDomain,
    pub access_token: SecretString,
    /// Granted scopes.
    pub scopes: Vec<String>,
}

impl std::fmt::Debug for OAuthToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthToken")
            .field("shop", &self.shop)
            .field("access_token", &"[REDACTED]")
            .field("scopes", &self.scopes)
            .finish()
    }
}

/// OAuth token response from Shopify.
#[derive(Debug, Deserialize)]
struct OAuthTokenResponse {
    access_token: String,
    #[serde(default)]
    scope: String,
}

/// The Shopify app: credentials shared by every installed shop.
///
/// Cheap to clone; all clones share one HTTP connection pool.
#[derive(Clone)]
pub struct ShopifyApp {
    inner: Arc<ShopifyAppInner>,
}

struct ShopifyAppInner {
    client: reqwest::Client,
    api_key: String,
    api_secret: SecretString,
    api_version: String,
    scopes: Vec<String>,
    /// Overrides `https://{shop}` for every request (local stubs).
    base_url_override: Option<String>,
}

impl ShopifyApp {
    /// Create the app from configuration.
    ///
    /// # Errors
    ///
    /// Returns `ShopifyError::Http` if the HTTP client cannot be built.
    pub fn new(config: &ShopifyAppConfig) -> Result<Self, ShopifyError> {
        Self::build(config, None)
    }

    /// Create the app with every request sent to `base_url` instead of the
    /// shop's host.
    ///
    /// # Errors
    ///
    /// Returns `ShopifyError::Http` if the HTTP client cannot be built.
    pub fn with_base_url(config: &ShopifyAppConfig, base_url: &str) -> Result<Self, ShopifyError> {
        Self::build(config, Some(base_url.trim_end_matches('/').to_string()))
    }

    fn build(
        config: &ShopifyAppConfig,
        base_url_override: Option<String>,
    ) -> Result<Self, ShopifyError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            inner: Arc::new(ShopifyAppInner {
                client,
                api_key: config.api_key.clone(),
                api_secret: config.api_secret.clone(),
                api_version: config.api_version.clone(),
                scopes: config.scopes.clone(),
                base_url_override,
            }),
        })
    }

    /// App client ID.
    #[must_use]
    pub fn api_key(&self) -> &str {
        &self.inner.api_key
    }

    /// App client secret (for HMAC verification).
    #[must_use]
    pub fn api_secret(&self) -> &SecretString {
        &self.inner.api_secret
    }

    /// Admin API version.
    #[must_use]
    pub fn api_version(&self) -> &str {
        &self.inner.api_version
    }

    fn shop_base_url(&self, shop: &ShopDomain) -> String {
        self.inner
            .base_url_override
            .clone()
            .unwrap_or_else(|| format!("https://{shop}"))
    }

    // =========================================================================
    // OAuth Flow
    // =========================================================================

    /// Generate the OAuth authorization URL for an offline access token.
    #[must_use]
    pub fn authorization_url(&self, shop: &ShopDomain, redirect_uri: &str, state: &str) -> String {
        let scope = self.inner.scopes.join(",");
        format!(
            "https://{shop}/admin/oauth/authorize?client_id={}&scope={}&redirect_uri={}&state={}",
            urlencoding::encode(&self.inner.api_key),
            urlencoding::encode(&scope),
            urlencoding::encode(redirect_uri),
            urlencoding::encode(state)
        )
    }

    /// Exchange an authorization code for an offline access token.
    ///
    /// # Errors
    ///
    /// Returns `ShopifyError::OAuth` if Shopify rejects the exchange.
    /// Returns `ShopifyError::Http` if the HTTP request fails.
    #[instrument(skip(self, shop, code), fields(shop = %shop))]
    pub async fn exchange_code(
        &self,
        shop: &ShopDomain,
        code: &str,
    ) -> Result<OAuthToken, ShopifyError> {
        let url = format!("{}/admin/oauth/access_token", self.shop_base_url(shop));

        let params = [
            ("client_id", self.inner.api_key.as_str()),
            ("client_secret", self.inner.api_secret.expose_secret()),
            ("code", code),
        ];

        let response = self.inner.client.post(&url).form(&params).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(ShopifyError::OAuth(format!(
                "Token exchange failed ({status}): {text}"
            )));
        }

        let token: OAuthTokenResponse = serde_json::from_str(&response.text().await?)?;

        Ok(OAuthToken {
            shop: shop.clone(),
            access_token: SecretString::from(token.access_token),
            scopes: token
                .scope
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
        })
    }

    // =========================================================================
    // Admin API
    // =========================================================================

    /// Admin API client for one shop.
    #[must_use]
    pub fn admin(&self, shop: &ShopDomain, access_token: &SecretString) -> AdminClient {
        let endpoint = format!(
            "{}/admin/api/{}/graphql.json",
            self.shop_base_url(shop),
            self.inner.api_version
        );
        AdminClient::new(
            self.inner.client.clone(),
            shop.clone(),
            endpoint,
            access_token.clone(),
        )
    }
}
