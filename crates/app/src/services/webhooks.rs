//! Shopify webhook dispatch.

use serde::Deserialize;
use tracing::instrument;
use vton_core::{ShopDomain, SubscriptionEventKind, SubscriptionStatus, charge_id_from_gid};

use crate::db::{
    ButtonSettingsRepository, SessionRepository, ShopDataRepository, SubscriptionEventRepository,
    SubscriptionRepository,
};
use crate::error::AppError;
use crate::state::AppState;

use super::billing::apply_plan_entitlements;

/// A webhook topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookTopic {
    AppUninstalled,
    AppSubscriptionsUpdate,
    CustomersDataRequest,
    CustomersRedact,
    ShopRedact,
    Other(String),
}

impl WebhookTopic {
    /// Parse an `X-Shopify-Topic` header. Both `app/uninstalled` and
    /// `APP_UNINSTALLED` spellings are accepted.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let normalized = raw.trim().replace('/', "_").to_ascii_uppercase();
        match normalized.as_str() {
            "APP_UNINSTALLED" => Self::AppUninstalled,
            "APP_SUBSCRIPTIONS_UPDATE" => Self::AppSubscriptionsUpdate,
            "CUSTOMERS_DATA_REQUEST" => Self::CustomersDataRequest,
            "CUSTOMERS_REDACT" => Self::CustomersRedact,
            "SHOP_REDACT" => Self::ShopRedact,
            _ => Self::Other(normalized),
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::AppUninstalled => "APP_UNINSTALLED",
            Self::AppSubscriptionsUpdate => "APP_SUBSCRIPTIONS_UPDATE",
            Self::CustomersDataRequest => "CUSTOMERS_DATA_REQUEST",
            Self::CustomersRedact => "CUSTOMERS_REDACT",
            Self::ShopRedact => "SHOP_REDACT",
            Self::Other(topic) => topic,
        }
    }
}

impl std::fmt::Display for WebhookTopic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payload of `APP_SUBSCRIPTIONS_UPDATE`.
#[derive(Debug, Clone, Deserialize)]
pub struct AppSubscriptionsUpdate {
    pub app_subscription: AppSubscriptionPayload,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppSubscriptionPayload {
    pub admin_graphql_api_id: String,
    pub name: String,
    pub status: String,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
    #[serde(default)]
    pub cancelled_on: Option<String>,
}

impl AppSubscriptionPayload {
    /// Event recorded for this update, given the status stored for the
    /// charge before it.
    #[must_use]
    pub fn event_kind(&self, previous: Option<SubscriptionStatus>) -> SubscriptionEventKind {
        SubscriptionEventKind::classify(
            &self.status,
            self.cancelled_on.is_some(),
            previous,
            self.created_at.as_deref(),
            self.updated_at.as_deref(),
        )
    }
}

/// Handle a verified webhook.
///
/// # Errors
///
/// Returns `BadRequest` for an unparseable payload and `Database` if a write
/// fails. Shopify retries on any non-2xx response.
#[instrument(skip(state, topic, shop, payload), fields(shop = %shop, topic = %topic))]
pub async fn handle_webhook(
    state: &AppState,
    topic: &WebhookTopic,
    shop: &ShopDomain,
    payload: &[u8],
) -> Result<(), AppError> {
    match topic {
        WebhookTopic::AppUninstalled => {
            let deleted = SessionRepository::new(state.pool())
                .delete_by_shop(shop)
                .await?;
            state.invalidate_subscription(shop).await;
            tracing::info!(deleted, "App uninstalled, sessions removed");
        }
        WebhookTopic::AppSubscriptionsUpdate => {
            let update: AppSubscriptionsUpdate = serde_json::from_slice(payload)
                .map_err(|e| AppError::BadRequest(format!("Invalid payload: {e}")))?;
            handle_subscription_update(state, shop, &update.app_subscription).await?;
        }
        WebhookTopic::CustomersDataRequest | WebhookTopic::CustomersRedact => {
            // No customer data is stored.
            tracing::info!("Acknowledged customer privacy webhook");
        }
        WebhookTopic::ShopRedact => {
            let deleted = ShopDataRepository::new(state.pool()).purge(shop).await?;
            state.invalidate_subscription(shop).await;
            tracing::info!(deleted, "Shop data redacted");
        }
        WebhookTopic::Other(_) => {
            tracing::warn!("Unhandled webhook topic");
        }
    }

    Ok(())
}

async fn handle_subscription_update(
    state: &AppState,
    shop: &ShopDomain,
    subscription: &AppSubscriptionPayload,
) -> Result<(), AppError> {
    let charge_id = charge_id_from_gid(&subscription.admin_graphql_api_id);
    let events = SubscriptionEventRepository::new(state.pool());

    let Ok(status) = subscription.status.parse::<SubscriptionStatus>() else {
        events
            .record(shop, charge_id, subscription.event_kind(None), &subscription.status)
            .await?;
        tracing::warn!(status = %subscription.status, "Unknown subscription status");
        state.invalidate_subscription(shop).await;
        return Ok(());
    };

    let previous = SubscriptionRepository::new(state.pool())
        .update_status(charge_id, status)
        .await?;
    let kind = subscription.event_kind(previous);
    events
        .record(shop, charge_id, kind, &subscription.status)
        .await?;
    tracing::info!(
        charge_id,
        %status,
        %kind,
        updated = previous.is_some(),
        "Subscription updated"
    );

    let buttons = ButtonSettingsRepository::new(state.pool());
    if status.is_active() {
        let session = SessionRepository::new(state.pool()).find_by_shop(shop).await?;
        if session.is_none() {
            tracing::warn!("No offline session for shop, skipping activation");
        } else {
            buttons.enable_or_create(shop).await?;
            apply_plan_entitlements(state.pool(), shop, Some(&subscription.name)).await?;
        }
    } else if status.disables_features() {
        let disabled = buttons.set_enabled(shop, false).await?;
        tracing::info!(disabled, "Storefront button disabled");
    }

    state.invalidate_subscription(shop).await;
    Ok(())
}
