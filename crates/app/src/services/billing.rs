//! Subscription billing: plan catalog, charge creation, charge activation
//! and the usage entitlements a plan grants.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::PgPool;
use tracing::instrument;
use vton_core::{Plan, ShopDomain, SubscriptionStatus, charge_gid, charge_id_from_gid};

use crate::config::AppConfig;
use crate::db::{
    ButtonSettingsRepository, CreditsRepository, NewSubscription, RepositoryError,
    SessionRepository, SubscriptionRepository, UsageLimitRepository,
};
use crate::error::AppError;
use crate::middleware::ShopContext;
use crate::shopify::{AdminClient, AppSubscription, ShopifyError};
use crate::state::AppState;

// =============================================================================
// Plan catalog
// =============================================================================

/// A plan as shown on the billing page.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanView {
    pub index: usize,
    pub name: &'static str,
    pub price: Decimal,
    pub currency_code: &'static str,
    pub interval: &'static str,
    pub trial_days: i32,
    pub usage_limit: i32,
    pub features: &'static [&'static str],
}

impl PlanView {
    fn new(index: usize, plan: Plan) -> Self {
        Self {
            index,
            name: plan.name(),
            price: plan.price(),
            currency_code: plan.currency_code(),
            interval: plan.interval().as_str(),
            trial_days: plan.trial_days(),
            usage_limit: plan.usage_limit(),
            features: plan.features(),
        }
    }
}

/// Every plan in display order.
#[must_use]
pub fn plan_catalog() -> Vec<PlanView> {
    Plan::ALL
        .iter()
        .enumerate()
        .map(|(index, plan)| PlanView::new(index, *plan))
        .collect()
}

// =============================================================================
// Charge creation
// =============================================================================

/// Create a recurring charge for `plan` and return the URL where the
/// merchant approves it.
///
/// # Errors
///
/// Returns `AppError::Shopify` if Shopify rejects or fails the mutation.
#[instrument(skip(admin, plan, config), fields(shop = %admin.shop(), plan = %plan))]
pub async fn create_subscription(
    admin: &AdminClient,
    plan: Plan,
    config: &AppConfig,
) -> Result<String, AppError> {
    let return_url = config.billing_return_url(admin.shop().as_str());
    let created = admin
        .create_subscription(plan, &return_url, config.shopify.billing_test)
        .await?;

    tracing::info!(charge = %created.id, status = %created.status, "Created subscription charge");
    Ok(created.confirmation_url)
}

// =============================================================================
// Charge activation
// =============================================================================

/// Result of [`handle_billing_callback`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActivationOutcome {
    pub status: SubscriptionStatus,
    pub plan: Plan,
    /// Whether this call refilled credits and enabled the button.
    pub entitlements_granted: bool,
}

/// Whether a charge now in `status` should grant plan entitlements, given
/// the status stored for it before this callback.
///
/// A charge that was already active locally has had its entitlements
/// granted, so replaying the return URL grants nothing.
#[must_use]
pub fn grants_entitlements(
    previous: Option<SubscriptionStatus>,
    status: SubscriptionStatus,
) -> bool {
    status.is_active() && previous != Some(SubscriptionStatus::Active)
}

/// Process the merchant's return from the charge approval page.
///
/// Activates an accepted charge and records it. When the charge became
/// active with this call, grants the plan's entitlements and switches the
/// storefront button on.
///
/// # Errors
///
/// - `Unauthorized` if the shop has no offline session
/// - `NotFound` if the charge does not exist
/// - `Shopify` or `Database` if a call fails
#[instrument(skip(state, shop), fields(shop = %shop))]
pub async fn handle_billing_callback(
    state: &AppState,
    shop: &ShopDomain,
    charge_id: &str,
) -> Result<ActivationOutcome, AppError> {
    let session = SessionRepository::new(state.pool())
        .find_by_shop(shop)
        .await?
        .ok_or_else(|| AppError::Unauthorized("No session found for shop".to_string()))?;

    let admin = state.shopify().admin(shop, &session.access_token);
    let gid = charge_gid(charge_id);

    let charge = admin
        .subscription(&gid)
        .await?
        .ok_or_else(|| AppError::NotFound("Subscription charge not found".to_string()))?;

    let status = if charge.status == SubscriptionStatus::Accepted {
        admin.activate_subscription(&gid).await?
    } else {
        charge.status
    };

    let upserted = SubscriptionRepository::new(state.pool())
        .upsert(NewSubscription {
            charge_id: charge_id_from_gid(&gid),
            shop,
            session_id: Some(&session.id),
            name: &charge.name,
            status,
            test: charge.test,
        })
        .await?;

    let plan = Plan::from_subscription_name(&charge.name);
    let entitlements_granted = grants_entitlements(upserted.previous_status, status);
    if entitlements_granted {
        apply_plan_entitlements(state.pool(), shop, Some(&charge.name)).await?;
        ButtonSettingsRepository::new(state.pool())
            .enable_or_create(shop)
            .await?;
    }

    state.invalidate_subscription(shop).await;

    tracing::info!(
        status = %status,
        plan = %plan,
        entitlements_granted,
        "Processed billing callback"
    );
    Ok(ActivationOutcome {
        status,
        plan,
        entitlements_granted,
    })
}

/// Set the shop's usage limit and refill its credits for the plan named
/// `plan_name`.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if a write fails.
#[instrument(skip(pool, shop), fields(shop = %shop))]
pub async fn apply_plan_entitlements(
    pool: &PgPool,
    shop: &ShopDomain,
    plan_name: Option<&str>,
) -> Result<Plan, RepositoryError> {
    let plan = Plan::from_optional_name(plan_name);

    UsageLimitRepository::new(pool)
        .upsert(shop, plan.usage_limit(), plan.name())
        .await?;
    CreditsRepository::new(pool)
        .reset(shop, plan.usage_limit())
        .await?;

    tracing::info!(plan = %plan, limit = plan.usage_limit(), "Applied plan entitlements");
    Ok(plan)
}

// =============================================================================
// Subscription status
// =============================================================================

/// The shop's current active subscription, served from the state cache.
///
/// # Errors
///
/// Returns `ShopifyError` if the Admin API call fails. Failures are not
/// cached.
pub async fn active_subscription(
    state: &AppState,
    ctx: &ShopContext,
) -> Result<Option<AppSubscription>, ShopifyError> {
    if let Some(cached) = state.subscription_cache().get(&ctx.shop).await {
        return Ok(cached);
    }

    let subscription = state
        .shopify()
        .admin(&ctx.shop, &ctx.session.access_token)
        .active_subscriptions()
        .await?
        .into_iter()
        .next();

    state
        .subscription_cache()
        .insert(ctx.shop.clone(), subscription.clone())
        .await;

    Ok(subscription)
}

/// Body of `GET /api/subscription-status`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionStatusResponse {
    pub is_active: bool,
    pub subscription_name: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub status: Option<SubscriptionStatus>,
    pub credits_remaining: i32,
}

impl SubscriptionStatusResponse {
    fn new(subscription: Option<&AppSubscription>, credits_remaining: i32) -> Self {
        Self {
            is_active: subscription.is_some_and(|s| s.status.is_active()),
            subscription_name: subscription.map(|s| s.name.clone()),
            expires_at: subscription.and_then(|s| s.current_period_end),
            status: subscription.map(|s| s.status),
            credits_remaining,
        }
    }
}

/// Subscription status of the calling shop.
///
/// # Errors
///
/// Returns `AppError` if the Admin API or the database fails.
#[instrument(skip(state, ctx), fields(shop = %ctx.shop))]
pub async fn subscription_status(
    state: &AppState,
    ctx: &ShopContext,
) -> Result<SubscriptionStatusResponse, AppError> {
    let subscription = active_subscription(state, ctx).await?;
    let credits = CreditsRepository::new(state.pool())
        .get(&ctx.shop)
        .await?
        .unwrap_or(0);

    Ok(SubscriptionStatusResponse::new(subscription.as_ref(), credits))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn subscription(status: SubscriptionStatus) -> AppSubscription {
        AppSubscription {
            id: "gid://shopify/AppSubscription/7".to_string(),
            name: "Runway".to_string(),
            status,
            test: true,
            created_at: None,
            current_period_end: Some("2026-02-01T00:00:00Z".parse().unwrap()),
            trial_days: 3,
        }
    }

    #[test]
    fn test_plan_catalog_order_and_shape() {
        let catalog = plan_catalog();
        assert_eq!(catalog.len(), 3);
        assert_eq!(catalog[0].name, "Trend");
        assert_eq!(catalog[2].index, 2);

        let json = serde_json::to_value(&catalog[1]).unwrap();
        assert_eq!(json["name"], "Runway");
        assert_eq!(json["price"], "49.99");
        assert_eq!(json["usageLimit"], 500);
        assert_eq!(json["trialDays"], 3);
        assert_eq!(json["interval"], "EVERY_30_DAYS");
    }

    #[test]
    fn test_status_response_active() {
        let sub = subscription(SubscriptionStatus::Active);
        let response = SubscriptionStatusResponse::new(Some(&sub), 42);
        let json = serde_json::to_value(&response).unwrap();

        assert_eq!(json["isActive"], true);
        assert_eq!(json["subscriptionName"], "Runway");
        assert_eq!(json["status"], "ACTIVE");
        assert_eq!(json["creditsRemaining"], 42);
        assert!(json["expiresAt"].is_string());
    }

    #[test]
    fn test_grants_entitlements_on_first_activation() {
        assert!(grants_entitlements(None, SubscriptionStatus::Active));
        assert!(grants_entitlements(
            Some(SubscriptionStatus::Pending),
            SubscriptionStatus::Active
        ));
        assert!(grants_entitlements(
            Some(SubscriptionStatus::Frozen),
            SubscriptionStatus::Active
        ));
    }

    #[test]
    fn test_grants_entitlements_not_on_replay() {
        assert!(!grants_entitlements(
            Some(SubscriptionStatus::Active),
            SubscriptionStatus::Active
        ));
    }

    #[test]
    fn test_grants_entitlements_requires_active_charge() {
        assert!(!grants_entitlements(None, SubscriptionStatus::Declined));
        assert!(!grants_entitlements(
            Some(SubscriptionStatus::Pending),
            SubscriptionStatus::Pending
        ));
    }

    #[test]
    fn test_status_response_without_subscription() {
        let response = SubscriptionStatusResponse::new(None, 0);
        assert!(!response.is_active);
        assert!(response.subscription_name.is_none());

        let frozen = subscription(SubscriptionStatus::Frozen);
        assert!(!SubscriptionStatusResponse::new(Some(&frozen), 0).is_active);
    }
}
