//! Shopify Admin API GraphQL client for one shop.
//!
//! Only the billing surface the app needs: reading the app's subscriptions,
//! creating a recurring charge and activating an accepted one.

use chrono::{DateTime, Utc};
use graphql_client::GraphQLQuery;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, de::DeserializeOwned};
use tracing::instrument;
use vton_core::{Plan, ShopDomain, SubscriptionStatus};

use super::queries::{
    self, ActiveSubscriptions, AppSubscriptionActivate, AppSubscriptionCreate,
    AppSubscriptionNode, user_error_message,
};
use super::{GraphQLError, GraphQLErrorLocation, ShopifyError};

/// An app subscription as reported by Shopify.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppSubscription {
    /// Global id (`gid://shopify/AppSubscription/<id>`).
    pub id: String,
    pub name: String,
    pub status: SubscriptionStatus,
    pub test: bool,
    pub created_at: Option<DateTime<Utc>>,
    pub current_period_end: Option<DateTime<Utc>>,
    pub trial_days: i32,
}

impl From<queries::active_subscriptions::ActiveSubscription> for AppSubscription {
    fn from(s: queries::active_subscriptions::ActiveSubscription) -> Self {
        Self {
            id: s.id,
            name: s.name,
            status: s.status,
            test: s.test,
            created_at: s.created_at,
            current_period_end: s.current_period_end,
            trial_days: s.trial_days,
        }
    }
}

/// A pending charge awaiting merchant approval.
#[derive(Debug, Clone)]
pub struct CreatedSubscription {
    /// Global id of the new charge.
    pub id: String,
    pub status: SubscriptionStatus,
    /// Where the merchant approves the charge.
    pub confirmation_url: String,
}

/// Shopify Admin API GraphQL client bound to one shop and access token.
#[derive(Clone)]
pub struct AdminClient {
    client: reqwest::Client,
    shop: ShopDomain,
    endpoint: String,
    access_token: SecretString,
}

impl std::fmt::Debug for AdminClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminClient")
            .field("shop", &self.shop)
            .field("endpoint", &self.endpoint)
            .field("access_token", &"[REDACTED]")
            .finish()
    }
}

/// GraphQL response wrapper.
#[derive(Debug, Deserialize)]
struct GraphQLResponse<T> {
    data: Option<T>,
    errors: Option<Vec<GraphQLErrorResponse>>,
}

#[derive(Debug, Deserialize)]
struct GraphQLErrorResponse {
    message: String,
    #[serde(default)]
    locations: Vec<GraphQLErrorLocationResponse>,
    #[serde(default)]
    path: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct GraphQLErrorLocationResponse {
    line: i64,
    column: i64,
}

impl AdminClient {
    pub(super) const fn new(
        client: reqwest::Client,
        shop: ShopDomain,
        endpoint: String,
        access_token: SecretString,
    ) -> Self {
        Self {
            client,
            shop,
            endpoint,
            access_token,
        }
    }

    /// The shop this client acts for.
    #[must_use]
    pub const fn shop(&self) -> &ShopDomain {
        &self.shop
    }

    // =========================================================================
    // GraphQL Execution
    // =========================================================================

    /// Execute a GraphQL operation.
    async fn execute<Q: GraphQLQuery>(
        &self,
        variables: Q::Variables,
    ) -> Result<Q::ResponseData, ShopifyError>
    where
        Q::ResponseData: DeserializeOwned,
    {
        let body = Q::build_query(variables);

        let response = self
            .client
            .post(&self.endpoint)
            .header("X-Shopify-Access-Token", self.access_token.expose_secret())
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        // Check for rate limiting
        if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.trim().parse::<f64>().ok())
                .map_or(2, |secs| {
                    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                    let secs = secs.ceil().max(0.0) as u64;
                    secs
                });
            return Err(ShopifyError::RateLimited(retry_after));
        }

        // Check for unauthorized
        if response.status() == reqwest::StatusCode::UNAUTHORIZED {
            return Err(ShopifyError::Unauthorized(
                "Invalid or expired access token".to_string(),
            ));
        }

        let graphql_response: GraphQLResponse<Q::ResponseData> =
            serde_json::from_str(&response.error_for_status()?.text().await?)?;

        // Check for GraphQL errors
        if let Some(errors) = graphql_response.errors
            && !errors.is_empty()
        {
            let converted_errors: Vec<GraphQLError> = errors
                .into_iter()
                .map(|e| GraphQLError {
                    message: e.message,
                    locations: e
                        .locations
                        .into_iter()
                        .map(|l| GraphQLErrorLocation {
                            line: l.line,
                            column: l.column,
                        })
                        .collect(),
                    path: e.path,
                })
                .collect();
            return Err(ShopifyError::GraphQL(converted_errors));
        }

        graphql_response
            .data
            .ok_or_else(|| ShopifyError::MissingData("No data in response".to_string()))
    }

    // =========================================================================
    // Billing
    // =========================================================================

    /// Active subscriptions of the current app installation.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails or returns an error response.
    #[instrument(skip(self), fields(shop = %self.shop))]
    pub async fn active_subscriptions(&self) -> Result<Vec<AppSubscription>, ShopifyError> {
        let response = self
            .execute::<ActiveSubscriptions>(queries::active_subscriptions::Variables)
            .await?;

        Ok(response
            .current_app_installation
            .active_subscriptions
            .into_iter()
            .map(AppSubscription::from)
            .collect())
    }

    /// Look up a subscription by global id.
    ///
    /// Returns `None` if the id does not resolve to an app subscription.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails or returns an error response.
    #[instrument(skip(self), fields(shop = %self.shop))]
    pub async fn subscription(
        &self,
        charge_gid: &str,
    ) -> Result<Option<AppSubscription>, ShopifyError> {
        let variables = queries::app_subscription_node::Variables {
            id: charge_gid.to_string(),
        };

        let response = self.execute::<AppSubscriptionNode>(variables).await?;

        Ok(match response.node {
            Some(queries::app_subscription_node::Node::AppSubscription(s)) => Some(s.into()),
            Some(queries::app_subscription_node::Node::Other) | None => None,
        })
    }

    /// Create a recurring charge for `plan`.
    ///
    /// # Errors
    ///
    /// Returns `ShopifyError::UserError` if Shopify rejects the input, or
    /// another error if the API request fails.
    #[instrument(skip(self, plan), fields(shop = %self.shop, plan = %plan))]
    pub async fn create_subscription(
        &self,
        plan: Plan,
        return_url: &str,
        test: bool,
    ) -> Result<CreatedSubscription, ShopifyError> {
        use queries::app_subscription_create::{
            AppPlanInput, AppRecurringPricingInput, AppSubscriptionLineItemInput, MoneyInput,
            Variables,
        };

        let variables = Variables {
            name: plan.name().to_string(),
            return_url: return_url.to_string(),
            test: Some(test),
            trial_days: Some(plan.trial_days()),
            line_items: vec![AppSubscriptionLineItemInput {
                plan: AppPlanInput {
                    app_recurring_pricing_details: AppRecurringPricingInput {
                        price: MoneyInput {
                            amount: plan.price(),
                            currency_code: plan.currency_code().to_string(),
                        },
                        interval: plan.interval().as_str().to_string(),
                    },
                },
            }],
        };

        let payload = self
            .execute::<AppSubscriptionCreate>(variables)
            .await?
            .app_subscription_create
            .ok_or_else(|| ShopifyError::MissingData("appSubscriptionCreate".to_string()))?;

        if let Some(message) = user_error_message(&payload.user_errors) {
            return Err(ShopifyError::UserError(message));
        }

        let subscription = payload
            .app_subscription
            .ok_or_else(|| ShopifyError::MissingData("appSubscription".to_string()))?;
        let confirmation_url = payload
            .confirmation_url
            .ok_or_else(|| ShopifyError::MissingData("confirmationUrl".to_string()))?;

        Ok(CreatedSubscription {
            id: subscription.id,
            status: subscription.status,
            confirmation_url,
        })
    }

    /// Activate an accepted charge. Returns the resulting status.
    ///
    /// # Errors
    ///
    /// Returns `ShopifyError::UserError` if Shopify refuses the activation,
    /// or another error if the API request fails.
    #[instrument(skip(self), fields(shop = %self.shop))]
    pub async fn activate_subscription(
        &self,
        charge_gid: &str,
    ) -> Result<SubscriptionStatus, ShopifyError> {
        let variables = queries::app_subscription_activate::Variables {
            id: charge_gid.to_string(),
        };

        let payload = self
            .execute::<AppSubscriptionActivate>(variables)
            .await?
            .app_subscription_activate
            .ok_or_else(|| ShopifyError::MissingData("appSubscriptionActivate".to_string()))?;

        if let Some(message) = user_error_message(&payload.user_errors) {
            return Err(ShopifyError::UserError(message));
        }

        payload
            .app_subscription
            .map(|s| s.status)
            .ok_or_else(|| ShopifyError::MissingData("appSubscription".to_string()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::{
        Json, Router,
        http::{HeaderMap, StatusCode},
        response::IntoResponse,
        routing::post,
    };
    use serde_json::{Value, json};

    use super::*;
    use crate::config::ShopifyAppConfig;
    use crate::shopify::ShopifyApp;

    const GRAPHQL_PATH: &str = "/admin/api/2025-01/graphql.json";

    async fn client_for(router: Router) -> AdminClient {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        let config = ShopifyAppConfig {
            api_key: "test_api_key".to_string(),
            api_secret: SecretString::from("test_api_secret"),
            api_version: "2025-01".to_string(),
            scopes: vec![],
            billing_test: true,
            custom_shop_domain: None,
        };
        let app = ShopifyApp::with_base_url(&config, &format!("http://{addr}")).unwrap();
        app.admin(
            &ShopDomain::parse("demo.myshopify.com").unwrap(),
            &SecretString::from("shpat_token"),
        )
    }

    fn graphql_stub(response: Value) -> Router {
        Router::new().route(
            GRAPHQL_PATH,
            post(move |headers: HeaderMap| {
                let response = response.clone();
                async move {
                    if headers.get("x-shopify-access-token").and_then(|v| v.to_str().ok())
                        != Some("shpat_token")
                    {
                        return StatusCode::UNAUTHORIZED.into_response();
                    }
                    Json(response).into_response()
                }
            }),
        )
    }

    #[tokio::test]
    async fn test_active_subscriptions() {
        let client = client_for(graphql_stub(json!({
            "data": {
                "currentAppInstallation": {
                    "activeSubscriptions": [{
                        "id": "gid://shopify/AppSubscription/11",
                        "name": "Runway",
                        "status": "ACTIVE",
                        "test": true,
                        "createdAt": "2026-01-01T00:00:00Z",
                        "currentPeriodEnd": "2026-01-31T00:00:00Z",
                        "trialDays": 3
                    }]
                }
            }
        })))
        .await;

        let subscriptions = client.active_subscriptions().await.unwrap();
        assert_eq!(subscriptions.len(), 1);
        assert_eq!(subscriptions[0].name, "Runway");
        assert_eq!(subscriptions[0].status, SubscriptionStatus::Active);
        assert!(subscriptions[0].current_period_end.is_some());
    }

    #[tokio::test]
    async fn test_graphql_errors_are_mapped() {
        let client = client_for(graphql_stub(json!({
            "errors": [
                {"message": "Access denied", "locations": [{"line": 1, "column": 2}]},
                {"message": "Throttled"}
            ]
        })))
        .await;

        let err = client.active_subscriptions().await.unwrap_err();
        match err {
            ShopifyError::GraphQL(errors) => {
                assert_eq!(errors.len(), 2);
                assert_eq!(errors[0].locations[0].column, 2);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_rate_limit_is_mapped() {
        let router = Router::new().route(
            GRAPHQL_PATH,
            post(|| async { (StatusCode::TOO_MANY_REQUESTS, [("Retry-After", "2.0")]) }),
        );
        let client = client_for(router).await;

        let err = client.active_subscriptions().await.unwrap_err();
        assert!(matches!(err, ShopifyError::RateLimited(2)));
    }

    #[tokio::test]
    async fn test_unauthorized_is_mapped() {
        let router = Router::new().route(GRAPHQL_PATH, post(|| async { StatusCode::UNAUTHORIZED }));
        let client = client_for(router).await;

        let err = client.active_subscriptions().await.unwrap_err();
        assert!(matches!(err, ShopifyError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn test_subscription_node_lookup() {
        let client = client_for(graphql_stub(json!({
            "data": {
                "node": {
                    "__typename": "AppSubscription",
                    "id": "gid://shopify/AppSubscription/11",
                    "name": "High Fashion",
                    "status": "ACCEPTED",
                    "test": false,
                    "createdAt": null,
                    "currentPeriodEnd": null,
                    "trialDays": 3
                }
            }
        })))
        .await;

        let subscription = client
            .subscription("gid://shopify/AppSubscription/11")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(subscription.status, SubscriptionStatus::Accepted);
        assert_eq!(subscription.name, "High Fashion");
    }

    #[tokio::test]
    async fn test_create_subscription_returns_confirmation_url() {
        let client = client_for(graphql_stub(json!({
            "data": {
                "appSubscriptionCreate": {
                    "appSubscription": {"id": "gid://shopify/AppSubscription/12", "status": "PENDING"},
                    "confirmationUrl": "https://demo.myshopify.com/admin/charges/12/confirm",
                    "userErrors": []
                }
            }
        })))
        .await;

        let created = client
            .create_subscription(Plan::Runway, "https://vton.example.app/cb", true)
            .await
            .unwrap();
        assert_eq!(created.status, SubscriptionStatus::Pending);
        assert!(created.confirmation_url.ends_with("/confirm"));
    }

    #[tokio::test]
    async fn test_create_subscription_user_errors() {
        let client = client_for(graphql_stub(json!({
            "data": {
                "appSubscriptionCreate": {
                    "appSubscription": null,
                    "confirmationUrl": null,
                    "userErrors": [{"field": ["returnUrl"], "message": "is invalid"}]
                }
            }
        })))
        .await;

        let err = client
            .create_subscription(Plan::Trend, "nope", true)
            .await
            .unwrap_err();
        assert!(matches!(err, ShopifyError::UserError(msg) if msg == "returnUrl: is invalid"));
    }

    #[tokio::test]
    async fn test_activate_subscription() {
        let client = client_for(graphql_stub(json!({
            "data": {
                "appSubscriptionActivate": {
                    "appSubscription": {
                        "id": "gid://shopify/AppSubscription/11",
                        "name": "Trend",
                        "status": "ACTIVE"
                    },
                    "userErrors": []
                }
            }
        })))
        .await;

        let status = client
            .activate_subscription("gid://shopify/AppSubscription/11")
            .await
            .unwrap();
        assert_eq!(status, SubscriptionStatus::Active);
    }
}
