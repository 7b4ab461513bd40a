//! GraphQL operations for the Shopify Admin API billing surface.
//!
//! Each operation implements [`GraphQLQuery`] and exposes `Variables` and
//! `ResponseData` in a module named after it, so callers read the same as
//! with derived queries. Documents live in `crates/app/graphql/`.

use graphql_client::{GraphQLQuery, QueryBody};

/// ISO 8601 date-time string.
type DateTime = chrono::DateTime<chrono::Utc>;

macro_rules! impl_graphql_query {
    ($query:ident, $module:ident, $operation:literal, $path:literal) => {
        impl GraphQLQuery for $query {
            type Variables = $module::Variables;
            type ResponseData = $module::ResponseData;

            fn build_query(variables: Self::Variables) -> QueryBody<Self::Variables> {
                QueryBody {
                    variables,
                    query: include_str!($path),
                    operation_name: $operation,
                }
            }
        }
    };
}

/// Shared `userErrors` selection of billing mutations.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct UserError {
    #[serde(default)]
    pub field: Option<Vec<String>>,
    pub message: String,
}

/// Join mutation user errors into one message, `None` when there are none.
#[must_use]
pub fn user_error_message(errors: &[UserError]) -> Option<String> {
    if errors.is_empty() {
        return None;
    }
    Some(
        errors
            .iter()
            .map(|e| match e.field.as_deref() {
                Some(field) if !field.is_empty() => format!("{}: {}", field.join("."), e.message),
                _ => e.message.clone(),
            })
            .collect::<Vec<_>>()
            .join("; "),
    )
}

// =============================================================================
// Subscription queries
// =============================================================================

pub struct ActiveSubscriptions;
impl_graphql_query!(
    ActiveSubscriptions,
    active_subscriptions,
    "ActiveSubscriptions",
    "../../graphql/active_subscriptions.graphql"
);

pub mod active_subscriptions {
    use serde::{Deserialize, Serialize};
    use vton_core::SubscriptionStatus;

    use super::DateTime;

    #[derive(Debug, Clone, Default, Serialize)]
    pub struct Variables;

    #[derive(Debug, Clone, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct ResponseData {
        pub current_app_installation: CurrentAppInstallation,
    }

    #[derive(Debug, Clone, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct CurrentAppInstallation {
        pub active_subscriptions: Vec<ActiveSubscription>,
    }

    #[derive(Debug, Clone, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct ActiveSubscription {
        pub id: String,
        pub name: String,
        pub status: SubscriptionStatus,
        pub test: bool,
        pub created_at: Option<DateTime>,
        pub current_period_end: Option<DateTime>,
        pub trial_days: i32,
    }
}

pub struct AppSubscriptionNode;
impl_graphql_query!(
    AppSubscriptionNode,
    app_subscription_node,
    "AppSubscriptionNode",
    "../../graphql/app_subscription.graphql"
);

pub mod app_subscription_node {
    use serde::{Deserialize, Serialize};

    pub use super::active_subscriptions::ActiveSubscription as AppSubscriptionFields;

    #[derive(Debug, Clone, Serialize)]
    pub struct Variables {
        pub id: String,
    }

    #[derive(Debug, Clone, Deserialize)]
    pub struct ResponseData {
        pub node: Option<Node>,
    }

    #[derive(Debug, Clone, Deserialize)]
    #[serde(tag = "__typename")]
    pub enum Node {
        AppSubscription(AppSubscriptionFields),
        #[serde(other)]
        Other,
    }
}

// =============================================================================
// Subscription mutations
// =============================================================================

pub struct AppSubscriptionCreate;
impl_graphql_query!(
    AppSubscriptionCreate,
    app_subscription_create,
    "AppSubscriptionCreate",
    "../../graphql/app_subscription_create.graphql"
);

pub mod app_subscription_create {
    use rust_decimal::Decimal;
    use serde::{Deserialize, Serialize};
    use vton_core::SubscriptionStatus;

    pub use super::UserError;

    #[derive(Debug, Clone, Serialize)]
    #[serde(rename_all = "camelCase")]
    pub struct Variables {
        pub name: String,
        pub return_url: String,
        pub test: Option<bool>,
        pub trial_days: Option<i32>,
        pub line_items: Vec<AppSubscriptionLineItemInput>,
    }

    #[derive(Debug, Clone, Serialize)]
    pub struct AppSubscriptionLineItemInput {
        pub plan: AppPlanInput,
    }

    #[derive(Debug, Clone, Serialize)]
    #[serde(rename_all = "camelCase")]
    pub struct AppPlanInput {
        pub app_recurring_pricing_details: AppRecurringPricingInput,
    }

    #[derive(Debug, Clone, Serialize)]
    pub struct AppRecurringPricingInput {
        pub price: MoneyInput,
        pub interval: String,
    }

    #[derive(Debug, Clone, Serialize)]
    #[serde(rename_all = "camelCase")]
    pub struct MoneyInput {
        pub amount: Decimal,
        pub currency_code: String,
    }

    #[derive(Debug, Clone, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct ResponseData {
        pub app_subscription_create: Option<Payload>,
    }

    #[derive(Debug, Clone, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct Payload {
        pub app_subscription: Option<CreatedAppSubscription>,
        pub confirmation_url: Option<String>,
        #[serde(default)]
        pub user_errors: Vec<UserError>,
    }

    #[derive(Debug, Clone, Deserialize)]
    pub struct CreatedAppSubscription {
        pub id: String,
        pub status: SubscriptionStatus,
    }
}

pub struct AppSubscriptionActivate;
impl_graphql_query!(
    AppSubscriptionActivate,
    app_subscription_activate,
    "AppSubscriptionActivate",
    "../../graphql/app_subscription_activate.graphql"
);

pub mod app_subscription_activate {
    use serde::{Deserialize, Serialize};
    use vton_core::SubscriptionStatus;

    pub use super::UserError;

    #[derive(Debug, Clone, Serialize)]
    pub struct Variables {
        pub id: String,
    }

    #[derive(Debug, Clone, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct ResponseData {
        pub app_subscription_activate: Option<Payload>,
    }

    #[derive(Debug, Clone, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct Payload {
        pub app_subscription: Option<ActivatedAppSubscription>,
        #[serde(default)]
        pub user_errors: Vec<UserError>,
    }

    #[derive(Debug, Clone, Deserialize)]
    pub struct ActivatedAppSubscription {
        pub id: String,
        pub name: String,
        pub status: SubscriptionStatus,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;

    #[test]
    fn test_build_query_uses_document() {
        let body = AppSubscriptionNode::build_query(app_subscription_node::Variables {
            id: "gid://shopify/AppSubscription/1".to_string(),
        });
        assert_eq!(body.operation_name, "AppSubscriptionNode");
        assert!(body.query.contains("... on AppSubscription"));

        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["variables"]["id"], "gid://shopify/AppSubscription/1");
        assert_eq!(json["operationName"], "AppSubscriptionNode");
    }

    #[test]
    fn test_create_variables_serialize_camel_case() {
        let variables = app_subscription_create::Variables {
            name: "Runway".to_string(),
            return_url: "https://vton.example.app/app/billing/callback".to_string(),
            test: Some(true),
            trial_days: Some(3),
            line_items: vec![app_subscription_create::AppSubscriptionLineItemInput {
                plan: app_subscription_create::AppPlanInput {
                    app_recurring_pricing_details: app_subscription_create::AppRecurringPricingInput {
                        price: app_subscription_create::MoneyInput {
                            amount: Decimal::new(4999, 2),
                            currency_code: "USD".to_string(),
                        },
                        interval: "EVERY_30_DAYS".to_string(),
                    },
                },
            }],
        };

        let json = serde_json::to_value(&variables).unwrap();
        assert_eq!(json["returnUrl"], "https://vton.example.app/app/billing/callback");
        assert_eq!(json["trialDays"], 3);
        let pricing = &json["lineItems"][0]["plan"]["appRecurringPricingDetails"];
        assert_eq!(pricing["price"]["amount"], "49.99");
        assert_eq!(pricing["price"]["currencyCode"], "USD");
        assert_eq!(pricing["interval"], "EVERY_30_DAYS");
    }

    #[test]
    fn test_node_response_dispatches_on_typename() {
        let data: app_subscription_node::ResponseData = serde_json::from_str(
            r#"{"node":{"__typename":"AppSubscription","id":"gid://shopify/AppSubscription/1",
                "name":"Trend","status":"ACCEPTED","test":true,"createdAt":"2026-01-01T00:00:00Z",
                "currentPeriodEnd":null,"trialDays":3}}"#,
        )
        .unwrap();
        assert!(matches!(
            data.node,
            Some(app_subscription_node::Node::AppSubscription(ref s)) if s.name == "Trend"
        ));

        let data: app_subscription_node::ResponseData =
            serde_json::from_str(r#"{"node":{"__typename":"Product"}}"#).unwrap();
        assert!(matches!(data.node, Some(app_subscription_node::Node::Other)));
    }

    #[test]
    fn test_user_error_message() {
        assert_eq!(user_error_message(&[]), None);
        let errors = vec![
            UserError {
                field: Some(vec!["returnUrl".to_string()]),
                message: "is invalid".to_string(),
            },
            UserError {
                field: None,
                message: "Plan not allowed".to_string(),
            },
        ];
        assert_eq!(
            user_error_message(&errors).as_deref(),
            Some("returnUrl: is invalid; Plan not allowed")
        );
    }
}
