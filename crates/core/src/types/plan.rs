//! Billing plan catalog.
//!
//! Plans are fixed in code; Shopify only knows a subscription by its name, so
//! every limit the app enforces is derived back from that name.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Usage limit applied when a shop has no recognizable subscription.
pub const DEFAULT_USAGE_LIMIT: i32 = 100;

/// Billing interval accepted by `appSubscriptionCreate`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlanInterval {
    #[default]
    Every30Days,
    Annual,
}

impl PlanInterval {
    /// The GraphQL enum value.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Every30Days => "EVERY_30_DAYS",
            Self::Annual => "ANNUAL",
        }
    }
}

/// A recurring billing plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Plan {
    Trend,
    Runway,
    HighFashion,
}

impl Plan {
    /// All plans in display order. The position is the `planIndex` used by
    /// the billing page.
    pub const ALL: [Self; 3] = [Self::Trend, Self::Runway, Self::HighFashion];

    /// Look up a plan by its catalog index.
    #[must_use]
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// Resolve a plan from a Shopify subscription name.
    ///
    /// Matches by substring, so `"Runway (test)"` resolves to [`Plan::Runway`].
    /// Unrecognized names fall back to [`Plan::Trend`].
    #[must_use]
    pub fn from_subscription_name(name: &str) -> Self {
        if name.contains("High Fashion") {
            Self::HighFashion
        } else if name.contains("Runway") {
            Self::Runway
        } else {
            Self::Trend
        }
    }

    /// Same as [`Plan::from_subscription_name`], treating a missing name as
    /// the entry plan.
    #[must_use]
    pub fn from_optional_name(name: Option<&str>) -> Self {
        name.map_or(Self::Trend, Self::from_subscription_name)
    }

    /// Plan name as sent to Shopify.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Trend => "Trend",
            Self::Runway => "Runway",
            Self::HighFashion => "High Fashion",
        }
    }

    /// Monthly price in USD.
    #[must_use]
    pub const fn price(self) -> Decimal {
        match self {
            Self::Trend => Decimal::from_parts(1999, 0, 0, false, 2),
            Self::Runway => Decimal::from_parts(4999, 0, 0, false, 2),
            Self::HighFashion => Decimal::from_parts(29999, 0, 0, false, 2),
        }
    }

    /// ISO 4217 currency of [`Plan::price`].
    #[must_use]
    pub const fn currency_code(self) -> &'static str {
        "USD"
    }

    #[must_use]
    pub const fn interval(self) -> PlanInterval {
        PlanInterval::Every30Days
    }

    #[must_use]
    pub const fn trial_days(self) -> i32 {
        3
    }

    /// Try-ons included per billing period.
    #[must_use]
    pub const fn usage_limit(self) -> i32 {
        match self {
            Self::Trend => 100,
            Self::Runway => 500,
            Self::HighFashion => 2000,
        }
    }

    /// Marketing bullet points shown on the plan picker.
    #[must_use]
    pub const fn features(self) -> &'static [&'static str] {
        match self {
            Self::Trend => &[
                "100 Try Ons per month",
                "Basic analytics",
                "Email support",
                "Standard integration",
            ],
            Self::Runway => &[
                "500 Try Ons per month",
                "Advanced analytics",
                "Priority support",
                "Custom integration options",
            ],
            Self::HighFashion => &[
                "2000 Try Ons per month",
                "Premium analytics",
                "24/7 Priority support",
                "Custom integration & API access",
                "Dedicated account manager",
            ],
        }
    }
}

impl std::fmt::Display for Plan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
