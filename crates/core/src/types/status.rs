//! Status enums for subscriptions, webhook events and usage.

use serde::{Deserialize, Serialize};

/// Prefix of Shopify's global ids for app subscriptions.
pub const APP_SUBSCRIPTION_GID_PREFIX: &str = "gid://shopify/AppSubscription/";

/// Build the global id for a numeric charge id.
///
/// Already-qualified ids are returned unchanged.
#[must_use]
pub fn charge_gid(charge_id: &str) -> String {
    if charge_id.starts_with("gid://") {
        charge_id.to_string()
    } else {
        format!("{APP_SUBSCRIPTION_GID_PREFIX}{charge_id}")
    }
}

/// Extract the numeric charge id from an `AppSubscription` global id.
///
/// Bare ids are returned unchanged.
#[must_use]
pub fn charge_id_from_gid(gid: &str) -> &str {
    gid.strip_prefix(APP_SUBSCRIPTION_GID_PREFIX).unwrap_or(gid)
}

/// Shopify `AppSubscriptionStatus`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubscriptionStatus {
    Active,
    Pending,
    Accepted,
    Declined,
    Expired,
    Frozen,
    Cancelled,
}

impl SubscriptionStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "ACTIVE",
            Self::Pending => "PENDING",
            Self::Accepted => "ACCEPTED",
            Self::Declined => "DECLINED",
            Self::Expired => "EXPIRED",
            Self::Frozen => "FROZEN",
            Self::Cancelled => "CANCELLED",
        }
    }

    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Active)
    }

    /// Whether the storefront button must be switched off.
    #[must_use]
    pub const fn disables_features(self) -> bool {
        matches!(self, Self::Cancelled | Self::Expired)
    }
}

impl std::fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SubscriptionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "ACTIVE" => Ok(Self::Active),
            "PENDING" => Ok(Self::Pending),
            "ACCEPTED" => Ok(Self::Accepted),
            "DECLINED" => Ok(Self::Declined),
            "EXPIRED" => Ok(Self::Expired),
            "FROZEN" => Ok(Self::Frozen),
            "CANCELLED" => Ok(Self::Cancelled),
            _ => Err(format!("invalid subscription status: {s}")),
        }
    }
}

/// Kind of change reported by an `APP_SUBSCRIPTIONS_UPDATE` webhook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionEventKind {
    Created,
    Updated,
    Cancelled,
    Expired,
    Renewed,
}

impl SubscriptionEventKind {
    /// Classify a subscription webhook.
    ///
    /// `status` is the raw status string from the payload and `previous` the
    /// status the app had stored for the charge, if any. An ACTIVE update is
    /// a renewal when the charge was already active. Without a stored status,
    /// `created_at` and `updated_at` are compared verbatim instead.
    #[must_use]
    pub fn classify(
        status: &str,
        cancelled: bool,
        previous: Option<SubscriptionStatus>,
        created_at: Option<&str>,
        updated_at: Option<&str>,
    ) -> Self {
        let status = status.parse::<SubscriptionStatus>().ok();

        if cancelled || status == Some(SubscriptionStatus::Cancelled) {
            return Self::Cancelled;
        }

        match status {
            Some(SubscriptionStatus::Expired) => Self::Expired,
            Some(SubscriptionStatus::Active) => match previous {
                Some(SubscriptionStatus::Active) => Self::Renewed,
                Some(_) => Self::Created,
                None if created_at != updated_at => Self::Renewed,
                None => Self::Created,
            },
            _ => Self::Updated,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Updated => "updated",
            Self::Cancelled => "cancelled",
            Self::Expired => "expired",
            Self::Renewed => "renewed",
        }
    }
}

impl std::fmt::Display for SubscriptionEventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SubscriptionEventKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "created" => Ok(Self::Created),
            "updated" => Ok(Self::Updated),
            "cancelled" => Ok(Self::Cancelled),
            "expired" => Ok(Self::Expired),
            "renewed" => Ok(Self::Renewed),
            _ => Err(format!("invalid subscription event: {s}")),
        }
    }
}

/// How close a shop is to its monthly try-on limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UsageLevel {
    /// Below 50% of the limit.
    Success,
    /// Between 50% and 80% of the limit.
    Warning,
    /// 80% of the limit or more.
    Critical,
}

impl UsageLevel {
    /// Percentage of `limit` consumed by `count`. A non-positive limit counts
    /// as fully used.
    #[must_use]
    pub fn percentage(count: i64, limit: i32) -> f64 {
        if limit <= 0 {
            return 100.0;
        }
        #[allow(clippy::cast_precision_loss)] // usage counts stay far below 2^52
        let pct = (count as f64 / f64::from(limit)) * 100.0;
        pct
    }

    #[must_use]
    pub fn from_percentage(percentage: f64) -> Self {
        if percentage < 50.0 {
            Self::Success
        } else if percentage < 80.0 {
            Self::Warning
        } else {
            Self::Critical
        }
    }

    #[must_use]
    pub fn from_usage(count: i64, limit: i32) -> Self {
        Self::from_percentage(Self::percentage(count, limit))
    }

    /// Merchant-facing description.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::Success => "Your usage is within normal limits.",
            Self::Warning => "You're approaching your monthly usage limit.",
            Self::Critical => {
                "You're close to your monthly usage limit. Consider upgrading your plan."
            }
        }
    }
}
