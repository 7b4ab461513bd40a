//! Credit-metered try-on tracking and usage reporting.

use chrono::{DateTime, Datelike, Days, NaiveDate, TimeZone, Utc};
use serde::Serialize;
use sqlx::PgPool;
use tracing::instrument;
use vton_core::{DEFAULT_USAGE_LIMIT, Plan, ShopDomain, UsageLevel, UsageRecordId};

use crate::db::{
    CreditsRepository, DailyUsage, SubscriptionRepository, UsageRecord, UsageRepository,
};
use crate::error::AppError;
use crate::middleware::ShopContext;
use crate::state::AppState;

use super::billing::active_subscription;

/// Name reported when the shop has no active subscription.
pub const NO_SUBSCRIPTION_NAME: &str = "No active subscription";

/// Days covered by the dashboard's daily chart, today included.
const DASHBOARD_DAYS: u64 = 30;

/// Rows in the dashboard's recent activity list.
const RECENT_USAGE_LIMIT: i64 = 5;

/// First instant of the UTC calendar month containing `now`.
#[must_use]
pub fn start_of_month_utc(now: DateTime<Utc>) -> DateTime<Utc> {
    let first = NaiveDate::from_ymd_opt(now.year(), now.month(), 1).unwrap_or(now.date_naive());
    Utc.from_utc_datetime(&first.and_time(chrono::NaiveTime::MIN))
}

/// One entry per day from `start` to `end` inclusive, taking counts from
/// `counts` and zero for missing days.
#[must_use]
pub fn fill_daily_counts(counts: &[DailyUsage], start: NaiveDate, end: NaiveDate) -> Vec<DailyUsage> {
    start
        .iter_days()
        .take_while(|date| *date <= end)
        .map(|date| DailyUsage {
            date,
            count: counts
                .iter()
                .find(|c| c.date == date)
                .map_or(0, |c| c.count),
        })
        .collect()
}

// =============================================================================
// Tracking
// =============================================================================

/// Body of a successful `POST /api/usage-tracker`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackUsageResponse {
    pub success: bool,
    /// Try-ons this calendar month, including this one.
    pub usage_count: i64,
    pub usage_id: UsageRecordId,
    pub credits_remaining: i32,
}

/// Consume one credit for a try-on of `product_id`.
///
/// # Errors
///
/// - `BadRequest` if the shop never subscribed
/// - `PaymentRequired` if no credit is left
/// - `Database` if a query fails
#[instrument(skip(pool, shop), fields(shop = %shop))]
pub async fn track_usage(
    pool: &PgPool,
    shop: &ShopDomain,
    product_id: &str,
) -> Result<TrackUsageResponse, AppError> {
    let subscription = SubscriptionRepository::new(pool)
        .latest_for_shop(shop)
        .await?
        .ok_or_else(|| {
            AppError::BadRequest("No active subscription found for this shop".to_string())
        })?;

    let usage = UsageRepository::new(pool);
    let receipt = usage
        .record_try_on(shop, product_id, Some(&subscription.charge_id))
        .await?
        .ok_or_else(|| AppError::PaymentRequired("No credits left".to_string()))?;

    let usage_count = usage
        .count_since(shop, start_of_month_utc(Utc::now()))
        .await?;

    tracing::info!(
        usage_id = %receipt.usage.id,
        usage_count,
        credits_remaining = receipt.credits_remaining,
        "Tracked try-on"
    );

    Ok(TrackUsageResponse {
        success: true,
        usage_count,
        usage_id: receipt.usage.id,
        credits_remaining: receipt.credits_remaining,
    })
}

/// Give back the credit of a try-on the vendor never started.
///
/// # Errors
///
/// Returns `Database` if a query fails.
#[instrument(skip(pool, shop), fields(shop = %shop))]
pub async fn refund_usage(
    pool: &PgPool,
    shop: &ShopDomain,
    usage_id: UsageRecordId,
) -> Result<bool, AppError> {
    let refunded = UsageRepository::new(pool).refund(shop, usage_id).await?;
    tracing::info!(usage_id = %usage_id, refunded, "Refunded try-on");
    Ok(refunded)
}

// =============================================================================
// Reporting
// =============================================================================

/// Monthly usage against the plan limit.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageStats {
    pub usage_count: i64,
    pub usage_limit: i32,
    pub percentage_used: f64,
    pub subscription_name: String,
    pub credits_remaining: i32,
}

impl UsageStats {
    fn new(
        usage_count: i64,
        subscription_name: Option<&str>,
        credits_remaining: i32,
    ) -> Self {
        let usage_limit = subscription_name
            .map_or(DEFAULT_USAGE_LIMIT, |name| Plan::from_subscription_name(name).usage_limit());

        Self {
            usage_count,
            usage_limit,
            percentage_used: UsageLevel::percentage(usage_count, usage_limit),
            subscription_name: subscription_name.unwrap_or(NO_SUBSCRIPTION_NAME).to_string(),
            credits_remaining,
        }
    }

    /// Level derived from [`Self::percentage_used`].
    #[must_use]
    pub fn level(&self) -> UsageLevel {
        UsageLevel::from_percentage(self.percentage_used)
    }
}

/// Usage statistics of the calling shop for the current month.
///
/// # Errors
///
/// Returns `AppError` if the Admin API or the database fails.
#[instrument(skip(state, ctx), fields(shop = %ctx.shop))]
pub async fn usage_stats(state: &AppState, ctx: &ShopContext) -> Result<UsageStats, AppError> {
    Ok(stats_with_period(state, ctx).await?.0)
}

async fn stats_with_period(
    state: &AppState,
    ctx: &ShopContext,
) -> Result<(UsageStats, Option<DateTime<Utc>>), AppError> {
    let subscription = active_subscription(state, ctx).await?;

    let usage_count = UsageRepository::new(state.pool())
        .count_since(&ctx.shop, start_of_month_utc(Utc::now()))
        .await?;
    let credits = CreditsRepository::new(state.pool())
        .get(&ctx.shop)
        .await?
        .unwrap_or(0);

    let stats = UsageStats::new(
        usage_count,
        subscription.as_ref().map(|s| s.name.as_str()),
        credits,
    );
    Ok((stats, subscription.and_then(|s| s.current_period_end)))
}

/// Body of `GET /api/usage`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageDashboard {
    #[serde(flatten)]
    pub stats: UsageStats,
    pub current_period_end: Option<DateTime<Utc>>,
    pub daily_usage: Vec<DailyUsage>,
    pub recent_usage: Vec<UsageRecord>,
    pub status: UsageLevel,
    pub message: &'static str,
}

/// Usage dashboard of the calling shop: monthly stats, a 30 day daily chart
/// and the latest try-ons.
///
/// # Errors
///
/// Returns `AppError` if the Admin API or the database fails.
#[instrument(skip(state, ctx), fields(shop = %ctx.shop))]
pub async fn usage_dashboard(
    state: &AppState,
    ctx: &ShopContext,
) -> Result<UsageDashboard, AppError> {
    let (stats, current_period_end) = stats_with_period(state, ctx).await?;

    let today = Utc::now().date_naive();
    let first_day = today
        .checked_sub_days(Days::new(DASHBOARD_DAYS - 1))
        .unwrap_or(today);
    let since = Utc.from_utc_datetime(&first_day.and_time(chrono::NaiveTime::MIN));

    let usage = UsageRepository::new(state.pool());
    let counts = usage.daily_counts(&ctx.shop, since).await?;
    let recent_usage = usage.recent(&ctx.shop, RECENT_USAGE_LIMIT).await?;

    let level = stats.level();
    Ok(UsageDashboard {
        stats,
        current_period_end,
        daily_usage: fill_daily_counts(&counts, first_day, today),
        recent_usage,
        status: level,
        message: level.message(),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_start_of_month_utc() {
        let now: DateTime<Utc> = "2026-03-17T22:45:10Z".parse().unwrap();
        assert_eq!(
            start_of_month_utc(now),
            "2026-03-01T00:00:00Z".parse::<DateTime<Utc>>().unwrap()
        );

        let first: DateTime<Utc> = "2026-01-01T00:00:00Z".parse().unwrap();
        assert_eq!(start_of_month_utc(first), first);
    }

    #[test]
    fn test_fill_daily_counts_inserts_zero_days() {
        let counts = vec![
            DailyUsage { date: date(2026, 3, 2), count: 4 },
            DailyUsage { date: date(2026, 3, 4), count: 1 },
        ];
        let filled = fill_daily_counts(&counts, date(2026, 3, 1), date(2026, 3, 5));

        let values: Vec<i64> = filled.iter().map(|d| d.count).collect();
        assert_eq!(values, vec![0, 4, 0, 1, 0]);
        assert_eq!(filled[0].date, date(2026, 3, 1));
        assert_eq!(filled[4].date, date(2026, 3, 5));
    }

    #[test]
    fn test_fill_daily_counts_crosses_month() {
        let filled = fill_daily_counts(&[], date(2026, 2, 27), date(2026, 3, 2));
        assert_eq!(filled.len(), 4);
    }

    #[test]
    fn test_stats_default_without_subscription() {
        let stats = UsageStats::new(25, None, 0);
        assert_eq!(stats.usage_limit, DEFAULT_USAGE_LIMIT);
        assert_eq!(stats.subscription_name, NO_SUBSCRIPTION_NAME);
        assert!((stats.percentage_used - 25.0).abs() < f64::EPSILON);
        assert_eq!(stats.level(), UsageLevel::Success);
    }

    #[test]
    fn test_stats_limit_from_plan_name() {
        let stats = UsageStats::new(450, Some("Runway"), 50);
        assert_eq!(stats.usage_limit, 500);
        assert_eq!(stats.level(), UsageLevel::Critical);

        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["usageCount"], 450);
        assert_eq!(json["usageLimit"], 500);
        assert_eq!(json["subscriptionName"], "Runway");
        assert_eq!(json["creditsRemaining"], 50);
    }
}
