//! Try-on usage metering.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use sqlx::PgPool;
use vton_core::{ShopDomain, UsageRecordId};

use super::RepositoryError;

/// A metered try-on.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct UsageRecord {
    pub id: UsageRecordId,
    pub shop: ShopDomain,
    pub product_id: String,
    pub subscription_id: Option<String>,
    pub used_at: DateTime<Utc>,
}

/// Result of a successful [`UsageRepository::record_try_on`].
#[derive(Debug, Clone)]
pub struct TryOnReceipt {
    pub usage: UsageRecord,
    /// Credits left after this try-on.
    pub credits_remaining: i32,
}

/// Number of try-ons on one UTC day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct DailyUsage {
    pub date: NaiveDate,
    pub count: i64,
}

const USAGE_COLUMNS: &str = "id, shop, product_id, subscription_id, used_at";

/// Repository for usage database operations.
pub struct UsageRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> UsageRepository<'a> {
    /// Create a new usage repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Consume one credit and record the try-on.
    ///
    /// Both writes happen in one transaction. The decrement only matches a
    /// row with `amount > 0`, so concurrent calls can never drive the balance
    /// negative. Returns `None`, writing nothing, when no credit is left.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn record_try_on(
        &self,
        shop: &ShopDomain,
        product_id: &str,
        subscription_id: Option<&str>,
    ) -> Result<Option<TryOnReceipt>, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let remaining = sqlx::query_scalar::<_, i32>(
            r"
            UPDATE vton.credits
            SET amount = amount - 1, updated_at = NOW()
            WHERE shop = $1 AND amount > 0
            RETURNING amount
            ",
        )
        .bind(shop.as_str())
        .fetch_optional(&mut *tx)
        .await?;

        let Some(credits_remaining) = remaining else {
            tx.rollback().await?;
            return Ok(None);
        };

        let usage = sqlx::query_as::<_, UsageRecord>(&format!(
            r"
            INSERT INTO vton.try_on_usage (shop, product_id, subscription_id)
            VALUES ($1, $2, $3)
            RETURNING {USAGE_COLUMNS}
            "
        ))
        .bind(shop.as_str())
        .bind(product_id)
        .bind(subscription_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(Some(TryOnReceipt {
            usage,
            credits_remaining,
        }))
    }

    /// Undo a recorded try-on: delete its usage row and give the credit
    /// back.
    ///
    /// Returns `false`, changing nothing, if the row no longer exists.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn refund(
        &self,
        shop: &ShopDomain,
        usage_id: UsageRecordId,
    ) -> Result<bool, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let deleted = sqlx::query("DELETE FROM vton.try_on_usage WHERE id = $1 AND shop = $2")
            .bind(usage_id)
            .bind(shop.as_str())
            .execute(&mut *tx)
            .await?
            .rows_affected();

        if deleted == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        sqlx::query(
            r"
            UPDATE vton.credits
            SET amount = amount + 1, updated_at = NOW()
            WHERE shop = $1
            ",
        )
        .bind(shop.as_str())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(true)
    }

    /// Number of try-ons since `since`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn count_since(
        &self,
        shop: &ShopDomain,
        since: DateTime<Utc>,
    ) -> Result<i64, RepositoryError> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM vton.try_on_usage WHERE shop = $1 AND used_at >= $2",
        )
        .bind(shop.as_str())
        .bind(since)
        .fetch_one(self.pool)
        .await?;

        Ok(count)
    }

    /// Try-ons per UTC day since `since`, oldest first. Days without usage
    /// are omitted.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn daily_counts(
        &self,
        shop: &ShopDomain,
        since: DateTime<Utc>,
    ) -> Result<Vec<DailyUsage>, RepositoryError> {
        let rows = sqlx::query_as::<_, DailyUsage>(
            r"
            SELECT (used_at AT TIME ZONE 'UTC')::date AS date, COUNT(*) AS count
            FROM vton.try_on_usage
            WHERE shop = $1 AND used_at >= $2
            GROUP BY 1
            ORDER BY 1
            ",
        )
        .bind(shop.as_str())
        .bind(since)
        .fetch_all(self.pool)
        .await?;

        Ok(rows)
    }

    /// Most recent try-ons, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn recent(
        &self,
        shop: &ShopDomain,
        limit: i64,
    ) -> Result<Vec<UsageRecord>, RepositoryError> {
        let rows = sqlx::query_as::<_, UsageRecord>(&format!(
            r"
            SELECT {USAGE_COLUMNS}
            FROM vton.try_on_usage
            WHERE shop = $1
            ORDER BY used_at DESC, id DESC
            LIMIT $2
            "
        ))
        .bind(shop.as_str())
        .bind(limit)
        .fetch_all(self.pool)
        .await?;

        Ok(rows)
    }
}
