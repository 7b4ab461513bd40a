//! Plan-derived usage limits and remaining credits.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use vton_core::ShopDomain;

use super::RepositoryError;

/// Monthly try-on limit of a shop.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UsageLimit {
    pub shop: ShopDomain,
    pub usage_limit: i32,
    pub plan_name: String,
    pub updated_at: DateTime<Utc>,
}

/// Repository for usage limit database operations.
pub struct UsageLimitRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> UsageLimitRepository<'a> {
    /// Create a new usage limit repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Set the limit and plan name of a shop.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn upsert(
        &self,
        shop: &ShopDomain,
        usage_limit: i32,
        plan_name: &str,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            INSERT INTO vton.usage_limit (shop, usage_limit, plan_name)
            VALUES ($1, $2, $3)
            ON CONFLICT (shop) DO UPDATE SET
                usage_limit = EXCLUDED.usage_limit,
                plan_name = EXCLUDED.plan_name,
                updated_at = NOW()
            ",
        )
        .bind(shop.as_str())
        .bind(usage_limit)
        .bind(plan_name)
        .execute(self.pool)
        .await?;

        Ok(())
    }

    /// Get the limit of a shop.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, shop: &ShopDomain) -> Result<Option<UsageLimit>, RepositoryError> {
        let limit = sqlx::query_as::<_, UsageLimit>(
            r"
            SELECT shop, usage_limit, plan_name, updated_at
            FROM vton.usage_limit
            WHERE shop = $1
            ",
        )
        .bind(shop.as_str())
        .fetch_optional(self.pool)
        .await?;

        Ok(limit)
    }
}

/// Repository for credit balance database operations.
///
/// Decrements happen in [`super::UsageRepository::record_try_on`] so they
/// share a transaction with the usage row.
pub struct CreditsRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CreditsRepository<'a> {
    /// Create a new credits repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Set the remaining credits of a shop.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails (including a
    /// negative `amount`, rejected by the table constraint).
    pub async fn reset(&self, shop: &ShopDomain, amount: i32) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            INSERT INTO vton.credits (shop, amount)
            VALUES ($1, $2)
            ON CONFLICT (shop) DO UPDATE SET
                amount = EXCLUDED.amount,
                updated_at = NOW()
            ",
        )
        .bind(shop.as_str())
        .bind(amount)
        .execute(self.pool)
        .await?;

        Ok(())
    }

    /// Remaining credits of a shop, `None` if never granted.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, shop: &ShopDomain) -> Result<Option<i32>, RepositoryError> {
        let amount =
            sqlx::query_scalar::<_, i32>("SELECT amount FROM vton.credits WHERE shop = $1")
                .bind(shop.as_str())
                .fetch_optional(self.pool)
                .await?;

        Ok(amount)
    }
}
