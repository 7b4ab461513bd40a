//! Removal of everything stored for a shop.

use sqlx::PgPool;
use vton_core::ShopDomain;

use super::RepositoryError;

/// Every table holding per-shop rows.
const SHOP_TABLES: &[&str] = &[
    "vton.try_on_usage",
    "vton.subscription_event",
    "vton.subscription",
    "vton.credits",
    "vton.usage_limit",
    "vton.button_settings",
    "vton.session",
];

/// Repository for shop-wide data operations.
pub struct ShopDataRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ShopDataRepository<'a> {
    /// Create a new shop data repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Delete every row of a shop in one transaction.
    ///
    /// Returns the total number of rows deleted.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if any delete fails; nothing is
    /// deleted in that case.
    pub async fn purge(&self, shop: &ShopDomain) -> Result<u64, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let mut deleted = 0;

        for table in SHOP_TABLES {
            let result = sqlx::query(&format!("DELETE FROM {table} WHERE shop = $1"))
                .bind(shop.as_str())
                .execute(&mut *tx)
                .await?;
            deleted += result.rows_affected();
        }

        tx.commit().await?;
        Ok(deleted)
    }
}
