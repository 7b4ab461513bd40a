//! Storefront button settings storage.

use sqlx::PgPool;
use vton_core::{ButtonSettings, ShopDomain};

use super::RepositoryError;

#[derive(Debug, sqlx::FromRow)]
struct ButtonSettingsRow {
    button_text: String,
    button_position: String,
    is_enabled: bool,
}

impl TryFrom<ButtonSettingsRow> for ButtonSettings {
    type Error = RepositoryError;

    fn try_from(row: ButtonSettingsRow) -> Result<Self, Self::Error> {
        Ok(Self {
            button_text: row.button_text,
            button_position: row
                .button_position
                .parse()
                .map_err(RepositoryError::DataCorruption)?,
            is_enabled: row.is_enabled,
        })
    }
}

/// Repository for button settings database operations.
pub struct ButtonSettingsRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ButtonSettingsRepository<'a> {
    /// Create a new button settings repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get the settings of a shop.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails, or
    /// `RepositoryError::DataCorruption` if the stored position is unknown.
    pub async fn get(&self, shop: &ShopDomain) -> Result<Option<ButtonSettings>, RepositoryError> {
        let row = sqlx::query_as::<_, ButtonSettingsRow>(
            r"
            SELECT button_text, button_position, is_enabled
            FROM vton.button_settings
            WHERE shop = $1
            ",
        )
        .bind(shop.as_str())
        .fetch_optional(self.pool)
        .await?;

        row.map(ButtonSettings::try_from).transpose()
    }

    /// Replace the settings of a shop.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn upsert(
        &self,
        shop: &ShopDomain,
        settings: &ButtonSettings,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            INSERT INTO vton.button_settings (shop, button_text, button_position, is_enabled)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (shop) DO UPDATE SET
                button_text = EXCLUDED.button_text,
                button_position = EXCLUDED.button_position,
                is_enabled = EXCLUDED.is_enabled,
                updated_at = NOW()
            ",
        )
        .bind(shop.as_str())
        .bind(&settings.button_text)
        .bind(settings.button_position.as_str())
        .bind(settings.is_enabled)
        .execute(self.pool)
        .await?;

        Ok(())
    }

    /// Enable the button, creating default settings if the shop has none.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn enable_or_create(&self, shop: &ShopDomain) -> Result<(), RepositoryError> {
        let defaults = ButtonSettings::default();

        sqlx::query(
            r"
            INSERT INTO vton.button_settings (shop, button_text, button_position, is_enabled)
            VALUES ($1, $2, $3, TRUE)
            ON CONFLICT (shop) DO UPDATE SET
                is_enabled = TRUE,
                updated_at = NOW()
            ",
        )
        .bind(shop.as_str())
        .bind(&defaults.button_text)
        .bind(defaults.button_position.as_str())
        .execute(self.pool)
        .await?;

        Ok(())
    }

    /// Toggle the button of an existing settings row. No row is created.
    ///
    /// Returns the number of rows updated.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn set_enabled(&self, shop: &ShopDomain, enabled: bool) -> Result<u64, RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE vton.button_settings
            SET is_enabled = $2, updated_at = NOW()
            WHERE shop = $1
            ",
        )
        .bind(shop.as_str())
        .bind(enabled)
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}
