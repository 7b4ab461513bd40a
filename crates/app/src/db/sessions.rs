//! Offline Admin API session storage.

use chrono::{DateTime, Utc};
use secrecy::SecretString;
use sqlx::PgPool;
use vton_core::ShopDomain;

use super::RepositoryError;

/// An offline session for a shop.
///
/// Implements `Debug` manually to redact the access token.
#[derive(Clone)]
pub struct StoredSession {
    /// Session id (`offline_<shop>`).
    pub id: String,
    pub shop: ShopDomain,
    /// Admin API access token (redacted in debug output).
    pub access_token: SecretString,
    /// Granted scopes.
    pub scopes: Vec<String>,
    pub updated_at: DateTime<Utc>,
}

impl std::fmt::Debug for StoredSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoredSession")
            .field("id", &self.id)
            .field("shop", &self.shop)
            .field("access_token", &"[REDACTED]")
            .field("scopes", &self.scopes)
            .field("updated_at", &self.updated_at)
            .finish()
    }
}

#[derive(Debug, sqlx::FromRow)]
struct SessionRow {
    id: String,
    shop: ShopDomain,
    access_token: String,
    scope: String,
    updated_at: DateTime<Utc>,
}

impl From<SessionRow> for StoredSession {
    fn from(row: SessionRow) -> Self {
        let scopes = row
            .scope
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        Self {
            id: row.id,
            shop: row.shop,
            access_token: SecretString::from(row.access_token),
            scopes,
            updated_at: row.updated_at,
        }
    }
}

/// Repository for session database operations.
pub struct SessionRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> SessionRepository<'a> {
    /// Create a new session repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Store or replace the offline session for a shop.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn store(
        &self,
        shop: &ShopDomain,
        access_token: &str,
        scopes: &[String],
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            INSERT INTO vton.session (id, shop, access_token, scope, is_online)
            VALUES ($1, $2, $3, $4, FALSE)
            ON CONFLICT (id) DO UPDATE SET
                access_token = EXCLUDED.access_token,
                scope = EXCLUDED.scope,
                updated_at = NOW()
            ",
        )
        .bind(shop.offline_session_id())
        .bind(shop.as_str())
        .bind(access_token)
        .bind(scopes.join(","))
        .execute(self.pool)
        .await?;

        Ok(())
    }

    /// Get the offline session for a shop.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn find_by_shop(
        &self,
        shop: &ShopDomain,
    ) -> Result<Option<StoredSession>, RepositoryError> {
        let row = sqlx::query_as::<_, SessionRow>(
            r"
            SELECT id, shop, access_token, scope, updated_at
            FROM vton.session
            WHERE shop = $1 AND is_online = FALSE
            ORDER BY updated_at DESC
            LIMIT 1
            ",
        )
        .bind(shop.as_str())
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(StoredSession::from))
    }

    /// Delete every session of a shop.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn delete_by_shop(&self, shop: &ShopDomain) -> Result<u64, RepositoryError> {
        let result = sqlx::query("DELETE FROM vton.session WHERE shop = $1")
            .bind(shop.as_str())
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use secrecy::ExposeSecret;

    use super::*;

    fn row() -> SessionRow {
        SessionRow {
            id: "offline_demo.myshopify.com".to_string(),
            shop: ShopDomain::parse("demo.myshopify.com").unwrap(),
            access_token: "shpat_abc123".to_string(),
            scope: "write_products, read_products,".to_string(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_row_conversion_splits_scopes() {
        let session = StoredSession::from(row());
        assert_eq!(session.scopes, vec!["write_products", "read_products"]);
        assert_eq!(session.access_token.expose_secret(), "shpat_abc123");
    }

    #[test]
    fn test_debug_redacts_token() {
        let debug_output = format!("{:?}", StoredSession::from(row()));
        assert!(debug_output.contains("demo.myshopify.com"));
        assert!(!debug_output.contains("shpat_abc123"));
    }
}
