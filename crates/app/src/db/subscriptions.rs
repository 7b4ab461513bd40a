//! Local record of app subscriptions.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use vton_core::{ShopDomain, SubscriptionStatus};

use super::RepositoryError;

/// A subscription charge as last seen by the app.
#[derive(Debug, Clone)]
pub struct Subscription {
    pub id: i32,
    /// Numeric Shopify charge id.
    pub charge_id: String,
    pub shop: ShopDomain,
    pub session_id: Option<String>,
    /// Plan name as sent to Shopify.
    pub name: String,
    pub status: SubscriptionStatus,
    pub test: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for [`SubscriptionRepository::upsert`].
#[derive(Debug, Clone, Copy)]
pub struct NewSubscription<'a> {
    pub charge_id: &'a str,
    pub shop: &'a ShopDomain,
    pub session_id: Option<&'a str>,
    pub name: &'a str,
    pub status: SubscriptionStatus,
    pub test: bool,
}

/// Result of [`SubscriptionRepository::upsert`].
#[derive(Debug, Clone)]
pub struct UpsertedSubscription {
    pub subscription: Subscription,
    /// Status stored before this write; `None` for a new charge.
    pub previous_status: Option<SubscriptionStatus>,
}

#[derive(Debug, sqlx::FromRow)]
struct SubscriptionRow {
    id: i32,
    charge_id: String,
    shop: ShopDomain,
    session_id: Option<String>,
    name: String,
    status: String,
    test: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<SubscriptionRow> for Subscription {
    type Error = RepositoryError;

    fn try_from(row: SubscriptionRow) -> Result<Self, Self::Error> {
        let status = parse_status(&row.status)?;

        Ok(Self {
            id: row.id,
            charge_id: row.charge_id,
            shop: row.shop,
            session_id: row.session_id,
            name: row.name,
            status,
            test: row.test,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn parse_status(status: &str) -> Result<SubscriptionStatus, RepositoryError> {
    status
        .parse::<SubscriptionStatus>()
        .map_err(RepositoryError::DataCorruption)
}

const SUBSCRIPTION_COLUMNS: &str =
    "id, charge_id, shop, session_id, name, status, test, created_at, updated_at";

/// Repository for subscription database operations.
pub struct SubscriptionRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> SubscriptionRepository<'a> {
    /// Create a new subscription repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Insert a subscription, or update the status of an existing one with
    /// the same charge id.
    ///
    /// The existing row is locked before it is overwritten, so concurrent
    /// callers for one charge observe each other's status in
    /// [`UpsertedSubscription::previous_status`].
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails, or
    /// `RepositoryError::DataCorruption` if a stored status is unknown.
    pub async fn upsert(
        &self,
        new: NewSubscription<'_>,
    ) -> Result<UpsertedSubscription, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let previous = sqlx::query_scalar::<_, String>(
            "SELECT status FROM vton.subscription WHERE charge_id = $1 FOR UPDATE",
        )
        .bind(new.charge_id)
        .fetch_optional(&mut *tx)
        .await?;

        let row = sqlx::query_as::<_, SubscriptionRow>(&format!(
            r"
            INSERT INTO vton.subscription (charge_id, shop, session_id, name, status, test)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (charge_id) DO UPDATE SET
                status = EXCLUDED.status,
                updated_at = NOW()
            RETURNING {SUBSCRIPTION_COLUMNS}
            "
        ))
        .bind(new.charge_id)
        .bind(new.shop.as_str())
        .bind(new.session_id)
        .bind(new.name)
        .bind(new.status.as_str())
        .bind(new.test)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(UpsertedSubscription {
            subscription: Subscription::try_from(row)?,
            previous_status: previous.as_deref().map(parse_status).transpose()?,
        })
    }

    /// Update the status of a known charge.
    ///
    /// Returns the status stored before the update, or `None` if no
    /// subscription has this charge id.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails, or
    /// `RepositoryError::DataCorruption` if the stored status is unknown.
    pub async fn update_status(
        &self,
        charge_id: &str,
        status: SubscriptionStatus,
    ) -> Result<Option<SubscriptionStatus>, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let previous = sqlx::query_scalar::<_, String>(
            "SELECT status FROM vton.subscription WHERE charge_id = $1 FOR UPDATE",
        )
        .bind(charge_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(previous) = previous else {
            tx.rollback().await?;
            return Ok(None);
        };

        sqlx::query(
            r"
            UPDATE vton.subscription
            SET status = $2, updated_at = NOW()
            WHERE charge_id = $1
            ",
        )
        .bind(charge_id)
        .bind(status.as_str())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        parse_status(&previous).map(Some)
    }

    /// Most recently created subscription of a shop.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails, or
    /// `RepositoryError::DataCorruption` if the stored status is unknown.
    pub async fn latest_for_shop(
        &self,
        shop: &ShopDomain,
    ) -> Result<Option<Subscription>, RepositoryError> {
        let row = sqlx::query_as::<_, SubscriptionRow>(&format!(
            r"
            SELECT {SUBSCRIPTION_COLUMNS}
            FROM vton.subscription
            WHERE shop = $1
            ORDER BY created_at DESC, id DESC
            LIMIT 1
            "
        ))
        .bind(shop.as_str())
        .fetch_optional(self.pool)
        .await?;

        row.map(Subscription::try_from).transpose()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn row(status: &str) -> SubscriptionRow {
        SubscriptionRow {
            id: 1,
            charge_id: "27000000".to_string(),
            shop: ShopDomain::parse("demo.myshopify.com").unwrap(),
            session_id: Some("offline_demo.myshopify.com".to_string()),
            name: "Runway".to_string(),
            status: status.to_string(),
            test: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_row_conversion() {
        let subscription = Subscription::try_from(row("ACTIVE")).unwrap();
        assert_eq!(subscription.status, SubscriptionStatus::Active);
        assert_eq!(subscription.name, "Runway");
    }

    #[test]
    fn test_row_conversion_rejects_unknown_status() {
        let result = Subscription::try_from(row("PAUSED"));
        assert!(matches!(result, Err(RepositoryError::DataCorruption(_))));
    }
}
