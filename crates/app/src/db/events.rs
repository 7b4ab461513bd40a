//! Subscription webhook audit trail.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use vton_core::{ShopDomain, SubscriptionEventId, SubscriptionEventKind};

use super::RepositoryError;

/// A recorded `APP_SUBSCRIPTIONS_UPDATE` webhook.
#[derive(Debug, Clone)]
pub struct SubscriptionEvent {
    pub id: SubscriptionEventId,
    pub shop: ShopDomain,
    pub subscription_id: String,
    pub kind: SubscriptionEventKind,
    /// Raw status string from the webhook payload.
    pub status: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
struct SubscriptionEventRow {
    id: SubscriptionEventId,
    shop: ShopDomain,
    subscription_id: String,
    event: String,
    status: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<SubscriptionEventRow> for SubscriptionEvent {
    type Error = RepositoryError;

    fn try_from(row: SubscriptionEventRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            shop: row.shop,
            subscription_id: row.subscription_id,
            kind: row
                .event
                .parse()
                .map_err(RepositoryError::DataCorruption)?,
            status: row.status,
            created_at: row.created_at,
        })
    }
}

/// Repository for subscription event database operations.
pub struct SubscriptionEventRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> SubscriptionEventRepository<'a> {
    /// Create a new subscription event repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Append an event.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn record(
        &self,
        shop: &ShopDomain,
        subscription_id: &str,
        kind: SubscriptionEventKind,
        status: &str,
    ) -> Result<SubscriptionEventId, RepositoryError> {
        let id = sqlx::query_scalar::<_, SubscriptionEventId>(
            r"
            INSERT INTO vton.subscription_event (shop, subscription_id, event, status)
            VALUES ($1, $2, $3, $4)
            RETURNING id
            ",
        )
        .bind(shop.as_str())
        .bind(subscription_id)
        .bind(kind.as_str())
        .bind(status)
        .fetch_one(self.pool)
        .await?;

        Ok(id)
    }

    /// Most recent events of a shop, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails, or
    /// `RepositoryError::DataCorruption` if a stored event kind is unknown.
    pub async fn recent_for_shop(
        &self,
        shop: &ShopDomain,
        limit: i64,
    ) -> Result<Vec<SubscriptionEvent>, RepositoryError> {
        let rows = sqlx::query_as::<_, SubscriptionEventRow>(
            r"
            SELECT id, shop, subscription_id, event, status, created_at
            FROM vton.subscription_event
            WHERE shop = $1
            ORDER BY created_at DESC, id DESC
            LIMIT $2
            ",
        )
        .bind(shop.as_str())
        .bind(limit)
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(SubscriptionEvent::try_from).collect()
    }
}
