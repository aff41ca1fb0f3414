use async_trait::async_trait;
use chrono::Utc;
use tracing::debug;

use super::SqliteSubscriptionStore;
use crate::error::Result;
use crate::subscriptions::{Subscription, SubscriptionStore};

const SELECT_COLUMNS: &str = r#"
    SELECT subscriber_id, group_key, item_key, last_known_full, orphaned, created_at, updated_at
    FROM subscriptions
"#;

#[async_trait]
impl SubscriptionStore for SqliteSubscriptionStore {
    async fn upsert(&self, subscriber_id: i64, group_key: &str, item_keys: &[String]) -> Result<()> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        for item_key in item_keys {
            sqlx::query(
                r#"
                INSERT INTO subscriptions (
                    subscriber_id, group_key, item_key, last_known_full, orphaned,
                    created_at, updated_at
                ) VALUES (?, ?, ?, NULL, FALSE, ?, ?)
                ON CONFLICT (subscriber_id, group_key, item_key)
                DO UPDATE SET updated_at = excluded.updated_at
                "#,
            )
            .bind(subscriber_id)
            .bind(group_key)
            .bind(item_key)
            .bind(now)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        debug!(
            subscriber_id,
            group = group_key,
            items = item_keys.len(),
            "Subscriptions upserted"
        );
        Ok(())
    }

    async fn remove_group(&self, subscriber_id: i64, group_key: &str) -> Result<u64> {
        let result = sqlx::query("DELETE FROM subscriptions WHERE subscriber_id = ? AND group_key = ?")
            .bind(subscriber_id)
            .bind(group_key)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    async fn remove_item(&self, subscriber_id: i64, group_key: &str, item_key: &str) -> Result<u64> {
        let result = sqlx::query(
            "DELETE FROM subscriptions WHERE subscriber_id = ? AND group_key = ? AND item_key = ?",
        )
        .bind(subscriber_id)
        .bind(group_key)
        .bind(item_key)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn clear_all(&self, subscriber_id: i64) -> Result<u64> {
        let result = sqlx::query("DELETE FROM subscriptions WHERE subscriber_id = ?")
            .bind(subscriber_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    async fn list_for_subscriber(&self, subscriber_id: i64) -> Result<Vec<Subscription>> {
        let sql = format!(
            "{} WHERE subscriber_id = ? ORDER BY group_key, item_key",
            SELECT_COLUMNS
        );
        let rows = sqlx::query_as::<_, Subscription>(&sql)
            .bind(subscriber_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows)
    }

    async fn list_all(&self) -> Result<Vec<Subscription>> {
        let sql = format!(
            "{} ORDER BY group_key, item_key, subscriber_id",
            SELECT_COLUMNS
        );
        let rows = sqlx::query_as::<_, Subscription>(&sql)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows)
    }

    async fn update_state(&self, subscription: &Subscription) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE subscriptions
            SET last_known_full = ?, orphaned = ?, updated_at = ?
            WHERE subscriber_id = ? AND group_key = ? AND item_key = ?
            "#,
        )
        .bind(subscription.last_known_full)
        .bind(subscription.orphaned)
        .bind(Utc::now())
        .bind(subscription.subscriber_id)
        .bind(&subscription.group_key)
        .bind(&subscription.item_key)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
