use super::SqliteSubscriptionStore;
use crate::error::{Error, Result};

impl SqliteSubscriptionStore {
    /// Run database migrations
    pub(super) async fn migrate(&self) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS subscriptions (
                subscriber_id INTEGER NOT NULL,
                group_key TEXT NOT NULL,
                item_key TEXT NOT NULL,
                last_known_full BOOLEAN,
                orphaned BOOLEAN NOT NULL DEFAULT FALSE,
                created_at TIMESTAMP NOT NULL,
                updated_at TIMESTAMP NOT NULL,
                PRIMARY KEY (subscriber_id, group_key, item_key)
            )
            "#,
        )
        .execute(&mut *tx)
        .await
        .map_err(|e| Error::Internal(format!("Migration failed (subscriptions): {}", e)))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_subscriptions_item ON subscriptions(group_key, item_key)",
        )
        .execute(&mut *tx)
        .await
        .map_err(|e| Error::Internal(format!("Migration failed (idx_subscriptions_item): {}", e)))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS chat_states (
                chat_id INTEGER PRIMARY KEY,
                state TEXT NOT NULL,
                updated_at TIMESTAMP NOT NULL
            )
            "#,
        )
        .execute(&mut *tx)
        .await
        .map_err(|e| Error::Internal(format!("Migration failed (chat_states): {}", e)))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS usage_stats (
                action TEXT PRIMARY KEY,
                count INTEGER NOT NULL DEFAULT 0
            )
            "#,
        )
        .execute(&mut *tx)
        .await
        .map_err(|e| Error::Internal(format!("Migration failed (usage_stats): {}", e)))?;

        tx.commit().await?;
        Ok(())
    }
}
