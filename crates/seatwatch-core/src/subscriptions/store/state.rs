use async_trait::async_trait;
use chrono::Utc;
use sqlx::Row;
use tracing::debug;

use super::SqliteSubscriptionStore;
use crate::error::Result;
use crate::stats::StatsStore;
use crate::subscriptions::ChatStateStore;

#[async_trait]
impl ChatStateStore for SqliteSubscriptionStore {
    async fn set_chat_state(&self, chat_id: i64, state: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO chat_states (chat_id, state, updated_at) VALUES (?, ?, ?)
            ON CONFLICT (chat_id)
            DO UPDATE SET state = excluded.state, updated_at = excluded.updated_at
            "#,
        )
        .bind(chat_id)
        .bind(state)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        debug!(chat_id, state, "Chat state set");
        Ok(())
    }

    async fn take_chat_state(&self, chat_id: i64) -> Result<Option<String>> {
        let mut tx = self.pool.begin().await?;

        let state: Option<String> =
            sqlx::query_scalar("SELECT state FROM chat_states WHERE chat_id = ?")
                .bind(chat_id)
                .fetch_optional(&mut *tx)
                .await?;

        if state.is_some() {
            sqlx::query("DELETE FROM chat_states WHERE chat_id = ?")
                .bind(chat_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(state)
    }

    async fn clear_chat_state(&self, chat_id: i64) -> Result<()> {
        sqlx::query("DELETE FROM chat_states WHERE chat_id = ?")
            .bind(chat_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl StatsStore for SqliteSubscriptionStore {
    async fn add_counts(&self, counts: &[(String, i64)]) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        for (action, count) in counts {
            sqlx::query(
                r#"
                INSERT INTO usage_stats (action, count) VALUES (?, ?)
                ON CONFLICT (action) DO UPDATE SET count = count + excluded.count
                "#,
            )
            .bind(action)
            .bind(count)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        debug!(actions = counts.len(), "Usage counters persisted");
        Ok(())
    }

    async fn load_counts(&self) -> Result<Vec<(String, i64)>> {
        let rows = sqlx::query("SELECT action, count FROM usage_stats ORDER BY count DESC, action")
            .fetch_all(&self.pool)
            .await?;

        let mut counts = Vec::with_capacity(rows.len());
        for row in rows {
            counts.push((row.try_get("action")?, row.try_get("count")?));
        }
        Ok(counts)
    }
}
