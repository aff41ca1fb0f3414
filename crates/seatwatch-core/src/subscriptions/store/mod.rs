//! Subscription storage using SQLite

mod migrations;
mod queries;
mod state;


use sqlx::{sqlite::SqlitePoolOptions, Pool, Sqlite};
use std::path::Path;
use tracing::info;

use crate::error::{Error, Result};

/// SQLite-based subscription store
pub struct SqliteSubscriptionStore {
    pub(super) pool: Pool<Sqlite>,
}

impl SqliteSubscriptionStore {
    /// Open (creating if needed) the database at `path`
    pub async fn from_path(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                Error::invalid_config("data_dir", format!("failed to create directory: {}", e))
            })?;
        }

        let url = format!("sqlite:{}?mode=rwc", path.display());
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&url)
            .await?;

        let store = Self { pool };
        store.migrate().await?;
        info!(path = %path.display(), "Subscription store opened");
        Ok(store)
    }

    /// Private in-memory database, mainly for tests
    pub async fn in_memory() -> Result<Self> {
        // Every in-memory connection is its own database; keep exactly one
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }
}
