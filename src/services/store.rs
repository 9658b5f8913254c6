//! String-keyed blob storage backing the snapshot cache.
//!
//! Two backends: a moka in-memory cache for single-process deployments and
//! tests, and a Postgres table through sea-orm that survives restarts.

use async_trait::async_trait;
use chrono::Utc;
use moka::future::Cache;
use sea_orm::sea_query::OnConflict;
use sea_orm::{DatabaseConnection, EntityTrait, Set};
use std::sync::Arc;

use crate::entity::timeline_cache;
use crate::error::AppResult;

#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> AppResult<Option<String>>;

    async fn set(&self, key: &str, value: String) -> AppResult<()>;
}

/// In-memory store weighted by payload size.
#[derive(Clone)]
pub struct MemoryStore {
    entries: Cache<String, Arc<String>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new(max_bytes: u64) -> Self {
        let entries = Cache::builder()
            .weigher(|key: &String, value: &Arc<String>| -> u32 {
                (key.len() + value.len()).try_into().unwrap_or(u32::MAX)
            })
            .max_capacity(max_bytes)
            .build();
        Self { entries }
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> AppResult<Option<String>> {
        Ok(self.entries.get(key).await.map(|v| v.as_ref().clone()))
    }

    async fn set(&self, key: &str, value: String) -> AppResult<()> {
        self.entries.insert(key.to_string(), Arc::new(value)).await;
        Ok(())
    }
}

/// Postgres-backed store, one row per key in `timeline_cache`.
#[derive(Clone)]
pub struct DbStore {
    db: DatabaseConnection,
}

impl DbStore {
    #[must_use]
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl KeyValueStore for DbStore {
    async fn get(&self, key: &str) -> AppResult<Option<String>> {
        let row = timeline_cache::Entity::find_by_id(key.to_string())
            .one(&self.db)
            .await?;
        Ok(row.map(|r| r.payload))
    }

    async fn set(&self, key: &str, value: String) -> AppResult<()> {
        let row = timeline_cache::ActiveModel {
            key: Set(key.to_string()),
            payload: Set(value),
            updated_at: Set(Utc::now().into()),
        };

        timeline_cache::Entity::insert(row)
            .on_conflict(
                OnConflict::column(timeline_cache::Column::Key)
                    .update_columns([
                        timeline_cache::Column::Payload,
                        timeline_cache::Column::UpdatedAt,
                    ])
                    .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await?;
        Ok(())
    }
}
