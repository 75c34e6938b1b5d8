//! SQLite 存储
//!
//! 单连接 + 互斥锁；每次调用都是短小的同步语句，幂等性依赖 INSERT OR REPLACE / OR IGNORE。

use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;

use super::{batch_record_ids, AgentStatusRecord, CreateManyOutcome, ItemStoreError, RecommendationStore};
use crate::core::{AgentStatus, Category, PersistenceError};
use crate::normalize::CanonicalRecommendation;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS recommendations (
    id TEXT PRIMARY KEY,
    trip_id TEXT NOT NULL,
    category TEXT NOT NULL,
    payload TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS trip_recommendations (
    trip_id TEXT NOT NULL,
    category TEXT NOT NULL,
    rec_id TEXT NOT NULL,
    position INTEGER NOT NULL,
    PRIMARY KEY (trip_id, category, rec_id)
);
CREATE TABLE IF NOT EXISTS agent_status (
    trip_id TEXT NOT NULL,
    agent TEXT NOT NULL,
    status TEXT NOT NULL,
    metadata TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    PRIMARY KEY (trip_id, agent)
);
";

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, PersistenceError> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| PersistenceError::Backend(e.to_string()))?;
            }
        }
        Self::with_connection(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self, PersistenceError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, PersistenceError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, PersistenceError> {
        self.conn
            .lock()
            .map_err(|_| PersistenceError::Backend("sqlite connection lock poisoned".to_string()))
    }
}

#[async_trait]
impl RecommendationStore for SqliteStore {
    async fn create_many(
        &self,
        trip_id: &str,
        category: Category,
        records: &[CanonicalRecommendation],
    ) -> Result<CreateManyOutcome, PersistenceError> {
        let conn = self.lock()?;
        let now = Utc::now().to_rfc3339();
        let mut outcome = CreateManyOutcome::default();

        let ids = batch_record_ids(trip_id, category, records);
        for (index, (record, id)) in records.iter().zip(ids).enumerate() {
            let written = serde_json::to_string(record)
                .map_err(PersistenceError::from)
                .and_then(|payload| {
                    conn.execute(
                        "INSERT OR REPLACE INTO recommendations (id, trip_id, category, payload, updated_at)
                         VALUES (?1, ?2, ?3, ?4, ?5)",
                        params![id, trip_id, category.as_str(), payload, now],
                    )
                    .map_err(PersistenceError::from)
                });
            match written {
                Ok(_) => {
                    if !outcome.inserted_ids.contains(&id) {
                        outcome.inserted_ids.push(id);
                    }
                }
                Err(e) => outcome.per_item_errors.push(ItemStoreError {
                    index,
                    message: e.to_string(),
                }),
            }
        }
        Ok(outcome)
    }

    async fn append_ids(
        &self,
        trip_id: &str,
        category: Category,
        ids: &[String],
    ) -> Result<(), PersistenceError> {
        let conn = self.lock()?;
        let start: i64 = conn.query_row(
            "SELECT COUNT(*) FROM trip_recommendations WHERE trip_id = ?1 AND category = ?2",
            params![trip_id, category.as_str()],
            |row| row.get(0),
        )?;
        for (offset, id) in ids.iter().enumerate() {
            conn.execute(
                "INSERT OR IGNORE INTO trip_recommendations (trip_id, category, rec_id, position)
                 VALUES (?1, ?2, ?3, ?4)",
                params![trip_id, category.as_str(), id, start + offset as i64],
            )?;
        }
        Ok(())
    }

    async fn set_agent_status(
        &self,
        trip_id: &str,
        agent: &str,
        status: AgentStatus,
        metadata: Value,
    ) -> Result<(), PersistenceError> {
        let metadata = serde_json::to_string(&metadata)?;
        let conn = self.lock()?;
        conn.execute(
            "INSERT OR REPLACE INTO agent_status (trip_id, agent, status, metadata, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![trip_id, agent, status.as_str(), metadata, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    async fn list_ids(&self, trip_id: &str, category: Category) -> Result<Vec<String>, PersistenceError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT rec_id FROM trip_recommendations
             WHERE trip_id = ?1 AND category = ?2 ORDER BY position",
        )?;
        let ids = stmt
            .query_map(params![trip_id, category.as_str()], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ids)
    }

    async fn agent_status(
        &self,
        trip_id: &str,
        agent: &str,
    ) -> Result<Option<AgentStatusRecord>, PersistenceError> {
        let conn = self.lock()?;
        let row = conn
            .query_row(
                "SELECT status, metadata, updated_at FROM agent_status WHERE trip_id = ?1 AND agent = ?2",
                params![trip_id, agent],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                },
            )
            .optional()?;

        let Some((status, metadata, updated_at)) = row else {
            return Ok(None);
        };
        let status: AgentStatus = serde_json::from_value(Value::String(status))?;
        let updated_at = DateTime::parse_from_rfc3339(&updated_at)
            .map(|t| t.with_timezone(&Utc))
            .map_err(|e| PersistenceError::Backend(e.to_string()))?;
        Ok(Some(AgentStatusRecord {
            agent: agent.to_string(),
            status,
            metadata: serde_json::from_str(&metadata)?,
            updated_at,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::sample;
    use super::*;

    #[tokio::test]
    async fn test_sqlite_round_trip_and_idempotent_writes() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteStore::open(dir.path().join("db").join("wayfarer.db")).unwrap();

        let records = vec![sample("Louvre"), sample("Sainte-Chapelle")];
        let out = store.create_many("trip_9", Category::Activity, &records).await.unwrap();
        assert_eq!(out.inserted_ids.len(), 2);
        assert!(out.per_item_errors.is_empty());

        store.append_ids("trip_9", Category::Activity, &out.inserted_ids).await.unwrap();
        store.append_ids("trip_9", Category::Activity, &out.inserted_ids).await.unwrap();
        let ids = store.list_ids("trip_9", Category::Activity).await.unwrap();
        assert_eq!(ids, out.inserted_ids);
    }

    #[tokio::test]
    async fn test_sqlite_agent_status() {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .set_agent_status("trip_9", "restaurant", AgentStatus::Failed, serde_json::json!({"error": "timeout"}))
            .await
            .unwrap();
        let rec = store.agent_status("trip_9", "restaurant").await.unwrap().unwrap();
        assert_eq!(rec.status, AgentStatus::Failed);
        assert_eq!(rec.metadata["error"], "timeout");
        assert!(store.agent_status("trip_9", "flight").await.unwrap().is_none());
    }
}
