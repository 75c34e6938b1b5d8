//! 推荐持久化协作方
//!
//! 写入是尽力而为且幂等的：记录 ID 由 `{trip_id}:{category}:{slug}` 确定性生成，
//! 重复写入覆盖同一条记录。调用方只记录失败，从不因此中断运行。

mod sqlite;

pub use sqlite::SqliteStore;

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::RwLock;

use crate::core::{AgentStatus, Category, PersistenceError};
use crate::normalize::CanonicalRecommendation;

/// 单条写入失败
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemStoreError {
    pub index: usize,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CreateManyOutcome {
    pub inserted_ids: Vec<String>,
    pub per_item_errors: Vec<ItemStoreError>,
}

/// 某行程中某 Agent 的最新状态
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentStatusRecord {
    pub agent: String,
    pub status: AgentStatus,
    pub metadata: Value,
    pub updated_at: DateTime<Utc>,
}

#[async_trait]
pub trait RecommendationStore: Send + Sync {
    async fn create_many(
        &self,
        trip_id: &str,
        category: Category,
        records: &[CanonicalRecommendation],
    ) -> Result<CreateManyOutcome, PersistenceError>;

    /// 把推荐 ID 追加到行程（已存在的 ID 忽略）
    async fn append_ids(
        &self,
        trip_id: &str,
        category: Category,
        ids: &[String],
    ) -> Result<(), PersistenceError>;

    async fn set_agent_status(
        &self,
        trip_id: &str,
        agent: &str,
        status: AgentStatus,
        metadata: Value,
    ) -> Result<(), PersistenceError>;

    async fn list_ids(&self, trip_id: &str, category: Category) -> Result<Vec<String>, PersistenceError>;

    async fn agent_status(
        &self,
        trip_id: &str,
        agent: &str,
    ) -> Result<Option<AgentStatusRecord>, PersistenceError>;
}

fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut last_dash = true;
    for c in text.chars().flat_map(char::to_lowercase) {
        if c.is_alphanumeric() {
            slug.push(c);
            last_dash = false;
        } else if !last_dash {
            slug.push('-');
            last_dash = true;
        }
    }
    slug.trim_end_matches('-').to_string()
}

/// 确定性记录 ID（单条，按名称）
pub fn record_id(trip_id: &str, category: Category, record: &CanonicalRecommendation) -> String {
    format!("{trip_id}:{}:{}", category.as_str(), slugify(&record.name))
}

/// 一批记录的 ID：名称 slug 为空时退回外部 ID 或序号；同批内 slug 冲突时依次追加外部 ID、序号。
/// 同一输入顺序总是得到同一组 ID，重复写入仍然幂等。
pub fn batch_record_ids(
    trip_id: &str,
    category: Category,
    records: &[CanonicalRecommendation],
) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::with_capacity(records.len());
    let mut ids = Vec::with_capacity(records.len());
    for (index, record) in records.iter().enumerate() {
        let external = record
            .external_ids
            .values()
            .map(|v| slugify(v))
            .find(|v| !v.is_empty());
        let mut slug = slugify(&record.name);
        if slug.is_empty() {
            slug = external.clone().unwrap_or_else(|| format!("item-{}", index + 1));
        } else if seen.contains(&slug) {
            if let Some(ext) = &external {
                slug = format!("{slug}-{ext}");
            }
        }
        let mut candidate = slug.clone();
        let mut n = 2;
        while seen.contains(&candidate) {
            candidate = format!("{slug}-{n}");
            n += 1;
        }
        seen.insert(candidate.clone());
        ids.push(format!("{trip_id}:{}:{candidate}", category.as_str()));
    }
    ids
}

#[derive(Default)]
struct MemoryState {
    records: HashMap<String, CanonicalRecommendation>,
    trip_ids: HashMap<(String, Category), Vec<String>>,
    statuses: HashMap<(String, String), AgentStatusRecord>,
}

/// 进程内存储（测试与无数据库时的默认实现）
#[derive(Default)]
pub struct InMemoryStore {
    state: RwLock<MemoryState>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, id: &str) -> Option<CanonicalRecommendation> {
        self.state.read().await.records.get(id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.records.len()
    }
}

#[async_trait]
impl RecommendationStore for InMemoryStore {
    async fn create_many(
        &self,
        trip_id: &str,
        category: Category,
        records: &[CanonicalRecommendation],
    ) -> Result<CreateManyOutcome, PersistenceError> {
        let mut state = self.state.write().await;
        let mut outcome = CreateManyOutcome::default();
        for (record, id) in records.iter().zip(batch_record_ids(trip_id, category, records)) {
            state.records.insert(id.clone(), record.clone());
            if !outcome.inserted_ids.contains(&id) {
                outcome.inserted_ids.push(id);
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
        let mut state = self.state.write().await;
        let list = state
            .trip_ids
            .entry((trip_id.to_string(), category))
            .or_default();
        for id in ids {
            if !list.contains(id) {
                list.push(id.clone());
            }
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
        let record = AgentStatusRecord {
            agent: agent.to_string(),
            status,
            metadata,
            updated_at: Utc::now(),
        };
        self.state
            .write()
            .await
            .statuses
            .insert((trip_id.to_string(), agent.to_string()), record);
        Ok(())
    }

    async fn list_ids(&self, trip_id: &str, category: Category) -> Result<Vec<String>, PersistenceError> {
        Ok(self
            .state
            .read()
            .await
            .trip_ids
            .get(&(trip_id.to_string(), category))
            .cloned()
            .unwrap_or_default())
    }

    async fn agent_status(
        &self,
        trip_id: &str,
        agent: &str,
    ) -> Result<Option<AgentStatusRecord>, PersistenceError> {
        Ok(self
            .state
            .read()
            .await
            .statuses
            .get(&(trip_id.to_string(), agent.to_string()))
            .cloned())
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::normalize::{CategoryMetadata, Confidence, Location, Price, Rating};

    pub fn sample(name: &str) -> CanonicalRecommendation {
        CanonicalRecommendation {
            name: name.to_string(),
            description: String::new(),
            price: Price {
                amount: 25.0,
                currency: "EUR".into(),
                unit: "per_person".into(),
            },
            rating: Rating {
                score: 4.2,
                review_count: 12,
                source: "test".into(),
            },
            location: Location::default(),
            confidence: Confidence {
                score: 0.8,
                reasoning: "test".into(),
            },
            category_metadata: CategoryMetadata::Activity {
                activity_type: None,
                duration_minutes: None,
            },
            external_ids: Default::default(),
            images: vec![],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::sample;
    use super::*;

    #[test]
    fn test_record_id_is_deterministic() {
        let id = record_id("trip_1", Category::Activity, &sample("Musée d'Orsay — Tour"));
        assert_eq!(id, "trip_1:activity:musée-d-orsay-tour");
        assert_eq!(id, record_id("trip_1", Category::Activity, &sample("Musée d'Orsay — Tour")));
    }

    #[test]
    fn test_batch_ids_disambiguate_collisions() {
        let mut with_ext = sample("Air France");
        with_ext.external_ids.insert("flight_agent".into(), "AF-1".into());
        let records = vec![sample("Air France"), with_ext, sample("Air France"), sample("★★★"), sample("")];
        let ids = batch_record_ids("t", Category::Flight, &records);
        assert_eq!(
            ids,
            vec![
                "t:flight:air-france",
                "t:flight:air-france-af-1",
                "t:flight:air-france-2",
                "t:flight:item-4",
                "t:flight:item-5",
            ]
        );
        assert_eq!(ids, batch_record_ids("t", Category::Flight, &records));
    }

    #[tokio::test]
    async fn test_same_name_records_are_not_collapsed() {
        let store = InMemoryStore::new();
        let records = vec![sample("Delta"), sample("Delta")];
        let out = store.create_many("t", Category::Flight, &records).await.unwrap();
        assert_eq!(out.inserted_ids.len(), 2);
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn test_create_many_is_idempotent() {
        let store = InMemoryStore::new();
        let records = vec![sample("Louvre"), sample("Orsay")];
        let first = store.create_many("t", Category::Activity, &records).await.unwrap();
        let second = store.create_many("t", Category::Activity, &records).await.unwrap();
        assert_eq!(first.inserted_ids, second.inserted_ids);
        assert_eq!(store.len().await, 2);

        store.append_ids("t", Category::Activity, &first.inserted_ids).await.unwrap();
        store.append_ids("t", Category::Activity, &second.inserted_ids).await.unwrap();
        assert_eq!(store.list_ids("t", Category::Activity).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_agent_status_overwrites() {
        let store = InMemoryStore::new();
        store
            .set_agent_status("t", "flight", AgentStatus::Running, Value::Null)
            .await
            .unwrap();
        store
            .set_agent_status("t", "flight", AgentStatus::Completed, serde_json::json!({"items": 3}))
            .await
            .unwrap();
        let rec = store.agent_status("t", "flight").await.unwrap().unwrap();
        assert_eq!(rec.status, AgentStatus::Completed);
        assert_eq!(rec.metadata["items"], 3);
        assert!(store.agent_status("t", "hotel").await.unwrap().is_none());
    }
}
