//! 批量归一化：单条失败只记录在对应下标，不影响其它条目

use serde::Serialize;
use serde_json::Value;

use super::{CanonicalRecommendation, NormalizationDefaults, NormalizationError, Normalizer};
use crate::core::Category;
use crate::persistence::{ItemStoreError, RecommendationStore};

#[derive(Debug, Clone, Default)]
pub struct BatchOutcome {
    pub records: Vec<CanonicalRecommendation>,
    /// (原始下标, 错误)
    pub failures: Vec<(usize, NormalizationError)>,
    /// records[i] 对应的原始下标
    pub source_indices: Vec<usize>,
}

impl BatchOutcome {
    pub fn rejected(&self) -> usize {
        self.failures.len()
    }
}

pub fn normalize_batch(
    normalizer: &Normalizer,
    category: Category,
    items: &[Value],
    defaults: &NormalizationDefaults,
) -> BatchOutcome {
    let mut outcome = BatchOutcome::default();
    for (index, item) in items.iter().enumerate() {
        match normalizer.normalize(category, item, defaults) {
            Ok(record) => {
                outcome.records.push(record);
                outcome.source_indices.push(index);
            }
            Err(e) => {
                tracing::warn!(category = %category, index, error = %e, "Recommendation rejected");
                outcome.failures.push((index, e));
            }
        }
    }
    outcome
}

/// 归一化结果加上入库结果；入库失败的下标同样指向原始条目
#[derive(Debug, Clone, Default, Serialize)]
pub struct StoredBatchOutcome {
    #[serde(skip)]
    pub batch: BatchOutcome,
    pub inserted_ids: Vec<String>,
    pub store_errors: Vec<ItemStoreError>,
}

/// 归一化后写入存储并把 ID 追加到行程；存储失败只记日志
pub async fn normalize_and_store(
    normalizer: &Normalizer,
    store: &dyn RecommendationStore,
    trip_id: &str,
    category: Category,
    items: &[Value],
    defaults: &NormalizationDefaults,
) -> StoredBatchOutcome {
    let batch = normalize_batch(normalizer, category, items, defaults);
    if batch.records.is_empty() {
        return StoredBatchOutcome {
            batch,
            ..Default::default()
        };
    }

    let (inserted_ids, store_errors) = match store.create_many(trip_id, category, &batch.records).await {
        Ok(outcome) => {
            let errors = outcome
                .per_item_errors
                .into_iter()
                .map(|e| ItemStoreError {
                    index: batch.source_indices.get(e.index).copied().unwrap_or(e.index),
                    message: e.message,
                })
                .collect();
            (outcome.inserted_ids, errors)
        }
        Err(e) => {
            tracing::warn!(trip_id, category = %category, error = %e, "create_many failed");
            let errors = batch
                .source_indices
                .iter()
                .map(|&index| ItemStoreError {
                    index,
                    message: e.to_string(),
                })
                .collect();
            (Vec::new(), errors)
        }
    };

    if !inserted_ids.is_empty() {
        if let Err(e) = store.append_ids(trip_id, category, &inserted_ids).await {
            tracing::warn!(trip_id, category = %category, error = %e, "append_ids failed");
        }
    }

    StoredBatchOutcome {
        batch,
        inserted_ids,
        store_errors,
    }
}
