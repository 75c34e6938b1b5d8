//! 推荐归一化
//!
//! 把各 Agent 的异构输出转换为 [`CanonicalRecommendation`]：
//! 形态识别见 [`shapes`]，字段强制转换见 [`coerce`]，批量与入库见 [`batch`]。

pub mod batch;
pub mod coerce;
pub mod shapes;
pub mod types;

pub use batch::{normalize_and_store, normalize_batch, BatchOutcome, StoredBatchOutcome};
pub use shapes::{detect_shape, ShapeKind};
pub use types::{CanonicalRecommendation, CategoryMetadata, Confidence, Location, Price, Rating};

use serde_json::Value;
use thiserror::Error;

use crate::config::NormalizeSection;
use crate::core::{Category, TripCriteria};
use coerce::{coerce_confidence, heuristic_confidence, round_to};

/// 单条推荐的归一化失败（只影响该条目）
#[derive(Error, Debug, Clone, PartialEq)]
pub enum NormalizationError {
    #[error("Item is not a JSON object")]
    NotAnObject,

    #[error("No known {category} shape matches item with fields {fields:?}")]
    UnknownShape { category: Category, fields: Vec<String> },

    #[error("Validation failed for {fields:?}: {reason}")]
    Validation { fields: Vec<String>, reason: String },
}

impl NormalizationError {
    /// 出错字段列表
    pub fn fields(&self) -> Vec<String> {
        match self {
            NormalizationError::NotAnObject => Vec::new(),
            NormalizationError::UnknownShape { fields, .. } => fields.clone(),
            NormalizationError::Validation { fields, .. } => fields.clone(),
        }
    }
}

/// 运行级默认值：币种、城市、评分来源
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizationDefaults {
    pub currency: String,
    pub city: Option<String>,
    pub source: String,
}

impl NormalizationDefaults {
    pub fn from_criteria(criteria: &TripCriteria, category: Category) -> Self {
        let city = criteria
            .destination
            .split(',')
            .next()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_string);
        Self {
            currency: criteria.currency.clone(),
            city,
            source: format!("{}_agent", category.as_str()),
        }
    }
}

/// 归一化器：持有启发式置信度常量
#[derive(Debug, Clone, Default)]
pub struct Normalizer {
    cfg: NormalizeSection,
}

impl Normalizer {
    pub fn new(cfg: NormalizeSection) -> Self {
        Self { cfg }
    }

    pub fn normalize(
        &self,
        category: Category,
        raw: &Value,
        defaults: &NormalizationDefaults,
    ) -> Result<CanonicalRecommendation, NormalizationError> {
        let draft = shapes::decode(category, raw)?;

        let name = draft.name.trim().to_string();
        let mut invalid = Vec::new();
        if name.is_empty() {
            invalid.push("name".to_string());
        }
        if let Some(coords) = draft.location.coordinates {
            if !(-90.0..=90.0).contains(&coords.lat) {
                invalid.push("location.coordinates.lat".to_string());
            }
            if !(-180.0..=180.0).contains(&coords.lng) {
                invalid.push("location.coordinates.lng".to_string());
            }
        }
        if !invalid.is_empty() {
            return Err(NormalizationError::Validation {
                reason: "blank name or coordinates out of range".to_string(),
                fields: invalid,
            });
        }

        let currency = draft
            .price
            .currency
            .or(draft.currency)
            .map(|c| c.trim().to_uppercase())
            .unwrap_or_else(|| defaults.currency.clone());
        if !currency.eq_ignore_ascii_case(&defaults.currency) {
            tracing::warn!(
                category = %category,
                item = %name,
                currency = %currency,
                expected = %defaults.currency,
                "Currency mismatch; amount kept as reported"
            );
        }
        let price = Price {
            amount: draft.price.amount.max(0.0),
            currency,
            unit: draft
                .price
                .unit
                .unwrap_or_else(|| category.default_price_unit().to_string()),
        };

        let rating = Rating {
            score: draft.rating.score,
            review_count: draft.rating.review_count.unwrap_or(0),
            source: draft
                .rating
                .source
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| defaults.source.clone()),
        };

        let mut location = draft.location;
        if location.city.is_none() {
            location.city = defaults.city.clone();
        }

        let confidence = match draft.confidence {
            Some(score) => Confidence {
                score: round_to(score.clamp(0.0, 1.0), 4),
                reasoning: draft
                    .confidence_reasoning
                    .unwrap_or_else(|| "reported by agent".to_string()),
            },
            None => {
                let (score, reasoning) = heuristic_confidence(
                    rating.score,
                    rating.review_count,
                    price.amount,
                    location.coordinates.is_some(),
                    &self.cfg,
                );
                Confidence { score, reasoning }
            }
        };

        tracing::debug!(category = %category, item = %name, confidence = confidence.score, "Normalized");

        Ok(CanonicalRecommendation {
            name,
            description: draft.description.unwrap_or_default(),
            price,
            rating,
            location,
            confidence,
            category_metadata: draft.metadata,
            external_ids: draft.external_ids,
            images: draft.images,
        })
    }

    /// Agent 自报的整体置信度
    pub fn reported_confidence(value: Option<&Value>) -> Option<f64> {
        coerce_confidence(value)
    }
}
