//! 规范推荐记录（Canonical Recommendation）
//!
//! 编排核心内部统一使用的数据结构。不变量：price.amount ≥ 0，rating.score ∈ [0,5]，
//! confidence.score ∈ [0,1]。

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::geo::Coordinates;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Price {
    pub amount: f64,
    pub currency: String,
    /// per_person / per_night / per_group / total
    pub unit: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rating {
    pub score: f64,
    pub review_count: u64,
    pub source: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Location {
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub coordinates: Option<Coordinates>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Confidence {
    pub score: f64,
    pub reasoning: String,
}

/// 各类别特有的元数据
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CategoryMetadata {
    Flight {
        airline: String,
        #[serde(default)]
        flight_number: Option<String>,
        #[serde(default)]
        origin: Option<String>,
        #[serde(default)]
        destination: Option<String>,
        #[serde(default)]
        departure_time: Option<String>,
        #[serde(default)]
        arrival_time: Option<String>,
        #[serde(default)]
        duration_minutes: Option<u32>,
        #[serde(default)]
        stops: u32,
        #[serde(default)]
        cabin_class: Option<String>,
    },
    Accommodation {
        #[serde(default)]
        property_type: Option<String>,
        #[serde(default)]
        amenities: Vec<String>,
    },
    Activity {
        #[serde(default)]
        activity_type: Option<String>,
        #[serde(default)]
        duration_minutes: Option<u32>,
    },
    Restaurant {
        #[serde(default)]
        cuisines: Vec<String>,
        #[serde(default)]
        price_level: Option<u8>,
        #[serde(default)]
        meal_types: Vec<String>,
    },
}

/// 归一化后的推荐
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalRecommendation {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price: Price,
    pub rating: Rating,
    #[serde(default)]
    pub location: Location,
    pub confidence: Confidence,
    pub category_metadata: CategoryMetadata,
    #[serde(default)]
    pub external_ids: BTreeMap<String, String>,
    #[serde(default)]
    pub images: Vec<String>,
}

impl CanonicalRecommendation {
    pub fn coordinates(&self) -> Option<Coordinates> {
        self.location.coordinates
    }
}
