//! 行程请求、搜索条件与 Agent 角色
//!
//! TripCriteria 在一次运行中不可变；Agent 只会拿到由 ExecutionContext 增强后的副本 EnhancedCriteria。

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::geo::{Coordinates, TravelMode, TravelStyle};

use super::context::AnchorLocation;

/// 推荐类别，也是 Agent 的角色名
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Flight,
    Accommodation,
    Activity,
    Restaurant,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Flight,
        Category::Accommodation,
        Category::Activity,
        Category::Restaurant,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Flight => "flight",
            Category::Accommodation => "accommodation",
            Category::Activity => "activity",
            Category::Restaurant => "restaurant",
        }
    }

    /// 默认价格单位
    pub fn default_price_unit(&self) -> &'static str {
        match self {
            Category::Accommodation => "per_night",
            _ => "per_person",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "flight" | "flights" => Ok(Category::Flight),
            "accommodation" | "accommodations" | "hotel" | "hotels" | "lodging" => {
                Ok(Category::Accommodation)
            }
            "activity" | "activities" => Ok(Category::Activity),
            "restaurant" | "restaurants" | "dining" => Ok(Category::Restaurant),
            other => Err(format!("unknown agent: {other}")),
        }
    }
}

/// 用户偏好
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TripPreferences {
    pub travel_style: TravelStyle,
    pub travel_mode: TravelMode,
    pub preferred_areas: Vec<String>,
    pub interests: Vec<String>,
    pub cuisines: Vec<String>,
    pub accommodation_type: Option<String>,
}

/// 用户给出的预算提示，只用于信息展示与评分，从不过滤推荐
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BudgetHints {
    pub total: Option<f64>,
    pub per_category: BTreeMap<Category, f64>,
}

impl BudgetHints {
    pub fn is_empty(&self) -> bool {
        self.total.is_none() && self.per_category.is_empty()
    }
}

/// 单次运行的不可变输入
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TripCriteria {
    pub destination: String,
    #[serde(default)]
    pub origin: Option<String>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default = "default_travelers")]
    pub travelers: u32,
    #[serde(default)]
    pub preferences: TripPreferences,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default)]
    pub budget: Option<BudgetHints>,
}

fn default_travelers() -> u32 {
    1
}

fn default_currency() -> String {
    "USD".to_string()
}

impl TripCriteria {
    /// 住宿晚数，至少 1
    pub fn nights(&self) -> u32 {
        (self.end_date - self.start_date).num_days().max(1) as u32
    }

    /// 行程覆盖的所有日期（含首尾）；结束早于开始时只返回开始日
    pub fn days(&self) -> Vec<NaiveDate> {
        let mut days = vec![self.start_date];
        let mut current = self.start_date;
        while current < self.end_date {
            match current.succ_opt() {
                Some(next) => {
                    days.push(next);
                    current = next;
                }
                None => break,
            }
        }
        days
    }

    pub fn travelers(&self) -> u32 {
        self.travelers.max(1)
    }
}

/// 调用方提交的行程请求
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TripRequest {
    #[serde(default = "new_trip_id")]
    pub trip_id: String,
    #[serde(flatten)]
    pub criteria: TripCriteria,
}

fn new_trip_id() -> String {
    format!("trip_{}", uuid::Uuid::new_v4())
}

impl TripRequest {
    pub fn new(criteria: TripCriteria) -> Self {
        Self {
            trip_id: new_trip_id(),
            criteria,
        }
    }
}

/// 发送给 Agent 的增强条件：基础条件 + 按角色注入的上下文字段
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnhancedCriteria {
    #[serde(flatten)]
    pub base: TripCriteria,
    pub role: Category,
    /// 生成该条件时上下文的版本号
    pub context_version: u64,
    #[serde(default)]
    pub anchor_location: Option<AnchorLocation>,
    #[serde(default)]
    pub max_distance_from_hotel_km: Option<f64>,
    #[serde(default)]
    pub preferred_areas: Vec<String>,
    #[serde(default)]
    pub activity_locations: Vec<Coordinates>,
    #[serde(default)]
    pub budget_hint: Option<f64>,
}
