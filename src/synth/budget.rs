//! 预算账本
//!
//! 每个完成的 Agent 把归一化价格折算为类别估算，账本维护累计总额与相对提示预算的偏差。
//! 提示预算只做展示与评分，从不过滤推荐；超出 10% 警告，超出 20% 升级，均不阻塞。

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config::BudgetSection;
use crate::core::{Category, TripCriteria};
use crate::normalize::CanonicalRecommendation;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetLedger {
    pub has_user_budget: bool,
    #[serde(default)]
    pub total_hint: Option<f64>,
    pub per_category_hint: BTreeMap<Category, f64>,
    pub per_category_estimate: BTreeMap<Category, f64>,
    pub total_estimate: f64,
    pub currency: String,
}

/// 预算警告级别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BudgetWarningLevel {
    Warning,
    Escalated,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetWarning {
    /// None 表示总预算
    pub category: Option<Category>,
    pub estimate: f64,
    pub hint: f64,
    pub over_ratio: f64,
    pub level: BudgetWarningLevel,
}

impl BudgetLedger {
    /// 由请求中的预算提示初始化；只给总额时按配置占比拆分到各类别
    pub fn from_criteria(criteria: &TripCriteria, cfg: &BudgetSection) -> Self {
        let hints = criteria.budget.clone().unwrap_or_default();
        let mut per_category_hint = hints.per_category.clone();

        if let Some(total) = hints.total {
            for category in Category::ALL {
                per_category_hint
                    .entry(category)
                    .or_insert(total * cfg.shares.get(category));
            }
        }

        let total_hint = hints.total.or_else(|| {
            (!per_category_hint.is_empty()).then(|| per_category_hint.values().sum())
        });

        Self {
            has_user_budget: !hints.is_empty(),
            total_hint,
            per_category_hint,
            per_category_estimate: BTreeMap::new(),
            total_estimate: 0.0,
            currency: criteria.currency.clone(),
        }
    }

    /// 写入（或覆盖）某类别的估算并重算总额
    pub fn record(&mut self, category: Category, estimate: f64) {
        self.per_category_estimate.insert(category, estimate.max(0.0));
        self.total_estimate = self.per_category_estimate.values().sum();
    }

    pub fn hint_for(&self, category: Category) -> Option<f64> {
        self.per_category_hint.get(&category).copied()
    }

    /// 各类别 estimate − hint（仅限两者都存在的类别）
    pub fn variance(&self) -> BTreeMap<Category, f64> {
        self.per_category_estimate
            .iter()
            .filter_map(|(c, est)| self.hint_for(*c).map(|hint| (*c, est - hint)))
            .collect()
    }

    pub fn total_variance(&self) -> Option<f64> {
        self.total_hint.map(|hint| self.total_estimate - hint)
    }

    /// 有用户预算且总估算不超过总提示
    pub fn within_budget(&self) -> bool {
        match self.total_hint {
            Some(hint) if self.has_user_budget => self.total_estimate <= hint,
            _ => false,
        }
    }

    pub fn warnings(&self, cfg: &BudgetSection) -> Vec<BudgetWarning> {
        let mut warnings: Vec<BudgetWarning> = self
            .per_category_estimate
            .iter()
            .filter_map(|(c, est)| {
                self.hint_for(*c)
                    .and_then(|hint| classify(Some(*c), *est, hint, cfg))
            })
            .collect();

        if let Some(w) = self
            .total_hint
            .and_then(|hint| classify(None, self.total_estimate, hint, cfg))
        {
            warnings.push(w);
        }
        warnings
    }

    /// 超出提示达到升级阈值的类别
    pub fn escalated_categories(&self, cfg: &BudgetSection) -> Vec<Category> {
        self.warnings(cfg)
            .into_iter()
            .filter(|w| w.level == BudgetWarningLevel::Escalated)
            .filter_map(|w| w.category)
            .collect()
    }
}

fn classify(
    category: Option<Category>,
    estimate: f64,
    hint: f64,
    cfg: &BudgetSection,
) -> Option<BudgetWarning> {
    if hint <= 0.0 {
        return None;
    }
    let over_ratio = (estimate - hint) / hint;
    let level = if over_ratio > cfg.escalate_ratio {
        BudgetWarningLevel::Escalated
    } else if over_ratio > cfg.warn_ratio {
        BudgetWarningLevel::Warning
    } else {
        return None;
    };
    Some(BudgetWarning {
        category,
        estimate,
        hint,
        over_ratio,
        level,
    })
}

/// 类别估算：取 top-N 价格（0 表示全部），按单位折算人数/晚数后求和
///
/// 活动与餐厅按置信度降序取前 N；航班与住宿保持 Agent 返回的顺序。
pub fn category_estimate(
    category: Category,
    records: &[CanonicalRecommendation],
    criteria: &TripCriteria,
    cfg: &BudgetSection,
) -> f64 {
    let mut selected: Vec<&CanonicalRecommendation> = records.iter().collect();
    if matches!(category, Category::Activity | Category::Restaurant) {
        selected.sort_by(|a, b| b.confidence.score.total_cmp(&a.confidence.score));
    }
    let top_n = cfg.top_n(category);
    if top_n > 0 {
        selected.truncate(top_n);
    }

    selected
        .iter()
        .map(|r| r.price.amount * unit_multiplier(&r.price.unit, criteria))
        .sum()
}

fn unit_multiplier(unit: &str, criteria: &TripCriteria) -> f64 {
    match unit {
        "per_person" => criteria.travelers() as f64,
        "per_night" => criteria.nights() as f64,
        "per_person_per_night" => criteria.travelers() as f64 * criteria.nights() as f64,
        _ => 1.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::BudgetHints;
    use crate::normalize::{CategoryMetadata, Confidence, Location, Price, Rating};

    fn rec(name: &str, amount: f64, unit: &str, confidence: f64) -> CanonicalRecommendation {
        CanonicalRecommendation {
            name: name.to_string(),
            description: String::new(),
            price: Price {
                amount,
                currency: "EUR".into(),
                unit: unit.into(),
            },
            rating: Rating {
                score: 4.0,
                review_count: 0,
                source: "test".into(),
            },
            location: Location::default(),
            confidence: Confidence {
                score: confidence,
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

    fn criteria(budget: Option<BudgetHints>) -> TripCriteria {
        let mut c: TripCriteria = serde_json::from_value(serde_json::json!({
            "destination": "Paris",
            "start_date": "2026-05-01",
            "end_date": "2026-05-04",
            "travelers": 2,
            "currency": "EUR",
        }))
        .unwrap();
        c.budget = budget;
        c
    }

    #[test]
    fn test_activity_top3_by_confidence_scaled_by_travelers() {
        let cfg = BudgetSection::default();
        let records = vec![
            rec("low", 100.0, "per_person", 0.5),
            rec("a", 10.0, "per_person", 0.9),
            rec("b", 20.0, "per_person", 0.8),
            rec("c", 30.0, "per_person", 0.7),
        ];
        let est = category_estimate(Category::Activity, &records, &criteria(None), &cfg);
        assert_eq!(est, (10.0 + 20.0 + 30.0) * 2.0);
    }

    #[test]
    fn test_large_party_and_long_stay_do_not_overflow() {
        let mut c = criteria(None);
        c.travelers = 70_000;
        c.start_date = chrono::NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
        c.end_date = chrono::NaiveDate::from_ymd_opt(2226, 1, 1).unwrap();
        let nights = c.nights() as f64;
        let items = vec![rec("Dorm", 2.0, "per_person_per_night", 0.9)];
        let estimate = category_estimate(Category::Accommodation, &items, &c, &BudgetSection::default());
        assert_eq!(estimate, 2.0 * 70_000.0 * nights);
        assert!(estimate.is_finite());
    }

    #[test]
    fn test_accommodation_all_items_per_night() {
        let cfg = BudgetSection::default();
        let records = vec![rec("hotel", 150.0, "per_night", 0.8)];
        let est = category_estimate(Category::Accommodation, &records, &criteria(None), &cfg);
        assert_eq!(est, 450.0);
    }

    #[test]
    fn test_total_hint_split_by_shares() {
        let c = criteria(Some(BudgetHints {
            total: Some(1000.0),
            per_category: Default::default(),
        }));
        let ledger = BudgetLedger::from_criteria(&c, &BudgetSection::default());
        assert!(ledger.has_user_budget);
        assert_eq!(ledger.hint_for(Category::Flight), Some(350.0));
        assert_eq!(ledger.hint_for(Category::Restaurant), Some(150.0));
    }

    #[test]
    fn test_variance_and_warning_levels() {
        let cfg = BudgetSection::default();
        let mut per_category = BTreeMap::new();
        per_category.insert(Category::Accommodation, 400.0);
        per_category.insert(Category::Activity, 100.0);
        let c = criteria(Some(BudgetHints {
            total: None,
            per_category,
        }));
        let mut ledger = BudgetLedger::from_criteria(&c, &cfg);
        ledger.record(Category::Accommodation, 450.0); // +12.5%
        ledger.record(Category::Activity, 130.0); // +30%

        let variance = ledger.variance();
        assert_eq!(variance[&Category::Accommodation], 50.0);
        assert_eq!(variance[&Category::Activity], 30.0);
        assert_eq!(ledger.total_estimate, 580.0);

        let warnings = ledger.warnings(&cfg);
        let acc = warnings
            .iter()
            .find(|w| w.category == Some(Category::Accommodation))
            .unwrap();
        assert_eq!(acc.level, BudgetWarningLevel::Warning);
        assert_eq!(ledger.escalated_categories(&cfg), vec![Category::Activity]);
        assert!(!ledger.within_budget());
    }

    #[test]
    fn test_no_budget_never_within() {
        let ledger = BudgetLedger::from_criteria(&criteria(None), &BudgetSection::default());
        assert!(!ledger.has_user_budget);
        assert!(!ledger.within_budget());
        assert!(ledger.warnings(&BudgetSection::default()).is_empty());
    }
}
