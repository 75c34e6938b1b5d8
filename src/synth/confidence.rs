//! 计划置信度
//!
//! 基础分为各已执行类别「条目平均置信度」的加权均值（权重只在产出了条目的类别上重新归一），
//! 再叠加覆盖率 / 预算加分与超支 / 失败扣分，最后 ×100 取整并截断到 [0,100]。

use serde::{Deserialize, Serialize};

use crate::config::{BudgetSection, CategoryWeights, ConfidenceSection};
use crate::core::{AgentResult, AgentStatus, Category};

use super::budget::BudgetLedger;

/// 各项得分明细（写入计划元数据，便于解释最终分数）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceBreakdown {
    pub base: f64,
    pub coverage_bonus: f64,
    pub budget_bonus: f64,
    pub over_budget_penalty: f64,
    pub failed_agent_penalty: f64,
    /// 0-100
    pub score: u32,
}

/// 加权均值；没有任何类别时为 0
pub fn weighted_base(per_category: &[(Category, f64)], weights: &CategoryWeights) -> f64 {
    let total_weight: f64 = per_category.iter().map(|(c, _)| weights.get(*c)).sum();
    if total_weight <= 0.0 {
        return 0.0;
    }
    per_category
        .iter()
        .map(|(c, confidence)| weights.get(*c) * confidence)
        .sum::<f64>()
        / total_weight
}

/// 覆盖率超过阈值后线性加分，100% 时达到上限
pub fn coverage_bonus(coverage: f64, cfg: &ConfidenceSection) -> f64 {
    let span = 100.0 - cfg.coverage_bonus_threshold;
    if coverage <= cfg.coverage_bonus_threshold || span <= 0.0 {
        return 0.0;
    }
    let ratio = ((coverage - cfg.coverage_bonus_threshold) / span).clamp(0.0, 1.0);
    cfg.coverage_bonus_max * ratio
}

pub fn score_plan(
    results: &[AgentResult],
    coverage: f64,
    ledger: &BudgetLedger,
    cfg: &ConfidenceSection,
    budget_cfg: &BudgetSection,
) -> ConfidenceBreakdown {
    let per_category: Vec<(Category, f64)> = results
        .iter()
        .filter(|r| r.status == AgentStatus::Completed)
        .filter_map(|r| r.average_item_confidence().map(|c| (r.category, c)))
        .collect();

    let base = weighted_base(&per_category, &cfg.weights);
    let coverage_bonus = coverage_bonus(coverage, cfg);
    let budget_bonus = if ledger.within_budget() {
        cfg.within_budget_bonus
    } else {
        0.0
    };
    let escalated = ledger.escalated_categories(budget_cfg).len();
    let failed = results
        .iter()
        .filter(|r| r.status == AgentStatus::Failed)
        .count();
    let over_budget_penalty = cfg.over_budget_penalty * escalated as f64;
    let failed_agent_penalty = cfg.failed_agent_penalty * failed as f64;

    let raw = base + coverage_bonus + budget_bonus - over_budget_penalty - failed_agent_penalty;
    let score = (raw * 100.0).round().clamp(0.0, 100.0) as u32;

    ConfidenceBreakdown {
        base,
        coverage_bonus,
        budget_bonus,
        over_budget_penalty,
        failed_agent_penalty,
        score,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::TripCriteria;

    fn ledger(total: Option<f64>) -> BudgetLedger {
        let mut criteria: TripCriteria = serde_json::from_value(serde_json::json!({
            "destination": "Paris",
            "start_date": "2026-05-01",
            "end_date": "2026-05-03"
        }))
        .unwrap();
        criteria.budget = total.map(|t| crate::core::BudgetHints {
            total: Some(t),
            per_category: Default::default(),
        });
        BudgetLedger::from_criteria(&criteria, &BudgetSection::default())
    }

    #[test]
    fn test_weighted_base_four_categories() {
        let cfg = ConfidenceSection::default();
        let base = weighted_base(
            &[
                (Category::Flight, 0.8),
                (Category::Accommodation, 0.9),
                (Category::Activity, 0.7),
                (Category::Restaurant, 0.6),
            ],
            &cfg.weights,
        );
        // 0.3×0.8 + 0.3×0.9 + 0.25×0.7 + 0.15×0.6
        assert!((base - 0.775).abs() < 1e-9);
    }

    #[test]
    fn test_weights_renormalized_over_present_categories() {
        let cfg = ConfidenceSection::default();
        let base = weighted_base(&[(Category::Accommodation, 0.9)], &cfg.weights);
        assert!((base - 0.9).abs() < 1e-9);
        assert_eq!(weighted_base(&[], &cfg.weights), 0.0);
    }

    #[test]
    fn test_coverage_bonus_linear() {
        let cfg = ConfidenceSection::default();
        assert_eq!(coverage_bonus(40.0, &cfg), 0.0);
        assert!((coverage_bonus(75.0, &cfg) - 0.025).abs() < 1e-9);
        assert!((coverage_bonus(100.0, &cfg) - 0.05).abs() < 1e-9);
    }

    #[test]
    fn test_failed_agent_penalty_and_clamp() {
        let cfg = ConfidenceSection::default();
        let results = vec![
            AgentResult::failed(Category::Flight, "down", 1),
            AgentResult::failed(Category::Accommodation, "down", 1),
        ];
        let breakdown = score_plan(&results, 0.0, &ledger(None), &cfg, &BudgetSection::default());
        assert_eq!(breakdown.base, 0.0);
        assert!((breakdown.failed_agent_penalty - 0.2).abs() < 1e-9);
        assert_eq!(breakdown.score, 0);
    }

    #[test]
    fn test_within_budget_bonus() {
        let cfg = ConfidenceSection::default();
        let breakdown = score_plan(&[], 0.0, &ledger(Some(5000.0)), &cfg, &BudgetSection::default());
        assert_eq!(breakdown.budget_bonus, 0.05);
        assert_eq!(breakdown.score, 5);
    }
}
