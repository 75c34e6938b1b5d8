//! 计划合成：把调度结果与最终上下文组合为 TripPlan

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::config::AppConfig;
use crate::core::{
    AgentResult, AgentStatus, AnchorLocation, Category, DependencyUnmetWarning, RunStatus,
    TripRequest,
};
use crate::geo::{geographic_coverage, lookup_city, Coordinates, GeoCluster};
use crate::normalize::CanonicalRecommendation;
use crate::workflow::{PhaseRecord, ScheduleOutcome};

use super::budget::BudgetWarning;
use super::confidence::{score_plan, ConfidenceBreakdown};
use super::itinerary::{build_itinerary, Itinerary, ItineraryDay};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetSummary {
    pub currency: String,
    pub has_user_budget: bool,
    pub total_estimate: f64,
    #[serde(default)]
    pub total_hint: Option<f64>,
    pub breakdown: BTreeMap<Category, f64>,
    pub hints: BTreeMap<Category, f64>,
    /// estimate − hint
    pub variance: BTreeMap<Category, f64>,
    #[serde(default)]
    pub total_variance: Option<f64>,
    pub within_budget: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanSummary {
    pub destination: String,
    #[serde(default)]
    pub destination_coordinates: Option<Coordinates>,
    #[serde(default)]
    pub origin: Option<String>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub nights: u32,
    pub travelers: u32,
    #[serde(default)]
    pub anchor_location: Option<AnchorLocation>,
    pub budget: BudgetSummary,
    /// 0-100
    pub confidence: u32,
    /// 0-100
    pub geographic_coverage: f64,
    pub failed_agents: Vec<String>,
}

/// 单个 Agent 的执行摘要（不含推荐本身）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentRunSummary {
    pub agent_name: String,
    pub status: AgentStatus,
    pub success: bool,
    pub confidence: f64,
    pub duration_ms: u64,
    pub items: usize,
    pub rejected_items: usize,
    #[serde(default)]
    pub error: Option<String>,
}

impl From<&AgentResult> for AgentRunSummary {
    fn from(r: &AgentResult) -> Self {
        Self {
            agent_name: r.agent_name.clone(),
            status: r.status,
            success: r.success,
            confidence: r.confidence,
            duration_ms: r.duration_ms,
            items: r.recommendations.len(),
            rejected_items: r.rejected_items,
            error: r.error.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanMetadata {
    pub run_status: RunStatus,
    pub agent_results: Vec<AgentRunSummary>,
    pub phases: Vec<PhaseRecord>,
    pub context_version: u64,
    pub clusters: Vec<GeoCluster>,
    pub budget_warnings: Vec<BudgetWarning>,
    pub dependency_warnings: Vec<DependencyUnmetWarning>,
    /// 存在依赖缺口时为 true
    pub structurally_incomplete: bool,
    /// 天数不足而未排进行程的活动簇
    #[serde(default)]
    pub unscheduled_clusters: Vec<String>,
    pub confidence_breakdown: ConfidenceBreakdown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TripPlan {
    pub trip_id: String,
    pub trip_summary: PlanSummary,
    pub recommendations: BTreeMap<Category, Vec<CanonicalRecommendation>>,
    pub itinerary: Vec<ItineraryDay>,
    pub metadata: PlanMetadata,
}

pub struct PlanSynthesizer {
    cfg: Arc<AppConfig>,
}

impl PlanSynthesizer {
    pub fn new(cfg: Arc<AppConfig>) -> Self {
        Self { cfg }
    }

    pub fn synthesize(&self, request: &TripRequest, outcome: ScheduleOutcome) -> TripPlan {
        let criteria = &request.criteria;
        let context = &outcome.context;
        let ledger = &context.budget_ledger;

        let coverage = geographic_coverage(
            context.anchor_location.as_ref().map(|a| a.coordinates),
            &context.clusters,
            self.cfg.geo.coverage_radius_km,
        );
        let breakdown = score_plan(
            &outcome.results,
            coverage,
            ledger,
            &self.cfg.confidence,
            &self.cfg.budget,
        );
        let budget_warnings = ledger.warnings(&self.cfg.budget);
        for w in &budget_warnings {
            tracing::warn!(
                category = w.category.map(|c| c.as_str()).unwrap_or("total"),
                estimate = w.estimate,
                hint = w.hint,
                level = ?w.level,
                "Budget hint exceeded"
            );
        }

        let recommendations: BTreeMap<Category, Vec<CanonicalRecommendation>> = outcome
            .results
            .iter()
            .filter(|r| r.status == AgentStatus::Completed)
            .map(|r| (r.category, r.recommendations.clone()))
            .collect();
        let Itinerary {
            days: itinerary,
            unscheduled_clusters,
        } = build_itinerary(criteria, &recommendations, context, &self.cfg);

        let failed_agents: Vec<String> = outcome
            .results
            .iter()
            .filter(|r| r.status == AgentStatus::Failed)
            .map(|r| r.agent_name.clone())
            .collect();

        let summary = PlanSummary {
            destination: criteria.destination.clone(),
            destination_coordinates: lookup_city(&criteria.destination),
            origin: criteria.origin.clone(),
            start_date: criteria.start_date,
            end_date: criteria.end_date,
            nights: criteria.nights(),
            travelers: criteria.travelers(),
            anchor_location: context.anchor_location.clone(),
            budget: BudgetSummary {
                currency: ledger.currency.clone(),
                has_user_budget: ledger.has_user_budget,
                total_estimate: ledger.total_estimate,
                total_hint: ledger.total_hint,
                breakdown: ledger.per_category_estimate.clone(),
                hints: ledger.per_category_hint.clone(),
                variance: ledger.variance(),
                total_variance: ledger.total_variance(),
                within_budget: ledger.within_budget(),
            },
            confidence: breakdown.score,
            geographic_coverage: coverage,
            failed_agents,
        };

        let run_status = RunStatus::from_results(&outcome.results);
        tracing::info!(
            trip_id = %request.trip_id,
            run_status = ?run_status,
            confidence = summary.confidence,
            coverage = %format!("{coverage:.1}"),
            days = itinerary.len(),
            "Plan synthesized"
        );

        TripPlan {
            trip_id: request.trip_id.clone(),
            trip_summary: summary,
            recommendations,
            itinerary,
            metadata: PlanMetadata {
                run_status,
                agent_results: outcome.results.iter().map(AgentRunSummary::from).collect(),
                phases: outcome.phases,
                context_version: context.version,
                clusters: context.clusters.clone(),
                budget_warnings,
                structurally_incomplete: !outcome.warnings.is_empty(),
                unscheduled_clusters,
                dependency_warnings: outcome.warnings,
                confidence_breakdown: breakdown,
            },
        }
    }
}
