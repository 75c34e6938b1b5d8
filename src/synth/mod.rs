//! 计划合成：预算账本、置信度评分、逐日行程与最终计划

pub mod budget;
pub mod confidence;
pub mod itinerary;
pub mod plan;

pub use budget::{category_estimate, BudgetLedger, BudgetWarning, BudgetWarningLevel};
pub use confidence::{score_plan, weighted_base, ConfidenceBreakdown};
pub use itinerary::{build_itinerary, Itinerary, ItineraryDay, ItineraryStop};
pub use plan::{AgentRunSummary, BudgetSummary, PlanMetadata, PlanSummary, PlanSynthesizer, TripPlan};
