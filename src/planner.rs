//! 行程规划门面：调用方只需要 `TripPlanner::run(request, subset)`
//!
//! 只有 PlannerError（阶段图非法、子集含未知 Agent、配置错误）会让 success=false；
//! Agent 失败只体现在计划元数据的 run_status 与 agent_results 中。

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::agents::AgentRegistry;
use crate::config::AppConfig;
use crate::core::{Category, PlannerError, TripRequest};
use crate::persistence::RecommendationStore;
use crate::synth::{PlanSynthesizer, TripPlan};
use crate::workflow::{PhasePlan, PhaseScheduler};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanResponse {
    pub success: bool,
    #[serde(default)]
    pub plan: Option<TripPlan>,
    #[serde(default)]
    pub error: Option<String>,
    pub executed_at: DateTime<Utc>,
}

pub struct TripPlanner {
    scheduler: PhaseScheduler,
    synthesizer: PlanSynthesizer,
}

impl TripPlanner {
    pub fn new(
        plan: PhasePlan,
        registry: AgentRegistry,
        store: Arc<dyn RecommendationStore>,
        cfg: Arc<AppConfig>,
    ) -> Self {
        Self {
            scheduler: PhaseScheduler::new(plan, registry, store, Arc::clone(&cfg)),
            synthesizer: PlanSynthesizer::new(cfg),
        }
    }

    /// 运行一次规划；subset 为 None 或空时运行全部 Agent
    pub async fn run(&self, request: &TripRequest, subset: Option<&[String]>) -> PlanResponse {
        match self.try_run(request, subset).await {
            Ok(plan) => PlanResponse {
                success: true,
                plan: Some(plan),
                error: None,
                executed_at: Utc::now(),
            },
            Err(e) => {
                tracing::error!(trip_id = %request.trip_id, error = %e, "Planning run failed");
                PlanResponse {
                    success: false,
                    plan: None,
                    error: Some(e.to_string()),
                    executed_at: Utc::now(),
                }
            }
        }
    }

    pub async fn try_run(
        &self,
        request: &TripRequest,
        subset: Option<&[String]>,
    ) -> Result<TripPlan, PlannerError> {
        let subset = parse_subset(subset)?;
        let outcome = self.scheduler.run(request, subset.as_deref()).await?;
        Ok(self.synthesizer.synthesize(request, outcome))
    }
}

/// 解析 Agent 名称（接受 hotels / dining 等别名），去重并保持顺序
pub fn parse_subset(subset: Option<&[String]>) -> Result<Option<Vec<Category>>, PlannerError> {
    let Some(names) = subset.filter(|s| !s.is_empty()) else {
        return Ok(None);
    };
    let mut agents = Vec::with_capacity(names.len());
    for name in names {
        let category: Category = name
            .parse()
            .map_err(|_| PlannerError::UnknownAgent(name.clone()))?;
        if !agents.contains(&category) {
            agents.push(category);
        }
    }
    Ok(Some(agents))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_subset() {
        let names = vec!["hotels".to_string(), "activity".to_string(), "hotel".to_string()];
        assert_eq!(
            parse_subset(Some(names.as_slice())).unwrap(),
            Some(vec![Category::Accommodation, Category::Activity])
        );
        assert_eq!(parse_subset(None).unwrap(), None);
        assert_eq!(parse_subset(Some(&[][..])).unwrap(), None);

        let bad = vec!["spa".to_string()];
        assert!(matches!(
            parse_subset(Some(bad.as_slice())),
            Err(PlannerError::UnknownAgent(name)) if name == "spa"
        ));
    }
}
