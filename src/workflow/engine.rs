//! 阶段调度引擎
//!
//! 按拓扑序执行阶段：并行阶段用 join_all 扇出、扇入后按声明顺序折叠结果；
//! 顺序阶段每个 Agent 完成后立即折叠，下一个 Agent 看到最新上下文。
//! 单个 Agent 的失败只记录在它自己的 AgentResult 中，从不中断兄弟或下游阶段。

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Instant;

use futures_util::future::join_all;
use serde_json::json;

use crate::agents::AgentRegistry;
use crate::config::AppConfig;
use crate::core::{
    AgentError, AgentResult, AgentStatus, Category, DependencyGap, DependencyUnmetWarning,
    ExecutionContext, PlannerError, TripRequest,
};
use crate::normalize::{normalize_and_store, NormalizationDefaults, Normalizer};
use crate::persistence::RecommendationStore;
use crate::workflow::builder::PhasePlan;
use crate::workflow::types::*;

/// 一次调度的产出
#[derive(Debug, Clone)]
pub struct ScheduleOutcome {
    /// 阶段顺序、阶段内 Agent 顺序
    pub results: Vec<AgentResult>,
    pub context: ExecutionContext,
    pub warnings: Vec<DependencyUnmetWarning>,
    pub phases: Vec<PhaseRecord>,
}

pub struct PhaseScheduler {
    plan: PhasePlan,
    registry: AgentRegistry,
    store: Arc<dyn RecommendationStore>,
    normalizer: Normalizer,
    cfg: Arc<AppConfig>,
}

impl PhaseScheduler {
    pub fn new(
        plan: PhasePlan,
        registry: AgentRegistry,
        store: Arc<dyn RecommendationStore>,
        cfg: Arc<AppConfig>,
    ) -> Self {
        Self {
            plan,
            registry,
            store,
            normalizer: Normalizer::new(cfg.normalize.clone()),
            cfg,
        }
    }

    pub fn plan(&self) -> &PhasePlan {
        &self.plan
    }

    /// 执行全部阶段；subset 为 None 时运行计划中的所有 Agent
    pub async fn run(
        &self,
        request: &TripRequest,
        subset: Option<&[Category]>,
    ) -> Result<ScheduleOutcome, PlannerError> {
        let requested: BTreeSet<Category> = match subset {
            Some(agents) => {
                if let Some(unknown) = agents.iter().find(|a| !self.plan.contains(**a)) {
                    return Err(PlannerError::UnknownAgent(unknown.to_string()));
                }
                agents.iter().copied().collect()
            }
            None => self.plan.agents().into_iter().collect(),
        };

        let trip_id = request.trip_id.as_str();
        let criteria = &request.criteria;
        let mut context = Arc::new(ExecutionContext::new(criteria, &self.cfg));
        let mut statuses: HashMap<Category, AgentStatus> = self
            .plan
            .agents()
            .into_iter()
            .map(|a| (a, AgentStatus::Pending))
            .collect();
        let mut results = Vec::new();
        let mut warnings = Vec::new();
        let mut phases = Vec::new();

        tracing::info!(
            trip_id,
            destination = %criteria.destination,
            agents = ?requested,
            "Planning run started"
        );

        for phase in self.plan.ordered_phases() {
            let started = Instant::now();
            let active: Vec<Category> = phase
                .agents
                .iter()
                .copied()
                .filter(|a| requested.contains(a))
                .collect();

            for agent in phase.agents.iter().filter(|a| !requested.contains(a)) {
                statuses.insert(*agent, AgentStatus::Skipped);
                self.persist_status(
                    trip_id,
                    *agent,
                    AgentStatus::Skipped,
                    json!({"phase": phase.id, "reason": "excluded from request"}),
                )
                .await;
            }

            if active.is_empty() {
                tracing::info!(trip_id, phase = %phase.id, "Phase skipped: no requested agents");
                results.extend(phase.agents.iter().map(|a| AgentResult::skipped(*a)));
                phases.push(PhaseRecord {
                    id: phase.id.clone(),
                    status: PhaseStatus::Skipped,
                    parallel: phase.parallel,
                    agents: phase.agents.clone(),
                    duration_ms: 0,
                    context_version: context.version,
                });
                continue;
            }

            for (dep, gap) in dependency_gaps(phase, &statuses)? {
                let warning = DependencyUnmetWarning::new(phase.id.clone(), dep, gap);
                tracing::warn!(trip_id, phase = %phase.id, dependency = %dep, "{}", warning.message);
                warnings.push(warning);
            }

            tracing::info!(
                trip_id,
                phase = %phase.id,
                parallel = phase.parallel,
                agents = ?active,
                context_version = context.version,
                "Phase started"
            );

            let mut finished: HashMap<Category, AgentResult> = HashMap::new();
            if phase.parallel {
                let snapshot = Arc::clone(&context);
                let outcomes = join_all(
                    active
                        .iter()
                        .map(|agent| self.invoke(request, &phase.id, *agent, Arc::clone(&snapshot))),
                )
                .await;
                // 扇入后按声明顺序折叠
                for result in outcomes {
                    context = self.fold(context, &result, request);
                    statuses.insert(result.category, result.status);
                    finished.insert(result.category, result);
                }
            } else {
                for agent in &active {
                    let result = self
                        .invoke(request, &phase.id, *agent, Arc::clone(&context))
                        .await;
                    context = self.fold(context, &result, request);
                    statuses.insert(result.category, result.status);
                    finished.insert(result.category, result);
                }
            }

            for agent in &phase.agents {
                results.push(
                    finished
                        .remove(agent)
                        .unwrap_or_else(|| AgentResult::skipped(*agent)),
                );
            }

            let duration_ms = started.elapsed().as_millis() as u64;
            tracing::info!(
                trip_id,
                phase = %phase.id,
                duration_ms,
                context_version = context.version,
                "Phase completed"
            );
            phases.push(PhaseRecord {
                id: phase.id.clone(),
                status: PhaseStatus::Executed,
                parallel: phase.parallel,
                agents: phase.agents.clone(),
                duration_ms,
                context_version: context.version,
            });
        }

        let context = Arc::try_unwrap(context).unwrap_or_else(|shared| (*shared).clone());
        Ok(ScheduleOutcome {
            results,
            context,
            warnings,
            phases,
        })
    }

    /// 成功的 Agent 折叠进上下文（新版本），失败的保持原样
    fn fold(
        &self,
        context: Arc<ExecutionContext>,
        result: &AgentResult,
        request: &TripRequest,
    ) -> Arc<ExecutionContext> {
        if result.status != AgentStatus::Completed {
            return context;
        }
        Arc::new(context.fold(
            result.category,
            &result.recommendations,
            &request.criteria,
            &self.cfg,
        ))
    }

    /// 调用单个 Agent：标记运行 → 增强条件 → 调用 → 归一化入库 → 标记终态
    async fn invoke(
        &self,
        request: &TripRequest,
        phase_id: &str,
        category: Category,
        snapshot: Arc<ExecutionContext>,
    ) -> AgentResult {
        let trip_id = request.trip_id.as_str();
        self.persist_status(
            trip_id,
            category,
            AgentStatus::Running,
            json!({"phase": phase_id, "context_version": snapshot.version}),
        )
        .await;

        let enhanced = snapshot.enhance(&request.criteria, category, &self.cfg);
        let start = Instant::now();
        let response = match self.registry.get(category) {
            Some(adapter) => adapter.execute(&enhanced).await.and_then(|r| r.into_result()),
            None => Err(AgentError::Unavailable(category)),
        };
        let invoke_ms = start.elapsed().as_millis() as u64;

        let result = match response {
            Ok(response) => {
                let items = response.recommendations.unwrap_or_default();
                let defaults = NormalizationDefaults::from_criteria(&request.criteria, category);
                let stored = normalize_and_store(
                    &self.normalizer,
                    self.store.as_ref(),
                    trip_id,
                    category,
                    &items,
                    &defaults,
                )
                .await;
                if !stored.store_errors.is_empty() {
                    tracing::warn!(
                        trip_id,
                        agent = %category,
                        failed = stored.store_errors.len(),
                        "Some recommendations were not persisted"
                    );
                }
                let reported = Normalizer::reported_confidence(response.confidence.as_ref());
                let rejected = stored.batch.rejected();
                AgentResult::completed(
                    category,
                    stored.batch.records,
                    reported,
                    start.elapsed().as_millis() as u64,
                    rejected,
                )
            }
            Err(e) => AgentResult::failed(category, e.to_string(), invoke_ms),
        };

        let audit = json!({
            "event": "agent_audit",
            "trip_id": trip_id,
            "agent": category.as_str(),
            "phase": phase_id,
            "ok": result.success,
            "outcome": result.status.as_str(),
            "duration_ms": result.duration_ms,
            "items": result.recommendations.len(),
            "rejected": result.rejected_items,
            "context_version": snapshot.version,
        });
        tracing::info!(audit = %audit.to_string(), "agent");

        let metadata = match &result.error {
            Some(error) => json!({"phase": phase_id, "error": error, "duration_ms": result.duration_ms}),
            None => json!({
                "phase": phase_id,
                "items": result.recommendations.len(),
                "rejected": result.rejected_items,
                "confidence": result.confidence,
                "duration_ms": result.duration_ms,
            }),
        };
        self.persist_status(trip_id, category, result.status, metadata)
            .await;
        result
    }

    async fn persist_status(
        &self,
        trip_id: &str,
        category: Category,
        status: AgentStatus,
        metadata: serde_json::Value,
    ) {
        if let Err(e) = self
            .store
            .set_agent_status(trip_id, category.as_str(), status, metadata)
            .await
        {
            tracing::warn!(trip_id, agent = %category, status = status.as_str(), error = %e, "Failed to persist agent status");
        }
    }
}

/// 阶段开始前检查依赖：每个依赖 Agent 都必须已到终态，跳过或失败的依赖返回对应缺口
fn dependency_gaps(
    phase: &Phase,
    statuses: &HashMap<Category, AgentStatus>,
) -> Result<Vec<(Category, DependencyGap)>, WorkflowError> {
    let mut gaps = Vec::new();
    for dep in &phase.dependencies {
        let status = statuses.get(dep).copied().unwrap_or(AgentStatus::Pending);
        if !status.is_terminal() {
            return Err(WorkflowError::DependencyNotReady {
                phase: phase.id.clone(),
                dependency: *dep,
            });
        }
        match status {
            AgentStatus::Skipped => gaps.push((*dep, DependencyGap::Excluded)),
            AgentStatus::Failed => gaps.push((*dep, DependencyGap::Failed)),
            _ => {}
        }
    }
    Ok(gaps)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::{demo_fixtures, MockAgent};
    use crate::persistence::InMemoryStore;
    use serde_json::json;

    fn request() -> TripRequest {
        serde_json::from_value(json!({
            "trip_id": "trip_test",
            "destination": "Paris",
            "start_date": "2026-05-01",
            "end_date": "2026-05-03",
            "travelers": 2
        }))
        .unwrap()
    }

    fn scheduler(registry: AgentRegistry) -> (PhaseScheduler, Arc<InMemoryStore>) {
        let store = Arc::new(InMemoryStore::new());
        let scheduler = PhaseScheduler::new(
            PhasePlan::standard(),
            registry,
            store.clone(),
            Arc::new(AppConfig::default()),
        );
        (scheduler, store)
    }

    fn demo_registry() -> AgentRegistry {
        let mut registry = AgentRegistry::new();
        for category in Category::ALL {
            registry.register(MockAgent::demo(category));
        }
        registry
    }

    #[tokio::test]
    async fn test_full_run_orders_results_and_versions() {
        let (scheduler, store) = scheduler(demo_registry());
        let outcome = scheduler.run(&request(), None).await.unwrap();

        let order: Vec<Category> = outcome.results.iter().map(|r| r.category).collect();
        assert_eq!(order, Category::ALL.to_vec());
        assert!(outcome.results.iter().all(|r| r.status == AgentStatus::Completed));
        assert_eq!(outcome.context.version, 4);
        assert!(outcome.context.anchor_location.is_some());
        assert!(outcome.warnings.is_empty());
        assert_eq!(outcome.phases.len(), 2);

        let status = store.agent_status("trip_test", "restaurant").await.unwrap().unwrap();
        assert_eq!(status.status, AgentStatus::Completed);
        let ids = store.list_ids("trip_test", Category::Activity).await.unwrap();
        assert_eq!(ids.len(), demo_fixtures(Category::Activity).len());
    }

    #[tokio::test]
    async fn test_parallel_agents_share_snapshot() {
        let flight = MockAgent::demo(Category::Flight);
        let hotel = MockAgent::demo(Category::Accommodation);
        let flight_calls = flight.recorder();
        let hotel_calls = hotel.recorder();
        let mut registry = AgentRegistry::new();
        registry.register(flight);
        registry.register(hotel);

        let (scheduler, _) = scheduler(registry);
        let subset = [Category::Flight, Category::Accommodation];
        let outcome = scheduler.run(&request(), Some(&subset[..])).await.unwrap();

        assert_eq!(flight_calls.calls()[0].context_version, 0);
        assert_eq!(hotel_calls.calls()[0].context_version, 0);
        assert_eq!(outcome.context.version, 2);
    }

    #[tokio::test]
    async fn test_sequential_agent_sees_previous_fold() {
        let activity = MockAgent::demo(Category::Activity);
        let restaurant = MockAgent::demo(Category::Restaurant);
        let activity_calls = activity.recorder();
        let restaurant_calls = restaurant.recorder();
        let mut registry = demo_registry();
        registry.register(activity);
        registry.register(restaurant);

        let (scheduler, _) = scheduler(registry);
        scheduler.run(&request(), None).await.unwrap();

        let activity_seen = &activity_calls.calls()[0];
        let restaurant_seen = &restaurant_calls.calls()[0];
        assert_eq!(activity_seen.context_version, 2);
        assert!(activity_seen.anchor_location.is_some());
        assert_eq!(restaurant_seen.context_version, 3);
        assert!(!restaurant_seen.activity_locations.is_empty());
    }

    #[tokio::test]
    async fn test_failure_is_isolated() {
        let mut registry = demo_registry();
        registry.register(MockAgent::failing(
            Category::Activity,
            AgentError::Transport("connection refused".into()),
        ));
        let restaurant = MockAgent::demo(Category::Restaurant);
        let restaurant_calls = restaurant.recorder();
        registry.register(restaurant);

        let (scheduler, _) = scheduler(registry);
        let outcome = scheduler.run(&request(), None).await.unwrap();

        let activity = &outcome.results[2];
        assert_eq!(activity.status, AgentStatus::Failed);
        assert!(activity.error.as_deref().unwrap().contains("connection refused"));
        assert_eq!(outcome.results[3].status, AgentStatus::Completed);
        // 失败不折叠：餐厅看到的仍是 foundation 之后的版本
        assert_eq!(restaurant_calls.calls()[0].context_version, 2);
    }

    #[tokio::test]
    async fn test_subset_without_dependency_warns() {
        let (scheduler, store) = scheduler(demo_registry());
        let subset = [Category::Activity];
        let outcome = scheduler.run(&request(), Some(&subset[..])).await.unwrap();

        assert_eq!(outcome.results.len(), 4);
        assert_eq!(outcome.results[0].status, AgentStatus::Skipped);
        assert_eq!(outcome.results[2].status, AgentStatus::Completed);
        assert_eq!(outcome.results[3].status, AgentStatus::Skipped);
        assert_eq!(outcome.warnings.len(), 1);
        assert_eq!(outcome.warnings[0].dependency, Category::Accommodation);
        assert_eq!(outcome.warnings[0].gap, DependencyGap::Excluded);
        assert_eq!(outcome.phases[0].status, PhaseStatus::Skipped);

        let skipped = store.agent_status("trip_test", "flight").await.unwrap().unwrap();
        assert_eq!(skipped.status, AgentStatus::Skipped);
    }

    #[test]
    fn test_dependency_gate_requires_terminal_status() {
        let phase = Phase {
            id: "experiences".into(),
            agents: vec![Category::Activity],
            parallel: false,
            dependencies: vec![Category::Accommodation],
        };
        let mut statuses = HashMap::new();
        statuses.insert(Category::Accommodation, AgentStatus::Running);
        assert_eq!(
            dependency_gaps(&phase, &statuses).unwrap_err(),
            WorkflowError::DependencyNotReady {
                phase: "experiences".into(),
                dependency: Category::Accommodation,
            }
        );

        statuses.insert(Category::Accommodation, AgentStatus::Completed);
        assert!(dependency_gaps(&phase, &statuses).unwrap().is_empty());
        statuses.insert(Category::Accommodation, AgentStatus::Failed);
        assert_eq!(
            dependency_gaps(&phase, &statuses).unwrap(),
            vec![(Category::Accommodation, DependencyGap::Failed)]
        );
    }

    #[tokio::test]
    async fn test_missing_adapter_fails_only_that_agent() {
        let mut registry = AgentRegistry::new();
        registry.register(MockAgent::demo(Category::Accommodation));
        let (scheduler, _) = scheduler(registry);
        let subset = [Category::Flight, Category::Accommodation];
        let outcome = scheduler.run(&request(), Some(&subset[..])).await.unwrap();
        assert_eq!(outcome.results[0].status, AgentStatus::Failed);
        assert_eq!(outcome.results[1].status, AgentStatus::Completed);
    }
}
