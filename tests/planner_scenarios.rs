//! 端到端规划场景：Mock Agent + 内存 / SQLite 存储

use std::sync::Arc;

use serde_json::json;
use wayfarer::agents::{AgentRegistry, MockAgent};
use wayfarer::config::AppConfig;
use wayfarer::core::{AgentError, AgentStatus, Category, DependencyGap, RunStatus, TripRequest};
use wayfarer::persistence::{InMemoryStore, RecommendationStore, SqliteStore};
use wayfarer::workflow::PhasePlan;
use wayfarer::TripPlanner;

fn paris_request() -> TripRequest {
    serde_json::from_value(json!({
        "trip_id": "trip_paris",
        "destination": "Paris, France",
        "origin": "New York",
        "start_date": "2026-05-01",
        "end_date": "2026-05-03",
        "travelers": 2,
        "preferences": { "travel_style": "moderate", "travel_mode": "walking" }
    }))
    .unwrap()
}

fn demo_registry() -> AgentRegistry {
    let mut registry = AgentRegistry::new();
    for category in Category::ALL {
        registry.register(MockAgent::demo(category));
    }
    registry
}

fn planner_with(registry: AgentRegistry, store: Arc<dyn RecommendationStore>) -> TripPlanner {
    TripPlanner::new(
        PhasePlan::standard(),
        registry,
        store,
        Arc::new(AppConfig::default()),
    )
}

fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

#[tokio::test]
async fn test_full_demo_run_produces_plan() {
    let planner = planner_with(demo_registry(), Arc::new(InMemoryStore::new()));
    let response = planner.run(&paris_request(), None).await;

    assert!(response.success);
    assert!(response.error.is_none());
    let plan = response.plan.unwrap();
    assert_eq!(plan.trip_id, "trip_paris");
    assert_eq!(plan.metadata.run_status, RunStatus::RecommendationsReady);
    assert_eq!(plan.metadata.context_version, 4);
    assert_eq!(plan.recommendations.len(), 4);
    assert_eq!(plan.recommendations[&Category::Activity].len(), 3);
    assert!(!plan.metadata.structurally_incomplete);
    assert!(plan.trip_summary.failed_agents.is_empty());
    assert!(plan.trip_summary.destination_coordinates.is_some());

    let anchor = plan.trip_summary.anchor_location.as_ref().unwrap();
    assert_eq!(anchor.name, "Hôtel de Ville Residence");

    assert_eq!(plan.itinerary.len(), 3);
    assert_eq!(plan.itinerary[0].day, 1);
}

#[tokio::test]
async fn test_paris_clusters_and_coverage() {
    let planner = planner_with(demo_registry(), Arc::new(InMemoryStore::new()));
    let plan = planner.run(&paris_request(), None).await.plan.unwrap();

    // 卢浮宫与圣母院相距约 1.2 公里成簇；万森纳城堡单独成簇
    assert_eq!(plan.metadata.clusters.len(), 2);
    let sizes: Vec<usize> = plan.metadata.clusters.iter().map(|c| c.members.len()).collect();
    assert!(sizes.contains(&2) && sizes.contains(&1));

    // 万森纳距酒店约 8 公里，不在覆盖半径内
    let coverage = plan.trip_summary.geographic_coverage;
    assert!((coverage - 200.0 / 3.0).abs() < 0.1, "coverage = {coverage}");
}

#[tokio::test]
async fn test_confidence_from_demo_fixtures() {
    let planner = planner_with(demo_registry(), Arc::new(InMemoryStore::new()));
    let plan = planner.run(&paris_request(), None).await.plan.unwrap();

    let breakdown = &plan.metadata.confidence_breakdown;
    // 0.30×0.8 + 0.30×0.9 + 0.25×0.7 + 0.15×0.6
    assert!((breakdown.base - 0.775).abs() < 1e-9);
    assert_eq!(breakdown.budget_bonus, 0.0);
    assert_eq!(breakdown.failed_agent_penalty, 0.0);
    assert_eq!(plan.trip_summary.confidence, 79);
}

#[tokio::test]
async fn test_accommodation_only_subset() {
    let planner = planner_with(demo_registry(), Arc::new(InMemoryStore::new()));
    let subset = names(&["accommodation"]);
    let response = planner.run(&paris_request(), Some(subset.as_slice())).await;

    assert!(response.success);
    let plan = response.plan.unwrap();
    let statuses: Vec<(String, AgentStatus)> = plan
        .metadata
        .agent_results
        .iter()
        .map(|r| (r.agent_name.clone(), r.status))
        .collect();
    assert!(statuses.contains(&("accommodation".into(), AgentStatus::Completed)));
    assert!(statuses.contains(&("activity".into(), AgentStatus::Skipped)));
    assert!(statuses.contains(&("flight".into(), AgentStatus::Skipped)));
    assert!(plan.metadata.dependency_warnings.is_empty());
    assert_eq!(plan.metadata.run_status, RunStatus::RecommendationsReady);
}

#[tokio::test]
async fn test_activity_without_accommodation_is_structurally_incomplete() {
    let planner = planner_with(demo_registry(), Arc::new(InMemoryStore::new()));
    let subset = names(&["activities"]);
    let response = planner.run(&paris_request(), Some(subset.as_slice())).await;

    assert!(response.success);
    let plan = response.plan.unwrap();
    assert!(plan.metadata.structurally_incomplete);
    assert_eq!(plan.metadata.dependency_warnings.len(), 1);
    let warning = &plan.metadata.dependency_warnings[0];
    assert_eq!(warning.dependency, Category::Accommodation);
    assert_eq!(warning.gap, DependencyGap::Excluded);
    assert!(plan.trip_summary.anchor_location.is_none());
    assert_eq!(plan.recommendations[&Category::Activity].len(), 3);
}

#[tokio::test]
async fn test_failing_agent_does_not_fail_run() {
    let mut registry = demo_registry();
    registry.register(MockAgent::failing(
        Category::Restaurant,
        AgentError::Rejected("no restaurants found".into()),
    ));
    let planner = planner_with(registry, Arc::new(InMemoryStore::new()));
    let response = planner.run(&paris_request(), None).await;

    assert!(response.success);
    let plan = response.plan.unwrap();
    assert_eq!(plan.metadata.run_status, RunStatus::Failed);
    assert_eq!(plan.trip_summary.failed_agents, vec!["restaurant".to_string()]);
    assert!((plan.metadata.confidence_breakdown.failed_agent_penalty - 0.1).abs() < 1e-9);
    assert!(!plan.recommendations.contains_key(&Category::Restaurant));
    assert_eq!(plan.recommendations[&Category::Activity].len(), 3);
}

#[tokio::test]
async fn test_failed_accommodation_still_runs_experiences() {
    let mut registry = demo_registry();
    registry.register(MockAgent::failing(
        Category::Accommodation,
        AgentError::Transport("connection reset".into()),
    ));
    let planner = planner_with(registry, Arc::new(InMemoryStore::new()));
    let response = planner.run(&paris_request(), None).await;

    assert!(response.success);
    let plan = response.plan.unwrap();
    let status_of = |name: &str| {
        plan.metadata
            .agent_results
            .iter()
            .find(|r| r.agent_name == name)
            .map(|r| r.status)
    };
    assert_eq!(status_of("accommodation"), Some(AgentStatus::Failed));
    assert_eq!(status_of("activity"), Some(AgentStatus::Completed));
    assert_eq!(status_of("restaurant"), Some(AgentStatus::Completed));

    assert_eq!(plan.metadata.dependency_warnings.len(), 1);
    let warning = &plan.metadata.dependency_warnings[0];
    assert_eq!(warning.dependency, Category::Accommodation);
    assert_eq!(warning.gap, DependencyGap::Failed);
    assert!(plan.metadata.structurally_incomplete);
    assert_eq!(plan.metadata.run_status, RunStatus::Failed);
    assert!(plan.trip_summary.anchor_location.is_none());
}

#[tokio::test]
async fn test_unknown_agent_fails_response() {
    let planner = planner_with(demo_registry(), Arc::new(InMemoryStore::new()));
    let subset = names(&["flight", "spa"]);
    let response = planner.run(&paris_request(), Some(subset.as_slice())).await;

    assert!(!response.success);
    assert!(response.plan.is_none());
    assert!(response.error.unwrap().contains("spa"));
}

#[tokio::test]
async fn test_budget_hint_is_reported_not_filtered() {
    let planner = planner_with(demo_registry(), Arc::new(InMemoryStore::new()));
    let mut request = paris_request();
    request.criteria.budget = serde_json::from_value(json!({ "total": 4000.0 })).unwrap();
    let plan = planner.run(&request, None).await.plan.unwrap();

    let budget = &plan.trip_summary.budget;
    assert!(budget.has_user_budget);
    assert_eq!(budget.total_hint, Some(4000.0));
    assert!(budget.total_estimate > 0.0);
    // 预算只作提示，推荐数量不受影响
    assert_eq!(plan.recommendations[&Category::Flight].len(), 2);
}

#[tokio::test]
async fn test_sqlite_store_persists_run() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(SqliteStore::open(dir.path().join("wayfarer.db")).unwrap());
    let planner = planner_with(demo_registry(), store.clone());
    let response = planner.run(&paris_request(), None).await;
    assert!(response.success);

    let hotels = store
        .list_ids("trip_paris", Category::Accommodation)
        .await
        .unwrap();
    assert_eq!(hotels.len(), 2);
    let status = store
        .agent_status("trip_paris", "activity")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(status.status, AgentStatus::Completed);
}
