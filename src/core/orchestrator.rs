//! 组件装配：根据配置创建 Agent 注册表、存储与 TripPlanner
//!
//! 配置了 HTTP 端点的角色使用 HttpAgent，其余角色回退到内置演示数据的 MockAgent；
//! 所有适配器统一包上 RetryingAgent(TimeoutAgent(..))。

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::agents::{AgentAdapter, AgentRegistry, HttpAgent, MockAgent, RetryingAgent, TimeoutAgent};
use crate::config::{load_config, AppConfig};
use crate::core::{Category, PlannerError};
use crate::persistence::{InMemoryStore, RecommendationStore, SqliteStore};
use crate::planner::TripPlanner;
use crate::workflow::PhasePlan;

/// 按角色选择适配器（HTTP / Mock），并叠加超时与重试
pub fn create_registry_from_config(cfg: &AppConfig) -> AgentRegistry {
    let mut registry = AgentRegistry::new();
    let timeout = Duration::from_secs(cfg.scheduler.agent_timeout_secs);
    let backoff = Duration::from_millis(cfg.scheduler.retry_backoff_ms);

    for category in Category::ALL {
        let inner: Arc<dyn AgentAdapter> = match cfg.agents.endpoints.get(category.as_str()) {
            Some(endpoint) if !endpoint.trim().is_empty() => {
                tracing::info!(agent = %category, endpoint = %endpoint, "Using HTTP agent");
                Arc::new(HttpAgent::new(category, endpoint.trim()))
            }
            _ => {
                tracing::info!(agent = %category, "No endpoint configured, using mock agent");
                Arc::new(MockAgent::demo(category))
            }
        };
        let timed: Arc<dyn AgentAdapter> = Arc::new(TimeoutAgent::new(inner, timeout));
        registry.register(RetryingAgent::new(timed, cfg.scheduler.retry_attempts, backoff));
    }
    registry
}

/// 配置了 sqlite_path 时使用 SQLite；打开失败则回退到内存存储（持久化只是尽力而为）
pub fn create_store_from_config(cfg: &AppConfig) -> Arc<dyn RecommendationStore> {
    match &cfg.persistence.sqlite_path {
        Some(path) => match SqliteStore::open(path) {
            Ok(store) => {
                tracing::info!(path = %path.display(), "Using SQLite store");
                Arc::new(store)
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "SQLite store unavailable, using in-memory store");
                Arc::new(InMemoryStore::new())
            }
        },
        None => Arc::new(InMemoryStore::new()),
    }
}

/// 由已加载的配置装配默认阶段计划的 TripPlanner
pub fn create_planner_with(cfg: Arc<AppConfig>) -> TripPlanner {
    let registry = create_registry_from_config(&cfg);
    let store = create_store_from_config(&cfg);
    TripPlanner::new(PhasePlan::standard(), registry, store, cfg)
}

/// 加载配置并装配 TripPlanner；配置解析失败是调度器级别的错误
pub fn create_planner(config_path: Option<PathBuf>) -> Result<TripPlanner, PlannerError> {
    let cfg = load_config(config_path)?;
    Ok(create_planner_with(Arc::new(cfg)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_covers_all_roles() {
        let mut cfg = AppConfig::default();
        cfg.agents
            .endpoints
            .insert("flight".into(), "http://localhost:8080/flights".into());
        let registry = create_registry_from_config(&cfg);
        assert_eq!(registry.len(), 4);
        assert_eq!(registry.get(Category::Flight).unwrap().name(), "flight");
    }

    #[test]
    fn test_store_falls_back_to_memory() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, b"x").unwrap();
        let mut cfg = AppConfig::default();
        cfg.persistence.sqlite_path = Some(blocker.join("db.sqlite"));
        // 父路径是普通文件，无法创建数据库；不应 panic
        let _store = create_store_from_config(&cfg);
    }
}
