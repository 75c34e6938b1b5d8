//! 阶段计划类型定义
//!
//! 阶段（Phase）是一组 Agent，带并行/顺序模式和依赖（依赖以 Agent 命名）。

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::Category;

pub type PhaseId = String;

/// 阶段定义
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Phase {
    pub id: PhaseId,
    pub agents: Vec<Category>,
    /// true：组内 Agent 并发执行并共享同一上下文快照
    #[serde(default)]
    pub parallel: bool,
    /// 本阶段开始前必须到达终态的 Agent
    #[serde(default)]
    pub dependencies: Vec<Category>,
}

impl Phase {
    pub fn new(id: impl Into<PhaseId>, agents: Vec<Category>, parallel: bool) -> Self {
        Self {
            id: id.into(),
            agents,
            parallel,
            dependencies: Vec::new(),
        }
    }
}

/// 阶段执行状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseStatus {
    /// 至少一个 Agent 被调用
    Executed,
    /// 组内 Agent 全部不在请求子集中
    Skipped,
}

/// 阶段执行记录（写入计划元数据）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseRecord {
    pub id: PhaseId,
    pub status: PhaseStatus,
    pub parallel: bool,
    pub agents: Vec<Category>,
    pub duration_ms: u64,
    /// 阶段结束时的上下文版本
    pub context_version: u64,
}

/// 阶段图错误（调度器内部故障）
#[derive(Error, Debug, Clone, PartialEq)]
pub enum WorkflowError {
    #[error("Phase plan has no phases")]
    EmptyPlan,
    #[error("Phase '{0}' has no agents")]
    EmptyPhase(PhaseId),
    #[error("Duplicate phase id '{0}'")]
    DuplicatePhase(PhaseId),
    #[error("Agent '{0}' appears in more than one phase")]
    DuplicateAgent(Category),
    #[error("Phase '{phase}' depends on '{dependency}', which no phase runs")]
    UnknownDependency { phase: PhaseId, dependency: Category },
    #[error("Cyclic dependency among phases {0:?}")]
    CyclicDependency(Vec<PhaseId>),
    #[error("Phase '{phase}' reached before dependency '{dependency}' finished")]
    DependencyNotReady { phase: PhaseId, dependency: Category },
    #[error("Invalid phase configuration: {0}")]
    InvalidConfiguration(String),
}
