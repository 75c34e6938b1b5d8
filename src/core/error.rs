//! 错误分类
//!
//! - AgentError：归属于单个 Agent，从不升级为整体失败
//! - PersistenceError：尽力而为的写入失败，只记录日志
//! - DependencyUnmetWarning：阶段依赖被排除或失败，降级执行并写入元数据
//! - PlannerError：调度器内部控制流故障，唯一会导致 success=false 的错误
//!
//! 单条推荐的归一化错误见 `normalize::NormalizationError`。

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::Category;
use crate::workflow::WorkflowError;

/// Agent 调用失败（抛错或返回 success=false）
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AgentError {
    #[error("Agent timed out after {0:?}")]
    Timeout(Duration),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Agent reported failure: {0}")]
    Rejected(String),

    #[error("Invalid agent response: {0}")]
    InvalidResponse(String),

    #[error("No adapter registered for {0}")]
    Unavailable(Category),
}

impl AgentError {
    /// 超时与传输错误可重试；Agent 明确拒绝或响应格式错误不重试
    pub fn is_retryable(&self) -> bool {
        matches!(self, AgentError::Timeout(_) | AgentError::Transport(_))
    }
}

/// 持久化协作方的失败
#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("Storage backend error: {0}")]
    Backend(String),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// 依赖缺口的原因
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyGap {
    /// 不在本次请求的 Agent 子集中
    Excluded,
    /// 已执行但失败
    Failed,
}

/// 阶段依赖未满足：执行继续，但上下文是降级的
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DependencyUnmetWarning {
    pub phase: String,
    pub dependency: Category,
    pub gap: DependencyGap,
    pub message: String,
}

impl DependencyUnmetWarning {
    pub fn new(phase: impl Into<String>, dependency: Category, gap: DependencyGap) -> Self {
        let phase = phase.into();
        let message = match gap {
            DependencyGap::Excluded => format!(
                "phase '{phase}' runs without '{dependency}' (excluded from request); context is degraded"
            ),
            DependencyGap::Failed => format!(
                "phase '{phase}' runs without '{dependency}' (agent failed); context is degraded"
            ),
        };
        Self {
            phase,
            dependency,
            gap,
            message,
        }
    }
}

/// 调度器内部故障
#[derive(Error, Debug)]
pub enum PlannerError {
    #[error("Invalid phase plan: {0}")]
    Workflow(#[from] WorkflowError),

    #[error("Unknown agent in requested subset: {0}")]
    UnknownAgent(String),

    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),
}
