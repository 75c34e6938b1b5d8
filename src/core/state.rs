//! 状态定义：Agent 状态、整体运行状态与单个 Agent 的执行结果

use serde::{Deserialize, Serialize};

use crate::core::Category;
use crate::normalize::CanonicalRecommendation;

/// 单个 Agent 的状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    /// 尚未执行
    Pending,
    /// 正在执行
    Running,
    /// 已完成
    Completed,
    /// 失败
    Failed,
    /// 不在请求子集中，未调用
    Skipped,
}

impl AgentStatus {
    /// 是否为终态
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AgentStatus::Completed | AgentStatus::Failed | AgentStatus::Skipped
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AgentStatus::Pending => "pending",
            AgentStatus::Running => "running",
            AgentStatus::Completed => "completed",
            AgentStatus::Failed => "failed",
            AgentStatus::Skipped => "skipped",
        }
    }
}

/// 整体运行状态：任一 Agent 失败即为 Failed，即使计划中仍含其它 Agent 的数据
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    RecommendationsReady,
    Failed,
}

impl RunStatus {
    pub fn from_results(results: &[AgentResult]) -> Self {
        if results.iter().any(|r| r.status == AgentStatus::Failed) {
            RunStatus::Failed
        } else {
            RunStatus::RecommendationsReady
        }
    }
}

/// 每个 Agent 每次运行产生一次，之后不可变
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentResult {
    pub agent_name: String,
    pub category: Category,
    pub status: AgentStatus,
    pub success: bool,
    pub recommendations: Vec<CanonicalRecommendation>,
    /// [0,1]
    pub confidence: f64,
    pub duration_ms: u64,
    #[serde(default)]
    pub error: Option<String>,
    /// 归一化失败的条目数
    #[serde(default)]
    pub rejected_items: usize,
}

impl AgentResult {
    pub fn skipped(category: Category) -> Self {
        Self {
            agent_name: category.as_str().to_string(),
            category,
            status: AgentStatus::Skipped,
            success: false,
            recommendations: Vec::new(),
            confidence: 0.0,
            duration_ms: 0,
            error: None,
            rejected_items: 0,
        }
    }

    pub fn failed(category: Category, error: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            agent_name: category.as_str().to_string(),
            category,
            status: AgentStatus::Failed,
            success: false,
            recommendations: Vec::new(),
            confidence: 0.0,
            duration_ms,
            error: Some(error.into()),
            rejected_items: 0,
        }
    }

    /// reported 为 Agent 自报的置信度（0-1 或 0-100）；缺省时取条目置信度均值
    pub fn completed(
        category: Category,
        recommendations: Vec<CanonicalRecommendation>,
        reported: Option<f64>,
        duration_ms: u64,
        rejected_items: usize,
    ) -> Self {
        let confidence = match reported.filter(|c| c.is_finite()) {
            Some(c) if c > 1.0 => (c / 100.0).clamp(0.0, 1.0),
            Some(c) => c.clamp(0.0, 1.0),
            None => mean_confidence(&recommendations),
        };
        Self {
            agent_name: category.as_str().to_string(),
            category,
            status: AgentStatus::Completed,
            success: true,
            recommendations,
            confidence,
            duration_ms,
            error: None,
            rejected_items,
        }
    }

    /// 条目置信度均值（用于计划置信度）；无条目时为 None
    pub fn average_item_confidence(&self) -> Option<f64> {
        if self.recommendations.is_empty() {
            None
        } else {
            Some(mean_confidence(&self.recommendations))
        }
    }
}

fn mean_confidence(recs: &[CanonicalRecommendation]) -> f64 {
    if recs.is_empty() {
        return 0.0;
    }
    recs.iter().map(|r| r.confidence.score).sum::<f64>() / recs.len() as f64
}
