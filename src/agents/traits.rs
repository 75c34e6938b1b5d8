//! Agent 适配器契约
//!
//! 每个外部推荐协作方（航班 / 住宿 / 活动 / 餐厅）都实现 AgentAdapter：
//! 输入增强后的条件，返回原始推荐 JSON，由调度器负责归一化。

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::{AgentError, Category, EnhancedCriteria};

/// Agent 的原始响应
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentResponse {
    pub success: bool,
    #[serde(default)]
    pub recommendations: Option<Vec<Value>>,
    /// 0-1 或 0-100
    #[serde(default)]
    pub confidence: Option<Value>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub duration_ms: u64,
}

impl AgentResponse {
    pub fn ok(recommendations: Vec<Value>) -> Self {
        Self {
            success: true,
            recommendations: Some(recommendations),
            ..Default::default()
        }
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = Some(Value::from(confidence));
        self
    }

    /// success=false 视为 Agent 拒绝
    pub fn into_result(self) -> Result<Self, AgentError> {
        if self.success {
            Ok(self)
        } else {
            Err(AgentError::Rejected(
                self.error
                    .unwrap_or_else(|| "agent returned success=false".to_string()),
            ))
        }
    }
}

#[async_trait]
pub trait AgentAdapter: Send + Sync {
    fn category(&self) -> Category;

    fn name(&self) -> &str {
        self.category().as_str()
    }

    async fn execute(&self, criteria: &EnhancedCriteria) -> Result<AgentResponse, AgentError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsuccessful_response_is_rejected() {
        let resp = AgentResponse {
            success: false,
            error: Some("no availability".into()),
            ..Default::default()
        };
        assert_eq!(
            resp.into_result(),
            Err(AgentError::Rejected("no availability".into()))
        );
        assert!(AgentResponse::ok(vec![]).into_result().is_ok());
    }

    #[test]
    fn test_response_decodes_minimal_json() {
        let resp: AgentResponse = serde_json::from_str(r#"{"success": true, "recommendations": [{"name": "x"}], "confidence": 80}"#).unwrap();
        assert_eq!(resp.recommendations.unwrap().len(), 1);
        assert_eq!(resp.confidence, Some(Value::from(80)));
    }
}
