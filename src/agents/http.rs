//! HTTP Agent：把增强条件以 JSON POST 给远端推荐服务
//!
//! 响应可以是完整的 AgentResponse，也可以是裸推荐数组。

use std::time::Instant;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use super::{AgentAdapter, AgentResponse};
use crate::core::{AgentError, Category, EnhancedCriteria};

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ResponseEnvelope {
    Full(AgentResponse),
    Bare(Vec<Value>),
}

pub struct HttpAgent {
    category: Category,
    endpoint: String,
    client: reqwest::Client,
}

impl HttpAgent {
    pub fn new(category: Category, endpoint: impl Into<String>) -> Self {
        Self {
            category,
            endpoint: endpoint.into(),
            client: reqwest::Client::new(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl AgentAdapter for HttpAgent {
    fn category(&self) -> Category {
        self.category
    }

    async fn execute(&self, criteria: &EnhancedCriteria) -> Result<AgentResponse, AgentError> {
        let start = Instant::now();
        let resp = self
            .client
            .post(&self.endpoint)
            .json(criteria)
            .send()
            .await
            .map_err(|e| AgentError::Transport(e.to_string()))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| AgentError::Transport(e.to_string()))?;
        if status.is_server_error() {
            return Err(AgentError::Transport(format!("{status}: {}", preview(&body))));
        }
        if !status.is_success() {
            return Err(AgentError::Rejected(format!("{status}: {}", preview(&body))));
        }

        let mut response = parse_body(&body)?;
        if response.duration_ms == 0 {
            response.duration_ms = start.elapsed().as_millis() as u64;
        }
        response.into_result()
    }
}

fn parse_body(body: &str) -> Result<AgentResponse, AgentError> {
    match serde_json::from_str::<ResponseEnvelope>(body) {
        Ok(ResponseEnvelope::Full(resp)) => Ok(resp),
        Ok(ResponseEnvelope::Bare(items)) => Ok(AgentResponse::ok(items)),
        Err(e) => Err(AgentError::InvalidResponse(format!("{e}: {}", preview(body)))),
    }
}

fn preview(body: &str) -> String {
    if body.len() > 200 {
        format!("{}...", body.chars().take(200).collect::<String>())
    } else {
        body.to_string()
    }
}
