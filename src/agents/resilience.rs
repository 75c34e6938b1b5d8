//! 适配器边界上的超时与重试包装
//!
//! 调度器本身从不重试；需要时在这里叠加 RetryingAgent(TimeoutAgent(inner))。

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::timeout;

use super::{AgentAdapter, AgentResponse};
use crate::core::{AgentError, Category, EnhancedCriteria};

pub struct TimeoutAgent {
    inner: Arc<dyn AgentAdapter>,
    timeout: Duration,
}

impl TimeoutAgent {
    pub fn new(inner: Arc<dyn AgentAdapter>, timeout: Duration) -> Self {
        Self { inner, timeout }
    }
}

#[async_trait]
impl AgentAdapter for TimeoutAgent {
    fn category(&self) -> Category {
        self.inner.category()
    }

    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn execute(&self, criteria: &EnhancedCriteria) -> Result<AgentResponse, AgentError> {
        match timeout(self.timeout, self.inner.execute(criteria)).await {
            Ok(result) => result,
            Err(_) => Err(AgentError::Timeout(self.timeout)),
        }
    }
}

/// 有界重试，退避时间线性增长（backoff × 第几次重试）；只重试可重试的错误
pub struct RetryingAgent {
    inner: Arc<dyn AgentAdapter>,
    max_retries: u32,
    backoff: Duration,
}

impl RetryingAgent {
    pub fn new(inner: Arc<dyn AgentAdapter>, max_retries: u32, backoff: Duration) -> Self {
        Self {
            inner,
            max_retries,
            backoff,
        }
    }
}

#[async_trait]
impl AgentAdapter for RetryingAgent {
    fn category(&self) -> Category {
        self.inner.category()
    }

    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn execute(&self, criteria: &EnhancedCriteria) -> Result<AgentResponse, AgentError> {
        let mut retry = 0;
        loop {
            match self.inner.execute(criteria).await {
                Ok(resp) => return Ok(resp),
                Err(e) if e.is_retryable() && retry < self.max_retries => {
                    retry += 1;
                    tracing::warn!(
                        agent = self.inner.name(),
                        retry,
                        max_retries = self.max_retries,
                        error = %e,
                        "Retrying agent"
                    );
                    tokio::time::sleep(self.backoff * retry).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
