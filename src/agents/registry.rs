//! Agent 注册表：按角色存储 Arc<dyn AgentAdapter>

use std::collections::BTreeMap;
use std::sync::Arc;

use super::AgentAdapter;
use crate::core::Category;

#[derive(Default, Clone)]
pub struct AgentRegistry {
    agents: BTreeMap<Category, Arc<dyn AgentAdapter>>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 按适配器声明的角色注册；同一角色重复注册时覆盖
    pub fn register(&mut self, agent: impl AgentAdapter + 'static) {
        self.register_arc(Arc::new(agent));
    }

    pub fn register_arc(&mut self, agent: Arc<dyn AgentAdapter>) {
        self.agents.insert(agent.category(), agent);
    }

    pub fn get(&self, category: Category) -> Option<Arc<dyn AgentAdapter>> {
        self.agents.get(&category).cloned()
    }

    pub fn categories(&self) -> Vec<Category> {
        self.agents.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}
