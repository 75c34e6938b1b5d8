//! 阶段计划构建器
//!
//! 提供流畅的 API 声明阶段与依赖，build() 时一次性校验阶段图。

use crate::core::Category;
use crate::workflow::graph::PhaseGraph;
use crate::workflow::types::*;

/// 校验过的阶段计划：阶段按声明顺序保存，执行顺序为拓扑序
#[derive(Debug, Clone)]
pub struct PhasePlan {
    phases: Vec<Phase>,
    order: Vec<usize>,
}

impl PhasePlan {
    /// 默认计划：foundation（航班 + 住宿，并行）→ experiences（活动 → 餐厅，顺序，依赖住宿）
    pub fn standard() -> Self {
        let phases = vec![
            Phase::new("foundation", vec![Category::Flight, Category::Accommodation], true),
            Phase {
                id: "experiences".to_string(),
                agents: vec![Category::Activity, Category::Restaurant],
                parallel: false,
                dependencies: vec![Category::Accommodation],
            },
        ];
        Self {
            phases,
            order: vec![0, 1],
        }
    }

    pub fn from_phases(phases: Vec<Phase>) -> Result<Self, WorkflowError> {
        let graph = PhaseGraph::new(&phases)?;
        let order = graph.execution_order(&phases)?;
        Ok(Self { phases, order })
    }

    /// 按执行顺序迭代阶段
    pub fn ordered_phases(&self) -> impl Iterator<Item = &Phase> {
        self.order.iter().map(move |&i| &self.phases[i])
    }

    /// 按执行顺序列出所有 Agent
    pub fn agents(&self) -> Vec<Category> {
        self.ordered_phases()
            .flat_map(|p| p.agents.iter().copied())
            .collect()
    }

    pub fn contains(&self, agent: Category) -> bool {
        self.phases.iter().any(|p| p.agents.contains(&agent))
    }

    pub fn phases(&self) -> &[Phase] {
        &self.phases
    }
}

impl Default for PhasePlan {
    fn default() -> Self {
        Self::standard()
    }
}

/// 阶段计划构建器
#[derive(Debug, Default)]
pub struct PhasePlanBuilder {
    phases: Vec<Phase>,
    error: Option<WorkflowError>,
}

impl PhasePlanBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// 添加并行阶段
    pub fn parallel(mut self, id: impl Into<PhaseId>, agents: impl IntoIterator<Item = Category>) -> Self {
        self.phases
            .push(Phase::new(id, agents.into_iter().collect(), true));
        self
    }

    /// 添加顺序阶段
    pub fn sequential(mut self, id: impl Into<PhaseId>, agents: impl IntoIterator<Item = Category>) -> Self {
        self.phases
            .push(Phase::new(id, agents.into_iter().collect(), false));
        self
    }

    /// 为已声明的阶段添加依赖
    pub fn depends_on(mut self, id: &str, deps: impl IntoIterator<Item = Category>) -> Self {
        match self.phases.iter_mut().find(|p| p.id == id) {
            Some(phase) => phase.dependencies.extend(deps),
            None => {
                self.error.get_or_insert(WorkflowError::InvalidConfiguration(format!(
                    "depends_on references undeclared phase '{id}'"
                )));
            }
        }
        self
    }

    pub fn build(self) -> Result<PhasePlan, WorkflowError> {
        if let Some(err) = self.error {
            return Err(err);
        }
        PhasePlan::from_phases(self.phases)
    }
}
