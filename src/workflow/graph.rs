//! 阶段依赖图
//!
//! 使用邻接表和入度表做 Kahn 拓扑排序；同层就绪的阶段按声明顺序出队，保证结果确定。

use std::collections::{BTreeSet, HashMap, HashSet};

use crate::core::Category;
use crate::workflow::types::*;

/// 阶段依赖图（节点为阶段在声明列表中的下标）
#[derive(Debug, Clone)]
pub struct PhaseGraph {
    /// 邻接表：阶段 -> 依赖它的阶段
    pub adjacency: Vec<Vec<usize>>,
    /// 入度表：阶段 -> 依赖的阶段数（按边计）
    pub in_degree: Vec<usize>,
    /// Agent -> 所属阶段
    pub owner: HashMap<Category, usize>,
}

impl PhaseGraph {
    /// 校验并建图：空计划、空阶段、重复阶段 / Agent、未知依赖都是错误
    pub fn new(phases: &[Phase]) -> Result<Self, WorkflowError> {
        if phases.is_empty() {
            return Err(WorkflowError::EmptyPlan);
        }

        let mut ids = HashSet::new();
        let mut owner = HashMap::new();
        for (index, phase) in phases.iter().enumerate() {
            if !ids.insert(phase.id.as_str()) {
                return Err(WorkflowError::DuplicatePhase(phase.id.clone()));
            }
            if phase.agents.is_empty() {
                return Err(WorkflowError::EmptyPhase(phase.id.clone()));
            }
            for agent in &phase.agents {
                if owner.insert(*agent, index).is_some() {
                    return Err(WorkflowError::DuplicateAgent(*agent));
                }
            }
        }

        let mut adjacency = vec![Vec::new(); phases.len()];
        let mut in_degree = vec![0; phases.len()];
        for (index, phase) in phases.iter().enumerate() {
            // 同一阶段内多个依赖落在同一上游阶段时只连一条边
            let mut upstream = HashSet::new();
            for dep in &phase.dependencies {
                let from = *owner.get(dep).ok_or_else(|| WorkflowError::UnknownDependency {
                    phase: phase.id.clone(),
                    dependency: *dep,
                })?;
                if upstream.insert(from) {
                    adjacency[from].push(index);
                    in_degree[index] += 1;
                }
            }
        }

        Ok(Self {
            adjacency,
            in_degree,
            owner,
        })
    }

    /// 拓扑序；存在环时返回环上（未能出队）的阶段
    pub fn execution_order(&self, phases: &[Phase]) -> Result<Vec<usize>, WorkflowError> {
        let mut in_degree = self.in_degree.clone();
        let mut ready: BTreeSet<usize> = in_degree
            .iter()
            .enumerate()
            .filter(|(_, d)| **d == 0)
            .map(|(i, _)| i)
            .collect();
        let mut order = Vec::with_capacity(phases.len());

        while let Some(next) = ready.pop_first() {
            order.push(next);
            for &dependent in &self.adjacency[next] {
                in_degree[dependent] -= 1;
                if in_degree[dependent] == 0 {
                    ready.insert(dependent);
                }
            }
        }

        if order.len() < phases.len() {
            let stuck = (0..phases.len())
                .filter(|i| !order.contains(i))
                .map(|i| phases[i].id.clone())
                .collect();
            return Err(WorkflowError::CyclicDependency(stuck));
        }
        Ok(order)
    }
}
