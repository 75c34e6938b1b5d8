//! 阶段调度：阶段图校验、拓扑排序与执行引擎

pub mod builder;
pub mod engine;
pub mod graph;
pub mod types;

pub use builder::{PhasePlan, PhasePlanBuilder};
pub use engine::{PhaseScheduler, ScheduleOutcome};
pub use graph::PhaseGraph;
pub use types::*;
