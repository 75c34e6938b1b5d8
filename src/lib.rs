//! Wayfarer - 行程规划编排核心
//!
//! 模块划分：
//! - **agents**: Agent 适配器契约、注册表、HTTP / Mock 实现、超时与重试
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 旅行条件、执行上下文、状态与错误、组件装配
//! - **geo**: 距离、聚类、交通可行性、城市坐标表
//! - **normalize**: 多形态推荐归一化为统一结构
//! - **persistence**: 推荐与 Agent 状态存储（内存 / SQLite）
//! - **planner**: 对外门面 TripPlanner
//! - **synth**: 预算、置信度、行程表与最终计划合成
//! - **workflow**: 阶段计划、依赖图与调度器

pub mod agents;
pub mod config;
pub mod core;
pub mod geo;
pub mod normalize;
pub mod observability;
pub mod persistence;
pub mod planner;
pub mod synth;
pub mod workflow;

pub use planner::{PlanResponse, TripPlanner};
