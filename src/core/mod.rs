//! 核心层：请求与条件、执行上下文、状态、错误分类、组件装配

pub mod context;
pub mod criteria;
pub mod error;
pub mod orchestrator;
pub mod state;

pub use context::{AnchorLocation, ExecutionContext};
pub use criteria::{BudgetHints, Category, EnhancedCriteria, TripCriteria, TripPreferences, TripRequest};
pub use error::{AgentError, DependencyGap, DependencyUnmetWarning, PersistenceError, PlannerError};
pub use orchestrator::{
    create_planner, create_planner_with, create_registry_from_config, create_store_from_config,
};
pub use state::{AgentResult, AgentStatus, RunStatus};
