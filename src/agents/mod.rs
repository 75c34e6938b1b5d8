//! Agent 适配器：契约、注册表与实现（Mock / HTTP / 超时与重试包装）

pub mod http;
pub mod mock;
pub mod registry;
pub mod resilience;
pub mod traits;

pub use http::HttpAgent;
pub use mock::{demo_fixtures, CallRecorder, MockAgent};
pub use registry::AgentRegistry;
pub use resilience::{RetryingAgent, TimeoutAgent};
pub use traits::{AgentAdapter, AgentResponse};
